use talent_portal::PortalError;
use talent_portal::models::{
    FileOutcome, MAX_CONTENT_LEN, MAX_TAGS, MAX_TITLE_LEN, NewPost, NewTalentProfile, Post,
    PostCategory, PostPatch, PostQuery, TalentFilter, TalentProfile,
};

// --- Test Data Helpers ---

fn valid_post() -> NewPost {
    NewPost {
        title: "Landed my first freelance contract".to_string(),
        content: "Sharing what worked for me during the search.".to_string(),
        category: PostCategory::SuccessStory,
        tags: vec!["freelance".to_string(), "contracts".to_string()],
        images: Vec::new(),
    }
}

fn field_of(err: PortalError) -> &'static str {
    match err {
        PortalError::Validation { field, .. } => field,
        other => panic!("expected a validation error, got {other:?}"),
    }
}

// --- Submission Limit Tests ---

#[test]
fn test_new_post_within_limits_passes() {
    assert!(valid_post().validate().is_ok());
}

#[test]
fn test_new_post_title_limits() {
    let mut draft = valid_post();
    draft.title = "   ".to_string();
    assert_eq!(field_of(draft.validate().unwrap_err()), "title");

    let mut draft = valid_post();
    draft.title = "x".repeat(MAX_TITLE_LEN + 1);
    assert_eq!(field_of(draft.validate().unwrap_err()), "title");

    // The boundary itself is accepted
    let mut draft = valid_post();
    draft.title = "x".repeat(MAX_TITLE_LEN);
    assert!(draft.validate().is_ok());
}

#[test]
fn test_new_post_content_limits() {
    let mut draft = valid_post();
    draft.content = String::new();
    assert_eq!(field_of(draft.validate().unwrap_err()), "content");

    let mut draft = valid_post();
    draft.content = "y".repeat(MAX_CONTENT_LEN + 1);
    assert_eq!(field_of(draft.validate().unwrap_err()), "content");
}

#[test]
fn test_new_post_tag_limits() {
    let mut draft = valid_post();
    draft.tags = (0..MAX_TAGS + 1).map(|i| format!("tag{i}")).collect();
    assert_eq!(field_of(draft.validate().unwrap_err()), "tags");

    let mut draft = valid_post();
    draft.tags = vec!["a-tag-well-over-twenty-characters".to_string()];
    assert_eq!(field_of(draft.validate().unwrap_err()), "tags");

    let mut draft = valid_post();
    draft.tags = vec!["  ".to_string()];
    assert_eq!(field_of(draft.validate().unwrap_err()), "tags");
}

#[test]
fn test_post_patch_checks_only_supplied_fields() {
    // An all-None patch has nothing to complain about
    assert!(PostPatch::default().validate().is_ok());

    let patch = PostPatch {
        title: Some("".to_string()),
        ..PostPatch::default()
    };
    assert_eq!(field_of(patch.validate().unwrap_err()), "title");
}

#[test]
fn test_talent_draft_validation() {
    let mut draft = NewTalentProfile {
        title: "Backend Engineer".to_string(),
        summary: "Six years building billing systems.".to_string(),
        skills: vec!["rust".to_string()],
        experience_years: 6,
        ..NewTalentProfile::default()
    };
    assert!(draft.validate().is_ok());

    draft.skills = Vec::new();
    assert_eq!(field_of(draft.validate().unwrap_err()), "skills");

    draft.skills = vec!["rust".to_string()];
    draft.experience_years = -1;
    assert_eq!(field_of(draft.validate().unwrap_err()), "experience_years");

    draft.experience_years = 6;
    draft.salary_expectation_min = Some(90_000);
    draft.salary_expectation_max = Some(60_000);
    assert_eq!(
        field_of(draft.validate().unwrap_err()),
        "salary_expectation_min"
    );
}

// --- Wire Format Tests ---

#[test]
fn test_category_snake_case_wire_format() {
    // The backend stores categories as snake_case strings
    let json_output = serde_json::to_string(&PostCategory::SuccessStory).unwrap();
    assert_eq!(json_output, r#""success_story""#);

    let parsed: PostCategory = serde_json::from_str(r#""qa""#).unwrap();
    assert_eq!(parsed, PostCategory::Qa);
}

#[test]
fn test_post_patch_omits_absent_fields() {
    let patch = PostPatch {
        title: Some("New Title Only".to_string()),
        ..PostPatch::default()
    };

    // The key validation is that only the provided field travels
    let json_output = serde_json::to_string(&patch).unwrap();
    assert!(json_output.contains(r#""title":"New Title Only""#));
    assert!(!json_output.contains("content"));
    assert!(!json_output.contains("category"));
    assert!(!json_output.contains("tags"));
}

#[test]
fn test_post_row_tolerates_missing_images() {
    // Rows written before the images column existed come back without it
    let row = serde_json::json!({
        "id": "a6f1f4e8-51da-4c53-b9ad-6de00b1b0d5f",
        "user_id": "0d9bd3f9-9a5e-4e0c-95c5-149e12f4fd7c",
        "title": "Older post",
        "content": "No images field in this row.",
        "category": "general",
        "tags": [],
        "is_pinned": false,
        "likes_count": 3,
        "replies_count": 1,
        "created_at": "2025-11-02T09:12:00Z",
        "updated_at": "2025-11-02T09:12:00Z",
    });

    let post: Post = serde_json::from_value(row).unwrap();
    assert!(post.images.is_empty());
    assert_eq!(post.likes_count, 3);
}

#[test]
fn test_search_hit_tolerates_missing_join_fields() {
    // A row read straight from the collection lacks the joined owner identity
    let row = serde_json::json!({
        "id": "7c9e6679-7425-40de-944b-e07fc1f90ae7",
        "user_id": "0d9bd3f9-9a5e-4e0c-95c5-149e12f4fd7c",
        "title": "Data Engineer",
        "summary": "Pipelines and warehouses.",
        "skills": ["sql", "python"],
        "experience_years": 4,
        "education": null,
        "portfolio_url": null,
        "location": "Berlin",
        "salary_expectation_min": null,
        "salary_expectation_max": null,
        "work_type": "fulltime",
        "remote_preference": "remote",
        "status": "approved",
        "created_at": "2025-11-02T09:12:00Z",
        "updated_at": "2025-11-02T09:12:00Z",
    });

    let profile: TalentProfile = serde_json::from_value(row).unwrap();
    assert!(profile.display_name.is_none());
    assert!(profile.certifications.is_empty());
}

// --- Local Filter State Tests ---

#[test]
fn test_talent_filter_default_page() {
    let filter = TalentFilter::default();
    assert_eq!(filter.limit, 50);
    assert_eq!(filter.offset, 0);
    assert!(filter.term.is_none());
    assert!(filter.skills.is_none());
}

#[test]
fn test_post_query_matching() {
    let mut post = Post {
        title: "Interview prep thread".to_string(),
        content: "Collecting questions we were asked.".to_string(),
        category: PostCategory::Qa,
        tags: vec!["interviews".to_string()],
        ..Post::default()
    };

    // No constraints match everything
    assert!(PostQuery::default().matches(&post));

    // Category must match exactly when selected
    let by_category = PostQuery {
        category: Some(PostCategory::Qa),
        term: None,
    };
    assert!(by_category.matches(&post));
    post.category = PostCategory::General;
    assert!(!by_category.matches(&post));

    // Free text scans title, content and tags, case-insensitively
    let by_term = PostQuery {
        category: None,
        term: Some("INTERVIEW".to_string()),
    };
    assert!(by_term.matches(&post));

    let by_tag = PostQuery {
        category: None,
        term: Some("interviews".to_string()),
    };
    assert!(by_tag.matches(&post));

    // A blank term imposes no constraint
    let blank = PostQuery {
        category: None,
        term: Some("   ".to_string()),
    };
    assert!(blank.matches(&post));

    let miss = PostQuery {
        category: None,
        term: Some("salary".to_string()),
    };
    assert!(!miss.matches(&post));
}

#[test]
fn test_file_outcome_defaults_to_skipped() {
    assert_eq!(FileOutcome::default(), FileOutcome::Skipped);
}
