use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::error::{PortalError, Result};
use crate::models::{JobPosting, WorkType};

/// JobRepository
///
/// The job board. No backend collection exists behind it; the repository serves a
/// bundled catalog and search is a client-side predicate over title, company and
/// tags. All calls are synchronous.
pub struct JobRepository {
    catalog: Vec<JobPosting>,
}

impl JobRepository {
    pub fn new() -> Self {
        Self {
            catalog: bundled_catalog(),
        }
    }

    /// Every posting, newest first.
    pub fn list(&self) -> Vec<JobPosting> {
        let mut jobs = self.catalog.clone();
        jobs.sort_by(|a, b| b.posted_at.cmp(&a.posted_at));
        jobs
    }

    /// One posting by id, or `NotFound`.
    pub fn get(&self, id: Uuid) -> Result<JobPosting> {
        self.catalog
            .iter()
            .find(|job| job.id == id)
            .cloned()
            .ok_or(PortalError::NotFound("job"))
    }

    /// Case-insensitive term search over title, company and tags. A blank term
    /// returns the full list.
    pub fn search(&self, term: &str) -> Vec<JobPosting> {
        let needle = term.trim().to_lowercase();
        if needle.is_empty() {
            return self.list();
        }
        self.list()
            .into_iter()
            .filter(|job| {
                job.title.to_lowercase().contains(&needle)
                    || job.company.to_lowercase().contains(&needle)
                    || job.tags.iter().any(|tag| tag.to_lowercase().contains(&needle))
            })
            .collect()
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|item| item.to_string()).collect()
}

fn bundled_catalog() -> Vec<JobPosting> {
    let now = Utc::now();
    vec![
        JobPosting {
            id: Uuid::from_u128(0x8f14e45fceea167a5a36dedd4bea2543),
            title: "Senior Backend Engineer".to_string(),
            company: "Lumen Labs".to_string(),
            company_logo: "LL".to_string(),
            location: "Seoul".to_string(),
            work_type: WorkType::Fulltime,
            remote: true,
            salary_min: Some(85_000),
            salary_max: Some(120_000),
            posted_at: now - Duration::days(2),
            description: "Own the service layer of a payments platform handling \
                          millions of daily transactions."
                .to_string(),
            requirements: strings(&[
                "5+ years building production services",
                "Deep familiarity with PostgreSQL",
                "Experience operating systems under real traffic",
            ]),
            benefits: strings(&[
                "Fully remote within KST±3",
                "Annual learning budget",
                "Stock options",
            ]),
            tags: strings(&["backend", "postgresql", "payments"]),
        },
        JobPosting {
            id: Uuid::from_u128(0x2b44928ae11fb9384c4cf38708677c48),
            title: "Frontend Developer".to_string(),
            company: "Harbor Studio".to_string(),
            company_logo: "HS".to_string(),
            location: "Busan".to_string(),
            work_type: WorkType::Fulltime,
            remote: false,
            salary_min: Some(55_000),
            salary_max: Some(80_000),
            posted_at: now - Duration::days(5),
            description: "Build accessible, fast interfaces for a design-heavy \
                          commerce product."
                .to_string(),
            requirements: strings(&[
                "3+ years of modern component-based UI work",
                "Strong CSS fundamentals",
            ]),
            benefits: strings(&["Relocation support", "Flexible hours"]),
            tags: strings(&["frontend", "typescript", "commerce"]),
        },
        JobPosting {
            id: Uuid::from_u128(0x6512bd43d9caa6e02c990b0a82652dca),
            title: "Data Engineer".to_string(),
            company: "Northwind Analytics".to_string(),
            company_logo: "NA".to_string(),
            location: "Remote".to_string(),
            work_type: WorkType::Contract,
            remote: true,
            salary_min: Some(70_000),
            salary_max: Some(95_000),
            posted_at: now - Duration::days(9),
            description: "Design and run the ingestion pipelines feeding our \
                          analytics warehouse."
                .to_string(),
            requirements: strings(&[
                "Hands-on pipeline orchestration experience",
                "Comfortable owning data quality end to end",
            ]),
            benefits: strings(&["Contract with extension path", "Hardware budget"]),
            tags: strings(&["data", "etl", "warehouse"]),
        },
        JobPosting {
            id: Uuid::from_u128(0xc20ad4d76fe97759aa27a0c99bff6710),
            title: "Product Designer".to_string(),
            company: "Quartz & Co".to_string(),
            company_logo: "QC".to_string(),
            location: "Seoul".to_string(),
            work_type: WorkType::Parttime,
            remote: false,
            salary_min: None,
            salary_max: None,
            posted_at: now - Duration::days(12),
            description: "Shape the end-to-end experience of a hiring platform, \
                          from research to polished flows."
                .to_string(),
            requirements: strings(&[
                "Portfolio showing shipped product work",
                "Comfort running user interviews",
            ]),
            benefits: strings(&["Part-time, 3 days a week", "Studio access"]),
            tags: strings(&["design", "ux", "research"]),
        },
        JobPosting {
            id: Uuid::from_u128(0x37693cfc748049e45d87b8c7d8b9aacd),
            title: "Platform Reliability Engineer".to_string(),
            company: "Lumen Labs".to_string(),
            company_logo: "LL".to_string(),
            location: "Incheon".to_string(),
            work_type: WorkType::Freelance,
            remote: true,
            salary_min: Some(60_000),
            salary_max: Some(90_000),
            posted_at: now - Duration::days(16),
            description: "Keep a multi-region deployment observable and boring. \
                          You will own alerting, capacity and incident review."
                .to_string(),
            requirements: strings(&[
                "Production on-call experience",
                "Fluency with infrastructure as code",
            ]),
            benefits: strings(&["Remote-first", "Quarterly on-sites"]),
            tags: strings(&["sre", "infrastructure", "observability"]),
        },
    ]
}
