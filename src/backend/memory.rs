use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::auth::{AuthUser, Claims};
use crate::error::{PortalError, Result};
use crate::models::{ApplicationStatus, Role};

use super::{BackendChannel, ListQuery, SessionGrant, SortDir};

/// MemoryBackend
///
/// An in-memory stand-in for the hosted service, used exclusively for unit and
/// integration testing. It reproduces the behavior the repositories depend on (row
/// defaults filled on insert, counter columns maintained from the join collections,
/// cascade deletes, the named procedures, real signed access tokens) so tests can
/// drive the full stack without a network connection.
///
/// Mutations require a valid bearer token, mirroring the hosted service's row-level
/// rules at the coarsest grain. Reads are public.
pub struct MemoryBackend {
    state: Mutex<MemoryState>,
    jwt_secret: String,
    fail_role_lookup: AtomicBool,
    fail_sign_out: AtomicBool,
}

struct MemoryState {
    accounts: HashMap<String, Account>,
    tables: HashMap<String, Vec<Value>>,
    last_timestamp: DateTime<Utc>,
}

struct Account {
    user_id: Uuid,
    password: String,
}

impl MemoryBackend {
    /// Signs tokens with the same fallback secret `AppConfig::default()` carries, so a
    /// default test configuration validates them without further wiring.
    pub fn new() -> Self {
        Self::with_secret("super-secure-test-secret-value-local")
    }

    pub fn with_secret(jwt_secret: &str) -> Self {
        Self {
            state: Mutex::new(MemoryState {
                accounts: HashMap::new(),
                tables: HashMap::new(),
                last_timestamp: Utc::now(),
            }),
            jwt_secret: jwt_secret.to_string(),
            fail_role_lookup: AtomicBool::new(false),
            fail_sign_out: AtomicBool::new(false),
        }
    }

    /// When set, `get_user_role` answers with a simulated outage.
    pub fn set_role_lookup_failing(&self, fail: bool) {
        self.fail_role_lookup.store(fail, AtomicOrdering::SeqCst);
    }

    /// When set, token revocation answers with a simulated outage.
    pub fn set_sign_out_failing(&self, fail: bool) {
        self.fail_sign_out.store(fail, AtomicOrdering::SeqCst);
    }

    /// Grants `role` to a user, replacing any previous grant.
    pub fn seed_role(&self, user_id: Uuid, role: Role) {
        let mut state = self.state();
        let rows = state.tables.entry("user_roles".to_string()).or_default();
        rows.retain(|row| field_str(row, "user_id") != Some(user_id.to_string()));
        let role = serde_json::to_value(role).unwrap_or(Value::Null);
        rows.push(json!({ "user_id": user_id, "role": role }));
    }

    /// Attaches an application row to a talent profile for dashboard scenarios.
    pub fn seed_application(
        &self,
        talent_profile_id: Uuid,
        company_name: &str,
        position: &str,
        status: ApplicationStatus,
    ) {
        let mut state = self.state();
        let applied_at = state.next_timestamp();
        let status = serde_json::to_value(status).unwrap_or(Value::Null);
        state
            .tables
            .entry("talent_applications".to_string())
            .or_default()
            .push(json!({
                "id": Uuid::new_v4(),
                "talent_profile_id": talent_profile_id,
                "company_name": company_name,
                "position": position,
                "status": status,
                "applied_at": applied_at,
                "notes": Value::Null,
            }));
    }

    // Poison recovery keeps a panicked test from cascading into every later one.
    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn mint_token(&self, user_id: Uuid, email: &str) -> Result<String> {
        let now = Utc::now().timestamp() as usize;
        let claims = Claims {
            sub: user_id,
            exp: now + 3600,
            iat: now,
            email: Some(email.to_string()),
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .map_err(|e| PortalError::Backend {
            status: 500,
            message: format!("token minting failed: {e}"),
        })
    }

    /// Resolves the caller from a bearer token; anything invalid is Unauthorized.
    fn authenticate(&self, token: Option<&str>) -> Result<Uuid> {
        let token = token.ok_or(PortalError::Unauthorized)?;
        let mut validation = Validation::default();
        validation.validate_exp = true;
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &validation,
        )
        .map(|data| data.claims.sub)
        .map_err(|_| PortalError::Unauthorized)
    }

    fn rpc_get_user_role(&self, args: &Value) -> Result<Value> {
        if self.fail_role_lookup.load(AtomicOrdering::SeqCst) {
            return Err(PortalError::Backend {
                status: 500,
                message: "role lookup unavailable".to_string(),
            });
        }
        let user_id = arg_str(args, "_user_id").unwrap_or_default();
        let state = self.state();
        let role = state
            .tables
            .get("user_roles")
            .and_then(|rows| {
                rows.iter()
                    .find(|row| field_str(row, "user_id") == Some(user_id.clone()))
            })
            .and_then(|row| row.get("role").cloned());
        Ok(role.unwrap_or(Value::Null))
    }

    fn rpc_search_talents(&self, args: &Value) -> Result<Value> {
        let term = arg_str(args, "_search_term").map(|t| t.to_lowercase());
        let skills = arg_str_list(args, "_skills");
        let experience_min = arg_i64(args, "_experience_min");
        let experience_max = arg_i64(args, "_experience_max");
        let work_type = arg_str(args, "_work_type");
        let remote_preference = arg_str(args, "_remote_preference");
        let location = arg_str(args, "_location").map(|l| l.to_lowercase());
        let limit = arg_i64(args, "_limit").unwrap_or(50).max(0) as usize;
        let offset = arg_i64(args, "_offset").unwrap_or(0).max(0) as usize;

        let state = self.state();
        let empty = Vec::new();
        let profiles = state.tables.get("profiles").unwrap_or(&empty);
        let mut hits: Vec<Value> = state
            .tables
            .get("talent_profiles")
            .unwrap_or(&empty)
            .iter()
            .filter(|row| {
                if field_str(row, "status").as_deref() != Some("approved") {
                    return false;
                }
                if let Some(term) = &term {
                    let title = field_str(row, "title").unwrap_or_default().to_lowercase();
                    let summary = field_str(row, "summary").unwrap_or_default().to_lowercase();
                    let in_skills = row_skills(row)
                        .iter()
                        .any(|s| s.to_lowercase().contains(term));
                    if !title.contains(term) && !summary.contains(term) && !in_skills {
                        return false;
                    }
                }
                if let Some(wanted) = &skills {
                    let have = row_skills(row);
                    let any = wanted
                        .iter()
                        .any(|w| have.iter().any(|h| h.eq_ignore_ascii_case(w)));
                    if !any {
                        return false;
                    }
                }
                let years = row.get("experience_years").and_then(Value::as_i64);
                if let Some(min) = experience_min {
                    if years.is_none_or(|y| y < min) {
                        return false;
                    }
                }
                if let Some(max) = experience_max {
                    if years.is_none_or(|y| y > max) {
                        return false;
                    }
                }
                if let Some(wt) = &work_type {
                    if field_str(row, "work_type").as_deref() != Some(wt) {
                        return false;
                    }
                }
                if let Some(rp) = &remote_preference {
                    if field_str(row, "remote_preference").as_deref() != Some(rp) {
                        return false;
                    }
                }
                if let Some(loc) = &location {
                    let row_loc = field_str(row, "location").unwrap_or_default().to_lowercase();
                    if !row_loc.contains(loc) {
                        return false;
                    }
                }
                true
            })
            .cloned()
            .collect();

        sort_rows(&mut hits, &[("created_at", SortDir::Desc)]);
        let page: Vec<Value> = hits
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|mut row| {
                // The procedure joins the owner's public profile into each hit.
                let owner = field_str(&row, "user_id").unwrap_or_default();
                let profile = profiles
                    .iter()
                    .find(|p| field_str(p, "id") == Some(owner.clone()));
                if let Value::Object(map) = &mut row {
                    let display_name = profile
                        .and_then(|p| p.get("display_name").cloned())
                        .unwrap_or(Value::Null);
                    let avatar_url = profile
                        .and_then(|p| p.get("avatar_url").cloned())
                        .unwrap_or(Value::Null);
                    map.insert("display_name".to_string(), display_name);
                    map.insert("avatar_url".to_string(), avatar_url);
                }
                row
            })
            .collect();
        Ok(Value::Array(page))
    }

    fn rpc_create_talent_profile(&self, token: Option<&str>, args: &Value) -> Result<Value> {
        let caller = self.authenticate(token)?;
        let mut state = self.state();
        let now = state.next_timestamp();
        let id = Uuid::new_v4();
        let mut row = json!({
            "id": id,
            "user_id": caller,
            "status": "pending",
            "certifications": [],
            "created_at": now,
            "updated_at": now,
        });
        if let (Value::Object(target), Value::Object(supplied)) = (&mut row, args) {
            for key in [
                "title",
                "summary",
                "skills",
                "experience_years",
                "education",
                "certifications",
                "portfolio_url",
                "location",
                "salary_expectation_min",
                "salary_expectation_max",
                "work_type",
                "remote_preference",
            ] {
                if let Some(value) = supplied.get(key) {
                    target.insert(key.to_string(), value.clone());
                }
            }
        }
        state
            .tables
            .entry("talent_profiles".to_string())
            .or_default()
            .push(row);
        Ok(Value::String(id.to_string()))
    }

    fn rpc_dashboard(&self, args: &Value) -> Result<Value> {
        let user_id = arg_str(args, "user_id").unwrap_or_default();
        let state = self.state();
        let empty = Vec::new();
        let mut own: Vec<Value> = state
            .tables
            .get("talent_profiles")
            .unwrap_or(&empty)
            .iter()
            .filter(|row| field_str(row, "user_id") == Some(user_id.clone()))
            .cloned()
            .collect();
        sort_rows(&mut own, &[("created_at", SortDir::Desc)]);
        let profile = own.into_iter().next();
        let applications: Vec<Value> = profile
            .as_ref()
            .and_then(|p| field_str(p, "id"))
            .map(|profile_id| {
                state
                    .tables
                    .get("talent_applications")
                    .unwrap_or(&empty)
                    .iter()
                    .filter(|row| field_str(row, "talent_profile_id") == Some(profile_id.clone()))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(json!([{
            "talent_profile": profile.unwrap_or(Value::Null),
            "applications": applications,
        }]))
    }
}

impl MemoryState {
    /// Strictly monotonic timestamps keep ordering assertions deterministic even when
    /// rows are created back to back.
    fn next_timestamp(&mut self) -> DateTime<Utc> {
        let mut now = Utc::now();
        if now <= self.last_timestamp {
            now = self.last_timestamp + Duration::milliseconds(1);
        }
        self.last_timestamp = now;
        now
    }

    fn bump_post_counter(&mut self, post_id: &str, field: &str, delta: i64) {
        if let Some(posts) = self.tables.get_mut("posts") {
            if let Some(post) = posts
                .iter_mut()
                .find(|row| field_str(row, "id").as_deref() == Some(post_id))
            {
                let current = post.get(field).and_then(Value::as_i64).unwrap_or(0);
                post[field] = Value::from((current + delta).max(0));
            }
        }
    }

    fn post_exists(&self, post_id: &str) -> bool {
        self.tables
            .get("posts")
            .map(|rows| {
                rows.iter()
                    .any(|row| field_str(row, "id").as_deref() == Some(post_id))
            })
            .unwrap_or(false)
    }
}

#[async_trait]
impl BackendChannel for MemoryBackend {
    async fn select(
        &self,
        _token: Option<&str>,
        table: &str,
        query: &ListQuery,
    ) -> Result<Vec<Value>> {
        let state = self.state();
        let empty = Vec::new();
        let mut rows: Vec<Value> = state
            .tables
            .get(table)
            .unwrap_or(&empty)
            .iter()
            .filter(|row| matches_filters(row, &query.filters))
            .cloned()
            .collect();
        sort_rows(&mut rows, &query.order);
        let offset = query.offset.unwrap_or(0) as usize;
        let rows = rows.into_iter().skip(offset);
        Ok(match query.limit {
            Some(limit) => rows.take(limit as usize).collect(),
            None => rows.collect(),
        })
    }

    async fn insert(&self, token: Option<&str>, table: &str, row: &Value) -> Result<Value> {
        self.authenticate(token)?;
        let mut state = self.state();
        let now = state.next_timestamp();
        let mut stored = row.clone();
        let Value::Object(fields) = &mut stored else {
            return Err(PortalError::Backend {
                status: 400,
                message: "insert expects a JSON object".to_string(),
            });
        };
        fields
            .entry("id")
            .or_insert_with(|| json!(Uuid::new_v4()));
        fields.entry("created_at").or_insert_with(|| json!(now));
        fields.entry("updated_at").or_insert_with(|| json!(now));
        match table {
            "posts" => {
                // Counter columns are derived server-side; whatever the client sent
                // is discarded.
                fields.insert("likes_count".to_string(), json!(0));
                fields.insert("replies_count".to_string(), json!(0));
                fields.entry("is_pinned").or_insert(json!(false));
                fields.entry("tags").or_insert(json!([]));
                fields.entry("images").or_insert(json!([]));
            }
            "post_replies" | "post_likes" => {
                let post_id = field_str(&stored, "post_id").unwrap_or_default();
                if !state.post_exists(&post_id) {
                    return Err(PortalError::NotFound("post"));
                }
                let field = if table == "post_replies" {
                    "replies_count"
                } else {
                    "likes_count"
                };
                state.bump_post_counter(&post_id, field, 1);
            }
            _ => {}
        }
        state
            .tables
            .entry(table.to_string())
            .or_default()
            .push(stored.clone());
        Ok(stored)
    }

    async fn update(
        &self,
        token: Option<&str>,
        table: &str,
        query: &ListQuery,
        patch: &Value,
    ) -> Result<u64> {
        self.authenticate(token)?;
        let Value::Object(changes) = patch else {
            return Err(PortalError::Backend {
                status: 400,
                message: "update expects a JSON object".to_string(),
            });
        };
        let mut state = self.state();
        let mut touched = 0u64;
        if let Some(rows) = state.tables.get_mut(table) {
            for row in rows.iter_mut() {
                if !matches_filters(row, &query.filters) {
                    continue;
                }
                if let Value::Object(fields) = row {
                    for (key, value) in changes {
                        fields.insert(key.clone(), value.clone());
                    }
                }
                touched += 1;
            }
        }
        Ok(touched)
    }

    async fn delete(&self, token: Option<&str>, table: &str, query: &ListQuery) -> Result<u64> {
        self.authenticate(token)?;
        let mut state = self.state();
        let removed: Vec<Value> = {
            let rows = state.tables.entry(table.to_string()).or_default();
            let (kept, removed): (Vec<Value>, Vec<Value>) = rows
                .drain(..)
                .partition(|row| !matches_filters(row, &query.filters));
            *rows = kept;
            removed
        };
        match table {
            "posts" => {
                // The backend cascades a post's replies and likes with it.
                for row in &removed {
                    let post_id = field_str(row, "id").unwrap_or_default();
                    for child in ["post_replies", "post_likes"] {
                        if let Some(rows) = state.tables.get_mut(child) {
                            rows.retain(|r| field_str(r, "post_id") != Some(post_id.clone()));
                        }
                    }
                }
            }
            "post_replies" => {
                for row in &removed {
                    let post_id = field_str(row, "post_id").unwrap_or_default();
                    state.bump_post_counter(&post_id, "replies_count", -1);
                }
            }
            "post_likes" => {
                for row in &removed {
                    let post_id = field_str(row, "post_id").unwrap_or_default();
                    state.bump_post_counter(&post_id, "likes_count", -1);
                }
            }
            _ => {}
        }
        Ok(removed.len() as u64)
    }

    async fn count(&self, _token: Option<&str>, table: &str, query: &ListQuery) -> Result<i64> {
        let state = self.state();
        let count = state
            .tables
            .get(table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| matches_filters(row, &query.filters))
                    .count()
            })
            .unwrap_or(0);
        Ok(count as i64)
    }

    async fn rpc(&self, token: Option<&str>, function: &str, args: &Value) -> Result<Value> {
        match function {
            "get_user_role" => self.rpc_get_user_role(args),
            "search_talents" => self.rpc_search_talents(args),
            "create_talent_profile" => self.rpc_create_talent_profile(token, args),
            "get_user_dashboard_data" => self.rpc_dashboard(args),
            _ => Err(PortalError::Backend {
                status: 404,
                message: format!("unknown function `{function}`"),
            }),
        }
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<SessionGrant> {
        if password.chars().count() < 6 {
            return Err(PortalError::WeakPassword);
        }
        let user_id = {
            let mut state = self.state();
            if state.accounts.contains_key(email) {
                return Err(PortalError::EmailTaken);
            }
            let user_id = Uuid::new_v4();
            state.accounts.insert(
                email.to_string(),
                Account {
                    user_id,
                    password: password.to_string(),
                },
            );
            // The hosted service materializes a profile row for every new auth user.
            let now = state.next_timestamp();
            state
                .tables
                .entry("profiles".to_string())
                .or_default()
                .push(json!({
                    "id": user_id,
                    "email": email,
                    "display_name": Value::Null,
                    "avatar_url": Value::Null,
                    "created_at": now,
                    "updated_at": now,
                }));
            user_id
        };
        Ok(SessionGrant {
            access_token: self.mint_token(user_id, email)?,
            user: AuthUser {
                id: user_id,
                email: email.to_string(),
            },
        })
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<SessionGrant> {
        let user_id = {
            let state = self.state();
            match state.accounts.get(email) {
                Some(account) if account.password == password => account.user_id,
                _ => return Err(PortalError::InvalidCredentials),
            }
        };
        Ok(SessionGrant {
            access_token: self.mint_token(user_id, email)?,
            user: AuthUser {
                id: user_id,
                email: email.to_string(),
            },
        })
    }

    async fn sign_out(&self, _access_token: &str) -> Result<()> {
        if self.fail_sign_out.load(AtomicOrdering::SeqCst) {
            return Err(PortalError::Backend {
                status: 500,
                message: "revocation unavailable".to_string(),
            });
        }
        Ok(())
    }
}

// --- Row Helpers ---

fn field_str(row: &Value, key: &str) -> Option<String> {
    row.get(key).and_then(Value::as_str).map(str::to_string)
}

fn row_skills(row: &Value) -> Vec<String> {
    row.get("skills")
        .and_then(Value::as_array)
        .map(|list| {
            list.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn arg_str(args: &Value, key: &str) -> Option<String> {
    args.get(key).and_then(Value::as_str).map(str::to_string)
}

fn arg_i64(args: &Value, key: &str) -> Option<i64> {
    args.get(key).and_then(Value::as_i64)
}

fn arg_str_list(args: &Value, key: &str) -> Option<Vec<String>> {
    args.get(key).and_then(Value::as_array).map(|list| {
        list.iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect()
    })
}

fn matches_filters(row: &Value, filters: &[(&'static str, String)]) -> bool {
    filters.iter().all(|(column, want)| match row.get(*column) {
        Some(Value::String(s)) => s == want,
        Some(Value::Bool(b)) => b.to_string() == *want,
        Some(Value::Number(n)) => n.to_string() == *want,
        _ => false,
    })
}

/// Orders rows by the given keys; RFC 3339 strings compare as instants so timestamp
/// columns sort correctly regardless of their fractional precision.
fn sort_rows(rows: &mut [Value], order: &[(&'static str, SortDir)]) {
    rows.sort_by(|a, b| {
        for (column, dir) in order {
            let left = a.get(*column).unwrap_or(&Value::Null);
            let right = b.get(*column).unwrap_or(&Value::Null);
            let mut ord = value_cmp(left, right);
            if *dir == SortDir::Desc {
                ord = ord.reverse();
            }
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });
}

fn value_cmp(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => {
            match (
                DateTime::parse_from_rfc3339(x),
                DateTime::parse_from_rfc3339(y),
            ) {
                (Ok(tx), Ok(ty)) => tx.cmp(&ty),
                _ => x.cmp(y),
            }
        }
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}
