use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;

use crate::auth::AuthUser;
use crate::config::AppConfig;
use crate::error::{PortalError, Result};

use super::{BackendChannel, ListQuery, SessionGrant, SortDir};

/// HttpBackend
///
/// The concrete `BackendChannel` speaking the hosted service's HTTP dialect:
/// PostgREST-style query strings under `/rest/v1`, procedures under `/rest/v1/rpc`,
/// and GoTrue-style grants under `/auth/v1`. Every request carries the publishable
/// `apikey` header plus a bearer token: the caller's access token when signed in,
/// the publishable key otherwise.
///
/// No timeout is configured beyond the transport defaults and nothing here retries;
/// a failed call surfaces as an error and the operation is abandoned.
#[derive(Clone)]
pub struct HttpBackend {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
}

impl HttpBackend {
    /// Constructs the client from the loaded configuration.
    pub fn new(config: &AppConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.backend_url.trim_end_matches('/').to_string(),
            anon_key: config.anon_key.clone(),
        }
    }

    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    /// Attaches the `apikey` and bearer headers every endpoint expects.
    fn authorize(&self, req: RequestBuilder, token: Option<&str>) -> RequestBuilder {
        req.header("apikey", &self.anon_key)
            .bearer_auth(token.unwrap_or(&self.anon_key))
    }

    /// Renders a `ListQuery` into the dialect's query-string pairs.
    fn query_params(query: &ListQuery) -> Vec<(String, String)> {
        let mut params = Vec::new();
        for (column, value) in &query.filters {
            params.push((column.to_string(), format!("eq.{value}")));
        }
        if !query.order.is_empty() {
            let order = query
                .order
                .iter()
                .map(|(column, dir)| {
                    let dir = match dir {
                        SortDir::Asc => "asc",
                        SortDir::Desc => "desc",
                    };
                    format!("{column}.{dir}")
                })
                .collect::<Vec<_>>()
                .join(",");
            params.push(("order".to_string(), order));
        }
        if let Some(limit) = query.limit {
            params.push(("limit".to_string(), limit.to_string()));
        }
        if let Some(offset) = query.offset {
            params.push(("offset".to_string(), offset.to_string()));
        }
        params
    }

    /// Maps non-success statuses onto the error taxonomy. The body (truncated) is
    /// preserved for the unexpected cases so failures stay diagnosable in logs.
    async fn expect_success(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let err = match status {
            StatusCode::UNAUTHORIZED => PortalError::Unauthorized,
            StatusCode::FORBIDDEN => PortalError::Forbidden,
            StatusCode::NOT_FOUND => PortalError::NotFound("resource"),
            _ => {
                let message = response.text().await.unwrap_or_default();
                PortalError::Backend {
                    status: status.as_u16(),
                    message: truncate(&message, 200),
                }
            }
        };
        Err(err)
    }

    /// Maps an auth-service error body onto the sign-up/sign-in outcomes. The service
    /// reports machine-readable codes alongside a human message.
    async fn auth_error(response: Response) -> PortalError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        let parsed: AuthErrorBody = serde_json::from_str(&body).unwrap_or_default();
        match parsed.error_code.as_deref() {
            Some("user_already_exists") | Some("email_exists") => PortalError::EmailTaken,
            Some("weak_password") => PortalError::WeakPassword,
            Some("invalid_credentials") | Some("invalid_grant") => PortalError::InvalidCredentials,
            _ => PortalError::Backend {
                status,
                message: parsed
                    .msg
                    .or(parsed.error_description)
                    .unwrap_or_else(|| truncate(&body, 200)),
            },
        }
    }
}

#[async_trait]
impl BackendChannel for HttpBackend {
    async fn select(
        &self,
        token: Option<&str>,
        table: &str,
        query: &ListQuery,
    ) -> Result<Vec<Value>> {
        let req = self
            .http
            .get(self.rest_url(table))
            .query(&Self::query_params(query));
        let response = Self::expect_success(self.authorize(req, token).send().await?).await?;
        Ok(response.json::<Vec<Value>>().await?)
    }

    async fn insert(&self, token: Option<&str>, table: &str, row: &Value) -> Result<Value> {
        let req = self
            .http
            .post(self.rest_url(table))
            .header("Prefer", "return=representation")
            .json(row);
        let response = Self::expect_success(self.authorize(req, token).send().await?).await?;
        let mut rows = response.json::<Vec<Value>>().await?;
        if rows.is_empty() {
            return Err(PortalError::Backend {
                status: 200,
                message: "insert returned no representation".to_string(),
            });
        }
        Ok(rows.swap_remove(0))
    }

    async fn update(
        &self,
        token: Option<&str>,
        table: &str,
        query: &ListQuery,
        patch: &Value,
    ) -> Result<u64> {
        let req = self
            .http
            .patch(self.rest_url(table))
            .query(&Self::query_params(query))
            .header("Prefer", "return=representation")
            .json(patch);
        let response = Self::expect_success(self.authorize(req, token).send().await?).await?;
        let rows = response.json::<Vec<Value>>().await?;
        Ok(rows.len() as u64)
    }

    async fn delete(&self, token: Option<&str>, table: &str, query: &ListQuery) -> Result<u64> {
        let req = self
            .http
            .delete(self.rest_url(table))
            .query(&Self::query_params(query))
            .header("Prefer", "return=representation");
        let response = Self::expect_success(self.authorize(req, token).send().await?).await?;
        let rows = response.json::<Vec<Value>>().await?;
        Ok(rows.len() as u64)
    }

    /// count
    ///
    /// Issues a HEAD request with `Prefer: count=exact`; the total comes back in the
    /// `Content-Range` header (`0-9/42` or `*/0`) without transferring any rows.
    async fn count(&self, token: Option<&str>, table: &str, query: &ListQuery) -> Result<i64> {
        let req = self
            .http
            .head(self.rest_url(table))
            .query(&Self::query_params(query))
            .header("Prefer", "count=exact");
        let response = Self::expect_success(self.authorize(req, token).send().await?).await?;
        let range = response
            .headers()
            .get("content-range")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        range
            .rsplit('/')
            .next()
            .and_then(|total| total.parse::<i64>().ok())
            .ok_or_else(|| PortalError::Backend {
                status: 200,
                message: format!("unparsable content-range `{range}`"),
            })
    }

    async fn rpc(&self, token: Option<&str>, function: &str, args: &Value) -> Result<Value> {
        let req = self
            .http
            .post(format!("{}/rest/v1/rpc/{}", self.base_url, function))
            .json(args);
        let response = Self::expect_success(self.authorize(req, token).send().await?).await?;
        // Void procedures answer with an empty body rather than `null`.
        let body = response.text().await?;
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&body)?)
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<SessionGrant> {
        let req = self
            .http
            .post(format!("{}/auth/v1/signup", self.base_url))
            .header("apikey", &self.anon_key)
            .json(&serde_json::json!({ "email": email, "password": password }));
        let response = req.send().await?;
        if !response.status().is_success() {
            return Err(Self::auth_error(response).await);
        }
        let grant: AuthResponse = response.json().await?;
        Ok(grant.into())
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<SessionGrant> {
        let req = self
            .http
            .post(format!(
                "{}/auth/v1/token?grant_type=password",
                self.base_url
            ))
            .header("apikey", &self.anon_key)
            .json(&serde_json::json!({ "email": email, "password": password }));
        let response = req.send().await?;
        if !response.status().is_success() {
            // The token grant reports bad credentials as a plain 400.
            if response.status() == StatusCode::BAD_REQUEST {
                return Err(PortalError::InvalidCredentials);
            }
            return Err(Self::auth_error(response).await);
        }
        let grant: AuthResponse = response.json().await?;
        Ok(grant.into())
    }

    async fn sign_out(&self, access_token: &str) -> Result<()> {
        let req = self
            .http
            .post(format!("{}/auth/v1/logout", self.base_url))
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token);
        Self::expect_success(req.send().await?).await?;
        Ok(())
    }
}

/// AuthResponse
///
/// The subset of the auth service's grant payload this layer consumes.
#[derive(Debug, Deserialize)]
struct AuthResponse {
    access_token: String,
    user: AuthUserPayload,
}

#[derive(Debug, Deserialize)]
struct AuthUserPayload {
    id: uuid::Uuid,
    email: String,
}

impl From<AuthResponse> for SessionGrant {
    fn from(value: AuthResponse) -> Self {
        SessionGrant {
            access_token: value.access_token,
            user: AuthUser {
                id: value.user.id,
                email: value.user.email,
            },
        }
    }
}

/// AuthErrorBody
///
/// Error envelope of the auth service; newer deployments send `error_code` + `msg`,
/// older token endpoints send OAuth-style `error`/`error_description`.
#[derive(Debug, Default, Deserialize)]
struct AuthErrorBody {
    error_code: Option<String>,
    msg: Option<String>,
    error_description: Option<String>,
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        text.chars().take(max).collect()
    }
}
