use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::AppError;

/// Capability the tool layer needs from the healthcare data backend: a GET
/// with query parameters that yields parsed JSON or a typed failure.
#[async_trait]
pub trait HealthDataProvider: Send + Sync {
    async fn fetch(
        &self,
        path: &str,
        params: &[(&'static str, String)],
    ) -> Result<Value, AppError>;
}

/// Client for the healthcare aggregation backend (FDA, PubMed, Health.gov,
/// ClinicalTrials.gov, ICD-10 terminology behind one HTTP service).
pub struct HttpBackendClient {
    base_url: String,
    client: reqwest::Client,
}

impl HttpBackendClient {
    pub fn new(base_url: String, timeout: Duration) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            ))
            .build()
            .map_err(|err| AppError::internal(format!("failed to build backend client: {err}")))?;

        Ok(Self { base_url, client })
    }
}

#[async_trait]
impl HealthDataProvider for HttpBackendClient {
    async fn fetch(
        &self,
        path: &str,
        params: &[(&'static str, String)],
    ) -> Result<Value, AppError> {
        let url = join_url(&self.base_url, path);

        let response = self
            .client
            .get(&url)
            .query(params)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    AppError::upstream("backend_timeout", format!("backend request to {path} timed out"))
                } else {
                    AppError::upstream(
                        "backend_unavailable",
                        format!("backend request to {path} failed: {err}"),
                    )
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::upstream(
                "backend_unavailable",
                format!("backend returned {status} for {path}"),
            ));
        }

        response.json::<Value>().await.map_err(|err| {
            AppError::upstream(
                "backend_invalid_response",
                format!("backend returned non-JSON for {path}: {err}"),
            )
        })
    }
}

fn join_url(base_url: &str, path: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), path)
}

#[cfg(test)]
mod tests {
    use super::join_url;

    #[test]
    fn joins_base_and_path() {
        assert_eq!(
            join_url("http://localhost:3002", "/api/fda"),
            "http://localhost:3002/api/fda"
        );
    }

    #[test]
    fn strips_trailing_slash_before_joining() {
        assert_eq!(
            join_url("http://localhost:3002/", "/api/pubmed"),
            "http://localhost:3002/api/pubmed"
        );
    }
}
