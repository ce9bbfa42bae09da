use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::models::{MatchCandidate, MatchRequest, MatchResponse, ProfileResponse, StudentProfile};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("invalid response JSON: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid service URL: {0}")]
    InvalidUrl(String),

    #[error("{0}")]
    Domain(String),
}

impl ClientError {
    /// Network and decode failures are both reported to the user as connection trouble.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ClientError::Transport(_) | ClientError::Decode(_) | ClientError::InvalidUrl(_)
        )
    }
}

/// The matching service as seen by the pages.
pub trait Backend {
    fn fetch_student_profile(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<StudentProfile, ClientError>> + Send;

    fn run_match(
        &self,
        request: &MatchRequest,
    ) -> impl Future<Output = Result<Vec<MatchCandidate>, ClientError>> + Send;
}

#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        }
    }
}

#[derive(Clone, Debug)]
pub struct HttpBackend {
    config: ClientConfig,
    base: reqwest::Url,
    http: reqwest::Client,
}

impl HttpBackend {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let base = reqwest::Url::parse(&config.base_url)
            .map_err(|err| ClientError::InvalidUrl(format!("{}: {err}", config.base_url)))?;
        let http = reqwest::Client::builder()
            .user_agent(concat!("skill-match/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout)
            .build()?;
        Ok(Self { config, base, http })
    }

    /// Appends percent-encoded path segments to the base URL.
    fn endpoint(&self, segments: &[&str]) -> Result<reqwest::Url, ClientError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| ClientError::InvalidUrl(self.config.base_url.clone()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn read_body(resp: reqwest::Response) -> Result<String, ClientError> {
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            warn!(%status, "matching service returned non-success status");
        }
        Ok(body)
    }
}

impl Backend for HttpBackend {
    async fn fetch_student_profile(&self, id: &str) -> Result<StudentProfile, ClientError> {
        let url = self.endpoint(&["student", id])?;
        debug!(%url, "fetching student profile");

        let resp = self.http.get(url).send().await?;
        let body = Self::read_body(resp).await?;

        match serde_json::from_str::<ProfileResponse>(&body)? {
            ProfileResponse::Profile(profile) => Ok(profile),
            ProfileResponse::Failure(failure) => Err(ClientError::Domain(failure.error)),
        }
    }

    async fn run_match(&self, request: &MatchRequest) -> Result<Vec<MatchCandidate>, ClientError> {
        let url = self.endpoint(&["match"])?;
        debug!(%url, workspace = %request.workspace_name, "running match");

        let resp = self.http.post(url).json(request).send().await?;
        let body = Self::read_body(resp).await?;

        match serde_json::from_str::<MatchResponse>(&body)? {
            MatchResponse::Ranked(candidates) => Ok(candidates),
            MatchResponse::Failure(failure) => Err(ClientError::Domain(failure.error)),
        }
    }
}
