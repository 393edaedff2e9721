//! HTTP client for a blescan server.

use std::time::Duration;

use blescan_core::{
    ControllerStatus, Notice, PendingPrompt, Permission, PermissionPolicy, PermissionStatus,
    ResultRow, ViewEvent,
};
use eventsource_stream::{EventStreamError, Eventsource};
use futures::stream::{Stream, StreamExt};
use reqwest::header::ACCEPT;
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};
use url::Url;
use uuid::Uuid;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
// A scan start may wait on a permission prompt.
const SCAN_TIMEOUT: Duration = Duration::from_secs(120);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Client errors.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("invalid server URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("request to {url} failed: {source}")]
    Request {
        url: Url,
        #[source]
        source: reqwest::Error,
    },

    #[error("{message} ({code}, HTTP {status})")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    #[error("unexpected response from {url}: {source}")]
    Decode {
        url: Url,
        #[source]
        source: reqwest::Error,
    },

    #[error("event stream interrupted: {0}")]
    Stream(#[source] EventStreamError<reqwest::Error>),

    #[error("malformed event: {0}")]
    Event(#[from] serde_json::Error),
}

/// `GET /health`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub backend: String,
    pub uptime_secs: u64,
}

/// `POST /api/radio/{enable,disable}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RadioChangeResponse {
    pub enabled: bool,
    pub changed: bool,
    pub notice: Notice,
}

/// `POST /api/scan/{start,stop,toggle}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResponse {
    pub scanning: bool,
    pub changed: bool,
    pub session_id: Option<Uuid>,
    pub notices: Vec<Notice>,
}

/// `GET /api/results`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultsResponse {
    pub scanning: bool,
    pub count: usize,
    pub rows: Vec<ResultRow>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionEntry {
    pub permission: Permission,
    pub label: String,
    pub policy: PermissionPolicy,
    pub status: PermissionStatus,
    pub required: bool,
}

/// `GET /api/permissions`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionsResponse {
    pub permissions: Vec<PermissionEntry>,
    pub pending: Vec<PendingPrompt>,
}

/// `POST /api/permissions/{name}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerPromptResponse {
    pub permission: Permission,
    pub granted: bool,
    pub notice: Notice,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
    message: String,
}

/// HTTP client for talking to the blescan server
#[derive(Clone)]
pub struct BlescanClient {
    client: reqwest::Client,
    base_url: Url,
}

impl BlescanClient {
    pub fn new(base_url: &str) -> Result<Self, CliError> {
        let base_url = Url::parse(base_url).map_err(|source| CliError::InvalidUrl {
            url: base_url.to_string(),
            source,
        })?;
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(CliError::Client)?;

        Ok(Self { client, base_url })
    }

    fn url(&self, path: &str) -> Result<Url, CliError> {
        self.base_url
            .join(path)
            .map_err(|source| CliError::InvalidUrl {
                url: format!("{}{path}", self.base_url),
                source,
            })
    }

    async fn send<T: DeserializeOwned>(
        &self,
        url: Url,
        request: RequestBuilder,
    ) -> Result<T, CliError> {
        debug!(%url, "Sending request");
        let response = request.send().await.map_err(|source| CliError::Request {
            url: url.clone(),
            source,
        })?;
        let response = check(response).await?;
        response
            .json()
            .await
            .map_err(|source| CliError::Decode { url, source })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, CliError> {
        let url = self.url(path)?;
        let request = self.client.get(url.clone()).timeout(REQUEST_TIMEOUT);
        self.send(url, request).await
    }

    async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        timeout: Duration,
    ) -> Result<T, CliError> {
        let url = self.url(path)?;
        let request = self.client.post(url.clone()).timeout(timeout);
        self.send(url, request).await
    }

    pub async fn health(&self) -> Result<HealthResponse, CliError> {
        self.get("/health").await
    }

    pub async fn enable_radio(&self) -> Result<RadioChangeResponse, CliError> {
        self.post("/api/radio/enable", REQUEST_TIMEOUT).await
    }

    pub async fn disable_radio(&self) -> Result<RadioChangeResponse, CliError> {
        self.post("/api/radio/disable", REQUEST_TIMEOUT).await
    }

    pub async fn scan_status(&self) -> Result<ControllerStatus, CliError> {
        self.get("/api/scan").await
    }

    pub async fn start_scan(&self) -> Result<ScanResponse, CliError> {
        self.post("/api/scan/start", SCAN_TIMEOUT).await
    }

    pub async fn stop_scan(&self) -> Result<ScanResponse, CliError> {
        self.post("/api/scan/stop", REQUEST_TIMEOUT).await
    }

    pub async fn toggle_scan(&self) -> Result<ScanResponse, CliError> {
        self.post("/api/scan/toggle", SCAN_TIMEOUT).await
    }

    pub async fn results(&self) -> Result<ResultsResponse, CliError> {
        self.get("/api/results").await
    }

    pub async fn permissions(&self) -> Result<PermissionsResponse, CliError> {
        self.get("/api/permissions").await
    }

    pub async fn answer(
        &self,
        permission: &str,
        granted: bool,
    ) -> Result<AnswerPromptResponse, CliError> {
        let url = self.url(&format!("/api/permissions/{permission}"))?;
        let request = self
            .client
            .post(url.clone())
            .timeout(REQUEST_TIMEOUT)
            .json(&serde_json::json!({ "granted": granted }));
        self.send(url, request).await
    }

    /// Follow the live change feed. Never times out.
    pub async fn events(
        &self,
    ) -> Result<impl Stream<Item = Result<ViewEvent, CliError>>, CliError> {
        let url = self.url("/api/results/events")?;
        let response = self
            .client
            .get(url.clone())
            .header(ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(|source| CliError::Request { url, source })?;
        let response = check(response).await?;

        let events = response
            .bytes_stream()
            .eventsource()
            .map(|item| -> Result<ViewEvent, CliError> {
                let event = item.map_err(CliError::Stream)?;
                trace!(event = %event.event, "SSE event");
                Ok(serde_json::from_str(&event.data)?)
            });
        Ok(events)
    }
}

/// Turn a non-2xx response into [`CliError::Api`].
async fn check(response: Response) -> Result<Response, CliError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let (code, message) = match serde_json::from_str::<ErrorBody>(&text) {
        Ok(body) => (body.error, body.message),
        Err(_) => (
            "http_error".to_string(),
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string(),
        ),
    };

    Err(CliError::Api {
        status: status.as_u16(),
        code,
        message,
    })
}
