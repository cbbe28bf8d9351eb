//! WebDAV PROPFIND client
//!
//! Issues depth-0/1 PROPFIND requests with Basic auth and maps responses to
//! the port contract: multistatus bodies become [`StatModel`] lists,
//! target-not-found becomes an empty list, and service-unavailable
//! responses are retried with a fixed delay, without bound for that class.

use std::time::Duration;

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use reqwest::{Client, Method, StatusCode};
use tracing::{debug, warn};

use davdex_core::domain::RemotePath;
use davdex_core::ports::remote_directory::{Depth, IRemoteDirectory, StatModel};

use crate::limiter::RequestLimiter;
use crate::xml::{parse_multistatus, target_first};
use crate::WebdavError;

/// Characters percent-encoded in URL path segments
const SEGMENT_ENCODE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'[')
    .add(b']')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// Fixed wait before retrying a service-unavailable response
const RETRY_DELAY: Duration = Duration::from_secs(60);

/// Request timeout for a single PROPFIND
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// The properties requested for every resource
const PROPFIND_BODY: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<D:propfind xmlns:D="DAV:">
    <D:prop>
        <D:displayname/>
        <D:getcontentlength/>
        <D:getlastmodified/>
        <D:resourcetype/>
    </D:prop>
</D:propfind>"#;

/// Connection settings for one WebDAV endpoint
#[derive(Debug, Clone)]
pub struct WebdavConfig {
    /// Base URL, e.g. `https://dav.example.com`
    pub url: String,
    pub username: String,
    pub password: String,
    /// Server path prefix present in every href; `/` means none
    pub base_path: String,
}

/// Reqwest-based implementation of the remote directory port
pub struct WebdavClient {
    http: Client,
    config: WebdavConfig,
    limiter: RequestLimiter,
    retry_delay: Duration,
}

impl WebdavClient {
    /// Creates a client for the given endpoint
    pub fn new(config: WebdavConfig) -> Result<Self, WebdavError> {
        url::Url::parse(&config.url).map_err(|e| WebdavError::Url(e.to_string()))?;

        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(WebdavError::Transport)?;

        Ok(Self {
            http,
            config,
            limiter: RequestLimiter::with_defaults(),
            retry_delay: RETRY_DELAY,
        })
    }

    /// Overrides the service-unavailable retry delay (tests use a short one)
    #[must_use]
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Overrides the request limiter
    #[must_use]
    pub fn with_limiter(mut self, limiter: RequestLimiter) -> Self {
        self.limiter = limiter;
        self
    }

    /// Builds the request URL for a remote path
    ///
    /// The path is percent-encoded segment-wise and prefixed with the
    /// server `base_path`.
    fn url_for(&self, path: &RemotePath) -> String {
        let mut url = self.config.url.trim_end_matches('/').to_string();

        let base = self.config.base_path.trim_end_matches('/');
        url.push_str(base);

        if path.is_root() {
            url.push('/');
            return url;
        }

        for segment in path.as_str()[1..].split('/') {
            url.push('/');
            url.push_str(&utf8_percent_encode(segment, SEGMENT_ENCODE).to_string());
        }
        url
    }

    /// Issues one PROPFIND and maps the response per the port contract
    pub async fn propfind_stats(
        &self,
        path: &RemotePath,
        depth: Depth,
    ) -> Result<Vec<StatModel>, WebdavError> {
        let url = self.url_for(path);
        let method =
            Method::from_bytes(b"PROPFIND").map_err(|e| WebdavError::Url(e.to_string()))?;

        loop {
            self.limiter.acquire().await;

            let response = self
                .http
                .request(method.clone(), &url)
                .basic_auth(&self.config.username, Some(&self.config.password))
                .header("Depth", depth.as_header_value())
                .header("Content-Type", "application/xml")
                .body(PROPFIND_BODY)
                .send()
                .await
                .map_err(WebdavError::Transport)?;

            let status = response.status();

            if matches!(
                status,
                StatusCode::SERVICE_UNAVAILABLE
                    | StatusCode::BAD_GATEWAY
                    | StatusCode::GATEWAY_TIMEOUT
            ) {
                warn!(
                    path = %path,
                    %status,
                    delay_secs = self.retry_delay.as_secs(),
                    "Service unavailable, waiting before retry"
                );
                tokio::time::sleep(self.retry_delay).await;
                continue;
            }

            if matches!(status, StatusCode::NOT_FOUND | StatusCode::GONE) {
                debug!(path = %path, %status, "Target not found");
                return Ok(Vec::new());
            }

            if status != StatusCode::MULTI_STATUS && !status.is_success() {
                return Err(WebdavError::HttpStatus {
                    status,
                    path: path.to_string(),
                });
            }

            let body = response.text().await.map_err(WebdavError::Transport)?;
            let stats = parse_multistatus(&body, &self.config.base_path)?;

            debug!(
                path = %path,
                depth = depth.as_header_value(),
                records = stats.len(),
                "PROPFIND complete"
            );

            return Ok(match depth {
                Depth::One => target_first(stats, path),
                Depth::Zero => stats,
            });
        }
    }
}

#[async_trait::async_trait]
impl IRemoteDirectory for WebdavClient {
    async fn propfind(&self, path: &RemotePath, depth: Depth) -> anyhow::Result<Vec<StatModel>> {
        self.propfind_stats(path, depth).await.map_err(Into::into)
    }
}
