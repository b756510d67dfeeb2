//! SSRF-safe download of externally-supplied URLs.
//!
//! Redirects are followed manually so every hop re-enters the policy gate,
//! and DNS answers for domain hosts are re-validated before the request is
//! issued. The response body is wrapped in a guard stream enforcing the byte
//! ceiling, an idle timeout that resets per chunk, and a final
//! content-length match when the server advertised one.

use bytes::Bytes;
use futures::StreamExt;
use std::io;
use std::net::IpAddr;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::files::application::domain::policies::url_policy::{UrlPolicy, UrlPolicyError};
use crate::files::application::ports::outgoing::blob_storage::BlobByteStream;
use crate::shared::config::UrlUploadConfig;

#[derive(Debug, Clone, Error)]
pub enum UrlFetchError {
    #[error("invalid URL: {0}")]
    Invalid(String),

    #[error(transparent)]
    Blocked(#[from] UrlPolicyError),

    #[error("too many redirects (limit {0})")]
    TooManyRedirects(u32),

    #[error("download exceeds the {0} byte limit")]
    TooLarge(u64),

    #[error("download timed out")]
    Timeout,

    #[error("remote returned HTTP {0}")]
    Http(u16),

    #[error("request failed: {0}")]
    Transport(String),
}

/// A validated remote body, ready for the upload pipeline.
pub struct FetchedBody {
    pub stream: BlobByteStream,
    pub mime_type: Option<String>,
    pub filename: Option<String>,
}

impl std::fmt::Debug for FetchedBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchedBody")
            .field("stream", &"<stream>")
            .field("mime_type", &self.mime_type)
            .field("filename", &self.filename)
            .finish()
    }
}

pub struct UrlFetcher {
    client: reqwest::Client,
    policy: UrlPolicy,
    config: UrlUploadConfig,
}

impl UrlFetcher {
    pub fn new(config: UrlUploadConfig) -> Self {
        let client = reqwest::Client::builder()
            // hops are validated here, not in the client
            .redirect(reqwest::redirect::Policy::none())
            .connect_timeout(Duration::from_secs(10))
            .build()
            .expect("failed to build the URL download client");

        Self {
            client,
            policy: UrlPolicy {
                https_only: false,
                block_unsafe: config.block_unsafe_connections,
            },
            config,
        }
    }

    pub async fn fetch(&self, raw_url: &str) -> Result<FetchedBody, UrlFetchError> {
        let mut url = Url::parse(raw_url).map_err(|e| UrlFetchError::Invalid(e.to_string()))?;

        for _hop in 0..=self.config.max_redirects {
            self.policy.validate_url(&url)?;
            self.validate_resolved_addresses(&url).await?;

            let response = self
                .client
                .get(url.clone())
                .timeout(Duration::from_millis(self.config.timeout_ms))
                .send()
                .await
                .map_err(|e| {
                    if e.is_timeout() {
                        UrlFetchError::Timeout
                    } else {
                        UrlFetchError::Transport(e.to_string())
                    }
                })?;

            if response.status().is_redirection() {
                let location = response
                    .headers()
                    .get(reqwest::header::LOCATION)
                    .and_then(|value| value.to_str().ok())
                    .ok_or_else(|| {
                        UrlFetchError::Invalid("redirect without Location".to_string())
                    })?;
                url = url
                    .join(location)
                    .map_err(|e| UrlFetchError::Invalid(e.to_string()))?;
                debug!(next = %url, "following redirect");
                continue;
            }

            if !response.status().is_success() {
                return Err(UrlFetchError::Http(response.status().as_u16()));
            }

            // advertised length past the ceiling fails before any byte flows
            let advertised = response.content_length();
            if let Some(length) = advertised {
                if length > self.config.max_bytes {
                    return Err(UrlFetchError::TooLarge(self.config.max_bytes));
                }
            }

            let mime_type = response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|value| value.to_str().ok())
                .map(|value| value.split(';').next().unwrap_or(value).trim().to_string());

            let filename = url
                .path_segments()
                .and_then(|mut segments| segments.next_back())
                .filter(|segment| !segment.is_empty())
                .map(str::to_string);

            let stream = guard_stream(
                response.bytes_stream().boxed(),
                self.config.max_bytes,
                Duration::from_millis(self.config.timeout_ms),
                advertised,
            );

            return Ok(FetchedBody {
                stream,
                mime_type,
                filename,
            });
        }

        Err(UrlFetchError::TooManyRedirects(self.config.max_redirects))
    }

    /// Domain hosts get every resolved address re-checked; IP literals were
    /// already validated by the URL gate.
    async fn validate_resolved_addresses(&self, url: &Url) -> Result<(), UrlFetchError> {
        let Some(url::Host::Domain(domain)) = url.host() else {
            return Ok(());
        };
        if !self.config.block_unsafe_connections {
            return Ok(());
        }

        let port = url.port_or_known_default().unwrap_or(443);
        let addrs = tokio::net::lookup_host((domain, port))
            .await
            .map_err(|e| UrlFetchError::Transport(format!("DNS resolution failed: {e}")))?;

        for addr in addrs {
            let ip: IpAddr = addr.ip();
            self.policy.validate_resolved_addr(ip)?;
        }
        Ok(())
    }
}

struct GuardState<E> {
    inner: futures::stream::BoxStream<'static, Result<Bytes, E>>,
    received: u64,
    max_bytes: u64,
    idle_timeout: Duration,
    advertised_length: Option<u64>,
    done: bool,
}

/// Wrap a response body with the byte ceiling, per-chunk idle timeout and
/// completion length check. The first violation fails the stream and ends it.
fn guard_stream<E: std::fmt::Display + Send + 'static>(
    inner: futures::stream::BoxStream<'static, Result<Bytes, E>>,
    max_bytes: u64,
    idle_timeout: Duration,
    advertised_length: Option<u64>,
) -> BlobByteStream {
    let state = GuardState {
        inner,
        received: 0,
        max_bytes,
        idle_timeout,
        advertised_length,
        done: false,
    };

    Box::pin(futures::stream::unfold(state, |mut state| async move {
        if state.done {
            return None;
        }

        match tokio::time::timeout(state.idle_timeout, state.inner.next()).await {
            Err(_) => {
                state.done = true;
                Some((
                    Err(io::Error::other("idle timeout while downloading")),
                    state,
                ))
            }
            Ok(None) => {
                state.done = true;
                if let Some(expected) = state.advertised_length {
                    if state.received != expected {
                        return Some((
                            Err(io::Error::other(format!(
                                "content length mismatch: advertised {expected}, received {}",
                                state.received
                            ))),
                            state,
                        ));
                    }
                }
                None
            }
            Ok(Some(Ok(chunk))) => {
                state.received += chunk.len() as u64;
                if state.received > state.max_bytes {
                    state.done = true;
                    Some((
                        Err(io::Error::other("download size limit exceeded")),
                        state,
                    ))
                } else {
                    Some((Ok(chunk), state))
                }
            }
            Ok(Some(Err(e))) => {
                state.done = true;
                Some((Err(io::Error::other(e.to_string())), state))
            }
        }
    }))
}
