//! Polite HTTP fetch layer.
//!
//! One [`PoliteClient`] per source. Requests go out one at a time per client,
//! every attempt is preceded by the configured rate-limit pause, and the two
//! block statuses the stats sites actually send (403, 429) get linear backoff
//! before the error is surfaced.

use std::time::Duration;

use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, StatusCode};
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, error, instrument, warn};
use url::Url;

use crate::config::Config;
use crate::error::{Result, ScrapeError};

/// Desktop Chrome profile presented to the stats sites.
const USER_AGENT_VALUE: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Rate-limited, single-request-in-flight HTTP client.
pub struct PoliteClient {
    client: Client,
    rate_limit: Duration,
    max_retries: usize,
    gate: Mutex<()>,
}

impl PoliteClient {
    pub fn new(rate_limit: Duration, max_retries: usize, verify_tls: bool) -> Result<Self> {
        let mut builder = Client::builder()
            .default_headers(browser_headers())
            .cookie_store(true)
            .timeout(REQUEST_TIMEOUT);
        if !verify_tls {
            warn!("TLS certificate verification is disabled for this client");
            builder = builder.danger_accept_invalid_certs(true);
        }
        let client = builder
            .build()
            .map_err(|e| ScrapeError::Configuration(format!("building HTTP client: {e}")))?;

        Ok(Self {
            client,
            rate_limit,
            max_retries,
            gate: Mutex::new(()),
        })
    }

    /// Build a client from runtime config, using the source's default pause
    /// when no explicit rate limit is configured.
    pub fn from_config(cfg: &Config, default_rate_limit: Duration) -> Result<Self> {
        Self::new(
            cfg.rate_limit.unwrap_or(default_rate_limit),
            cfg.max_retries,
            cfg.verify_tls,
        )
    }

    pub fn rate_limit(&self) -> Duration {
        self.rate_limit
    }

    /// Fetch a page body as text.
    ///
    /// Holds the client's request gate for the whole call, sleeps the rate
    /// limit before every attempt (the first included), retries 403 and 429
    /// with their backoff schedules, and returns any other failure as-is.
    #[instrument(level = "debug", skip(self))]
    pub async fn fetch_text(&self, url: &str) -> Result<String> {
        let parsed = Url::parse(url).map_err(|e| ScrapeError::Fetch {
            url: url.to_string(),
            reason: format!("invalid URL: {e}"),
        })?;

        let _in_flight = self.gate.lock().await;
        for attempt in 0..self.max_retries {
            sleep(self.rate_limit).await;
            debug!(attempt = attempt + 1, "requesting");

            let response = match self.client.get(parsed.clone()).send().await {
                Ok(r) => r,
                Err(e) => {
                    return Err(ScrapeError::Fetch {
                        url: url.to_string(),
                        reason: e.to_string(),
                    })
                }
            };

            let status = response.status();
            if status.is_success() {
                return response.text().await.map_err(|e| ScrapeError::Fetch {
                    url: url.to_string(),
                    reason: format!("reading body: {e}"),
                });
            }

            match status {
                StatusCode::FORBIDDEN => {
                    if attempt + 1 < self.max_retries {
                        let delay = forbidden_backoff(attempt);
                        warn!(
                            attempt = attempt + 1,
                            delay_s = delay.as_secs(),
                            "403 Forbidden; backing off before retry"
                        );
                        sleep(delay).await;
                    } else {
                        error!(attempts = self.max_retries, "403 persisted through all retries");
                        return Err(ScrapeError::Forbidden {
                            url: url.to_string(),
                            attempts: self.max_retries,
                        });
                    }
                }
                StatusCode::TOO_MANY_REQUESTS => {
                    if attempt + 1 < self.max_retries {
                        let delay = rate_limited_backoff(attempt);
                        warn!(
                            attempt = attempt + 1,
                            delay_s = delay.as_secs(),
                            "429 Too Many Requests; backing off before retry"
                        );
                        sleep(delay).await;
                    } else {
                        return Err(ScrapeError::Fetch {
                            url: url.to_string(),
                            reason: format!("HTTP 429 after {} attempts", self.max_retries),
                        });
                    }
                }
                other => {
                    return Err(ScrapeError::Fetch {
                        url: url.to_string(),
                        reason: format!("HTTP {other}"),
                    });
                }
            }
        }

        Err(ScrapeError::Fetch {
            url: url.to_string(),
            reason: format!("exhausted {} attempts", self.max_retries),
        })
    }
}

/// Backoff after the `attempt`-th 403 (zero-based): 5 s, 10 s, 15 s, ...
pub(crate) fn forbidden_backoff(attempt: usize) -> Duration {
    Duration::from_secs(((attempt + 1) * 5) as u64)
}

/// Backoff after the `attempt`-th 429 (zero-based): 10 s, 20 s, 30 s, ...
pub(crate) fn rate_limited_backoff(attempt: usize) -> Duration {
    Duration::from_secs(((attempt + 1) * 10) as u64)
}

fn browser_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(header::USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
    headers.insert(
        header::ACCEPT,
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
        ),
    );
    headers.insert(
        header::ACCEPT_LANGUAGE,
        HeaderValue::from_static("en-US,en;q=0.9"),
    );
    headers.insert(header::DNT, HeaderValue::from_static("1"));
    headers.insert(header::UPGRADE_INSECURE_REQUESTS, HeaderValue::from_static("1"));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("max-age=0"));
    headers.insert(
        HeaderName::from_static("sec-fetch-dest"),
        HeaderValue::from_static("document"),
    );
    headers.insert(
        HeaderName::from_static("sec-fetch-mode"),
        HeaderValue::from_static("navigate"),
    );
    headers.insert(
        HeaderName::from_static("sec-fetch-site"),
        HeaderValue::from_static("none"),
    );
    headers
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    // Nothing listens on the discard port, so requests fail fast after the
    // politeness pause has already been paid.
    const REFUSED_URL: &str = "http://127.0.0.1:9/nobody-home";

    fn test_client(rate_ms: u64) -> PoliteClient {
        PoliteClient::new(Duration::from_millis(rate_ms), 3, true).unwrap()
    }

    #[test]
    fn forbidden_backoff_grows_linearly() {
        assert_eq!(forbidden_backoff(0), Duration::from_secs(5));
        assert_eq!(forbidden_backoff(1), Duration::from_secs(10));
        assert_eq!(forbidden_backoff(2), Duration::from_secs(15));
    }

    #[test]
    fn rate_limited_backoff_grows_linearly() {
        assert_eq!(rate_limited_backoff(0), Duration::from_secs(10));
        assert_eq!(rate_limited_backoff(1), Duration::from_secs(20));
    }

    #[test]
    fn browser_profile_headers_present() {
        let headers = browser_headers();
        assert_eq!(
            headers.get(header::USER_AGENT).unwrap(),
            HeaderValue::from_static(USER_AGENT_VALUE)
        );
        assert!(headers.contains_key("sec-fetch-dest"));
        assert!(headers.contains_key(header::DNT));
    }

    #[tokio::test]
    async fn invalid_url_fails_before_any_request() {
        let client = test_client(0);
        let err = client.fetch_text("not a url").await.unwrap_err();
        assert!(matches!(err, ScrapeError::Fetch { .. }));
        assert!(err.to_string().contains("invalid URL"));
    }

    #[tokio::test]
    async fn every_fetch_pays_the_politeness_pause() {
        let client = test_client(120);
        let start = Instant::now();
        let _ = client.fetch_text(REFUSED_URL).await;
        let _ = client.fetch_text(REFUSED_URL).await;
        assert!(start.elapsed() >= Duration::from_millis(240));
    }

    #[tokio::test]
    async fn concurrent_fetches_are_serialized() {
        let client = test_client(100);
        let start = Instant::now();
        let (a, b) = tokio::join!(
            client.fetch_text(REFUSED_URL),
            client.fetch_text(REFUSED_URL)
        );
        assert!(a.is_err() && b.is_err());
        // Both calls paid their pause one after the other, not in parallel.
        assert!(start.elapsed() >= Duration::from_millis(200));
    }

    // Slow test: pays the real 5 s and 10 s backoffs between the attempts.
    #[tokio::test]
    async fn forbidden_twice_then_success_on_third_attempt() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let responses = [
                "HTTP/1.1 403 Forbidden\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
                "HTTP/1.1 403 Forbidden\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
                "HTTP/1.1 200 OK\r\ncontent-type: text/html\r\ncontent-length: 2\r\nconnection: close\r\n\r\nok",
            ];
            for response in responses {
                let (mut sock, _) = listener.accept().await.unwrap();
                let mut buf = [0u8; 2048];
                let _ = sock.read(&mut buf).await;
                sock.write_all(response.as_bytes()).await.unwrap();
                let _ = sock.shutdown().await;
            }
        });

        let client = test_client(10);
        let start = Instant::now();
        let body = client
            .fetch_text(&format!("http://{addr}/matchlogs"))
            .await
            .unwrap();
        assert_eq!(body, "ok");
        assert!(start.elapsed() >= forbidden_backoff(0) + forbidden_backoff(1));
    }
}
