use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use rand::Rng;
use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue};
use tracing::{debug, warn};

use crate::config::ScrapeConfig;
use crate::model::RawDocument;

const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Source of raw pages. Retries, if any, happen behind this call.
pub trait Fetcher {
    fn fetch(&self, url: &str) -> Result<RawDocument>;
}

/// Blocking HTTP fetcher with exponential backoff and jitter.
pub struct HttpFetcher {
    client: Client,
    max_retries: u32,
    backoff: Duration,
}

impl HttpFetcher {
    pub fn new(cfg: &ScrapeConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
            ),
        );
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_static("zh-CN,zh;q=0.9,en;q=0.8"),
        );
        let client = Client::builder()
            .timeout(cfg.timeout)
            .user_agent(cfg.user_agent.clone())
            .default_headers(headers)
            .build()
            .context("failed to build http client")?;
        Ok(Self {
            client,
            max_retries: cfg.max_retries,
            backoff: cfg.retry_backoff,
        })
    }

    fn fetch_once(&self, url: &str) -> Result<RawDocument, Attempt> {
        let resp = self.client.get(url).send().map_err(|err| {
            let retry = err.is_timeout() || err.is_connect() || err.is_request();
            Attempt {
                retry,
                error: anyhow!(err).context(format!("request to {url} failed")),
            }
        })?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Attempt {
                retry: is_retryable_status(status),
                error: anyhow!("{url} returned {status}"),
            });
        }
        let html = resp.text().map_err(|err| Attempt {
            retry: true,
            error: anyhow!(err).context(format!("read body of {url}")),
        })?;
        Ok(RawDocument::new(url, html))
    }
}

struct Attempt {
    retry: bool,
    error: anyhow::Error,
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<RawDocument> {
        let mut attempt = 0u32;
        loop {
            match self.fetch_once(url) {
                Ok(doc) => {
                    debug!(url, bytes = doc.html.len(), attempt, "fetched page");
                    return Ok(doc);
                }
                Err(failed) if failed.retry && attempt < self.max_retries => {
                    let wait = backoff_delay(self.backoff, attempt);
                    warn!(
                        url,
                        attempt,
                        wait_ms = wait.as_millis() as u64,
                        error = %failed.error,
                        "fetch failed, retrying"
                    );
                    thread::sleep(wait);
                    attempt += 1;
                }
                Err(failed) => return Err(failed.error),
            }
        }
    }
}

pub fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
}

/// `base * 2^attempt` capped at 30s, plus up to half of that again as jitter.
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let exp = base.saturating_mul(2u32.saturating_pow(attempt.min(16)));
    let capped = exp.min(MAX_BACKOFF);
    let jitter_ms = (capped.as_millis() as u64) / 2;
    let jitter = if jitter_ms == 0 {
        0
    } else {
        rand::thread_rng().gen_range(0..=jitter_ms)
    };
    capped + Duration::from_millis(jitter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_and_is_capped() {
        let base = Duration::from_millis(100);
        let first = backoff_delay(base, 0);
        assert!(first >= base && first <= Duration::from_millis(150));
        let third = backoff_delay(base, 2);
        assert!(third >= Duration::from_millis(400) && third <= Duration::from_millis(600));
        let huge = backoff_delay(base, 40);
        assert!(huge >= MAX_BACKOFF && huge <= MAX_BACKOFF + MAX_BACKOFF / 2);
        assert_eq!(backoff_delay(Duration::ZERO, 3), Duration::ZERO);
    }

    #[test]
    fn retryable_statuses() {
        assert!(is_retryable_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable_status(StatusCode::BAD_GATEWAY));
        assert!(!is_retryable_status(StatusCode::NOT_FOUND));
        assert!(!is_retryable_status(StatusCode::FORBIDDEN));
    }
}
