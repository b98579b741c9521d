use std::time::Duration;

use anyhow::{Context as _, anyhow};
use bytes::Bytes;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use url::Url;

#[derive(Debug, Clone)]
pub struct FetchPolicy {
    pub user_agent: String,
    pub timeout: Duration,
    /// Extra attempts after the first one fails.
    pub retries: usize,
    pub retry_interval: Duration,
}

#[derive(Clone)]
pub struct Fetcher {
    client: reqwest::Client,
    retries: usize,
    retry_interval: Duration,
}

impl Fetcher {
    pub fn new(policy: &FetchPolicy) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(&policy.user_agent)
            .connect_timeout(policy.timeout)
            .timeout(policy.timeout * 2)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .context("build reqwest client")?;
        Ok(Self {
            client,
            retries: policy.retries,
            retry_interval: policy.retry_interval,
        })
    }

    pub async fn get_bytes(&self, url: Url) -> anyhow::Result<(Bytes, HeaderMap)> {
        let max_attempts = self.retries + 1;
        let mut last_err = anyhow!("GET {} was never attempted", url);

        for attempt in 1..=max_attempts {
            let mut wait = self.retry_interval;
            match self.client.get(url.clone()).send().await {
                Ok(resp) => {
                    let status = resp.status();
                    let headers = resp.headers().clone();
                    if status.is_success() {
                        let bytes = resp.bytes().await.context("read response body")?;
                        return Ok((bytes, headers));
                    }
                    if let Some(after) = retry_after_duration(&headers) {
                        wait = after;
                    }
                    last_err = anyhow!("GET {} failed with status {}", url, status);
                }
                Err(e) => {
                    last_err = anyhow::Error::new(e).context(format!("GET {}", url));
                }
            }

            if attempt < max_attempts {
                tracing::warn!(
                    %url,
                    attempt,
                    wait_ms = wait.as_millis(),
                    error = %last_err,
                    "request failed; retrying"
                );
                tokio::time::sleep(wait).await;
            }
        }

        tracing::error!(%url, "download failed");
        Err(last_err)
    }

    pub async fn get_text(&self, url: Url) -> anyhow::Result<String> {
        let (bytes, _headers) = self.get_bytes(url.clone()).await?;
        Ok(decode_utf8_lossy(&url, &bytes))
    }
}

/// Invalid sequences become U+FFFD instead of failing the page.
fn decode_utf8_lossy(url: &Url, bytes: &[u8]) -> String {
    match String::from_utf8_lossy(bytes) {
        std::borrow::Cow::Borrowed(text) => text.to_string(),
        std::borrow::Cow::Owned(text) => {
            tracing::warn!(%url, "response is not valid utf-8; replaced invalid bytes");
            text
        }
    }
}

fn retry_after_duration(headers: &HeaderMap) -> Option<Duration> {
    let v = headers.get(RETRY_AFTER)?;
    let s = v.to_str().ok()?.trim();
    let seconds: u64 = s.parse().ok()?;
    Some(Duration::from_secs(seconds))
}
