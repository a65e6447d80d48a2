use crate::config::Settings;
use crate::error::{Result, ScanError};
use reqwest::{Client, Response};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// 重试策略: 第 n 次重试前等待 base * 2^(n-1), 上限 max_delay
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }
        let multiplier = 1u32.checked_shl(retry - 1).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(multiplier)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// Run `operation` until it succeeds, fails with a non-transient error, or the
/// attempts run out. `operation` receives the 0-indexed attempt number.
pub async fn retry_with_backoff<F, Fut, T>(
    policy: &RetryPolicy,
    retry_statuses: &[u16],
    operation: F,
) -> Result<T>
where
    F: Fn(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) if attempt + 1 < attempts && err.is_transient(retry_statuses) => {
                attempt += 1;
                let delay = policy.delay_for_retry(attempt);
                debug!(
                    attempt,
                    max = attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Retrying after transient error"
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}

/// 共享的 HTTP 客户端 (连接复用, 固定 User-Agent, GET 请求自动重试)
#[derive(Clone)]
pub struct HttpClient {
    inner: Client,
    policy: RetryPolicy,
    retry_statuses: Arc<[u16]>,
    request_timeout: Duration,
}

impl HttpClient {
    pub fn new(settings: &Settings) -> Result<Self> {
        let inner = Client::builder()
            .user_agent(settings.user_agent.as_str())
            .connect_timeout(settings.stream_connect_timeout())
            .build()?;

        Ok(Self {
            inner,
            policy: RetryPolicy {
                max_attempts: settings.retry_attempts,
                base_delay: settings.retry_backoff(),
                max_delay: MAX_BACKOFF,
            },
            retry_statuses: settings.retry_statuses.clone().into(),
            request_timeout: settings.request_timeout(),
        })
    }

    /// GET 并返回响应文本
    pub async fn get_text(&self, url: &str) -> Result<String> {
        retry_with_backoff(&self.policy, &self.retry_statuses, |_| async move {
            let resp = self
                .inner
                .get(url)
                .timeout(self.request_timeout)
                .send()
                .await?;
            let resp = check_status(url, resp)?;
            Ok(resp.text().await?)
        })
        .await
    }

    /// GET 并解析为 JSON. 解析失败不重试.
    pub async fn get_json(&self, url: &str) -> Result<serde_json::Value> {
        let body = self.get_text(url).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// 打开流式 GET (不重试). 等待响应头的时间受 `header_timeout` 限制.
    pub async fn open_stream(&self, url: &str, header_timeout: Duration) -> Result<Response> {
        let resp = tokio::time::timeout(header_timeout, self.inner.get(url).send())
            .await
            .map_err(|_| ScanError::ReadTimeout(header_timeout))??;
        check_status(url, resp)
    }
}

fn check_status(url: &str, resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        Ok(resp)
    } else {
        Err(ScanError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        })
    }
}
