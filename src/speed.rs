use crate::client::HttpClient;
use crate::config::Settings;
use crate::error::{Result, ScanError};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

/// 计时下限, 防止除零
const MIN_ELAPSED: Duration = Duration::from_millis(100);

/// KB/s
pub fn throughput_kbps(bytes: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.max(MIN_ELAPSED).as_secs_f64();
    bytes as f64 / 1024.0 / secs
}

/// 达到阈值即保留
pub fn is_accepted(throughput_kbps: f64, threshold: f64) -> bool {
    throughput_kbps >= threshold
}

/// 测速失败的地址日志 (追加写入, 多个任务共享)
pub struct FailedUrlLog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FailedUrlLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn record(&self, url: &str, error: &ScanError) {
        let line = format!("{} - {}\n", url, error);
        let _guard = self.lock.lock().await;
        let res: std::io::Result<()> = async {
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .await?;
            file.write_all(line.as_bytes()).await
        }
        .await;
        if let Err(e) = res {
            warn!(path = ?self.path, error = %e, "Could not append to failed url log");
        }
    }
}

/// 读取流的前一段, 计算吞吐量
///
/// 第一块数据最多等 read timeout, 不受时长上限约束 (响应头来得晚的直播流
/// 也至少读到一块). 之后读满时长上限或流结束即停止.
/// 任何一次读取超过 read timeout 都视为失败.
async fn measure(client: &HttpClient, settings: &Settings, url: &str) -> Result<f64> {
    let start = Instant::now();
    let deadline = start + settings.speed_test_cap();
    let read_timeout = settings.stream_read_timeout();

    let mut resp = client.open_stream(url, read_timeout).await?;
    let mut downloaded: u64 = 0;
    let mut first_chunk = true;

    loop {
        let now = Instant::now();
        let wait = if first_chunk {
            read_timeout
        } else if now >= deadline {
            break;
        } else {
            read_timeout.min(deadline - now)
        };
        let capped = wait < read_timeout;

        match tokio::time::timeout(wait, resp.chunk()).await {
            Ok(Ok(Some(chunk))) => {
                downloaded += chunk.len() as u64;
                first_chunk = false;
            }
            Ok(Ok(None)) => break,
            Ok(Err(e)) => return Err(e.into()),
            Err(_) if capped => break,
            Err(_) => return Err(ScanError::ReadTimeout(read_timeout)),
        }
    }

    Ok(throughput_kbps(downloaded, start.elapsed()))
}

/// 单个流测速. 网络错误记为 0 并写入失败日志, 不向上抛出.
pub async fn speed_test(
    client: &HttpClient,
    settings: &Settings,
    failed: &FailedUrlLog,
    url: &str,
) -> f64 {
    match measure(client, settings, url).await {
        Ok(kbps) => {
            debug!(url = %url, kbps, "Speed test finished");
            kbps
        }
        Err(e) => {
            // 进度条显示期间只在 debug 级别输出, 失败地址都写入日志文件
            debug!(phase = "speed", url = %url, error = %e, "Speed test failed");
            failed.record(url, &e).await;
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{serve, Gauge, Reply};
    use std::sync::Arc;
    use tempfile::tempdir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn threshold_is_inclusive() {
        assert!(is_accepted(0.1, 0.1));
        assert!(is_accepted(2.5, 0.1));
        assert!(!is_accepted(0.0999, 0.1));
        assert!(!is_accepted(0.0, 0.1));
    }

    #[test]
    fn elapsed_is_floored() {
        // 1 KB in "no time" counts as 1 KB over 0.1 s
        let kbps = throughput_kbps(1024, Duration::ZERO);
        assert!((kbps - 10.0).abs() < 1e-9);

        let kbps = throughput_kbps(2048, Duration::from_secs(2));
        assert!((kbps - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn measures_a_finite_stream() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/live/1.ts"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 64 * 1024]))
            .mount(&server)
            .await;

        let dir = tempdir()?;
        let failed = FailedUrlLog::new(dir.path().join("failed.log"));
        let settings = Settings::default();
        let client = HttpClient::new(&settings)?;

        let kbps = speed_test(&client, &settings, &failed, &format!("{}/live/1.ts", server.uri())).await;
        assert!(is_accepted(kbps, settings.speed_threshold));
        assert!(!failed.path().exists());
        Ok(())
    }

    #[tokio::test]
    async fn failures_score_zero_and_are_logged() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempdir()?;
        let failed = FailedUrlLog::new(dir.path().join("failed.log"));
        let settings = Settings::default();
        let client = HttpClient::new(&settings)?;

        let url = format!("{}/live/2.m3u8", server.uri());
        let kbps = speed_test(&client, &settings, &failed, &url).await;
        assert_eq!(kbps, 0.0);

        let log = tokio::fs::read_to_string(failed.path()).await?;
        assert!(log.starts_with(&format!("{} - ", url)));
        assert!(log.contains("403"));
        Ok(())
    }

    #[tokio::test]
    async fn slow_response_headers_time_out() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
            .mount(&server)
            .await;

        let dir = tempdir()?;
        let failed = FailedUrlLog::new(dir.path().join("failed.log"));
        let settings = Settings {
            stream_read_timeout_secs: 1,
            ..Settings::default()
        };
        let client = HttpClient::new(&settings)?;

        let kbps = speed_test(&client, &settings, &failed, &server.uri()).await;
        assert_eq!(kbps, 0.0);
        Ok(())
    }

    #[tokio::test]
    async fn endless_stream_stops_at_cap() -> Result<()> {
        let base = serve(Reply::endless(Duration::from_millis(50)), Arc::new(Gauge::default())).await;

        let dir = tempdir()?;
        let failed = FailedUrlLog::new(dir.path().join("failed.log"));
        let settings = Settings {
            speed_test_cap_secs: 1.0,
            ..Settings::default()
        };
        let client = HttpClient::new(&settings)?;

        let started = std::time::Instant::now();
        let kbps = speed_test(&client, &settings, &failed, &format!("{}/live/1.ts", base)).await;
        let elapsed = started.elapsed();

        assert!(kbps > 0.0);
        assert!(is_accepted(kbps, settings.speed_threshold));
        assert!(elapsed >= Duration::from_secs(1));
        assert!(elapsed < Duration::from_secs(3), "cap not applied: {:?}", elapsed);
        assert!(!failed.path().exists());
        Ok(())
    }

    #[tokio::test]
    async fn late_headers_still_get_measured() -> Result<()> {
        let reply = Reply {
            header_delay: Duration::from_millis(1500),
            ..Reply::endless(Duration::from_millis(50))
        };
        let base = serve(reply, Arc::new(Gauge::default())).await;

        let dir = tempdir()?;
        let failed = FailedUrlLog::new(dir.path().join("failed.log"));
        let settings = Settings {
            speed_test_cap_secs: 1.0,
            ..Settings::default()
        };
        let client = HttpClient::new(&settings)?;

        let kbps = speed_test(&client, &settings, &failed, &format!("{}/live/slow.ts", base)).await;
        assert!(kbps > 0.0);
        assert!(is_accepted(kbps, settings.speed_threshold));
        assert!(!failed.path().exists());
        Ok(())
    }

    #[tokio::test]
    async fn stall_before_cap_scores_zero_and_is_logged() -> Result<()> {
        let reply = Reply {
            chunks: 3,
            stall: Duration::from_secs(5),
            ..Reply::endless(Duration::from_millis(50))
        };
        let base = serve(reply, Arc::new(Gauge::default())).await;

        let dir = tempdir()?;
        let failed = FailedUrlLog::new(dir.path().join("failed.log"));
        let settings = Settings {
            stream_read_timeout_secs: 1,
            speed_test_cap_secs: 8.0,
            ..Settings::default()
        };
        let client = HttpClient::new(&settings)?;

        let url = format!("{}/live/stall.ts", base);
        let started = std::time::Instant::now();
        let kbps = speed_test(&client, &settings, &failed, &url).await;

        assert_eq!(kbps, 0.0);
        assert!(started.elapsed() < Duration::from_secs(4));
        let log = tokio::fs::read_to_string(failed.path()).await?;
        assert!(log.starts_with(&format!("{} - Read timed out", url)));
        Ok(())
    }

    #[tokio::test]
    async fn headers_without_body_are_logged() -> Result<()> {
        let reply = Reply {
            chunks: 0,
            stall: Duration::from_secs(5),
            ..Reply::endless(Duration::ZERO)
        };
        let base = serve(reply, Arc::new(Gauge::default())).await;

        let dir = tempdir()?;
        let failed = FailedUrlLog::new(dir.path().join("failed.log"));
        let settings = Settings {
            stream_read_timeout_secs: 1,
            speed_test_cap_secs: 0.5,
            ..Settings::default()
        };
        let client = HttpClient::new(&settings)?;

        let url = format!("{}/live/empty.ts", base);
        assert_eq!(speed_test(&client, &settings, &failed, &url).await, 0.0);
        let log = tokio::fs::read_to_string(failed.path()).await?;
        assert!(log.contains(&url));
        Ok(())
    }
}
