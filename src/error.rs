use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("IO operation failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP status {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Read timed out after {0:?}")]
    ReadTimeout(std::time::Duration),

    #[error("Malformed data: {0}")]
    Malformed(String),
}

impl ScanError {
    /// 是否为可重试的瞬时错误 (网络层错误或列表中的状态码)
    pub fn is_transient(&self, retry_statuses: &[u16]) -> bool {
        match self {
            ScanError::Http(e) => e.is_connect() || e.is_timeout() || e.is_request() || e.is_body(),
            ScanError::Status { status, .. } => retry_statuses.contains(status),
            ScanError::ReadTimeout(_) => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, ScanError>;
