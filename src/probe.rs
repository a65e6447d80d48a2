use crate::client::HttpClient;
use crate::error::{Result, ScanError};
use crate::types::{ChannelRecord, Endpoint};
use serde_json::Value;
use tracing::debug;
use url::Url;

/// 从端点响应中解析频道列表
///
/// `data` 必须是数组, 否则整批丢弃. 单个条目缺少 `name`/`url`
/// 或地址无法拼接时只跳过该条目.
pub fn parse_channels(endpoint: &Endpoint, body: &Value) -> Result<Vec<ChannelRecord>> {
    let entries = body
        .get("data")
        .and_then(Value::as_array)
        .ok_or_else(|| ScanError::Malformed(format!("`data` is not a list in {}", endpoint)))?;

    let base = Url::parse(endpoint.as_str())?;

    let channels = entries
        .iter()
        .filter_map(|entry| {
            let name = entry.get("name").and_then(Value::as_str).map(str::trim);
            let url = entry.get("url").and_then(Value::as_str).map(str::trim);
            match (name, url) {
                (Some(name), Some(url)) if !name.is_empty() && !url.is_empty() => {
                    match base.join(url) {
                        Ok(full) => Some(ChannelRecord::new(name, full.as_str())),
                        Err(e) => {
                            debug!(url = %url, error = %e, "Skipping channel with bad url");
                            None
                        }
                    }
                }
                _ => {
                    debug!(entry = %entry, "Skipping incomplete channel entry");
                    None
                }
            }
        })
        .collect();

    Ok(channels)
}

/// 请求端点并解析频道. 任何失败都只记录日志, 返回空列表.
pub async fn probe(client: &HttpClient, endpoint: &Endpoint) -> Vec<ChannelRecord> {
    let body = match client.get_json(endpoint.as_str()).await {
        Ok(body) => body,
        Err(e) => {
            debug!(phase = "probe", url = %endpoint, error = %e, "Endpoint request failed");
            return Vec::new();
        }
    };

    match parse_channels(endpoint, &body) {
        Ok(channels) => {
            debug!(url = %endpoint, channels = channels.len(), "Endpoint answered");
            channels
        }
        Err(e) => {
            debug!(phase = "probe", url = %endpoint, error = %e, "Invalid channel list");
            Vec::new()
        }
    }
}
