use crate::client::HttpClient;
use crate::config::Settings;
use crate::error::Result;
use crate::extractors;
use crate::traits::Extractor;
use crate::types::{Endpoint, SeedSource};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};
use url::Url;

/// 阶段 1 的结果
#[derive(Debug, Default)]
pub struct HarvestReport {
    pub endpoints: BTreeSet<Endpoint>,
    pub failed_sources: Vec<String>,
}

/// 把任意形式的候选串改写为标准 API 地址
///
/// 缺省协议补 `http`, 路径和查询替换为固定值, 丢弃 fragment 和用户信息.
/// 无法解析或没有主机的返回 None.
pub fn standardize_url(raw: &str, path: &str, query: &str) -> Option<Endpoint> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    let with_scheme = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("http://{}", raw)
    };

    let mut url = Url::parse(&with_scheme).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    url.host_str()?;

    url.set_username("").ok()?;
    url.set_password(None).ok()?;
    url.set_path(path);
    url.set_query(Some(query));
    url.set_fragment(None);

    Some(Endpoint::new(url.into()))
}

/// 对一段文本运行全部提取规则, 返回去重后的端点集合
pub fn extract_endpoints(
    rules: &[Box<dyn Extractor>],
    text: &str,
    path: &str,
    query: &str,
) -> BTreeSet<Endpoint> {
    let mut endpoints = BTreeSet::new();
    for extractor in rules {
        let raw = extractor.extract(text);
        debug!(extractor = extractor.name(), matches = raw.len(), "Extracted candidates");
        endpoints.extend(
            raw.iter()
                .filter_map(|candidate| standardize_url(candidate, path, query)),
        );
    }
    endpoints
}

/// 依次尝试主地址和备用地址, 返回第一个成功的响应文本
async fn fetch_seed(client: &HttpClient, seed: &SeedSource) -> Option<String> {
    for url in seed.urls() {
        match client.get_text(url).await {
            Ok(body) => {
                info!(url = %url, bytes = body.len(), "Fetched seed source");
                return Some(body);
            }
            Err(e) => warn!(phase = "harvest", url = %url, error = %e, "Seed source fetch failed"),
        }
    }
    None
}

/// 并发获取所有种子源并提取端点. 单个源失败只记录, 不影响其他源.
pub async fn harvest(client: &HttpClient, settings: &Settings) -> Result<HarvestReport> {
    let rules = extractors::all()?;
    debug!(extractors = ?extractors::SUPPORTED_EXTRACTORS, "Extractors ready");

    let tasks = settings.sources.iter().map(|seed| async move {
        let body = fetch_seed(client, seed).await;
        (seed, body)
    });
    let fetched = futures::future::join_all(tasks).await;

    let mut report = HarvestReport::default();
    for (seed, body) in fetched {
        match body {
            Some(text) => {
                let found =
                    extract_endpoints(&rules, &text, &settings.probe_path, &settings.probe_query);
                info!(url = %seed.url, endpoints = found.len(), "Extracted endpoints");
                report.endpoints.extend(found);
            }
            None => report.failed_sources.push(seed.url.clone()),
        }
    }

    Ok(report)
}
