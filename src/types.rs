use serde::Deserialize;
use std::fmt;

/// 标准化后的 API 端点, 例如 `http://1.2.3.4:8080/iptv/live/1000.json?key=txiptv`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Endpoint(String);

impl Endpoint {
    pub(crate) fn new(url: String) -> Self {
        Self(url)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 种子源: 主地址 + 备用地址
#[derive(Debug, Clone, Deserialize)]
pub struct SeedSource {
    pub url: String,
    #[serde(default)]
    pub backups: Vec<String>,
}

impl SeedSource {
    #[cfg(test)]
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            backups: Vec::new(),
        }
    }

    /// 按尝试顺序返回所有地址
    pub fn urls(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.url.as_str()).chain(self.backups.iter().map(String::as_str))
    }
}

/// 从端点 JSON 中解析出的频道
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelRecord {
    pub name: String,
    pub url: String, // 已解析为绝对地址
}

impl ChannelRecord {
    pub fn new(name: &str, url: &str) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
        }
    }
}

/// 测速结果
#[derive(Debug, Clone)]
pub struct SpeedResult {
    pub channel: ChannelRecord,
    pub throughput_kbps: f64, // KB/s, 失败则为 0
}

/// 输出分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Cctv,
    Satellite,
    Other,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Cctv, Category::Satellite, Category::Other];

    /// 输出文件中的分类标题
    pub fn title(&self) -> &'static str {
        match self {
            Category::Cctv => "央视频道",
            Category::Satellite => "卫视频道",
            Category::Other => "其他频道",
        }
    }
}

/// 一次运行的汇总
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub endpoints: usize,
    pub failed_sources: Vec<String>,
    pub live_endpoints: usize,
    pub channels_tested: usize,
    pub channels_accepted: usize,
    pub cctv_lines: usize,
    pub satellite_lines: usize,
    pub other_lines: usize,
    pub output_path: String,
}
