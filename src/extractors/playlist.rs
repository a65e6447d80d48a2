use crate::error::Result;
use crate::traits::Extractor;
use regex::Regex;

/// 播放列表格式文本 (m3u / txt 直播源) 中的流地址, 例如
/// `CCTV1,http://1.2.3.4:8080/hls/1/index.m3u8`
pub struct PlaylistExtractor {
    re: Regex,
}

impl PlaylistExtractor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            re: Regex::new(
                r#"(?i)https?://[^\s,"'<>]+?(?:\.m3u8?|\.ts|\.flv|/live/[^\s,"'<>]*|/hls/[^\s,"'<>]*)(?:\?[^\s,"'<>]*)?"#,
            )?,
        })
    }
}

impl Extractor for PlaylistExtractor {
    fn name(&self) -> &'static str {
        "playlist"
    }

    fn extract(&self, text: &str) -> Vec<String> {
        text.lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with("#EXTM3U"))
            .flat_map(|line| self.re.find_iter(line).map(|m| m.as_str().to_string()))
            .collect()
    }
}
