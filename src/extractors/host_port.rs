use crate::error::Result;
use crate::traits::Extractor;
use regex::Regex;

/// 裸主机名 / IP, 可带端口和协议头, 例如 `1.2.3.4:8080` 或 `http://tv.example.com/`
pub struct HostPortExtractor {
    re: Regex,
}

impl HostPortExtractor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            re: Regex::new(r"(?:https?://)?(?:[\w\-]+\.)+[\w\-]+(?::\d+)?/?")?,
        })
    }
}

impl Extractor for HostPortExtractor {
    fn name(&self) -> &'static str {
        "host_port"
    }

    fn extract(&self, text: &str) -> Vec<String> {
        self.re
            .find_iter(text)
            .map(|m| m.as_str().to_string())
            .collect()
    }
}
