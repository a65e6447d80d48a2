use crate::error::Result;
use crate::traits::Extractor;
use regex::Regex;

/// `key=value` 形式, 例如 `host=1.2.3.4:8080` 或 `"url": "http://h:81"`
pub struct KeyValueExtractor {
    re: Regex,
}

impl KeyValueExtractor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            re: Regex::new(
                r#"(?i)\b(?:url|host|ip|addr|address|server)["']?\s*[=:]\s*["']?([^\s"',;&<>]+)"#,
            )?,
        })
    }
}

impl Extractor for KeyValueExtractor {
    fn name(&self) -> &'static str {
        "key_value"
    }

    fn extract(&self, text: &str) -> Vec<String> {
        self.re
            .captures_iter(text)
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
            .collect()
    }
}
