pub mod host_port;
pub mod key_value;
pub mod playlist;

use crate::error::Result;
use crate::traits::Extractor;

pub const SUPPORTED_EXTRACTORS: &[&str] = &["host_port", "playlist", "key_value"];

/// 构建全部提取规则
pub fn all() -> Result<Vec<Box<dyn Extractor>>> {
    Ok(vec![
        Box::new(host_port::HostPortExtractor::new()?),
        Box::new(playlist::PlaylistExtractor::new()?),
        Box::new(key_value::KeyValueExtractor::new()?),
    ])
}
