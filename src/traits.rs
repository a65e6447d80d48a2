/// Extractor: 从种子文档中提取候选地址的规则必须实现的接口
///
/// 种子文档没有固定格式, 提取是尽力而为: 不匹配的文本直接忽略, 不算错误.
pub trait Extractor: Sync + Send {
    /// 规则名称 (如 "host_port"), 用于日志
    fn name(&self) -> &'static str;

    /// 返回原始候选串, 由调用方负责标准化和去重
    fn extract(&self, text: &str) -> Vec<String>;
}
