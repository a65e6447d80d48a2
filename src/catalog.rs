use crate::error::Result;
use crate::types::Category;
use chrono::{DateTime, Local};
use regex::Regex;
use std::collections::{BTreeSet, HashSet};
use std::path::Path;
use tokio::fs;

/// 无编号的央视频道排在最后
const UNNUMBERED_KEY: u32 = 999;

/// 频道名分类规则
pub struct Classifier {
    cctv: Regex,
    satellite: Regex,
    number: Regex,
}

impl Classifier {
    pub fn new() -> Result<Self> {
        Ok(Self {
            // 4K/8K 必须排在数字前面, 否则 CCTV4K 会被截成 CCTV4
            cctv: Regex::new(r"(?i)CCTV[\-\s]?(4K|8K|\d{1,2}\+?|HD)")?,
            satellite: Regex::new(r"(.{2,4}卫视)台?")?,
            number: Regex::new(r"\d+")?,
        })
    }

    /// 返回分类和规范化后的频道名
    pub fn classify(&self, name: &str) -> (Category, String) {
        if let Some(caps) = self.cctv.captures(name) {
            return (Category::Cctv, format!("CCTV{}", caps[1].to_uppercase()));
        }
        if let Some(caps) = self.satellite.captures(name) {
            return (Category::Satellite, caps[1].to_string());
        }
        (Category::Other, name.to_string())
    }

    fn cctv_sort_key(&self, name: &str) -> u32 {
        self.number
            .find(name)
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(UNNUMBERED_KEY)
    }
}

/// 分类并排序后的输出行
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Sections {
    pub cctv: Vec<String>,
    pub satellite: Vec<String>,
    pub other: Vec<String>,
}

impl Sections {
    pub fn lines(&self, category: Category) -> &[String] {
        match category {
            Category::Cctv => &self.cctv,
            Category::Satellite => &self.satellite,
            Category::Other => &self.other,
        }
    }

    /// 渲染输出文件内容
    pub fn render(&self, updated_at: &DateTime<Local>) -> String {
        let mut out = format!("# 最后更新: {}\n\n", updated_at.format("%Y-%m-%d %H:%M"));
        for (i, category) in Category::ALL.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            out.push_str(category.title());
            out.push_str(",#genre#\n");
            for line in self.lines(*category) {
                out.push_str(line);
                out.push('\n');
            }
        }
        out
    }
}

/// 已通过测速的频道集合 (按行去重)
#[derive(Default)]
pub struct Catalog {
    lines: HashSet<String>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// 加入一条 `name,url`. 名称中的逗号会破坏行格式, 替换为空格.
    pub fn insert(&mut self, name: &str, url: &str) -> bool {
        let name = name.trim().replace(',', " ");
        self.lines.insert(format!("{},{}", name, url))
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// 分类, 规范化名称, 去重并排序
    pub fn categorize(&self, classifier: &Classifier) -> Sections {
        let mut cctv = BTreeSet::new();
        let mut satellite = BTreeSet::new();
        let mut other = BTreeSet::new();

        for line in &self.lines {
            let Some((name, url)) = line.split_once(',') else {
                continue;
            };
            let (category, normalized) = classifier.classify(name);
            let line = format!("{},{}", normalized, url);
            match category {
                Category::Cctv => {
                    cctv.insert((classifier.cctv_sort_key(&normalized), line));
                }
                Category::Satellite => {
                    satellite.insert(line);
                }
                Category::Other => {
                    other.insert(line);
                }
            }
        }

        Sections {
            cctv: cctv.into_iter().map(|(_, line)| line).collect(),
            satellite: satellite.into_iter().collect(),
            other: other.into_iter().collect(),
        }
    }
}

/// 写出播放列表文件. 写入失败是致命错误.
pub async fn write_playlist(path: &Path, sections: &Sections, updated_at: &DateTime<Local>) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }
    fs::write(path, sections.render(updated_at)).await?;
    Ok(())
}
