// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// 域名记录
///
/// 注册表中的一行，每个规范化域名唯一对应一条记录。
/// 记录既是域名的权威存储，也是爬取工作队列中的一个工作单元。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainRecord {
    /// 代理主键，创建时分配，永不复用
    pub id: i32,
    /// 规范化后的域名，全表唯一
    pub domain: String,
    /// 爬取状态
    pub crawl_state: CrawlState,
    /// 可达性，`None` 表示尚未探测
    pub reachability: Option<Reachability>,
    /// 技术栈指纹，`None` 表示尚未探测
    pub technologies: Option<TechnologyProfile>,
    /// 被认领的时间
    pub claimed_at: Option<DateTime<FixedOffset>>,
    /// 爬取完成的时间
    pub crawled_at: Option<DateTime<FixedOffset>>,
    /// 探测完成的时间
    pub probed_at: Option<DateTime<FixedOffset>>,
    /// 创建时间
    pub created_at: DateTime<FixedOffset>,
}

impl DomainRecord {
    /// 是否已完成探测
    pub fn is_probed(&self) -> bool {
        self.reachability.is_some()
    }
}

/// 模型解析错误
///
/// 数据库中存储的文本无法还原为领域类型时返回
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid {kind} value: {value:?}")]
pub struct ParseModelError {
    kind: &'static str,
    value: String,
}

impl ParseModelError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// 爬取状态枚举
///
/// 状态只能向前推进：
/// Pending → Claimed → Done
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CrawlState {
    /// 待爬取
    #[default]
    Pending,
    /// 已被某个工作器认领，尚未完成
    Claimed,
    /// 已完成爬取
    Done,
}

impl fmt::Display for CrawlState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CrawlState::Pending => write!(f, "pending"),
            CrawlState::Claimed => write!(f, "claimed"),
            CrawlState::Done => write!(f, "done"),
        }
    }
}

impl FromStr for CrawlState {
    type Err = ParseModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(CrawlState::Pending),
            "claimed" => Ok(CrawlState::Claimed),
            "done" => Ok(CrawlState::Done),
            _ => Err(ParseModelError::new("crawl state", s)),
        }
    }
}

/// URL 变体
///
/// 探测时针对每个域名构造的四种访问方式，声明顺序即优先级顺序
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum UrlVariant {
    /// `https://d`
    Https,
    /// `https://www.d`
    HttpsWww,
    /// `http://d`
    Http,
    /// `http://www.d`
    HttpWww,
}

impl UrlVariant {
    /// 按优先级排列的全部变体
    pub const ALL: [UrlVariant; 4] = [
        UrlVariant::Https,
        UrlVariant::HttpsWww,
        UrlVariant::Http,
        UrlVariant::HttpWww,
    ];

    /// 存储使用的标签
    pub fn label(self) -> &'static str {
        match self {
            UrlVariant::Https => "https",
            UrlVariant::HttpsWww => "https-www",
            UrlVariant::Http => "http",
            UrlVariant::HttpWww => "http-www",
        }
    }

    /// 为给定域名构造该变体的 URL
    pub fn url_for(self, domain: &str) -> String {
        match self {
            UrlVariant::Https => format!("https://{}", domain),
            UrlVariant::HttpsWww => format!("https://www.{}", domain),
            UrlVariant::Http => format!("http://{}", domain),
            UrlVariant::HttpWww => format!("http://www.{}", domain),
        }
    }
}

impl fmt::Display for UrlVariant {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for UrlVariant {
    type Err = ParseModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        UrlVariant::ALL
            .into_iter()
            .find(|variant| variant.label() == s)
            .ok_or_else(|| ParseModelError::new("url variant", s))
    }
}

/// 可达性结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reachability {
    /// 至少一个变体可达，按优先级排序且不重复
    Reachable(Vec<UrlVariant>),
    /// 四个变体均不可达
    Unreachable,
}

impl Reachability {
    /// 由可达变体集合构造结果
    ///
    /// 变体会按优先级排序去重，空集合视为不可达
    pub fn from_variants<I>(variants: I) -> Self
    where
        I: IntoIterator<Item = UrlVariant>,
    {
        let mut variants: Vec<UrlVariant> = variants.into_iter().collect();
        variants.sort();
        variants.dedup();

        if variants.is_empty() {
            Reachability::Unreachable
        } else {
            Reachability::Reachable(variants)
        }
    }

    /// 可达的变体列表
    pub fn variants(&self) -> &[UrlVariant] {
        match self {
            Reachability::Reachable(variants) => variants,
            Reachability::Unreachable => &[],
        }
    }

    /// 优先级最高的可达变体
    pub fn first_reachable(&self) -> Option<UrlVariant> {
        self.variants().first().copied()
    }

    pub fn is_reachable(&self) -> bool {
        matches!(self, Reachability::Reachable(_))
    }
}

impl fmt::Display for Reachability {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Reachability::Unreachable => f.write_str("unreachable"),
            Reachability::Reachable(variants) => {
                let labels: Vec<&str> = variants.iter().map(|v| v.label()).collect();
                f.write_str(&labels.join(","))
            }
        }
    }
}

impl FromStr for Reachability {
    type Err = ParseModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s == "unreachable" || s.is_empty() {
            return Ok(Reachability::Unreachable);
        }

        let variants = s
            .split(',')
            .map(|label| label.trim().parse::<UrlVariant>())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Reachability::from_variants(variants))
    }
}

/// 检测到的技术及其版本
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Technology {
    /// 技术名称，例如 `WordPress`
    pub name: String,
    /// 检测到的版本，可能为空
    pub versions: Vec<String>,
}

impl Technology {
    pub fn new(name: impl Into<String>, versions: Vec<String>) -> Self {
        Self {
            name: name.into(),
            versions,
        }
    }

    /// 版本字符串，多个版本以空格分隔
    pub fn version_label(&self) -> String {
        self.versions.join(" ")
    }
}

/// 技术栈指纹结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TechnologyProfile {
    /// 检测到的技术列表，按名称排序
    Detected(Vec<Technology>),
    /// 已尝试识别但未检测到任何技术（或识别器失败）
    NotDetected,
    /// 不适用：没有任何可达变体，未进行识别
    NotApplicable,
}

const NOT_APPLICABLE: &str = "n/a";
const NOT_DETECTED: &str = "none";

impl TechnologyProfile {
    /// 由识别结果构造指纹，空列表视为未检测到
    pub fn from_detected(mut technologies: Vec<Technology>) -> Self {
        if technologies.is_empty() {
            return TechnologyProfile::NotDetected;
        }
        technologies.sort_by(|a, b| a.name.cmp(&b.name));
        TechnologyProfile::Detected(technologies)
    }

    /// 存储中表示哨兵值的文本
    pub fn sentinels() -> [&'static str; 2] {
        [NOT_APPLICABLE, NOT_DETECTED]
    }

    pub fn technologies(&self) -> &[Technology] {
        match self {
            TechnologyProfile::Detected(technologies) => technologies,
            _ => &[],
        }
    }
}

impl fmt::Display for TechnologyProfile {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TechnologyProfile::NotApplicable => f.write_str(NOT_APPLICABLE),
            TechnologyProfile::NotDetected => f.write_str(NOT_DETECTED),
            TechnologyProfile::Detected(technologies) => {
                let json = serde_json::to_string(technologies).map_err(|_| fmt::Error)?;
                f.write_str(&json)
            }
        }
    }
}

impl FromStr for TechnologyProfile {
    type Err = ParseModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            NOT_APPLICABLE => Ok(TechnologyProfile::NotApplicable),
            NOT_DETECTED => Ok(TechnologyProfile::NotDetected),
            json => serde_json::from_str::<Vec<Technology>>(json)
                .map(TechnologyProfile::from_detected)
                .map_err(|_| ParseModelError::new("technology profile", s)),
        }
    }
}
