// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::domain::repositories::domain_repository::DomainRepository;
use crate::domain::services::normalizer::normalize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error};

/// 一次合并的结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// 新登记的域名，按发现顺序
    pub discovered: Vec<String>,
    /// 已知域名的数量
    pub known: usize,
    /// 因存储错误被放弃的候选数量
    pub failed: usize,
}

/// 发现与合并服务
///
/// 把页面中提取出的外链转换为规范化域名并登记到注册表
pub struct DiscoveryService<R: DomainRepository + ?Sized> {
    repo: Arc<R>,
}

impl<R: DomainRepository + ?Sized> DiscoveryService<R> {
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }

    /// 将外链合并进注册表
    ///
    /// 已存在的域名被静默忽略；单个候选的存储错误只放弃该候选。
    /// 返回值仅用于观测，不影响调用方的控制流。
    ///
    /// # 参数
    ///
    /// * `links` - 原始 href 字符串
    ///
    /// # 返回值
    ///
    /// 合并结果，包含新登记的域名
    pub async fn merge_links<S: AsRef<str>>(&self, links: &[S]) -> MergeReport {
        let mut report = MergeReport::default();

        for candidate in extract_domain_candidates(links) {
            match self.repo.insert_if_absent(&candidate).await {
                Ok(true) => {
                    debug!("Discovered new domain {}", candidate);
                    report.discovered.push(candidate);
                }
                Ok(false) => report.known += 1,
                Err(e) => {
                    error!("Failed to register domain {}: {}", candidate, e);
                    report.failed += 1;
                }
            }
        }

        report
    }
}

/// 从外链中提取规范化的候选域名
///
/// 只接受带 http/https 协议的绝对链接，取其 authority 部分（去掉 userinfo），
/// 规范化后去重，保持首次出现的顺序。
pub fn extract_domain_candidates<S: AsRef<str>>(links: &[S]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut candidates = Vec::new();

    for link in links {
        let Some(authority) = authority_of(link.as_ref()) else {
            continue;
        };

        let domain = normalize(authority);
        if !domain.is_empty() && seen.insert(domain.clone()) {
            candidates.push(domain);
        }
    }

    candidates
}

fn authority_of(link: &str) -> Option<&str> {
    let link = link.trim();
    let (scheme, rest) = link.split_once("://")?;
    if !scheme.eq_ignore_ascii_case("http") && !scheme.eq_ignore_ascii_case("https") {
        return None;
    }

    let end = rest.find(&['/', '?', '#'][..]).unwrap_or(rest.len());
    let authority = &rest[..end];
    let host = match authority.rfind('@') {
        Some(at) => &authority[at + 1..],
        None => authority,
    };

    if host.is_empty() {
        None
    } else {
        Some(host)
    }
}

#[cfg(test)]
#[path = "discovery_service_test.rs"]
mod tests;
