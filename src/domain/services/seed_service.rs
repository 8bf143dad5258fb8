// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::repositories::domain_repository::{DomainRepository, RepositoryError};
use crate::domain::services::normalizer::normalize;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

/// 种子导入结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    /// 读取的行数
    pub read: u64,
    /// 新登记的域名数
    pub inserted: u64,
    /// 空行、重复行或已知域名
    pub skipped: u64,
}

/// 批量种子导入服务
///
/// 原始域名先规范化再写入，与发现合并遵循相同的唯一性保证
pub struct SeedService<R: DomainRepository + ?Sized> {
    repo: Arc<R>,
    chunk_size: usize,
}

impl<R: DomainRepository + ?Sized> SeedService<R> {
    /// 创建新的种子导入服务
    ///
    /// # 参数
    ///
    /// * `repo` - 域名仓库
    /// * `chunk_size` - 每次批量写入的域名数
    pub fn new(repo: Arc<R>, chunk_size: usize) -> Self {
        Self {
            repo,
            chunk_size: chunk_size.max(1),
        }
    }

    /// 导入原始域名列表
    ///
    /// # 参数
    ///
    /// * `lines` - 每项一个原始域名
    ///
    /// # 返回值
    ///
    /// * `Ok(ImportReport)` - 导入结果
    /// * `Err(RepositoryError)` - 写入失败，已提交的批次保留
    pub async fn import<I, S>(&self, lines: I) -> Result<ImportReport, RepositoryError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut report = ImportReport::default();
        let mut seen = HashSet::new();
        let mut chunk = Vec::with_capacity(self.chunk_size);

        for line in lines {
            report.read += 1;
            let domain = normalize(line.as_ref());
            if domain.is_empty() || !seen.insert(domain.clone()) {
                continue;
            }

            chunk.push(domain);
            if chunk.len() >= self.chunk_size {
                report.inserted += self.flush(&mut chunk).await?;
            }
        }
        report.inserted += self.flush(&mut chunk).await?;

        report.skipped = report.read - report.inserted;
        info!(
            "Seed import finished: read={} inserted={} skipped={}",
            report.read, report.inserted, report.skipped
        );
        Ok(report)
    }

    /// 确保给定的种子域名存在
    ///
    /// # 返回值
    ///
    /// 新登记的域名数量
    pub async fn ensure_seeds(&self, seeds: &[String]) -> Result<u64, RepositoryError> {
        let mut inserted = 0;
        for seed in seeds {
            let domain = normalize(seed);
            if !domain.is_empty() && self.repo.insert_if_absent(&domain).await? {
                info!("Registered seed domain {}", domain);
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    async fn flush(&self, chunk: &mut Vec<String>) -> Result<u64, RepositoryError> {
        if chunk.is_empty() {
            return Ok(0);
        }

        let inserted = self.repo.insert_many(chunk).await?;
        debug!("Imported chunk of {} domains, {} new", chunk.len(), inserted);
        chunk.clear();
        Ok(inserted)
    }
}
