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

use crate::domain::repositories::domain_repository::{
    DomainFilter, DomainRepository, NormalizationOp, RepositoryError,
};
use crate::domain::services::normalizer::normalize;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, error, info};

/// 规范化维护结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NormalizationReport {
    /// 扫描的记录数
    pub scanned: u64,
    /// 改写为规范形式的记录数
    pub rewritten: u64,
    /// 作为重复项删除的记录数
    pub deleted: u64,
    /// 提交失败的批次数
    pub failed_batches: u64,
}

/// 同一规范化键下的记录，`ids[0]` 是最早登记的记录
struct KeyGroup {
    ids: Vec<i32>,
}

impl KeyGroup {
    fn winner(&self) -> i32 {
        self.ids[0]
    }
}

/// 规范化维护服务
///
/// 重新规范化注册表中的每一行：重复项删除（最早登记的记录保留），
/// 非规范形式改写为规范形式。每批一个事务，可安全重复执行。
pub struct NormalizationService<R: DomainRepository + ?Sized> {
    repo: Arc<R>,
    batch_size: u64,
}

impl<R: DomainRepository + ?Sized> NormalizationService<R> {
    /// 创建新的规范化维护服务
    ///
    /// # 参数
    ///
    /// * `repo` - 域名仓库
    /// * `batch_size` - 每批处理的记录数
    pub fn new(repo: Arc<R>, batch_size: u64) -> Self {
        Self {
            repo,
            batch_size: batch_size.max(1),
        }
    }

    /// 执行一次完整的维护
    ///
    /// 先一次性加载整个注册表的 (id, 域名) 快照建立规范化键索引，
    /// 再按 id 分批遍历。单个批次提交失败只记录并继续。
    ///
    /// # 返回值
    ///
    /// * `Ok(NormalizationReport)` - 维护结果
    /// * `Err(RepositoryError)` - 快照加载或扫描失败
    pub async fn run(&self) -> Result<NormalizationReport, RepositoryError> {
        let groups = self.build_index().await?;
        info!("Loaded {} normalized keys for maintenance", groups.len());

        let mut report = NormalizationReport::default();
        let mut deleted: HashSet<i32> = HashSet::new();
        let mut after_id = 0;

        loop {
            let batch = self
                .repo
                .scan(DomainFilter::All, after_id, self.batch_size)
                .await?;
            let Some(last) = batch.last() else {
                break;
            };
            after_id = last.id;
            report.scanned += batch.len() as u64;

            let mut deletes = Vec::new();
            let mut rewrites = Vec::new();
            let mut batch_deleted = HashSet::new();

            for record in &batch {
                if deleted.contains(&record.id) || batch_deleted.contains(&record.id) {
                    continue;
                }

                let key = normalize(&record.domain);
                if key.is_empty() {
                    debug!("Skipping id {} with empty normalized form", record.id);
                    continue;
                }

                let winner = groups.get(&key).map(KeyGroup::winner).unwrap_or(record.id);
                if winner != record.id {
                    batch_deleted.insert(record.id);
                    deletes.push(NormalizationOp::Delete { id: record.id });
                    continue;
                }

                if record.domain != key {
                    // Duplicates may already hold the canonical spelling, remove them first
                    if let Some(group) = groups.get(&key) {
                        for &id in group.ids.iter().skip(1) {
                            if !deleted.contains(&id) && batch_deleted.insert(id) {
                                deletes.push(NormalizationOp::Delete { id });
                            }
                        }
                    }
                    rewrites.push(NormalizationOp::Rewrite {
                        id: record.id,
                        domain: key,
                    });
                }
            }

            if deletes.is_empty() && rewrites.is_empty() {
                continue;
            }

            // Deletes first so a rewrite never collides with a row about to go
            let mut ops = deletes;
            ops.extend(rewrites);
            match self.repo.apply_normalization(&ops).await {
                Ok(outcome) => {
                    report.deleted += outcome.deleted;
                    report.rewritten += outcome.rewritten;
                    deleted.extend(batch_deleted);
                    debug!(
                        "Batch ending at id {}: {} deleted, {} rewritten",
                        after_id, outcome.deleted, outcome.rewritten
                    );
                }
                Err(e) => {
                    error!("Normalization batch ending at id {} failed: {}", after_id, e);
                    report.failed_batches += 1;
                }
            }
        }

        info!(
            "Normalization finished: scanned={} rewritten={} deleted={} failed_batches={}",
            report.scanned, report.rewritten, report.deleted, report.failed_batches
        );
        Ok(report)
    }

    async fn build_index(&self) -> Result<HashMap<String, KeyGroup>, RepositoryError> {
        let mut groups: HashMap<String, KeyGroup> = HashMap::new();

        // load_keys is ordered by id, so the first id pushed is the earliest registration
        for (id, domain) in self.repo.load_keys().await? {
            let key = normalize(&domain);
            if key.is_empty() {
                continue;
            }
            groups.entry(key).or_insert_with(|| KeyGroup { ids: Vec::new() }).ids.push(id);
        }

        Ok(groups)
    }
}

#[cfg(test)]
#[path = "normalization_service_test.rs"]
mod tests;
