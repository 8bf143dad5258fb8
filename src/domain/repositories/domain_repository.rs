// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::domain_record::{
    DomainRecord, ParseModelError, Reachability, TechnologyProfile,
};
use crate::domain::models::registry_stats::RegistryStats;
use async_trait::async_trait;
use sea_orm::DbErr;
use thiserror::Error;

/// 仓库错误类型
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// 数据库错误
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
    /// 记录未找到
    #[error("Record not found")]
    NotFound,
    /// 存储的数据无法解析
    #[error("Invalid stored data: {0}")]
    InvalidData(#[from] ParseModelError),
}

/// 计数与扫描使用的谓词
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainFilter {
    /// 全部记录
    All,
    /// 待爬取
    Pending,
    /// 已认领未完成
    Claimed,
    /// 已爬取
    Done,
    /// 尚未探测（可达性为空）
    Unprobed,
    /// 已探测
    Probed,
    /// 至少一个变体可达
    Reachable,
    /// 检测到技术栈
    Fingerprinted,
}

/// 规范化维护操作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizationOp {
    /// 删除与更早记录重复的行
    Delete { id: i32 },
    /// 将行改写为规范形式
    Rewrite { id: i32, domain: String },
}

/// 一个批次的维护结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NormalizationOutcome {
    pub deleted: u64,
    pub rewritten: u64,
}

/// 域名注册表特质
///
/// 注册表是系统中唯一的串行化点，所有操作都必须可以被任意数量的调用方并发调用。
/// 每个操作要么完整生效，要么完全不生效。
#[async_trait]
pub trait DomainRepository: Send + Sync {
    /// 插入待爬取域名，若已存在则忽略
    ///
    /// # 返回值
    ///
    /// * `Ok(true)` - 新建了记录
    /// * `Ok(false)` - 域名已存在
    async fn insert_if_absent(&self, domain: &str) -> Result<bool, RepositoryError>;

    /// 批量插入待爬取域名，已存在的域名被忽略
    ///
    /// # 返回值
    ///
    /// 新建记录的数量
    async fn insert_many(&self, domains: &[String]) -> Result<u64, RepositoryError>;

    /// 根据域名查找记录
    async fn find_by_domain(&self, domain: &str) -> Result<Option<DomainRecord>, RepositoryError>;

    /// 原子地认领一个待爬取记录
    ///
    /// 同一条记录最多只会被一个调用方认领。没有待爬取记录时返回 `Ok(None)`。
    async fn claim_next(&self) -> Result<Option<DomainRecord>, RepositoryError>;

    /// 标记记录已爬取
    async fn mark_crawled(&self, id: i32) -> Result<(), RepositoryError>;

    /// 写入探测结果
    ///
    /// 仅当记录尚未探测时生效，返回是否实际写入
    async fn record_probe(
        &self,
        id: i32,
        reachability: &Reachability,
        technologies: &TechnologyProfile,
    ) -> Result<bool, RepositoryError>;

    /// 按谓词计数
    async fn count(&self, filter: DomainFilter) -> Result<u64, RepositoryError>;

    /// 聚合统计
    async fn stats(&self) -> Result<RegistryStats, RepositoryError> {
        Ok(RegistryStats {
            total: self.count(DomainFilter::All).await?,
            pending: self.count(DomainFilter::Pending).await?,
            claimed: self.count(DomainFilter::Claimed).await?,
            done: self.count(DomainFilter::Done).await?,
            probed: self.count(DomainFilter::Probed).await?,
            reachable: self.count(DomainFilter::Reachable).await?,
            fingerprinted: self.count(DomainFilter::Fingerprinted).await?,
        })
    }

    /// 按谓词分页扫描，返回 id 大于 `after_id` 的最多 `limit` 条记录（按 id 升序）
    async fn scan(
        &self,
        filter: DomainFilter,
        after_id: i32,
        limit: u64,
    ) -> Result<Vec<DomainRecord>, RepositoryError>;

    /// 均匀随机选取一条已爬取记录
    async fn sample_crawled(&self) -> Result<Option<DomainRecord>, RepositoryError>;

    /// 加载全部 (id, 域名)，按 id 升序
    async fn load_keys(&self) -> Result<Vec<(i32, String)>, RepositoryError>;

    /// 在单个事务中执行一个批次的规范化操作
    async fn apply_normalization(
        &self,
        ops: &[NormalizationOp],
    ) -> Result<NormalizationOutcome, RepositoryError>;

    /// 将所有记录的探测结果重置为空
    async fn reset_probe_results(&self) -> Result<u64, RepositoryError>;
}
