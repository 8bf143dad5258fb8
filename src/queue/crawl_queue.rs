// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::domain_record::DomainRecord;
use crate::domain::repositories::domain_repository::{DomainRepository, RepositoryError};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// 队列错误类型
#[derive(Error, Debug)]
pub enum QueueError {
    /// 仓库错误
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

/// 爬取队列特质
///
/// 注册表同时充当工作队列：待爬取记录即队列中的工作单元
#[async_trait]
pub trait CrawlQueue: Send + Sync {
    /// 原子地认领一个待爬取域名
    ///
    /// # 返回值
    ///
    /// * `Ok(Some(DomainRecord))` - 认领成功，记录只属于当前调用方
    /// * `Ok(None)` - 队列为空
    /// * `Err(QueueError)` - 存储错误，调用方可继续循环
    async fn claim(&self) -> Result<Option<DomainRecord>, QueueError>;

    /// 标记域名爬取完成
    async fn complete(&self, id: i32) -> Result<(), QueueError>;

    /// 随机选取一个已爬取的域名用于重爬
    async fn sample_for_recrawl(&self) -> Result<Option<DomainRecord>, QueueError>;
}

/// 基于域名注册表的爬取队列
pub struct RegistryCrawlQueue<R: DomainRepository + ?Sized> {
    /// 域名仓库
    repository: Arc<R>,
}

impl<R: DomainRepository + ?Sized> RegistryCrawlQueue<R> {
    /// 创建新的爬取队列实例
    ///
    /// # 参数
    ///
    /// * `repository` - 域名仓库
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl<R: DomainRepository + ?Sized> CrawlQueue for RegistryCrawlQueue<R> {
    async fn claim(&self) -> Result<Option<DomainRecord>, QueueError> {
        Ok(self.repository.claim_next().await?)
    }

    async fn complete(&self, id: i32) -> Result<(), QueueError> {
        self.repository.mark_crawled(id).await?;
        Ok(())
    }

    async fn sample_for_recrawl(&self) -> Result<Option<DomainRecord>, QueueError> {
        Ok(self.repository.sample_crawled().await?)
    }
}

#[async_trait]
impl<T: CrawlQueue + ?Sized> CrawlQueue for Arc<T> {
    async fn claim(&self) -> Result<Option<DomainRecord>, QueueError> {
        (**self).claim().await
    }

    async fn complete(&self, id: i32) -> Result<(), QueueError> {
        (**self).complete(id).await
    }

    async fn sample_for_recrawl(&self) -> Result<Option<DomainRecord>, QueueError> {
        (**self).sample_for_recrawl().await
    }
}
