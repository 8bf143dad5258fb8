// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::domain_record::DomainRecord;
use crate::domain::repositories::domain_repository::DomainRepository;
use crate::domain::services::discovery_service::DiscoveryService;
use crate::engines::link_extractor::{extract_links, extract_sitemap_links, sitemap_url};
use crate::engines::traits::{EngineError, PageFetcher};
use crate::queue::crawl_queue::CrawlQueue;
use rand::Rng;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};
use url::Url;
use uuid::Uuid;

/// 认领失败后的退避时间
const CLAIM_BACKOFF: Duration = Duration::from_secs(1);

/// 工作槽重启原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RestartReason {
    /// 工作器已自行退出
    Finished,
    /// 心跳超时
    Stalled,
}

/// 爬取进度事件
///
/// 通过广播通道发出，没有订阅者时直接丢弃
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CrawlEvent {
    Crawling { slot: usize, domain: String },
    Crawled { slot: usize, domain: String, discovered: usize },
    Discovered { slot: usize, domain: String },
    Recrawl { slot: usize, domain: String },
    Exhausted { slot: usize },
    Restarted { slot: usize, reason: RestartReason },
}

/// 工作器心跳
///
/// 记录相对于创建时刻的毫秒数，监督器据此判断工作器是否停滞
#[derive(Debug, Clone)]
pub struct Heartbeat {
    epoch: Instant,
    last_ms: Arc<AtomicU64>,
}

impl Heartbeat {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
            last_ms: Arc::new(AtomicU64::new(0)),
        }
    }

    /// 记录一次进展
    pub fn beat(&self) {
        let elapsed = self.epoch.elapsed().as_millis() as u64;
        self.last_ms.store(elapsed, Ordering::Relaxed);
    }

    /// 距上次进展经过的时间
    pub fn idle_for(&self) -> Duration {
        let now = self.epoch.elapsed().as_millis() as u64;
        Duration::from_millis(now.saturating_sub(self.last_ms.load(Ordering::Relaxed)))
    }
}

impl Default for Heartbeat {
    fn default() -> Self {
        Self::new()
    }
}

/// 待爬队列为空时的重爬策略
#[derive(Debug, Clone, Copy)]
pub struct RecrawlPolicy {
    /// 执行重爬的概率，0 表示从不重爬
    pub probability: f64,
    /// 从站点地图中抓取的页面上限
    pub sitemap_link_limit: usize,
}

impl RecrawlPolicy {
    fn roll(&self) -> bool {
        if self.probability <= 0.0 {
            return false;
        }
        rand::rng().random_bool(self.probability.min(1.0))
    }
}

/// 爬取工作器
///
/// 一个工作槽的一次生命周期：反复认领域名、抓取首页、合并发现的域名，
/// 直到队列耗尽且不再重爬时退出。每个实例拥有独立的网络会话。
pub struct CrawlWorker<Q, R>
where
    Q: CrawlQueue + ?Sized,
    R: DomainRepository + ?Sized,
{
    slot: usize,
    session_id: Uuid,
    queue: Arc<Q>,
    discovery: Arc<DiscoveryService<R>>,
    fetcher: Arc<dyn PageFetcher>,
    heartbeat: Heartbeat,
    policy: RecrawlPolicy,
    events: broadcast::Sender<CrawlEvent>,
}

impl<Q, R> CrawlWorker<Q, R>
where
    Q: CrawlQueue + ?Sized,
    R: DomainRepository + ?Sized,
{
    /// 创建新的爬取工作器
    ///
    /// # 参数
    ///
    /// * `slot` - 工作槽编号
    /// * `queue` - 爬取队列
    /// * `discovery` - 发现合并服务
    /// * `fetcher` - 本工作器独占的网络会话
    /// * `heartbeat` - 与监督器共享的心跳
    /// * `policy` - 重爬策略
    /// * `events` - 进度事件通道
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        slot: usize,
        queue: Arc<Q>,
        discovery: Arc<DiscoveryService<R>>,
        fetcher: Arc<dyn PageFetcher>,
        heartbeat: Heartbeat,
        policy: RecrawlPolicy,
        events: broadcast::Sender<CrawlEvent>,
    ) -> Self {
        Self {
            slot,
            session_id: Uuid::new_v4(),
            queue,
            discovery,
            fetcher,
            heartbeat,
            policy,
            events,
        }
    }

    /// 运行工作器直到没有可做的工作
    pub async fn run(self) {
        info!("Crawl worker {} started on slot {}", self.session_id, self.slot);
        self.heartbeat.beat();

        loop {
            match self.queue.claim().await {
                Ok(Some(record)) => self.crawl(record).await,
                Ok(None) => {
                    if !self.policy.roll() {
                        break;
                    }
                    match self.queue.sample_for_recrawl().await {
                        Ok(Some(record)) => self.recrawl(record).await,
                        Ok(None) => break,
                        Err(e) => {
                            error!("Failed to sample domain for recrawl: {}", e);
                            tokio::time::sleep(CLAIM_BACKOFF).await;
                        }
                    }
                }
                Err(e) => {
                    error!("Failed to claim next domain: {}", e);
                    tokio::time::sleep(CLAIM_BACKOFF).await;
                }
            }
            self.heartbeat.beat();
        }

        info!("Crawl worker {} exhausted the queue", self.session_id);
        self.emit(CrawlEvent::Exhausted { slot: self.slot });
    }

    #[instrument(skip(self, record), fields(slot = self.slot, domain = %record.domain))]
    async fn crawl(&self, record: DomainRecord) {
        self.emit(CrawlEvent::Crawling {
            slot: self.slot,
            domain: record.domain.clone(),
        });

        let links = self.links_from(&format!("http://{}", record.domain)).await;
        self.heartbeat.beat();
        let discovered = self.merge(&links).await;

        if let Err(e) = self.queue.complete(record.id).await {
            error!("Failed to mark {} as crawled: {}", record.domain, e);
        }

        self.emit(CrawlEvent::Crawled {
            slot: self.slot,
            domain: record.domain,
            discovered,
        });
    }

    #[instrument(skip(self, record), fields(slot = self.slot, domain = %record.domain))]
    async fn recrawl(&self, record: DomainRecord) {
        self.emit(CrawlEvent::Recrawl {
            slot: self.slot,
            domain: record.domain.clone(),
        });

        let sitemap_links = match self.fetcher.fetch(&sitemap_url(&record.domain)).await {
            Ok(page) => extract_sitemap_links(&page.body),
            Err(e) => {
                self.log_fetch_failure("sitemap", &record.domain, &e);
                Vec::new()
            }
        };
        self.heartbeat.beat();

        let mut links = sitemap_links.clone();
        for page_url in sitemap_links
            .iter()
            .filter(|link| is_fetchable(link))
            .take(self.policy.sitemap_link_limit)
        {
            links.extend(self.links_from(page_url).await);
            self.heartbeat.beat();
        }

        let discovered = self.merge(&links).await;
        self.emit(CrawlEvent::Crawled {
            slot: self.slot,
            domain: record.domain,
            discovered,
        });
    }

    /// 抓取页面并提取链接，失败时视为没有链接
    async fn links_from(&self, url: &str) -> Vec<String> {
        match self.fetcher.fetch(url).await {
            Ok(page) => extract_links(&page.body),
            Err(e) => {
                self.log_fetch_failure("page", url, &e);
                Vec::new()
            }
        }
    }

    async fn merge(&self, links: &[String]) -> usize {
        let report = self.discovery.merge_links(links).await;
        if report.failed > 0 {
            warn!("{} candidates could not be registered", report.failed);
        }
        for domain in &report.discovered {
            self.emit(CrawlEvent::Discovered {
                slot: self.slot,
                domain: domain.clone(),
            });
        }
        report.discovered.len()
    }

    fn log_fetch_failure(&self, what: &str, target: &str, error: &EngineError) {
        if error.is_timeout() {
            debug!("Fetching {} {} timed out", what, target);
        } else {
            debug!("Fetching {} {} failed: {}", what, target, error);
        }
    }

    fn emit(&self, event: CrawlEvent) {
        let _ = self.events.send(event);
    }
}

fn is_fetchable(link: &str) -> bool {
    Url::parse(link)
        .map(|url| matches!(url.scheme(), "http" | "https"))
        .unwrap_or(false)
}

#[cfg(test)]
#[path = "crawl_worker_test.rs"]
mod tests;
