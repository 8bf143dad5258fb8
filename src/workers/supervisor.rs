// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::repositories::domain_repository::DomainRepository;
use crate::domain::services::discovery_service::DiscoveryService;
use crate::engines::traits::{EngineError, FetcherFactory};
use crate::queue::crawl_queue::CrawlQueue;
use crate::utils::errors::WorkerError;
use crate::workers::crawl_worker::{CrawlEvent, CrawlWorker, Heartbeat, RecrawlPolicy, RestartReason};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

/// 监督器配置
#[derive(Debug, Clone, Copy)]
pub struct SupervisorConfig {
    /// 工作槽数量
    pub workers: usize,
    /// 心跳超过该时长视为停滞
    pub stall_timeout: Duration,
    /// 轮询间隔
    pub poll_interval: Duration,
    /// 重爬策略
    pub recrawl: RecrawlPolicy,
}

/// 监督结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SupervisorReport {
    /// 因工作器退出而重启的次数
    pub restarts: u64,
    /// 因停滞而重启的次数
    pub stall_restarts: u64,
}

/// 正在运行的工作槽
///
/// 被替换或丢弃时中止其任务
struct Slot {
    handle: JoinHandle<()>,
    heartbeat: Heartbeat,
}

impl Slot {
    fn restart_reason(&self, stall_timeout: Duration) -> Option<RestartReason> {
        if self.handle.is_finished() {
            Some(RestartReason::Finished)
        } else if self.heartbeat.idle_for() > stall_timeout {
            Some(RestartReason::Stalled)
        } else {
            None
        }
    }
}

impl Drop for Slot {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// 爬取工作池监督器
///
/// 维持固定数量的工作槽：退出的工作器被重启，停滞的工作器被中止后重启，
/// 每次启动都使用新的网络会话。某次轮询时所有工作槽都已退出，工作池结束。
pub struct WorkerSupervisor<Q, R>
where
    Q: CrawlQueue + ?Sized + 'static,
    R: DomainRepository + ?Sized + 'static,
{
    queue: Arc<Q>,
    discovery: Arc<DiscoveryService<R>>,
    factory: Arc<dyn FetcherFactory>,
    config: SupervisorConfig,
    events: broadcast::Sender<CrawlEvent>,
}

impl<Q, R> WorkerSupervisor<Q, R>
where
    Q: CrawlQueue + ?Sized + 'static,
    R: DomainRepository + ?Sized + 'static,
{
    /// 创建新的监督器
    ///
    /// # 参数
    ///
    /// * `queue` - 爬取队列
    /// * `discovery` - 发现合并服务
    /// * `factory` - 网络会话工厂
    /// * `config` - 监督器配置
    pub fn new(
        queue: Arc<Q>,
        discovery: Arc<DiscoveryService<R>>,
        factory: Arc<dyn FetcherFactory>,
        config: SupervisorConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(1024);
        Self {
            queue,
            discovery,
            factory,
            config,
            events,
        }
    }

    /// 订阅爬取进度事件
    pub fn subscribe(&self) -> broadcast::Receiver<CrawlEvent> {
        self.events.subscribe()
    }

    /// 运行工作池直到所有工作器退出
    ///
    /// 丢弃返回的 future 会中止所有工作器
    ///
    /// # 返回值
    ///
    /// * `Ok(SupervisorReport)` - 工作池已结束
    /// * `Err(WorkerError)` - 启动时无法创建网络会话
    pub async fn run(&self) -> Result<SupervisorReport, WorkerError> {
        if self.config.workers == 0 {
            return Err(WorkerError::Configuration(
                "worker pool needs at least one slot".to_string(),
            ));
        }

        let mut slots = (0..self.config.workers)
            .map(|index| self.spawn(index))
            .collect::<Result<Vec<_>, _>>()?;
        info!("Started {} crawl workers", slots.len());

        let mut report = SupervisorReport::default();
        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            if slots.iter().all(|slot| slot.handle.is_finished()) {
                break;
            }

            for (index, slot) in slots.iter_mut().enumerate() {
                let Some(reason) = slot.restart_reason(self.config.stall_timeout) else {
                    continue;
                };

                match self.spawn(index) {
                    Ok(fresh) => {
                        // the replaced slot aborts its task on drop
                        *slot = fresh;
                        match reason {
                            RestartReason::Finished => report.restarts += 1,
                            RestartReason::Stalled => {
                                warn!("Crawl worker on slot {} stalled, restarting", index);
                                report.stall_restarts += 1;
                            }
                        }
                        let _ = self.events.send(CrawlEvent::Restarted { slot: index, reason });
                    }
                    Err(e) => {
                        error!("Failed to create session for slot {}: {}", index, e);
                    }
                }
            }
        }

        info!(
            "Crawl pool finished: restarts={} stall_restarts={}",
            report.restarts, report.stall_restarts
        );
        Ok(report)
    }

    fn spawn(&self, index: usize) -> Result<Slot, EngineError> {
        let fetcher = self.factory.session()?;
        let heartbeat = Heartbeat::new();
        let worker = CrawlWorker::new(
            index,
            self.queue.clone(),
            self.discovery.clone(),
            fetcher,
            heartbeat.clone(),
            self.config.recrawl,
            self.events.clone(),
        );

        let handle = tokio::spawn(async move {
            worker.run().await;
        });
        Ok(Slot { handle, heartbeat })
    }
}

#[cfg(test)]
#[path = "supervisor_test.rs"]
mod tests;
