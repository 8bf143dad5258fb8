// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::registry_stats::RegistryStats;
use crate::domain::repositories::domain_repository::DomainRepository;
use crate::workers::probe_worker::ProbeProgress;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// 统计汇报任务
///
/// 定期读取注册表聚合统计和探测计数器并写入日志，不修改任何状态
pub struct StatsReporter<R>
where
    R: DomainRepository + ?Sized + 'static,
{
    repository: Arc<R>,
    progress: Option<Arc<ProbeProgress>>,
    interval: Duration,
}

impl<R> StatsReporter<R>
where
    R: DomainRepository + ?Sized + 'static,
{
    pub fn new(repository: Arc<R>, interval: Duration) -> Self {
        Self {
            repository,
            progress: None,
            interval,
        }
    }

    /// 同时汇报探测流水线的计数器
    pub fn with_probe_progress(mut self, progress: Arc<ProbeProgress>) -> Self {
        self.progress = Some(progress);
        self
    }

    /// 运行汇报循环
    pub async fn run(&self) {
        info!("Stats reporter started, interval {:?}", self.interval);

        let mut interval = tokio::time::interval(self.interval);

        loop {
            interval.tick().await;
            self.report_once().await;
        }
    }

    /// 汇报一次
    ///
    /// # 返回值
    ///
    /// 本次读取到的注册表统计，读取失败时为 `None`
    pub async fn report_once(&self) -> Option<RegistryStats> {
        let stats = match self.repository.stats().await {
            Ok(stats) => {
                info!("Registry: {}", stats);
                Some(stats)
            }
            Err(e) => {
                error!("Failed to load registry stats: {}", e);
                None
            }
        };

        if let Some(progress) = &self.progress {
            let snapshot = progress.snapshot();
            info!(
                "Probe: processed={} reachable={} fingerprinted={} write_failures={}",
                snapshot.processed,
                snapshot.reachable,
                snapshot.fingerprinted,
                snapshot.write_failures
            );
        }

        stats
    }

    /// 启动后台运行
    pub fn start(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }
}
