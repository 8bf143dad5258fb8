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

use crate::domain::models::domain_record::{
    DomainRecord, Reachability, TechnologyProfile, UrlVariant,
};
use crate::domain::repositories::domain_repository::{DomainFilter, DomainRepository};
use crate::engines::traits::{Fingerprinter, ReachabilityProbe};
use crate::utils::errors::WorkerError;
use futures::future::join_all;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, instrument};

/// 探测进度计数器
///
/// 由流水线更新，统计任务只读
#[derive(Debug, Default)]
pub struct ProbeProgress {
    processed: AtomicU64,
    reachable: AtomicU64,
    fingerprinted: AtomicU64,
    write_failures: AtomicU64,
}

impl ProbeProgress {
    pub fn snapshot(&self) -> ProbeReport {
        ProbeReport {
            processed: self.processed.load(Ordering::Relaxed),
            reachable: self.reachable.load(Ordering::Relaxed),
            fingerprinted: self.fingerprinted.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
        }
    }
}

/// 探测结果汇总
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProbeReport {
    /// 已处理的域名数
    pub processed: u64,
    /// 至少一个变体可达的域名数
    pub reachable: u64,
    /// 检测到技术栈的域名数
    pub fingerprinted: u64,
    /// 写回失败的域名数
    pub write_failures: u64,
}

/// 探测流水线配置
#[derive(Debug, Clone, Copy)]
pub struct ProbeConfig {
    /// 每批扫描的记录数
    pub batch_size: u64,
    /// 同时进行中的域名探测上限
    pub max_in_flight: usize,
}

/// 可达性与技术栈探测流水线
///
/// 按批扫描尚未探测的记录，直到某批为空。并发由一个跨批次共享的信号量限制，
/// 每个域名在完成四个变体探测和一次指纹识别之前始终持有一个许可。
pub struct ProbePipeline<R: DomainRepository + ?Sized> {
    repo: Arc<R>,
    probe: Arc<dyn ReachabilityProbe>,
    fingerprinter: Arc<dyn Fingerprinter>,
    permits: Arc<Semaphore>,
    batch_size: u64,
    progress: Arc<ProbeProgress>,
}

impl<R: DomainRepository + ?Sized> ProbePipeline<R> {
    /// 创建新的探测流水线
    ///
    /// # 参数
    ///
    /// * `repo` - 域名仓库
    /// * `probe` - 可达性探测器
    /// * `fingerprinter` - 技术栈识别器
    /// * `config` - 批大小与并发上限
    pub fn new(
        repo: Arc<R>,
        probe: Arc<dyn ReachabilityProbe>,
        fingerprinter: Arc<dyn Fingerprinter>,
        config: ProbeConfig,
    ) -> Self {
        Self {
            repo,
            probe,
            fingerprinter,
            permits: Arc::new(Semaphore::new(config.max_in_flight.max(1))),
            batch_size: config.batch_size.max(1),
            progress: Arc::new(ProbeProgress::default()),
        }
    }

    /// 共享的进度计数器
    pub fn progress(&self) -> Arc<ProbeProgress> {
        self.progress.clone()
    }

    /// 处理所有尚未探测的记录
    ///
    /// 写回失败的记录保持未探测状态，留给下一次运行
    ///
    /// # 返回值
    ///
    /// * `Ok(ProbeReport)` - 本次运行的累计结果
    /// * `Err(WorkerError)` - 扫描注册表失败
    pub async fn run(&self) -> Result<ProbeReport, WorkerError> {
        let mut after_id = 0;

        loop {
            let batch = self
                .repo
                .scan(DomainFilter::Unprobed, after_id, self.batch_size)
                .await?;
            let Some(last) = batch.last() else {
                break;
            };
            after_id = last.id;

            debug!("Probing batch of {} domains up to id {}", batch.len(), after_id);
            join_all(batch.iter().map(|record| self.probe_domain(record))).await;
        }

        let report = self.progress.snapshot();
        info!(
            "Probe run finished: processed={} reachable={} fingerprinted={} write_failures={}",
            report.processed, report.reachable, report.fingerprinted, report.write_failures
        );
        Ok(report)
    }

    #[instrument(skip(self, record), fields(domain = %record.domain))]
    async fn probe_domain(&self, record: &DomainRecord) {
        let Ok(_permit) = self.permits.acquire().await else {
            return;
        };

        let reachability = self.check_variants(&record.domain).await;
        let technologies = match reachability.first_reachable() {
            None => TechnologyProfile::NotApplicable,
            Some(variant) => self.identify(&variant.url_for(&record.domain)).await,
        };

        match self
            .repo
            .record_probe(record.id, &reachability, &technologies)
            .await
        {
            Ok(true) => {
                if reachability.is_reachable() {
                    self.progress.reachable.fetch_add(1, Ordering::Relaxed);
                }
                if matches!(technologies, TechnologyProfile::Detected(_)) {
                    self.progress.fingerprinted.fetch_add(1, Ordering::Relaxed);
                }
                debug!("Recorded {} / {:?}", reachability, technologies);
            }
            Ok(false) => debug!("Already probed by another run"),
            Err(e) => {
                error!("Failed to record probe result: {}", e);
                self.progress.write_failures.fetch_add(1, Ordering::Relaxed);
            }
        }
        self.progress.processed.fetch_add(1, Ordering::Relaxed);
    }

    /// 依次探测全部四个变体，不因某个变体可达而提前结束
    async fn check_variants(&self, domain: &str) -> Reachability {
        let mut reachable = Vec::with_capacity(UrlVariant::ALL.len());
        for variant in UrlVariant::ALL {
            if self.probe.is_reachable(&variant.url_for(domain)).await {
                reachable.push(variant);
            }
        }
        Reachability::from_variants(reachable)
    }

    async fn identify(&self, url: &str) -> TechnologyProfile {
        match self.fingerprinter.fingerprint(url).await {
            Ok(technologies) => TechnologyProfile::from_detected(technologies),
            Err(e) => {
                debug!("Fingerprinting {} failed: {}", url, e);
                TechnologyProfile::NotDetected
            }
        }
    }
}

#[cfg(test)]
#[path = "probe_worker_test.rs"]
mod tests;
