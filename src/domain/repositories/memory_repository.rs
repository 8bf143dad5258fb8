// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 测试用的内存注册表，不依赖数据库与 tokio 计时器

use crate::domain::models::domain_record::{
    CrawlState, DomainRecord, Reachability, TechnologyProfile,
};
use crate::domain::repositories::domain_repository::{
    DomainFilter, DomainRepository, NormalizationOp, NormalizationOutcome, RepositoryError,
};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

#[derive(Default)]
pub struct MemoryRepository {
    rows: Mutex<Vec<DomainRecord>>,
    /// 为 true 时写操作与计数返回数据库错误
    failing: AtomicBool,
}

impl MemoryRepository {
    pub fn with_domains(domains: &[&str]) -> Self {
        let repo = Self::default();
        {
            let mut rows = repo.rows.lock().unwrap();
            for domain in domains {
                let id = rows.len() as i32 + 1;
                rows.push(new_record(id, domain));
            }
        }
        repo
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> Vec<DomainRecord> {
        self.rows.lock().unwrap().clone()
    }

    pub fn state_of(&self, domain: &str) -> Option<CrawlState> {
        self.rows
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.domain == domain)
            .map(|r| r.crawl_state)
    }

    fn check(&self) -> Result<(), RepositoryError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(RepositoryError::Database(sea_orm::DbErr::Custom(
                "registry unavailable".to_string(),
            )))
        } else {
            Ok(())
        }
    }
}

fn new_record(id: i32, domain: &str) -> DomainRecord {
    DomainRecord {
        id,
        domain: domain.to_string(),
        crawl_state: CrawlState::Pending,
        reachability: None,
        technologies: None,
        claimed_at: None,
        crawled_at: None,
        probed_at: None,
        created_at: Utc::now().into(),
    }
}

fn matches(filter: DomainFilter, record: &DomainRecord) -> bool {
    match filter {
        DomainFilter::All => true,
        DomainFilter::Pending => record.crawl_state == CrawlState::Pending,
        DomainFilter::Claimed => record.crawl_state == CrawlState::Claimed,
        DomainFilter::Done => record.crawl_state == CrawlState::Done,
        DomainFilter::Unprobed => record.reachability.is_none(),
        DomainFilter::Probed => record.reachability.is_some(),
        DomainFilter::Reachable => record
            .reachability
            .as_ref()
            .is_some_and(Reachability::is_reachable),
        DomainFilter::Fingerprinted => matches!(
            record.technologies,
            Some(TechnologyProfile::Detected(_))
        ),
    }
}

#[async_trait]
impl DomainRepository for MemoryRepository {
    async fn insert_if_absent(&self, domain: &str) -> Result<bool, RepositoryError> {
        self.check()?;
        let mut rows = self.rows.lock().unwrap();
        if rows.iter().any(|r| r.domain == domain) {
            return Ok(false);
        }
        let id = rows.iter().map(|r| r.id).max().unwrap_or(0) + 1;
        rows.push(new_record(id, domain));
        Ok(true)
    }

    async fn insert_many(&self, domains: &[String]) -> Result<u64, RepositoryError> {
        let mut inserted = 0;
        for domain in domains {
            if self.insert_if_absent(domain).await? {
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    async fn find_by_domain(&self, domain: &str) -> Result<Option<DomainRecord>, RepositoryError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.domain == domain)
            .cloned())
    }

    async fn claim_next(&self) -> Result<Option<DomainRecord>, RepositoryError> {
        self.check()?;
        let mut rows = self.rows.lock().unwrap();
        let Some(record) = rows
            .iter_mut()
            .find(|r| r.crawl_state == CrawlState::Pending)
        else {
            return Ok(None);
        };
        record.crawl_state = CrawlState::Claimed;
        record.claimed_at = Some(Utc::now().into());
        Ok(Some(record.clone()))
    }

    async fn mark_crawled(&self, id: i32) -> Result<(), RepositoryError> {
        self.check()?;
        let mut rows = self.rows.lock().unwrap();
        let record = rows
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(RepositoryError::NotFound)?;
        record.crawl_state = CrawlState::Done;
        record.crawled_at = Some(Utc::now().into());
        Ok(())
    }

    async fn record_probe(
        &self,
        id: i32,
        reachability: &Reachability,
        technologies: &TechnologyProfile,
    ) -> Result<bool, RepositoryError> {
        self.check()?;
        let mut rows = self.rows.lock().unwrap();
        match rows
            .iter_mut()
            .find(|r| r.id == id && r.reachability.is_none())
        {
            Some(record) => {
                record.reachability = Some(reachability.clone());
                record.technologies = Some(technologies.clone());
                record.probed_at = Some(Utc::now().into());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn count(&self, filter: DomainFilter) -> Result<u64, RepositoryError> {
        self.check()?;
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|r| matches(filter, r))
            .count() as u64)
    }

    async fn scan(
        &self,
        filter: DomainFilter,
        after_id: i32,
        limit: u64,
    ) -> Result<Vec<DomainRecord>, RepositoryError> {
        let mut found: Vec<DomainRecord> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.id > after_id && matches(filter, r))
            .cloned()
            .collect();
        found.sort_by_key(|r| r.id);
        found.truncate(limit as usize);
        Ok(found)
    }

    async fn sample_crawled(&self) -> Result<Option<DomainRecord>, RepositoryError> {
        self.check()?;
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.crawl_state == CrawlState::Done)
            .cloned())
    }

    async fn load_keys(&self) -> Result<Vec<(i32, String)>, RepositoryError> {
        let mut keys: Vec<(i32, String)> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .map(|r| (r.id, r.domain.clone()))
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn apply_normalization(
        &self,
        ops: &[NormalizationOp],
    ) -> Result<NormalizationOutcome, RepositoryError> {
        self.check()?;
        let mut rows = self.rows.lock().unwrap();
        let mut outcome = NormalizationOutcome::default();
        for op in ops {
            match op {
                NormalizationOp::Delete { id } => {
                    let before = rows.len();
                    rows.retain(|r| r.id != *id);
                    outcome.deleted += (before - rows.len()) as u64;
                }
                NormalizationOp::Rewrite { id, domain } => {
                    if let Some(record) = rows.iter_mut().find(|r| r.id == *id) {
                        record.domain = domain.clone();
                        outcome.rewritten += 1;
                    }
                }
            }
        }
        Ok(outcome)
    }

    async fn reset_probe_results(&self) -> Result<u64, RepositoryError> {
        self.check()?;
        let mut reset = 0;
        for record in self.rows.lock().unwrap().iter_mut() {
            if record.reachability.is_some() || record.technologies.is_some() {
                record.reachability = None;
                record.technologies = None;
                record.probed_at = None;
                reset += 1;
            }
        }
        Ok(reset)
    }
}
