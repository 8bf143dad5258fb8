// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use migration::{Migrator, MigratorTrait};
use roomba::config::settings::DatabaseSettings;
use roomba::domain::models::domain_record::Technology;
use roomba::engines::traits::{
    EngineError, FetchedPage, FetcherFactory, Fingerprinter, PageFetcher, ReachabilityProbe,
};
use roomba::infrastructure::database::connection;
use roomba::infrastructure::repositories::domain_repo_impl::DomainRepositoryImpl;
use sea_orm::DatabaseConnection;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub struct TestRegistry {
    pub db: Arc<DatabaseConnection>,
    pub repo: Arc<DomainRepositoryImpl>,
}

/// 创建已执行迁移的内存 SQLite 注册表
pub async fn create_test_registry() -> TestRegistry {
    let settings = DatabaseSettings {
        url: "sqlite::memory:".to_string(),
        max_connections: None,
        min_connections: None,
        connect_timeout: Some(30),
        idle_timeout: None,
    };
    let db = Arc::new(connection::create_pool(&settings).await.unwrap());
    Migrator::up(db.as_ref(), None).await.unwrap();

    TestRegistry {
        repo: Arc::new(DomainRepositoryImpl::new(db.clone())),
        db,
    }
}

/// 按 URL 返回固定页面的抓取器，未登记的 URL 返回 404
#[derive(Clone, Default)]
pub struct MapFetcher {
    pages: Arc<HashMap<String, String>>,
}

impl MapFetcher {
    pub fn new(pages: &[(&str, &str)]) -> Self {
        Self {
            pages: Arc::new(
                pages
                    .iter()
                    .map(|(url, body)| (url.to_string(), body.to_string()))
                    .collect(),
            ),
        }
    }
}

#[async_trait]
impl PageFetcher for MapFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, EngineError> {
        match self.pages.get(url) {
            Some(body) => Ok(FetchedPage { body: body.clone() }),
            None => Err(EngineError::Status(404)),
        }
    }
}

/// 每个会话共享同一组页面，并记录创建的会话数
pub struct MapFetcherFactory {
    fetcher: MapFetcher,
    sessions: AtomicUsize,
}

impl MapFetcherFactory {
    pub fn new(fetcher: MapFetcher) -> Self {
        Self {
            fetcher,
            sessions: AtomicUsize::new(0),
        }
    }

    pub fn sessions(&self) -> usize {
        self.sessions.load(Ordering::SeqCst)
    }
}

impl FetcherFactory for MapFetcherFactory {
    fn session(&self) -> Result<Arc<dyn PageFetcher>, EngineError> {
        self.sessions.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(self.fetcher.clone()))
    }
}

/// 只有登记的 URL 可达
pub struct SetProbe {
    reachable: HashSet<String>,
}

impl SetProbe {
    pub fn new(urls: &[&str]) -> Self {
        Self {
            reachable: urls.iter().map(|u| u.to_string()).collect(),
        }
    }
}

#[async_trait]
impl ReachabilityProbe for SetProbe {
    async fn is_reachable(&self, url: &str) -> bool {
        self.reachable.contains(url)
    }
}

/// 记录调用并返回固定技术栈的识别器
#[derive(Default)]
pub struct RecordingFingerprinter {
    calls: Mutex<Vec<String>>,
}

impl RecordingFingerprinter {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Fingerprinter for RecordingFingerprinter {
    async fn fingerprint(&self, url: &str) -> Result<Vec<Technology>, EngineError> {
        self.calls.lock().unwrap().push(url.to_string());
        Ok(vec![Technology::new("WordPress", vec!["6.4.2".to_string()])])
    }
}
