// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::helpers::{create_test_registry, MapFetcher, MapFetcherFactory};
use roomba::domain::models::domain_record::CrawlState;
use roomba::domain::repositories::domain_repository::{DomainFilter, DomainRepository};
use roomba::domain::services::discovery_service::DiscoveryService;
use roomba::domain::services::seed_service::SeedService;
use roomba::queue::crawl_queue::RegistryCrawlQueue;
use roomba::workers::crawl_worker::{CrawlEvent, RecrawlPolicy};
use roomba::workers::supervisor::{SupervisorConfig, WorkerSupervisor};
use std::sync::Arc;
use std::time::Duration;

fn pool_config(workers: usize) -> SupervisorConfig {
    SupervisorConfig {
        workers,
        stall_timeout: Duration::from_secs(30),
        poll_interval: Duration::from_millis(20),
        recrawl: RecrawlPolicy {
            probability: 0.0,
            sitemap_link_limit: 10,
        },
    }
}

/// 端到端爬取
///
/// 种子页面链接到 https://a.test/x 与 http://WWW.A.test/y，两者规范化后是同一个域名，
/// 爬取结束后注册表恰好新增一条 a.test，种子记录为已完成
#[tokio::test]
async fn test_crawl_discovers_linked_domain() {
    let registry = create_test_registry().await;
    SeedService::new(registry.repo.clone(), 100)
        .ensure_seeds(&["https://www.example.com/".to_string()])
        .await
        .unwrap();

    let factory = Arc::new(MapFetcherFactory::new(MapFetcher::new(&[(
        "http://example.com",
        r#"<html><body><a href="https://a.test/x">A</a> <a href="http://WWW.A.test/y">A again</a> <a href="/local">local</a></body></html>"#,
    )])));
    let supervisor = WorkerSupervisor::new(
        Arc::new(RegistryCrawlQueue::new(registry.repo.clone())),
        Arc::new(DiscoveryService::new(registry.repo.clone())),
        factory.clone(),
        pool_config(2),
    );
    let mut events = supervisor.subscribe();

    let report = tokio::time::timeout(Duration::from_secs(30), supervisor.run())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(report.stall_restarts, 0);
    assert!(factory.sessions() >= 2);

    let keys = registry.repo.load_keys().await.unwrap();
    let domains: Vec<&str> = keys.iter().map(|(_, d)| d.as_str()).collect();
    assert_eq!(domains, vec!["example.com", "a.test"]);

    let seed = registry
        .repo
        .find_by_domain("example.com")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(seed.crawl_state, CrawlState::Done);
    assert_eq!(registry.repo.count(DomainFilter::Pending).await.unwrap(), 0);
    assert_eq!(registry.repo.count(DomainFilter::Claimed).await.unwrap(), 0);

    let mut discovered = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let CrawlEvent::Discovered { domain, .. } = event {
            discovered.push(domain);
        }
    }
    assert_eq!(discovered, vec!["a.test".to_string()]);
}

/// 多个工作器共享一条链接链时每个域名只爬取一次
#[tokio::test]
async fn test_pool_crawls_each_domain_once() {
    let registry = create_test_registry().await;
    registry.repo.insert_if_absent("hub.test").await.unwrap();

    let links: String = (0..20)
        .map(|i| format!(r#"<a href="http://leaf{}.test/">leaf</a>"#, i))
        .collect();
    let factory = Arc::new(MapFetcherFactory::new(MapFetcher::new(&[(
        "http://hub.test",
        links.as_str(),
    )])));
    let supervisor = WorkerSupervisor::new(
        Arc::new(RegistryCrawlQueue::new(registry.repo.clone())),
        Arc::new(DiscoveryService::new(registry.repo.clone())),
        factory,
        pool_config(4),
    );
    let mut events = supervisor.subscribe();

    tokio::time::timeout(Duration::from_secs(30), supervisor.run())
        .await
        .unwrap()
        .unwrap();

    let stats = registry.repo.stats().await.unwrap();
    assert_eq!(stats.total, 21);
    assert_eq!(stats.done, 21);

    let mut crawled = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let CrawlEvent::Crawled { domain, .. } = event {
            crawled.push(domain);
        }
    }
    assert_eq!(crawled.len(), 21);
    crawled.sort();
    crawled.dedup();
    assert_eq!(crawled.len(), 21);
}
