// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::helpers::create_test_registry;
use roomba::domain::models::domain_record::CrawlState;
use roomba::domain::repositories::domain_repository::{DomainFilter, DomainRepository};
use roomba::queue::crawl_queue::{CrawlQueue, RegistryCrawlQueue};
use std::collections::HashSet;
use std::sync::Arc;

/// 测试并发认领
///
/// N 个调用方同时认领，每条记录最多被一个调用方拿到，
/// 成功认领的数量等于 min(N, 待爬取数量)
#[tokio::test]
async fn test_concurrent_claims_are_exclusive() {
    let registry = create_test_registry().await;
    let seeds: Vec<String> = (0..4).map(|i| format!("site{}.test", i)).collect();
    registry.repo.insert_many(&seeds).await.unwrap();

    let queue = Arc::new(RegistryCrawlQueue::new(registry.repo.clone()));
    let claimants: Vec<_> = (0..10)
        .map(|_| {
            let queue = queue.clone();
            tokio::spawn(async move { queue.claim().await.unwrap() })
        })
        .collect();

    let mut claimed = Vec::new();
    for claimant in claimants {
        if let Some(record) = claimant.await.unwrap() {
            claimed.push(record.id);
        }
    }

    let distinct: HashSet<i32> = claimed.iter().copied().collect();
    assert_eq!(claimed.len(), 4);
    assert_eq!(distinct.len(), 4);
    assert_eq!(registry.repo.count(DomainFilter::Pending).await.unwrap(), 0);
    assert_eq!(registry.repo.count(DomainFilter::Claimed).await.unwrap(), 4);
}

/// 测试记录状态只前进不后退
#[tokio::test]
async fn test_claimed_record_moves_forward_only() {
    let registry = create_test_registry().await;
    registry.repo.insert_if_absent("one.test").await.unwrap();
    let queue = RegistryCrawlQueue::new(registry.repo.clone());

    let record = queue.claim().await.unwrap().unwrap();
    assert_eq!(record.crawl_state, CrawlState::Claimed);
    assert!(queue.claim().await.unwrap().is_none());

    queue.complete(record.id).await.unwrap();
    let done = registry.repo.find_by_domain("one.test").await.unwrap().unwrap();
    assert_eq!(done.crawl_state, CrawlState::Done);
    assert!(done.crawled_at.is_some());

    // 已完成的记录不会再被认领，但可以被抽样重爬
    assert!(queue.claim().await.unwrap().is_none());
    let sampled = queue.sample_for_recrawl().await.unwrap().unwrap();
    assert_eq!(sampled.id, record.id);
}

/// 测试插入与认领交错时没有记录被跳过或重复
#[tokio::test]
async fn test_claims_interleaved_with_inserts() {
    let registry = create_test_registry().await;
    let queue = RegistryCrawlQueue::new(registry.repo.clone());

    assert!(queue.claim().await.unwrap().is_none());

    registry.repo.insert_if_absent("first.test").await.unwrap();
    let first = queue.claim().await.unwrap().unwrap();
    registry.repo.insert_if_absent("second.test").await.unwrap();
    // 重复插入不会让已认领的记录回到待爬取
    registry.repo.insert_if_absent("first.test").await.unwrap();
    let second = queue.claim().await.unwrap().unwrap();

    assert_eq!(first.domain, "first.test");
    assert_eq!(second.domain, "second.test");
    assert!(queue.claim().await.unwrap().is_none());
}
