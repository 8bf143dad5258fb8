// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::helpers::{create_test_registry, RecordingFingerprinter, SetProbe};
use roomba::domain::models::domain_record::{Reachability, TechnologyProfile, UrlVariant};
use roomba::domain::repositories::domain_repository::{DomainFilter, DomainRepository};
use roomba::workers::probe_worker::{ProbeConfig, ProbePipeline};
use std::sync::Arc;

/// 端到端探测
///
/// 域名只在 http://www.d 可达，结果为 {http-www}，指纹针对 http://www.d 计算
#[tokio::test]
async fn test_probe_records_only_reachable_variant() {
    let registry = create_test_registry().await;
    registry.repo.insert_if_absent("d.test").await.unwrap();
    registry.repo.insert_if_absent("dark.test").await.unwrap();

    let fingerprinter = Arc::new(RecordingFingerprinter::default());
    let pipeline = ProbePipeline::new(
        registry.repo.clone(),
        Arc::new(SetProbe::new(&["http://www.d.test"])),
        fingerprinter.clone(),
        ProbeConfig {
            batch_size: 1,
            max_in_flight: 10,
        },
    );

    let report = pipeline.run().await.unwrap();
    assert_eq!(report.processed, 2);
    assert_eq!(report.reachable, 1);
    assert_eq!(report.fingerprinted, 1);
    assert_eq!(report.write_failures, 0);

    let d = registry.repo.find_by_domain("d.test").await.unwrap().unwrap();
    assert_eq!(
        d.reachability,
        Some(Reachability::Reachable(vec![UrlVariant::HttpWww]))
    );
    assert_eq!(fingerprinter.calls(), vec!["http://www.d.test".to_string()]);
    match d.technologies {
        Some(TechnologyProfile::Detected(technologies)) => {
            assert_eq!(technologies[0].name, "WordPress");
            assert_eq!(technologies[0].version_label(), "6.4.2");
        }
        other => panic!("unexpected technologies: {:?}", other),
    }
    assert!(d.probed_at.is_some());

    let dark = registry
        .repo
        .find_by_domain("dark.test")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(dark.reachability, Some(Reachability::Unreachable));
    assert_eq!(dark.technologies, Some(TechnologyProfile::NotApplicable));
}

/// 探测结果清空后下一次运行重新处理全部记录
#[tokio::test]
async fn test_reset_makes_domains_probeable_again() {
    let registry = create_test_registry().await;
    let domains: Vec<String> = (0..5).map(|i| format!("p{}.test", i)).collect();
    registry.repo.insert_many(&domains).await.unwrap();

    let fingerprinter = Arc::new(RecordingFingerprinter::default());
    let pipeline = ProbePipeline::new(
        registry.repo.clone(),
        Arc::new(SetProbe::new(&["https://p0.test", "https://p1.test"])),
        fingerprinter.clone(),
        ProbeConfig {
            batch_size: 2,
            max_in_flight: 2,
        },
    );

    pipeline.run().await.unwrap();
    let stats = registry.repo.stats().await.unwrap();
    assert_eq!(stats.probed, 5);
    assert_eq!(stats.reachable, 2);
    assert_eq!(stats.fingerprinted, 2);

    // 第二次运行没有待探测的记录
    let again = ProbePipeline::new(
        registry.repo.clone(),
        Arc::new(SetProbe::new(&[])),
        fingerprinter.clone(),
        ProbeConfig {
            batch_size: 2,
            max_in_flight: 2,
        },
    )
    .run()
    .await
    .unwrap();
    assert_eq!(again.processed, 0);

    assert_eq!(registry.repo.reset_probe_results().await.unwrap(), 5);
    assert_eq!(registry.repo.count(DomainFilter::Unprobed).await.unwrap(), 5);
    assert_eq!(registry.repo.count(DomainFilter::Fingerprinted).await.unwrap(), 0);
}
