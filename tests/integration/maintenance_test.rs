// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::helpers::create_test_registry;
use roomba::domain::repositories::domain_repository::{DomainFilter, DomainRepository};
use roomba::domain::services::normalization_service::NormalizationService;
use roomba::domain::services::normalizer::normalize;
use roomba::domain::services::seed_service::SeedService;
use std::io::Write;

/// 从文件导入种子域名
#[tokio::test]
async fn test_seed_import_from_file() {
    let registry = create_test_registry().await;

    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "https://www.Example.com/").unwrap();
    writeln!(file, "example.com").unwrap();
    writeln!(file).unwrap();
    writeln!(file, "rust-lang.org?utm=1").unwrap();
    writeln!(file, "WWW2.crates.io").unwrap();
    file.flush().unwrap();

    let contents = std::fs::read_to_string(file.path()).unwrap();
    let report = SeedService::new(registry.repo.clone(), 2)
        .import(contents.lines())
        .await
        .unwrap();

    assert_eq!(report.read, 5);
    assert_eq!(report.inserted, 3);
    assert_eq!(report.skipped, 2);

    let keys = registry.repo.load_keys().await.unwrap();
    let domains: Vec<&str> = keys.iter().map(|(_, d)| d.as_str()).collect();
    assert_eq!(domains, vec!["example.com", "rust-lang.org", "crates.io"]);
}

/// 规范化维护的幂等性
///
/// 第一次运行后所有记录都是规范形式且互不重复，第二次运行不做任何修改
#[tokio::test]
async fn test_normalization_pass_is_idempotent() {
    let registry = create_test_registry().await;
    let raw: Vec<String> = [
        "HTTPS://WWW.Alpha.test/",
        "alpha.test",
        "beta.test/#top",
        "http://www3.gamma.test",
        "gamma.test",
        "wwww.delta.test?x=1",
        "b%C3%BCcher.test",
        "epsilon.test",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    registry.repo.insert_many(&raw).await.unwrap();

    let service = NormalizationService::new(registry.repo.clone(), 3);
    let first = service.run().await.unwrap();
    assert_eq!(first.scanned, 8);
    assert_eq!(first.failed_batches, 0);
    assert_eq!(first.deleted, 2);

    let keys = registry.repo.load_keys().await.unwrap();
    for (_, domain) in &keys {
        assert_eq!(&normalize(domain), domain);
    }
    let mut names: Vec<&str> = keys.iter().map(|(_, d)| d.as_str()).collect();
    names.sort();
    assert_eq!(
        names,
        vec![
            "alpha.test",
            "beta.test",
            "bücher.test",
            "delta.test",
            "epsilon.test",
            "gamma.test"
        ]
    );

    let second = service.run().await.unwrap();
    assert_eq!(second.deleted, 0);
    assert_eq!(second.rewritten, 0);
    assert_eq!(registry.repo.load_keys().await.unwrap(), keys);
    assert_eq!(registry.repo.count(DomainFilter::All).await.unwrap(), 6);
}
