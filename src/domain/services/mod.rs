// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域服务模块
///
/// 该模块包含系统的核心业务逻辑服务：
/// - 规范化（normalizer）：生成域名去重键的纯函数
/// - 发现与合并（discovery_service）：把外链登记为待爬取域名
/// - 规范化维护（normalization_service）：对整个注册表重新规范化并去重
/// - 种子导入（seed_service）：批量导入外部域名列表
pub mod discovery_service;
pub mod normalization_service;
pub mod normalizer;
pub mod seed_service;
