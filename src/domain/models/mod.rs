// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域模型模块
///
/// 定义域名记录、爬取状态、可达性与技术栈指纹等核心类型
pub mod domain_record;
pub mod registry_stats;
