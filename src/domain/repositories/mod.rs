// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 仓库接口模块
///
/// 定义域名注册表的访问契约
pub mod domain_repository;

#[cfg(test)]
pub mod memory_repository;
