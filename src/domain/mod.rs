// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域层模块
///
/// 该模块包含系统的核心业务逻辑，包括：
/// - 领域模型（models）：域名记录、爬取状态、可达性与技术栈指纹
/// - 仓库接口（repositories）：域名注册表的访问契约
/// - 服务（services）：规范化、发现合并、维护与种子导入
///
/// 领域层不依赖任何具体的存储或网络实现。
pub mod models;
pub mod repositories;
pub mod services;
