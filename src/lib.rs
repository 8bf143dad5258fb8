// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 配置模块
///
/// 处理应用程序的配置设置和环境变量
pub mod config;

/// 领域模块
///
/// 域名记录模型、注册表契约、规范化与发现合并等领域服务
pub mod domain;

/// 引擎模块
///
/// 页面抓取、链接提取、可达性探测与技术栈识别
pub mod engines;

/// 基础设施模块
///
/// 数据库连接与注册表的 SeaORM 实现
pub mod infrastructure;

/// 队列模块
///
/// 基于注册表的爬取队列
pub mod queue;

/// 工具模块
///
/// 提供通用的工具函数和辅助功能
pub mod utils;

/// 工作器模块
///
/// 爬取工作池、探测流水线与统计汇报
pub mod workers;
