// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 队列模块
///
/// 在域名注册表之上提供爬取工作队列：认领、完成与重爬抽样
pub mod crawl_queue;
