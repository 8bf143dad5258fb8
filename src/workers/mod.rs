// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 爬取工作器
pub mod crawl_worker;

/// 探测流水线
pub mod probe_worker;

/// 统计汇报任务
pub mod stats_reporter;

/// 爬取工作池监督器
pub mod supervisor;
