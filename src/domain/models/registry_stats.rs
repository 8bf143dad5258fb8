// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::Serialize;
use std::fmt;

/// 注册表聚合统计
///
/// 由存储层的聚合查询得出，仪表盘和统计任务只读消费
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RegistryStats {
    /// 域名总数
    pub total: u64,
    /// 待爬取数量
    pub pending: u64,
    /// 已认领未完成数量
    pub claimed: u64,
    /// 已爬取数量
    pub done: u64,
    /// 已探测数量
    pub probed: u64,
    /// 可达数量
    pub reachable: u64,
    /// 检测到技术栈的数量
    pub fingerprinted: u64,
}

impl RegistryStats {
    /// 探测进度百分比
    pub fn probe_progress(&self) -> f64 {
        percent(self.probed, self.total)
    }

    /// 爬取进度百分比
    pub fn crawl_progress(&self) -> f64 {
        percent(self.done, self.total)
    }
}

fn percent(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

impl fmt::Display for RegistryStats {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "total={} pending={} claimed={} done={} ({:.2}%) probed={} ({:.2}%) reachable={} fingerprinted={}",
            self.total,
            self.pending,
            self.claimed,
            self.done,
            self.crawl_progress(),
            self.probed,
            self.probe_progress(),
            self.reachable,
            self.fingerprinted
        )
    }
}
