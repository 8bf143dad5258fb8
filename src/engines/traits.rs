// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::domain::models::domain_record::Technology;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// 引擎错误类型
#[derive(Error, Debug)]
pub enum EngineError {
    /// 请求失败
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// 非 2xx 响应
    #[error("Unexpected status: {0}")]
    Status(u16),
    /// 超时
    #[error("Timeout")]
    Timeout,
    /// URL 无法解析
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl EngineError {
    /// 是否为超时类错误
    pub fn is_timeout(&self) -> bool {
        match self {
            EngineError::Request(e) => e.is_timeout(),
            EngineError::Timeout => true,
            _ => false,
        }
    }
}

/// 抓取到的页面
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// 响应正文
    pub body: String,
}

/// 页面抓取特质
///
/// 一个实例代表一个网络会话（独立的连接池与 Cookie），不得在工作槽之间共享
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// 抓取页面，非 2xx 响应返回 `EngineError::Status`
    async fn fetch(&self, url: &str) -> Result<FetchedPage, EngineError>;
}

/// 网络会话工厂
///
/// 每次工作槽启动或重启时调用一次
pub trait FetcherFactory: Send + Sync {
    /// 创建一个全新的会话
    fn session(&self) -> Result<Arc<dyn PageFetcher>, EngineError>;
}

/// 可达性探测特质
#[async_trait]
pub trait ReachabilityProbe: Send + Sync {
    /// 2xx 响应视为可达，任何错误视为不可达
    async fn is_reachable(&self, url: &str) -> bool;
}

/// 技术栈识别特质
///
/// 慢速、尽力而为的黑盒，调用方吸收所有错误
#[async_trait]
pub trait Fingerprinter: Send + Sync {
    async fn fingerprint(&self, url: &str) -> Result<Vec<Technology>, EngineError>;
}
