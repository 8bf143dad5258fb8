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

use crate::engines::traits::{
    EngineError, FetchedPage, FetcherFactory, PageFetcher, ReachabilityProbe,
};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// 模拟浏览器的 User-Agent
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// 模拟浏览器的请求头集合
///
/// `Accept-Encoding` 由 reqwest 根据启用的解压特性自动设置
pub fn browser_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
        ),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
    headers
}

pub(crate) fn client_builder(timeout: Duration) -> reqwest::ClientBuilder {
    reqwest::Client::builder()
        .user_agent(BROWSER_USER_AGENT)
        .default_headers(browser_headers())
        .timeout(timeout)
}

pub(crate) fn classify(error: reqwest::Error) -> EngineError {
    if error.is_timeout() {
        EngineError::Timeout
    } else if error.is_builder() {
        EngineError::InvalidUrl(error.to_string())
    } else {
        EngineError::Request(error)
    }
}

/// 读取响应头，名称统一为小写
pub fn collect_headers(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|value| (name.as_str().to_ascii_lowercase(), value.to_string()))
        })
        .collect()
}

/// 基于reqwest的页面抓取会话
///
/// 每个实例拥有独立的客户端与 Cookie 存储
pub struct ReqwestFetcher {
    client: reqwest::Client,
}

impl ReqwestFetcher {
    /// 创建新的抓取会话
    ///
    /// # 参数
    ///
    /// * `timeout` - 单次请求超时
    pub fn new(timeout: Duration) -> Result<Self, EngineError> {
        let client = client_builder(timeout).cookie_store(true).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for ReqwestFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, EngineError> {
        let response = self.client.get(url).send().await.map_err(classify)?;

        let status = response.status();
        if !status.is_success() {
            return Err(EngineError::Status(status.as_u16()));
        }

        let body = response.text().await.map_err(classify)?;
        Ok(FetchedPage { body })
    }
}

/// 为每个工作槽创建独立的 reqwest 会话
pub struct ReqwestFetcherFactory {
    timeout: Duration,
}

impl ReqwestFetcherFactory {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl FetcherFactory for ReqwestFetcherFactory {
    fn session(&self) -> Result<Arc<dyn PageFetcher>, EngineError> {
        Ok(Arc::new(ReqwestFetcher::new(self.timeout)?))
    }
}

/// 基于reqwest的可达性探测
///
/// 所有探测共享同一个客户端（连接池），不保存 Cookie
pub struct ReqwestProbe {
    client: reqwest::Client,
}

impl ReqwestProbe {
    pub fn new(timeout: Duration) -> Result<Self, EngineError> {
        let client = client_builder(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ReachabilityProbe for ReqwestProbe {
    async fn is_reachable(&self, url: &str) -> bool {
        match self.client.get(url).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!("Probe of {} failed: {}", url, e);
                false
            }
        }
    }
}

#[cfg(test)]
#[path = "reqwest_engine_test.rs"]
mod tests;
