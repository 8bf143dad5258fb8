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
use crate::engines::reqwest_engine::{classify, client_builder, collect_headers};
use crate::engines::traits::{EngineError, Fingerprinter};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::Duration;

/// 签名匹配的输入来源
#[derive(Debug, Clone, Copy)]
enum Source {
    /// 指定的响应头（小写名称）
    Header(&'static str),
    /// `<meta name="generator">` 的内容
    MetaGenerator,
    /// 响应正文
    Body,
}

/// 一条技术签名，第一个捕获组（若存在）为版本号
struct Signature {
    technology: &'static str,
    source: Source,
    pattern: Regex,
}

impl Signature {
    fn new(technology: &'static str, source: Source, pattern: &str) -> Self {
        Self {
            technology,
            source,
            pattern: Regex::new(pattern).expect("valid signature pattern"),
        }
    }
}

static SIGNATURES: Lazy<Vec<Signature>> = Lazy::new(|| {
    use Source::*;

    vec![
        // Web servers and CDNs
        Signature::new("Nginx", Header("server"), r"(?i)nginx(?:/([\d.]+))?"),
        Signature::new("Apache", Header("server"), r"(?i)apache(?:/([\d.]+))?"),
        Signature::new("Microsoft IIS", Header("server"), r"(?i)microsoft-iis(?:/([\d.]+))?"),
        Signature::new("LiteSpeed", Header("server"), r"(?i)litespeed"),
        Signature::new("Cloudflare", Header("server"), r"(?i)^cloudflare$"),
        Signature::new("Cloudflare", Header("cf-ray"), r".+"),
        Signature::new("Varnish", Header("x-varnish"), r".+"),
        // Languages and frameworks
        Signature::new("PHP", Header("x-powered-by"), r"(?i)php(?:/([\d.]+))?"),
        Signature::new("Express", Header("x-powered-by"), r"(?i)^express$"),
        Signature::new("ASP.NET", Header("x-powered-by"), r"(?i)asp\.net"),
        Signature::new("ASP.NET", Header("x-aspnet-version"), r"([\d.]+)"),
        Signature::new("Next.js", Header("x-powered-by"), r"(?i)next\.js(?:\s+([\d.]+))?"),
        Signature::new("Next.js", Body, r#"/_next/static/"#),
        // Content management systems and site builders
        Signature::new("WordPress", MetaGenerator, r"(?i)wordpress(?:\s+([\d.]+))?"),
        Signature::new("WordPress", Body, r"/wp-(?:content|includes)/"),
        Signature::new("Drupal", MetaGenerator, r"(?i)drupal(?:\s+(\d+))?"),
        Signature::new("Drupal", Header("x-generator"), r"(?i)drupal(?:\s+(\d+))?"),
        Signature::new("Joomla", MetaGenerator, r"(?i)joomla!?"),
        Signature::new("Ghost", MetaGenerator, r"(?i)ghost(?:\s+([\d.]+))?"),
        Signature::new("Hugo", MetaGenerator, r"(?i)hugo(?:\s+([\d.]+))?"),
        Signature::new("Wix", MetaGenerator, r"(?i)wix\.com"),
        Signature::new("Wix", Header("x-wix-request-id"), r".+"),
        Signature::new("Shopify", Header("x-shopid"), r".+"),
        Signature::new("Shopify", Body, r"cdn\.shopify\.com"),
        Signature::new("Squarespace", Body, r"(?i)static1\.squarespace\.com"),
    ]
});

static META_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("meta[name][content]").expect("valid meta selector"));

fn meta_generators(body: &str) -> Vec<String> {
    let document = Html::parse_document(body);
    document
        .select(&META_SELECTOR)
        .filter(|meta| {
            meta.value()
                .attr("name")
                .is_some_and(|name| name.eq_ignore_ascii_case("generator"))
        })
        .filter_map(|meta| meta.value().attr("content").map(str::to_string))
        .collect()
}

/// 根据响应头与正文识别技术栈
///
/// # 参数
///
/// * `headers` - 响应头，名称为小写
/// * `body` - 响应正文
///
/// # 返回值
///
/// 识别到的技术，按名称排序，同一技术的多个版本合并
pub fn detect(headers: &HashMap<String, String>, body: &str) -> Vec<Technology> {
    let generators = meta_generators(body);
    let mut found: BTreeMap<&'static str, BTreeSet<String>> = BTreeMap::new();

    for signature in SIGNATURES.iter() {
        let inputs: Vec<&str> = match signature.source {
            Source::Header(name) => headers.get(name).map(String::as_str).into_iter().collect(),
            Source::MetaGenerator => generators.iter().map(String::as_str).collect(),
            Source::Body => vec![body],
        };

        for input in inputs {
            if let Some(captures) = signature.pattern.captures(input) {
                let versions = found.entry(signature.technology).or_default();
                if let Some(version) = captures.get(1) {
                    versions.insert(version.as_str().to_string());
                }
            }
        }
    }

    found
        .into_iter()
        .map(|(name, versions)| Technology::new(name, versions.into_iter().collect()))
        .collect()
}

/// 基于签名匹配的技术栈识别器
pub struct SignatureFingerprinter {
    client: reqwest::Client,
}

impl SignatureFingerprinter {
    pub fn new(timeout: Duration) -> Result<Self, EngineError> {
        let client = client_builder(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fingerprinter for SignatureFingerprinter {
    async fn fingerprint(&self, url: &str) -> Result<Vec<Technology>, EngineError> {
        let response = self.client.get(url).send().await.map_err(classify)?;

        let status = response.status();
        if !status.is_success() {
            return Err(EngineError::Status(status.as_u16()));
        }

        let headers = collect_headers(response.headers());
        let body = response.text().await.map_err(classify)?;

        Ok(detect(&headers, &body))
    }
}
