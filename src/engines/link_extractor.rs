// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use once_cell::sync::Lazy;
use scraper::{Html, Selector};

static ANCHOR_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a[href]").expect("valid anchor selector"));

static LOC_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("loc").expect("valid sitemap selector"));

/// 提取页面中所有 `<a href>` 的原始值
///
/// 纯解析，不做过滤或解析相对路径
pub fn extract_links(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    document
        .select(&ANCHOR_SELECTOR)
        .filter_map(|element| element.value().attr("href"))
        .map(|href| href.trim().to_string())
        .filter(|href| !href.is_empty())
        .collect()
}

/// 提取站点地图中的 `<loc>` 条目
pub fn extract_sitemap_links(xml: &str) -> Vec<String> {
    let document = Html::parse_document(xml);
    document
        .select(&LOC_SELECTOR)
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|loc| !loc.is_empty())
        .collect()
}

/// 站点地图地址
pub fn sitemap_url(domain: &str) -> String {
    format!("http://{}/sitemap.xml", domain)
}
