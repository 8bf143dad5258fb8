// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

static SCHEME_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^https?://").expect("valid scheme regex"));

/// `www.`、`www2.`、`wwww.`、`wwwwww.` 等前缀
static WWW_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(?:www\d*|w{4,})\.").expect("valid www regex"));

/// 规范化域名字符串，生成去重键
///
/// 去掉协议与 www 类前缀、查询串与片段、结尾斜杠，
/// 百分号解码，小写并做 NFC 组合。函数是幂等的：
/// `normalize(&normalize(x)) == normalize(x)`。
///
/// # 参数
///
/// * `raw` - 原始域名或链接
///
/// # 返回值
///
/// 规范化后的域名，输入无有效内容时返回空字符串
pub fn normalize(raw: &str) -> String {
    // 解码后可能暴露出新的前缀，重复直到不动点
    let mut current = normalize_once(raw);
    loop {
        let next = normalize_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn normalize_once(raw: &str) -> String {
    let decoded = percent_decode(raw.trim());
    let mut value: String = decoded.to_lowercase().nfc().collect();

    loop {
        let trimmed = value.trim();
        let stripped = if let Some(m) = SCHEME_PREFIX.find(trimmed) {
            &trimmed[m.end()..]
        } else if let Some(m) = WWW_PREFIX.find(trimmed) {
            &trimmed[m.end()..]
        } else {
            break;
        };
        value = stripped.to_string();
    }

    let mut value = value.trim();
    if let Some(end) = value.find(&['#', '?'][..]) {
        value = &value[..end];
    }

    value
        .trim_end_matches(|c: char| c == '/' || c.is_whitespace())
        .to_string()
}

/// 反复解码直到不再变化，解码结果不是合法 UTF-8 时保留上一次结果
fn percent_decode(input: &str) -> String {
    let mut current = input.to_string();
    while current.contains('%') {
        match urlencoding::decode(&current) {
            Ok(decoded) if decoded != current => current = decoded.into_owned(),
            _ => break,
        }
    }
    current
}
