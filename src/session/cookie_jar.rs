//! 会话 Cookie 存储
//!
//! 只保留 `Set-Cookie` 中第一个 `;` 之前的 `name=value`，同名覆盖（区分大小写），
//! 其余按首次出现的顺序累积。Cookie 值属于认证凭据，`Debug` 输出中只显示名称。

use indexmap::IndexMap;
use reqwest::header::{HeaderMap, SET_COOKIE};
use std::fmt;

#[derive(Clone, Default, PartialEq, Eq)]
pub struct CookieJar {
    cookies: IndexMap<String, String>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// 合并单个 `Set-Cookie` 值，返回是否写入
    pub fn merge_set_cookie(&mut self, set_cookie: &str) -> bool {
        let pair = set_cookie.split(';').next().unwrap_or_default();
        let Some((name, value)) = pair.split_once('=') else {
            return false;
        };
        let (name, value) = (name.trim(), value.trim());
        if name.is_empty() || value.is_empty() {
            return false;
        }
        self.cookies.insert(name.to_string(), value.to_string());
        true
    }

    /// 合并响应头中的所有 `Set-Cookie`，返回写入的条数
    pub fn merge_headers(&mut self, headers: &HeaderMap) -> usize {
        headers
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .filter(|v| self.merge_set_cookie(v))
            .count()
    }

    /// 渲染为 `Cookie` 请求头：`a=1; b=2`
    pub fn header_value(&self) -> String {
        self.cookies
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; ")
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    pub fn names(&self) -> Vec<String> {
        self.cookies.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    pub fn clear(&mut self) {
        self.cookies.clear();
    }
}

impl fmt::Debug for CookieJar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CookieJar")
            .field("names", &self.cookies.keys().collect::<Vec<_>>())
            .finish()
    }
}
