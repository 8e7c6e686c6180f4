//! Moonboard 登录页解析
//!
//! 解析策略放在 [`LoginPageParser`] 之后，状态机只依赖这两个方法，
//! 换成真正的 HTML 解析器时不需要改动登录流程。

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::LoginError;

pub const LOGIN_FORM_ID: &str = "frmLogin";
pub const VERIFICATION_TOKEN_FIELD: &str = "__RequestVerificationToken";
pub const FORM_KEY_FIELD: &str = "form_key";

/// 表示错误信息的 CSS class
pub const ERROR_CLASSES: &[&str] = &[
    "validation-summary-errors",
    "field-validation-error",
    "text-danger",
    "alert-danger",
];

/// 登录表单中的防伪字段，只在一次登录提交中使用
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsrfTokens {
    pub verification_token: String,
    pub form_key: String,
}

pub trait LoginPageParser: Send + Sync {
    /// 从登录页中提取防伪字段
    fn extract_form_fields(&self, html: &str) -> Result<CsrfTokens, LoginError>;

    /// 在登录响应中查找用户名/密码错误提示
    fn find_error_message(&self, html: &str) -> Option<String>;
}

static FORM_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<form\b([^>]*)>(.*?)</form\s*>"#).expect("invalid form regex")
});

static INPUT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?is)<input\b([^>]*)/?>"#).expect("invalid input regex"));

static ATTR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)([a-z_:][-a-z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
        .expect("invalid attribute regex")
});

static OPEN_TAG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<([a-z][a-z0-9]*)\b([^>]*)>"#).expect("invalid tag regex")
});

static STRIP_TAGS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<[^>]*>").expect("invalid strip regex"));

static WHITESPACE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("invalid whitespace regex"));

fn attribute<'a>(attrs: &'a str, name: &str) -> Option<&'a str> {
    ATTR_RE.captures_iter(attrs).find_map(|caps| {
        let key = caps.get(1)?.as_str();
        if !key.eq_ignore_ascii_case(name) {
            return None;
        }
        caps.get(2).or_else(|| caps.get(3)).map(|m| m.as_str())
    })
}

fn has_error_class(attrs: &str) -> bool {
    attribute(attrs, "class")
        .map(|classes| {
            classes
                .split_whitespace()
                .any(|c| ERROR_CLASSES.iter().any(|e| c.eq_ignore_ascii_case(e)))
        })
        .unwrap_or(false)
}

/// 去掉标签并折叠空白
pub fn strip_tags(fragment: &str) -> String {
    let text = STRIP_TAGS_RE.replace_all(fragment, " ");
    WHITESPACE_RE.replace_all(text.trim(), " ").to_string()
}

/// 默认的正则解析器
#[derive(Debug, Clone, Copy, Default)]
pub struct RegexLoginPageParser;

impl RegexLoginPageParser {
    fn login_form<'a>(&self, html: &'a str) -> Option<&'a str> {
        FORM_RE.captures_iter(html).find_map(|caps| {
            let attrs = caps.get(1)?.as_str();
            if attribute(attrs, "id") == Some(LOGIN_FORM_ID) {
                caps.get(2).map(|m| m.as_str())
            } else {
                None
            }
        })
    }

    fn input_value(form: &str, field: &str) -> Option<String> {
        INPUT_RE.captures_iter(form).find_map(|caps| {
            let attrs = caps.get(1)?.as_str();
            if attribute(attrs, "name") == Some(field) {
                attribute(attrs, "value").map(str::to_string)
            } else {
                None
            }
        })
    }

    /// 所有带错误 class 的元素的纯文本
    pub fn error_fragments(&self, html: &str) -> Vec<String> {
        let lower = html.to_ascii_lowercase();
        OPEN_TAG_RE
            .captures_iter(html)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                let tag = caps.get(1)?.as_str().to_ascii_lowercase();
                if !has_error_class(caps.get(2)?.as_str()) {
                    return None;
                }
                let rest = &html[whole.end()..];
                let close = lower[whole.end()..]
                    .find(&format!("</{tag}"))
                    .unwrap_or(rest.len());
                let text = strip_tags(&rest[..close]);
                (!text.is_empty()).then_some(text)
            })
            .collect()
    }
}

impl LoginPageParser for RegexLoginPageParser {
    fn extract_form_fields(&self, html: &str) -> Result<CsrfTokens, LoginError> {
        let form = self.login_form(html).ok_or(LoginError::MissingLoginForm)?;
        let verification_token = Self::input_value(form, VERIFICATION_TOKEN_FIELD)
            .ok_or(LoginError::MissingCsrfField(VERIFICATION_TOKEN_FIELD))?;
        let form_key = Self::input_value(form, FORM_KEY_FIELD)
            .ok_or(LoginError::MissingCsrfField(FORM_KEY_FIELD))?;
        Ok(CsrfTokens {
            verification_token,
            form_key,
        })
    }

    fn find_error_message(&self, html: &str) -> Option<String> {
        self.error_fragments(html).into_iter().find(|text| {
            let lower = text.to_lowercase();
            lower.contains("username") && lower.contains("password")
        })
    }
}
