//! 厂商账号凭证
//!
//! 从环境变量（以及 `.env`）读取，只保存在内存中。

use std::fmt;

pub const AURORA_USERNAME_ENV: &str = "AURORA_USERNAME";
pub const AURORA_PASSWORD_ENV: &str = "AURORA_PASSWORD";
pub const MOONBOARD_USERNAME_ENV: &str = "MOONBOARD_USERNAME";
pub const MOONBOARD_PASSWORD_ENV: &str = "MOONBOARD_PASSWORD";

/// 用户名 + 密码
#[derive(Clone, PartialEq, Eq)]
pub struct AccountCredentials {
    pub username: String,
    pub password: String,
}

impl AccountCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    fn from_pair(username: Option<String>, password: Option<String>) -> Option<Self> {
        match (username, password) {
            (Some(u), Some(p)) if !u.trim().is_empty() && !p.is_empty() => {
                Some(Self::new(u.trim(), p))
            }
            _ => None,
        }
    }
}

impl fmt::Debug for AccountCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountCredentials")
            .field("username", &self.username)
            .field("password", &"********")
            .finish()
    }
}

/// 所有厂商的凭证
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub aurora: Option<AccountCredentials>,
    pub moonboard: Option<AccountCredentials>,
}

impl Credentials {
    /// 先加载 `.env`（不存在时忽略），再读取环境变量
    pub fn from_env() -> Self {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!("[Config] 已加载 {}", path.display());
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 通过任意查找函数构造，便于测试
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            aurora: AccountCredentials::from_pair(
                lookup(AURORA_USERNAME_ENV),
                lookup(AURORA_PASSWORD_ENV),
            ),
            moonboard: AccountCredentials::from_pair(
                lookup(MOONBOARD_USERNAME_ENV),
                lookup(MOONBOARD_PASSWORD_ENV),
            ),
        }
    }

    /// 命令行传入的凭证覆盖环境变量（同时作用于两类厂商）
    pub fn with_override(mut self, username: Option<String>, password: Option<String>) -> Self {
        if let Some(account) = AccountCredentials::from_pair(username, password) {
            self.aurora = Some(account.clone());
            self.moonboard = Some(account);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_requires_both_username_and_password() {
        let creds = Credentials::from_lookup(lookup(&[
            (AURORA_USERNAME_ENV, "climber"),
            (AURORA_PASSWORD_ENV, "secret"),
            (MOONBOARD_USERNAME_ENV, "moon"),
        ]));
        assert_eq!(creds.aurora, Some(AccountCredentials::new("climber", "secret")));
        assert!(creds.moonboard.is_none());
    }

    #[test]
    fn test_debug_redacts_password() {
        let account = AccountCredentials::new("climber", "hunter2");
        let printed = format!("{:?}", Credentials {
            aurora: Some(account),
            moonboard: None,
        });
        assert!(printed.contains("climber"));
        assert!(!printed.contains("hunter2"));
    }

    #[test]
    fn test_cli_override_replaces_env() {
        let creds = Credentials::from_lookup(lookup(&[]))
            .with_override(Some("cli".into()), Some("pw".into()));
        assert_eq!(creds.aurora.as_ref().map(|a| a.username.as_str()), Some("cli"));
        assert_eq!(creds.moonboard.as_ref().map(|a| a.username.as_str()), Some("cli"));
    }
}
