//! 配置管理模块
//!
//! 提供 YAML 配置文件支持与环境变量凭证加载

mod credentials;
mod types;
mod yaml;

pub use credentials::{
    AccountCredentials, Credentials, AURORA_PASSWORD_ENV, AURORA_USERNAME_ENV,
    MOONBOARD_PASSWORD_ENV, MOONBOARD_USERNAME_ENV,
};
pub use types::{
    AppConfig, AuroraConfig, KmlConfig, LoggingConfig, MoonboardConfig, RateLimitConfig,
    RetryConfig, DEFAULT_KML_URL, DEFAULT_MOONBOARD_HOST,
};
pub use yaml::{
    default_config_path, load_config, parse_config, resolve_config_path, save_config,
};
