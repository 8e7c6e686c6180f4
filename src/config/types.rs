//! 配置类型定义
//!
//! 所有字段都有默认值，YAML 中缺省的部分自动补齐。

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// 默认 12Climb KML 导出地址（Google My Maps）
pub const DEFAULT_KML_URL: &str =
    "https://www.google.com/maps/d/kml?mid=193vm5XWh8uVnqQS71aVd130TNV2JkDnA&forcekml=1";

/// 默认 Moonboard 站点
pub const DEFAULT_MOONBOARD_HOST: &str = "https://moonboard.com";

/// 应用配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// 输出根目录，其下为 data/ 与 geojson/
    pub output_dir: PathBuf,
    pub rate_limit: RateLimitConfig,
    pub retry: RetryConfig,
    pub aurora: AuroraConfig,
    pub moonboard: MoonboardConfig,
    pub twelve_climb: KmlConfig,
    pub logging: LoggingConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            rate_limit: RateLimitConfig::default(),
            retry: RetryConfig::default(),
            aurora: AuroraConfig::default(),
            moonboard: MoonboardConfig::default(),
            twelve_climb: KmlConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl AppConfig {
    /// 校验配置中不允许为零的字段
    pub fn validate(&self) -> Result<(), String> {
        if self.rate_limit.requests_per_minute == 0 {
            return Err("rate_limit.requests_per_minute must be greater than 0".to_string());
        }
        if self.rate_limit.window_secs == 0 {
            return Err("rate_limit.window_secs must be greater than 0".to_string());
        }
        if self.rate_limit.poll_interval_ms == 0 {
            return Err("rate_limit.poll_interval_ms must be greater than 0".to_string());
        }
        if self.aurora.timeout_secs == 0
            || self.moonboard.timeout_secs == 0
            || self.twelve_climb.timeout_secs == 0
        {
            return Err("timeout_secs must be greater than 0".to_string());
        }
        if url::Url::parse(&self.moonboard.host).is_err() {
            return Err(format!("moonboard.host is not a valid URL: {}", self.moonboard.host));
        }
        Ok(())
    }
}

/// 滑动窗口限流配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// 每个 Aurora board 每窗口允许的请求数
    pub requests_per_minute: usize,
    pub window_secs: u64,
    /// 排队时的轮询间隔
    pub poll_interval_ms: u64,
    /// 使用率超过该百分比时输出警告
    pub warn_threshold_percent: f64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: 30,
            window_secs: 60,
            poll_interval_ms: 100,
            warn_threshold_percent: 80.0,
        }
    }
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// 429 重试配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuroraConfig {
    pub timeout_secs: u64,
}

impl Default for AuroraConfig {
    fn default() -> Self {
        Self { timeout_secs: 10 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MoonboardConfig {
    pub host: String,
    pub timeout_secs: u64,
}

impl Default for MoonboardConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_MOONBOARD_HOST.to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KmlConfig {
    pub kml_url: String,
    pub timeout_secs: u64,
}

impl Default for KmlConfig {
    fn default() -> Self {
        Self {
            kml_url: DEFAULT_KML_URL.to_string(),
            timeout_secs: 30,
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 日志级别（trace/debug/info/warn/error）
    pub level: String,
    /// 输出 JSON 格式日志
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}
