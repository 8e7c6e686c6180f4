//! Boardmap - 攀岩训练板场馆地图
//!
//! 从各厂商后端抓取场馆位置并转换为 GeoJSON：
//! - Aurora 协议 board（共用一套 REST API，按厂商滑动窗口限流）
//! - Moonboard（表单登录 + Cookie 会话）
//! - 12Climb（公开 KML）

pub mod config;
pub mod converter;
pub mod error;
pub mod logger;
pub mod models;
pub mod providers;
pub mod services;
pub mod session;
pub mod storage;

pub use config::{AppConfig, Credentials};
pub use error::{BoardError, BoardResult, ErrorKind};
pub use models::{BoardProtocol, BoardType};
pub use providers::{AuroraClient, MoonboardClient, TwelveClimbClient};
pub use services::{GeoJsonService, ScrapeService};
pub use session::RateLimiterRegistry;
pub use storage::DataStore;
