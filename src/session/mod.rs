//! 会话与限流模块
//!
//! 提供以下功能：
//! - 按厂商划分的滑动窗口限流（进程内共享）
//! - Moonboard 会话 Cookie 存储

mod cookie_jar;
mod rate_limit;

pub use cookie_jar::CookieJar;
pub use rate_limit::{RateLimiterRegistry, VendorWindow};
