//! 按厂商划分的滑动窗口限流
//!
//! 提供以下功能：
//! - 每个 Aurora board 独立的请求时间戳窗口
//! - 排队等待（只延迟，从不报错）
//! - 使用率统计，用于高负载告警
//!
//! 清理、判断、追加三个动作在同一个临界区内完成，锁内没有挂起点，
//! 所以并发的调用方不会同时看到“还有余量”而超发。

use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::config::RateLimitConfig;
use crate::models::board::BoardType;

/// 单个厂商的请求窗口
#[derive(Debug)]
pub struct VendorWindow {
    quota: usize,
    timestamps: Mutex<VecDeque<Instant>>,
}

impl VendorWindow {
    fn new(quota: usize) -> Self {
        Self {
            quota,
            timestamps: Mutex::new(VecDeque::with_capacity(quota)),
        }
    }

    fn prune(timestamps: &mut VecDeque<Instant>, now: Instant, window: Duration) {
        while let Some(front) = timestamps.front() {
            if now.saturating_duration_since(*front) >= window {
                timestamps.pop_front();
            } else {
                break;
            }
        }
    }

    /// 一次完整的准入判断，成功时记录时间戳
    fn try_acquire(&self, now: Instant, window: Duration) -> bool {
        let mut timestamps = self.timestamps.lock();
        Self::prune(&mut timestamps, now, window);
        if timestamps.len() < self.quota {
            timestamps.push_back(now);
            true
        } else {
            false
        }
    }

    fn live_count(&self, now: Instant, window: Duration) -> usize {
        let mut timestamps = self.timestamps.lock();
        Self::prune(&mut timestamps, now, window);
        timestamps.len()
    }

    fn clear(&self) {
        self.timestamps.lock().clear();
    }
}

/// 限流器注册表
///
/// 进程内共享，所有同一 board 的客户端持有同一个 `Arc<RateLimiterRegistry>`。
#[derive(Debug)]
pub struct RateLimiterRegistry {
    windows: DashMap<BoardType, Arc<VendorWindow>>,
    window: Duration,
    poll_interval: Duration,
    warn_threshold_percent: f64,
}

impl Default for RateLimiterRegistry {
    fn default() -> Self {
        Self::new(&RateLimitConfig::default())
    }
}

impl RateLimiterRegistry {
    /// 为每个 Aurora board 创建配额相同的窗口
    pub fn new(config: &RateLimitConfig) -> Self {
        let windows = DashMap::new();
        for board in BoardType::aurora_boards() {
            windows.insert(board, Arc::new(VendorWindow::new(config.requests_per_minute)));
        }
        Self {
            windows,
            window: config.window(),
            poll_interval: config.poll_interval(),
            warn_threshold_percent: config.warn_threshold_percent,
        }
    }

    /// 覆盖（或新增）某个 board 的配额，已有时间戳会被丢弃
    pub fn with_quota(self, board: BoardType, quota: usize) -> Self {
        self.windows.insert(board, Arc::new(VendorWindow::new(quota)));
        self
    }

    /// 取出窗口的 Arc，避免在等待期间持有 DashMap 的分片锁
    fn vendor(&self, board: BoardType) -> Option<Arc<VendorWindow>> {
        self.windows.get(&board).map(|w| Arc::clone(w.value()))
    }

    pub fn quota(&self, board: BoardType) -> Option<usize> {
        self.vendor(board).map(|w| w.quota)
    }

    pub fn warn_threshold_percent(&self) -> f64 {
        self.warn_threshold_percent
    }

    /// 等待直到该 board 的窗口有余量，然后记录本次请求
    ///
    /// 没有配额的 board（moonboard、12climb）立即放行。
    pub async fn admit(&self, board: BoardType) {
        let Some(vendor) = self.vendor(board) else {
            return;
        };

        let mut waited = false;
        loop {
            if vendor.try_acquire(Instant::now(), self.window) {
                if waited {
                    tracing::debug!("[RateLimiter] {} 排队结束，已放行", board);
                }
                return;
            }
            if !waited {
                tracing::debug!(
                    "[RateLimiter] {} 已达到配额 {}/{}s，开始排队",
                    board,
                    vendor.quota,
                    self.window.as_secs()
                );
                waited = true;
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// 非阻塞准入，窗口已满时返回 false 且不记录
    pub fn try_admit(&self, board: BoardType) -> bool {
        match self.vendor(board) {
            Some(vendor) => vendor.try_acquire(Instant::now(), self.window),
            None => true,
        }
    }

    /// 当前窗口内的请求数
    pub fn live_count(&self, board: BoardType) -> usize {
        self.vendor(board)
            .map(|w| w.live_count(Instant::now(), self.window))
            .unwrap_or(0)
    }

    /// 使用率百分比 `(live / quota) * 100`，仅用于观测
    pub fn usage(&self, board: BoardType) -> f64 {
        match self.vendor(board) {
            Some(vendor) if vendor.quota > 0 => {
                let live = vendor.live_count(Instant::now(), self.window);
                live as f64 / vendor.quota as f64 * 100.0
            }
            _ => 0.0,
        }
    }

    /// 使用率是否超过告警阈值
    pub fn is_high_usage(&self, board: BoardType) -> bool {
        self.usage(board) > self.warn_threshold_percent
    }

    /// 清空某个 board 的时间戳（测试或手动恢复用）
    pub fn reset(&self, board: BoardType) {
        if let Some(vendor) = self.vendor(board) {
            vendor.clear();
            tracing::info!("[RateLimiter] {} 限流窗口已重置", board);
        }
    }
}
