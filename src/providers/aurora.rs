//! Aurora Provider - Aurora 系攀岩板通用 REST 客户端
//!
//! Aurora、Decoy、Grasshopper、Kilter、So iLL、Tension、Touchstone 共用同一套 API。
//! 每次发送（包括重试）前都要经过共享限流器；429 按线性退避重试，
//! 401/403 立即失败且永不重试。

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;
use url::Url;
use uuid::Uuid;

use super::user_agent::random_mobile_user_agent;
use crate::config::{AuroraConfig, RetryConfig};
use crate::error::{BoardError, BoardResult, ErrorKind};
use crate::models::board::BoardType;
use crate::models::login::{Login, LoginRequest};
use crate::models::pin::PinsResponse;
use crate::models::user::UserResponse;
use crate::session::RateLimiterRegistry;

const LOGINS_PATH: &str = "/v1/logins";
const PINS_PATH: &str = "/v1/pins";

/// 429 重试策略：第 n 次重试前等待 `n * base_delay`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.base_delay_ms),
        }
    }
}

impl RetryPolicy {
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }
}

/// 单次 API 请求描述
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
    pub body: Option<serde_json::Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    /// 非法的 header 名或值会被忽略并记录警告
    pub fn header(mut self, name: &str, value: &str) -> Self {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                self.headers.insert(name, value);
            }
            _ => tracing::warn!("[Aurora] 忽略非法请求头: {}", name),
        }
        self
    }

    pub fn bearer(mut self, token: &str) -> Self {
        if let Ok(value) = HeaderValue::from_str(&format!("Bearer {token}")) {
            self.headers.insert(AUTHORIZATION, value);
        }
        self
    }

    pub fn json<B: Serialize>(mut self, body: &B) -> BoardResult<Self> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }
}

/// Aurora 系 API 客户端
///
/// 一个实例绑定一个 board，重试计数属于实例本身；限流窗口在同一 board 的所有实例间共享。
pub struct AuroraClient {
    board: BoardType,
    base_url: Url,
    client: Client,
    limiter: Arc<RateLimiterRegistry>,
    retry: RetryPolicy,
    retry_count: AtomicU32,
    user_agent: &'static str,
}

impl AuroraClient {
    pub fn new(
        board: BoardType,
        limiter: Arc<RateLimiterRegistry>,
        config: &AuroraConfig,
    ) -> BoardResult<Self> {
        let user_agent = random_mobile_user_agent();

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(USER_AGENT, HeaderValue::from_static(user_agent));

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()?;

        Ok(Self {
            board,
            base_url: Url::parse(&board.origin())?,
            client,
            limiter,
            retry: RetryPolicy::default(),
            retry_count: AtomicU32::new(0),
            user_agent,
        })
    }

    /// 覆盖源站地址（镜像或测试用）
    pub fn with_base_url(mut self, base_url: &str) -> BoardResult<Self> {
        self.base_url = Url::parse(base_url)?;
        Ok(self)
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn board(&self) -> BoardType {
        self.board
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn user_agent(&self) -> &str {
        self.user_agent
    }

    /// 当前连续 429 重试次数
    pub fn retry_count(&self) -> u32 {
        self.retry_count.load(Ordering::SeqCst)
    }

    /// 发送请求并解码 JSON 响应
    pub async fn request<T: DeserializeOwned>(&self, request: ApiRequest) -> BoardResult<T> {
        let request_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "aurora_request",
            board = %self.board,
            request_id = %request_id,
            method = %request.method,
            path = %request.path,
        );
        self.execute(request).instrument(span).await
    }

    async fn execute<T: DeserializeOwned>(&self, request: ApiRequest) -> BoardResult<T> {
        let usage = self.limiter.usage(self.board);
        if usage > self.limiter.warn_threshold_percent() {
            tracing::warn!("[Aurora] {} API 使用率过高: {:.1}%", self.board, usage);
        }

        let url = self.base_url.join(&request.path)?;

        loop {
            self.limiter.admit(self.board).await;

            let response = self.send(&url, &request).await.map_err(|e| {
                tracing::error!("[Aurora] {} 请求失败: {}", self.board, e);
                BoardError::Transport(e)
            })?;
            let status = response.status();

            if status == StatusCode::TOO_MANY_REQUESTS {
                let max = self.retry.max_retries;
                match self
                    .retry_count
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |c| (c < max).then_some(c + 1))
                {
                    Ok(previous) => {
                        let attempt = previous + 1;
                        let delay = self.retry.delay_for(attempt);
                        tracing::warn!(
                            "[Aurora] {} 被限流 (429)，第 {}/{} 次重试，等待 {}ms",
                            self.board,
                            attempt,
                            max,
                            delay.as_millis()
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    Err(retries) => {
                        tracing::error!("[Aurora] {} 429 重试已用尽 ({} 次)", self.board, retries);
                        return Err(BoardError::Throttled {
                            board: self.board,
                            retries,
                        });
                    }
                }
            }

            if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                let body = response.text().await.unwrap_or_default();
                let reason = auth_failure_reason(status, &body);
                tracing::error!("[Aurora] {} 认证失败: {}", self.board, reason);
                return Err(BoardError::AuthenticationFailed {
                    board: self.board,
                    reason,
                });
            }

            if status == StatusCode::NOT_FOUND {
                return Err(BoardError::NotFound(url.to_string()));
            }

            if !status.is_success() {
                tracing::error!("[Aurora] {} 请求失败: HTTP {}", self.board, status);
                return Err(BoardError::Http {
                    status: status.as_u16(),
                    url: url.to_string(),
                });
            }

            let bytes = response.bytes().await?;
            let data = serde_json::from_slice::<T>(&bytes)?;
            self.retry_count.store(0, Ordering::SeqCst);
            return Ok(data);
        }
    }

    async fn send(&self, url: &Url, request: &ApiRequest) -> Result<reqwest::Response, reqwest::Error> {
        let mut builder = self
            .client
            .request(request.method.clone(), url.clone())
            .headers(request.headers.clone());
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        builder.send().await
    }

    /// 用户名密码登录，换取 token
    pub async fn login(&self, username: &str, password: &str) -> BoardResult<Login> {
        tracing::info!("[Aurora] {} 登录中", self.board);
        let request = ApiRequest::post(LOGINS_PATH).json(&LoginRequest { username, password })?;
        self.request(request).await
    }

    /// 公开场馆列表，token 可选
    pub async fn pins(&self, token: Option<&str>) -> BoardResult<PinsResponse> {
        let mut request = ApiRequest::get(PINS_PATH).query("types", "gym");
        if let Some(token) = token {
            request = request.bearer(token);
        }
        self.request(request).await
    }

    /// 场馆账号详情（含墙体），404 视为不存在
    pub async fn user(&self, gym_id: u64, token: &str) -> BoardResult<Option<UserResponse>> {
        let request = ApiRequest::get(format!("/v2/users/{gym_id}")).bearer(token);
        match self.request(request).await {
            Ok(user) => Ok(Some(user)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!("[Aurora] {} 场馆 {} 不存在", self.board, gym_id);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

fn auth_failure_reason(status: StatusCode, body: &str) -> String {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string));
    match message {
        Some(message) => format!("HTTP {} {}", status.as_u16(), message),
        None => format!("HTTP {}", status.as_u16()),
    }
}
