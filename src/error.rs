//! 错误类型定义
//!
//! 所有 Board API 访问层的错误都汇总到 [`BoardError`]，
//! 通过 [`BoardError::kind`] 映射到五类：限流、认证失败、未找到、协议违规、传输错误。

use crate::models::board::BoardType;
use thiserror::Error;

/// 错误大类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// 被限流（429），已在客户端内部重试
    Throttled,
    /// 认证失败，永不重试
    AuthenticationFailed,
    /// 资源不存在（仅用户查询接口视为非致命）
    NotFound,
    /// 响应不符合预期的协议格式
    ProtocolViolation,
    /// 网络、超时或其他 HTTP 失败
    Transport,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Throttled => write!(f, "Throttled"),
            Self::AuthenticationFailed => write!(f, "AuthenticationFailed"),
            Self::NotFound => write!(f, "NotFound"),
            Self::ProtocolViolation => write!(f, "ProtocolViolation"),
            Self::Transport => write!(f, "Transport"),
        }
    }
}

/// Moonboard 登录流程中的错误
#[derive(Debug, Error)]
pub enum LoginError {
    #[error("login page returned HTTP {0}")]
    LoginPageStatus(u16),
    #[error("could not find login form with id='frmLogin'")]
    MissingLoginForm,
    #[error("could not extract CSRF tokens from login form (missing {0})")]
    MissingCsrfField(&'static str),
    #[error("invalid username or password: {0}")]
    InvalidCredentials(String),
    #[error("invalid CSRF token, the login form was rejected")]
    InvalidCsrfToken,
    #[error("login submission returned HTTP {0}")]
    SubmitStatus(u16),
    #[error("redirect to {location} failed with HTTP {status}")]
    RedirectFailed { location: String, status: u16 },
    #[error("invalid redirect location {0:?}")]
    InvalidRedirect(String),
    #[error("could not encode login form: {0}")]
    Encode(#[from] serde_urlencoded::ser::Error),
    #[error("{0}")]
    Transport(#[from] reqwest::Error),
}

impl LoginError {
    /// 是否为用户名/密码错误
    pub fn is_invalid_credentials(&self) -> bool {
        matches!(self, Self::InvalidCredentials(_))
    }

    /// 是否为 CSRF token 失效
    pub fn is_invalid_token(&self) -> bool {
        matches!(self, Self::InvalidCsrfToken)
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingLoginForm | Self::MissingCsrfField(_) => ErrorKind::ProtocolViolation,
            Self::Transport(_) => ErrorKind::Transport,
            _ => ErrorKind::AuthenticationFailed,
        }
    }
}

/// Board API 访问层统一错误
#[derive(Debug, Error)]
pub enum BoardError {
    #[error("rate limited by {board} (HTTP 429), gave up after {retries} retries")]
    Throttled { board: BoardType, retries: u32 },

    #[error("authentication failed for {board}: {reason}")]
    AuthenticationFailed { board: BoardType, reason: String },

    #[error("authentication required, call authenticate() first")]
    AuthenticationRequired,

    #[error("{board} authentication failed: {source}")]
    Login {
        board: BoardType,
        #[source]
        source: LoginError,
    },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("HTTP {status} from {url}")]
    Http { status: u16, url: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<BoardError>,
    },
}

impl BoardError {
    /// 映射到错误大类
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Throttled { .. } => ErrorKind::Throttled,
            Self::AuthenticationFailed { .. } | Self::AuthenticationRequired => {
                ErrorKind::AuthenticationFailed
            }
            Self::Login { source, .. } => source.kind(),
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::ProtocolViolation(_) | Self::Decode(_) | Self::Url(_) => {
                ErrorKind::ProtocolViolation
            }
            Self::Http { .. } | Self::Transport(_) => ErrorKind::Transport,
            Self::Context { source, .. } => source.kind(),
        }
    }

    /// 为错误附加上下文，`kind()` 保持不变
    pub fn context(self, context: impl Into<String>) -> Self {
        Self::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// 剥离所有 Context 包装后的根错误
    pub fn root(&self) -> &BoardError {
        match self {
            Self::Context { source, .. } => source.root(),
            other => other,
        }
    }

    pub fn is_authentication(&self) -> bool {
        self.kind() == ErrorKind::AuthenticationFailed
    }

    /// 登录失败时返回内部的登录错误
    pub fn login_error(&self) -> Option<&LoginError> {
        match self.root() {
            Self::Login { source, .. } => Some(source),
            _ => None,
        }
    }
}

pub type BoardResult<T> = Result<T, BoardError>;

/// 配置加载错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    NotFound(String),
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// 本地文件存储错误
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to (de)serialize {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// GeoJSON 转换错误
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("invalid file structure: expecting a 'gyms' array")]
    MissingGyms,
    #[error("invalid gym coordinates for gym id {0}")]
    InvalidCoordinates(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
