//! Moonboard Provider - 表单登录 + Cookie 会话
//!
//! 登录是一个显式的状态机：
//! 取登录页 -> 提取防伪字段 -> 提交表单（不自动跟随重定向）-> 手动跟随重定向或检查错误页。
//! 每次 HTTP 往返收到的 `Set-Cookie` 都合并进会话 Cookie。
//! 会话只存在于内存中，进程重启后需要重新登录。

use parking_lot::RwLock;
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE, COOKIE, LOCATION, REFERER, USER_AGENT,
};
use reqwest::{redirect, Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use super::login_page::{CsrfTokens, LoginPageParser, RegexLoginPageParser};
use super::user_agent::random_mobile_user_agent;
use crate::config::MoonboardConfig;
use crate::error::{BoardError, BoardResult, LoginError};
use crate::models::board::BoardType;
use crate::models::pin::MoonboardPin;
use crate::session::CookieJar;

const LOGIN_PAGE_PATH: &str = "/account/login";
const LOGIN_SUBMIT_PATH: &str = "/Account/login";
pub const MAP_MARKERS_PATH: &str = "/MoonBoard/GetMapMarkers";
const INVALID_TOKEN_PATH: &str = "/Error/InvalidToken";
const RESPONDED_JSON_HEADER: &str = "x-responded-json";

/// 登录状态机
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoginStage {
    #[default]
    Unauthenticated,
    LoginPageFetched,
    TokensExtracted,
    LoginSubmitted,
    Authenticated,
    Failed,
}

impl std::fmt::Display for LoginStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unauthenticated => write!(f, "Unauthenticated"),
            Self::LoginPageFetched => write!(f, "LoginPageFetched"),
            Self::TokensExtracted => write!(f, "TokensExtracted"),
            Self::LoginSubmitted => write!(f, "LoginSubmitted"),
            Self::Authenticated => write!(f, "Authenticated"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

#[derive(Debug, Default)]
struct SessionState {
    authenticated: bool,
    stage: LoginStage,
    cookies: CookieJar,
}

/// 会话诊断信息（不含 Cookie 值）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub authenticated: bool,
    pub stage: LoginStage,
    pub cookie_names: Vec<String>,
}

/// 已认证请求的选项
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Option<String>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            method: Method::GET,
            headers: HeaderMap::new(),
            body: None,
        }
    }
}

impl RequestOptions {
    pub fn get() -> Self {
        Self::default()
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// 非法的 header 名或值会被忽略
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.insert(name, value);
        }
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// Moonboard 会话客户端
///
/// 会话状态归单个实例独占。`authenticate` 通过异步互斥锁串行化，
/// 登录进行中发起的请求会因未认证而被拒绝。
pub struct MoonboardClient {
    host: Url,
    login_page_url: Url,
    login_submit_url: Url,
    /// 普通请求，自动跟随重定向
    client: Client,
    /// 登录提交专用，不跟随重定向
    login_client: Client,
    parser: Arc<dyn LoginPageParser>,
    state: RwLock<SessionState>,
    login_lock: tokio::sync::Mutex<()>,
    retry_count: AtomicU32,
}

impl MoonboardClient {
    pub fn new(config: &MoonboardConfig) -> BoardResult<Self> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let client = Client::builder().timeout(timeout).build()?;
        let login_client = Client::builder()
            .timeout(timeout)
            .redirect(redirect::Policy::none())
            .build()?;
        let host = Url::parse(&config.host)?;

        Ok(Self {
            login_page_url: host.join(LOGIN_PAGE_PATH)?,
            login_submit_url: host.join(LOGIN_SUBMIT_PATH)?,
            host,
            client,
            login_client,
            parser: Arc::new(RegexLoginPageParser),
            state: RwLock::new(SessionState::default()),
            login_lock: tokio::sync::Mutex::new(()),
            retry_count: AtomicU32::new(0),
        })
    }

    /// 覆盖站点地址
    pub fn with_host(mut self, host: &str) -> BoardResult<Self> {
        let host = Url::parse(host)?;
        self.login_page_url = host.join(LOGIN_PAGE_PATH)?;
        self.login_submit_url = host.join(LOGIN_SUBMIT_PATH)?;
        self.host = host;
        Ok(self)
    }

    /// 替换登录页解析策略
    pub fn with_parser(mut self, parser: Arc<dyn LoginPageParser>) -> Self {
        self.parser = parser;
        self
    }

    pub fn host(&self) -> &Url {
        &self.host
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.read().authenticated
    }

    pub fn login_stage(&self) -> LoginStage {
        self.state.read().stage
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count.load(Ordering::SeqCst)
    }

    pub fn session_snapshot(&self) -> SessionSnapshot {
        let state = self.state.read();
        SessionSnapshot {
            authenticated: state.authenticated,
            stage: state.stage,
            cookie_names: state.cookies.names(),
        }
    }

    fn set_stage(&self, stage: LoginStage) {
        self.state.write().stage = stage;
        tracing::debug!("[Moonboard] 登录阶段: {}", stage);
    }

    fn merge_cookies(&self, headers: &HeaderMap) {
        let merged = self.state.write().cookies.merge_headers(headers);
        if merged > 0 {
            tracing::debug!("[Moonboard] 合并了 {} 个 Cookie", merged);
        }
    }

    fn cookie_header(&self) -> Option<HeaderValue> {
        let state = self.state.read();
        if state.cookies.is_empty() {
            return None;
        }
        HeaderValue::from_str(&state.cookies.header_value()).ok()
    }

    /// 使会话失效：清空 Cookie 并回到未认证状态
    fn revoke_session(&self) {
        let mut state = self.state.write();
        state.authenticated = false;
        state.stage = LoginStage::Unauthenticated;
        state.cookies.clear();
        tracing::warn!("[Moonboard] 会话已失效，需要重新登录");
    }

    fn with_session_headers(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let builder = builder.header(USER_AGENT, random_mobile_user_agent());
        match self.cookie_header() {
            Some(cookie) => builder.header(COOKIE, cookie),
            None => builder,
        }
    }

    /// 第一步：获取登录页，非 200 视为失败
    pub async fn fetch_login_page(&self) -> Result<String, LoginError> {
        let response = self
            .with_session_headers(self.client.get(self.login_page_url.clone()))
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(LoginError::LoginPageStatus(status.as_u16()));
        }
        self.merge_cookies(response.headers());
        let html = response.text().await?;
        self.set_stage(LoginStage::LoginPageFetched);
        Ok(html)
    }

    /// 第二步：从登录表单提取防伪字段
    pub fn extract_tokens(&self, html: &str) -> Result<CsrfTokens, LoginError> {
        let tokens = self.parser.extract_form_fields(html)?;
        self.set_stage(LoginStage::TokensExtracted);
        Ok(tokens)
    }

    /// 第三步：提交登录表单，不跟随重定向
    pub async fn submit_login(
        &self,
        username: &str,
        password: &str,
        tokens: &CsrfTokens,
    ) -> Result<Response, LoginError> {
        let form = [
            ("Login.Username", username),
            ("Login.Password", password),
            ("__RequestVerificationToken", tokens.verification_token.as_str()),
            ("form_key", tokens.form_key.as_str()),
            ("Login.RememberMe", "false"),
            ("Login.AcceptTerms", "true"),
        ];
        let body = serde_urlencoded::to_string(&form[..])?;

        let request = self
            .login_client
            .post(self.login_submit_url.clone())
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header(REFERER, self.login_page_url.as_str())
            .body(body);
        let response = self.with_session_headers(request).send().await?;

        self.merge_cookies(response.headers());
        self.set_stage(LoginStage::LoginSubmitted);
        tracing::debug!("[Moonboard] 登录表单提交响应: {}", response.status());
        Ok(response)
    }

    /// 第四步（重定向分支）：手动跟随 `Location`
    pub async fn follow_redirect(&self, response: &Response) -> Result<(), LoginError> {
        let Some(location) = response.headers().get(LOCATION) else {
            tracing::debug!("[Moonboard] 重定向响应没有 Location，跳过");
            return Ok(());
        };
        let location = location
            .to_str()
            .map_err(|_| LoginError::InvalidRedirect(String::from_utf8_lossy(location.as_bytes()).into_owned()))?;
        let target = self
            .host
            .join(location)
            .map_err(|_| LoginError::InvalidRedirect(location.to_string()))?;

        if target.path().contains(INVALID_TOKEN_PATH) {
            return Err(LoginError::InvalidCsrfToken);
        }

        let redirected = self
            .with_session_headers(self.client.get(target.clone()))
            .send()
            .await?;
        self.merge_cookies(redirected.headers());

        let status = redirected.status();
        if !status.is_success() {
            return Err(LoginError::RedirectFailed {
                location: target.path().to_string(),
                status: status.as_u16(),
            });
        }
        if redirected.url().path().contains(INVALID_TOKEN_PATH) {
            return Err(LoginError::InvalidCsrfToken);
        }
        Ok(())
    }

    /// 第四步（非重定向分支）：检查错误提示和 token 错误页
    pub async fn inspect_login_response(&self, response: Response) -> Result<(), LoginError> {
        let status = response.status();
        let final_url = response.url().clone();
        let body = response.text().await?;

        if let Some(message) = self.parser.find_error_message(&body) {
            return Err(LoginError::InvalidCredentials(message));
        }
        if final_url.path().contains(INVALID_TOKEN_PATH) {
            return Err(LoginError::InvalidCsrfToken);
        }
        if !status.is_success() {
            return Err(LoginError::SubmitStatus(status.as_u16()));
        }
        Ok(())
    }

    async fn run_login(&self, username: &str, password: &str) -> Result<(), LoginError> {
        let html = self.fetch_login_page().await?;
        let tokens = self.extract_tokens(&html)?;
        let response = self.submit_login(username, password, &tokens).await?;

        if response.status().is_redirection() {
            self.follow_redirect(&response).await
        } else {
            self.inspect_login_response(response).await
        }
    }

    /// 用户名密码登录
    ///
    /// 失败的尝试不会留下可用会话，即使已经收到部分 Cookie。
    pub async fn authenticate(&self, username: &str, password: &str) -> BoardResult<()> {
        let _guard = self.login_lock.lock().await;
        {
            let mut state = self.state.write();
            state.authenticated = false;
            state.stage = LoginStage::Unauthenticated;
        }

        tracing::info!("[Moonboard] 开始登录流程");
        match self.run_login(username, password).await {
            Ok(()) => {
                let mut state = self.state.write();
                state.authenticated = true;
                state.stage = LoginStage::Authenticated;
                tracing::info!("[Moonboard] 登录成功，持有 {} 个 Cookie", state.cookies.len());
                Ok(())
            }
            Err(source) => {
                {
                    let mut state = self.state.write();
                    state.authenticated = false;
                    state.stage = LoginStage::Failed;
                }
                tracing::error!("[Moonboard] 登录失败: {}", source);
                Err(BoardError::Login {
                    board: BoardType::MoonBoard,
                    source,
                })
            }
        }
    }

    /// 已认证请求
    ///
    /// Cookie 头最后写入，调用方传入的同名头会被覆盖。
    /// `x-responded-json` 中嵌套的 401 会使会话失效。
    pub async fn request<T>(&self, url: &str, options: RequestOptions) -> BoardResult<T>
    where
        T: DeserializeOwned + Default,
    {
        if !self.is_authenticated() {
            return Err(BoardError::AuthenticationRequired);
        }

        let target = self.host.join(url)?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(USER_AGENT, HeaderValue::from_static(random_mobile_user_agent()));
        for (name, value) in options.headers.iter() {
            headers.insert(name.clone(), value.clone());
        }
        match self.cookie_header() {
            Some(cookie) => {
                headers.insert(COOKIE, cookie);
            }
            None => {
                headers.remove(COOKIE);
            }
        }

        let mut builder = self
            .client
            .request(options.method, target.clone())
            .headers(headers);
        if let Some(body) = options.body {
            builder = builder.body(body);
        }
        let response = builder.send().await.map_err(|e| {
            tracing::error!("[Moonboard] 请求失败: {}", e);
            BoardError::Transport(e)
        })?;

        self.merge_cookies(response.headers());
        self.check_responded_json(response.headers())?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            self.revoke_session();
            return Err(BoardError::AuthenticationFailed {
                board: BoardType::MoonBoard,
                reason: format!("HTTP {}", status.as_u16()),
            });
        }
        if !status.is_success() {
            return Err(BoardError::Http {
                status: status.as_u16(),
                url: target.to_string(),
            });
        }

        let text = response.text().await?;
        if text.trim().is_empty() {
            if target.path().eq_ignore_ascii_case(MAP_MARKERS_PATH) {
                tracing::debug!("[Moonboard] GetMapMarkers 返回空响应，视为无数据");
                return Ok(T::default());
            }
            return Err(BoardError::ProtocolViolation(format!(
                "empty response body from {}",
                target.path()
            )));
        }

        let data = serde_json::from_str::<T>(&text)?;
        self.retry_count.store(0, Ordering::SeqCst);
        Ok(data)
    }

    /// 检查 ASP.NET 在 `x-responded-json` 中嵌套的状态码
    fn check_responded_json(&self, headers: &HeaderMap) -> BoardResult<()> {
        let Some(raw) = headers.get(RESPONDED_JSON_HEADER) else {
            return Ok(());
        };
        let nested: serde_json::Value = raw
            .to_str()
            .ok()
            .and_then(|s| serde_json::from_str(s).ok())
            .ok_or_else(|| {
                BoardError::ProtocolViolation(format!(
                    "failed to parse {RESPONDED_JSON_HEADER} header"
                ))
            })?;

        if nested.get("status").and_then(|s| s.as_u64()) == Some(401) {
            tracing::error!("[Moonboard] 响应头嵌套状态 401，认证失败");
            self.revoke_session();
            return Err(BoardError::AuthenticationFailed {
                board: BoardType::MoonBoard,
                reason: format!("{RESPONDED_JSON_HEADER} status 401"),
            });
        }
        Ok(())
    }

    /// 地图标记（场馆）列表
    pub async fn map_markers(&self) -> BoardResult<Vec<MoonboardPin>> {
        let options = RequestOptions::get().header("X-Requested-With", "XMLHttpRequest");
        self.request::<Vec<MoonboardPin>>(MAP_MARKERS_PATH, options)
            .await
            .map_err(|e| e.context("Failed to fetch Moonboard map markers"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const LOGIN_PAGE: &str = r#"<html><body>
<form action="/Account/Login" id="frmLogin" method="post">
  <input name="__RequestVerificationToken" type="hidden" value="tok-abc" />
  <input name="form_key" type="hidden" value="key-123" />
</form></body></html>"#;

    fn client_for(server: &MockServer) -> MoonboardClient {
        MoonboardClient::new(&MoonboardConfig {
            host: server.uri(),
            timeout_secs: 5,
        })
        .unwrap()
    }

    async fn mount_login_page(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/account/login"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(LOGIN_PAGE)
                    .append_header("Set-Cookie", "ASP.NET_SessionId=s1; path=/; HttpOnly")
                    .append_header("Set-Cookie", "__RequestVerificationToken=c1; path=/"),
            )
            .mount(server)
            .await;
    }

    /// 登录页 -> 302 -> 200 的完整成功流程
    async fn mount_successful_login(server: &MockServer) {
        mount_login_page(server).await;
        Mock::given(method("POST"))
            .and(path("/Account/login"))
            .and(header("content-type", "application/x-www-form-urlencoded"))
            .and(header("cookie", "ASP.NET_SessionId=s1; __RequestVerificationToken=c1"))
            .and(body_string_contains("Login.Username=climber"))
            .and(body_string_contains("__RequestVerificationToken=tok-abc"))
            .and(body_string_contains("form_key=key-123"))
            .respond_with(
                ResponseTemplate::new(302)
                    .insert_header("Location", "/Dashboard")
                    .append_header("Set-Cookie", ".ASPXAUTH=auth1; path=/; HttpOnly")
                    .append_header("Set-Cookie", "ASP.NET_SessionId=s2; path=/"),
            )
            .expect(1)
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/Dashboard"))
            .and(header(
                "cookie",
                "ASP.NET_SessionId=s2; __RequestVerificationToken=c1; .ASPXAUTH=auth1",
            ))
            .respond_with(ResponseTemplate::new(200).append_header("Set-Cookie", "dash=1; path=/"))
            .expect(1)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_login_with_redirect_merges_cookies() {
        let server = MockServer::start().await;
        mount_successful_login(&server).await;

        let client = client_for(&server);
        client.authenticate("climber", "pw").await.unwrap();

        let snapshot = client.session_snapshot();
        assert!(snapshot.authenticated);
        assert_eq!(snapshot.stage, LoginStage::Authenticated);
        assert_eq!(
            snapshot.cookie_names,
            vec!["ASP.NET_SessionId", "__RequestVerificationToken", ".ASPXAUTH", "dash"]
        );
    }

    /// 不解析 HTML 的固定解析器
    struct FixedParser;

    impl LoginPageParser for FixedParser {
        fn extract_form_fields(&self, _html: &str) -> Result<CsrfTokens, LoginError> {
            Ok(CsrfTokens {
                verification_token: "fixed-tok".to_string(),
                form_key: "fixed-key".to_string(),
            })
        }

        fn find_error_message(&self, html: &str) -> Option<String> {
            html.contains("REJECTED").then(|| "rejected by fixed parser".to_string())
        }
    }

    #[tokio::test]
    async fn test_custom_parser_drives_login() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/account/login"))
            .respond_with(ResponseTemplate::new(200).set_body_string("no form here"))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/Account/login"))
            .and(body_string_contains("__RequestVerificationToken=fixed-tok"))
            .and(body_string_contains("form_key=fixed-key"))
            .respond_with(ResponseTemplate::new(302).insert_header("Location", "/Dashboard"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/Dashboard"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = client_for(&server).with_parser(Arc::new(FixedParser));
        client.authenticate("climber", "pw").await.unwrap();
        assert!(client.is_authenticated());
        assert_eq!(client.login_stage(), LoginStage::Authenticated);
    }

    #[tokio::test]
    async fn test_custom_parser_error_message() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/account/login"))
            .respond_with(ResponseTemplate::new(200).set_body_string("no form here"))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/Account/login"))
            .respond_with(ResponseTemplate::new(200).set_body_string("REJECTED"))
            .mount(&server)
            .await;

        let client = client_for(&server).with_parser(Arc::new(FixedParser));
        let err = client.authenticate("climber", "pw").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AuthenticationFailed);
        assert!(err
            .login_error()
            .is_some_and(|e| e.is_invalid_credentials()));
        assert!(!client.is_authenticated());
        assert_eq!(client.login_stage(), LoginStage::Failed);
    }

    #[tokio::test]
    async fn test_map_markers_before_authenticate() {
        let server = MockServer::start().await;
        let client = client_for(&server);

        let err = client.map_markers().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AuthenticationFailed);
        assert!(matches!(err.root(), BoardError::AuthenticationRequired));
        assert!(err.to_string().contains("Failed to fetch Moonboard map markers"));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_map_markers_empty_body_is_empty_list() {
        let server = MockServer::start().await;
        mount_successful_login(&server).await;
        Mock::given(method("GET"))
            .and(path("/MoonBoard/GetMapMarkers"))
            .and(header("x-requested-with", "XMLHttpRequest"))
            .and(header(
                "cookie",
                "ASP.NET_SessionId=s2; __RequestVerificationToken=c1; .ASPXAUTH=auth1; dash=1",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_string(""))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        client.authenticate("climber", "pw").await.unwrap();
        let markers = client.map_markers().await.unwrap();
        assert!(markers.is_empty());
    }

    #[tokio::test]
    async fn test_map_markers_parses_pins() {
        let server = MockServer::start().await;
        mount_successful_login(&server).await;
        Mock::given(method("GET"))
            .and(path("/MoonBoard/GetMapMarkers"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"Name": "Wall Gym", "Description": "LED board", "Image": "", "Latitude": 51.5,
                 "Longitude": -0.1, "IsCommercial": true, "IsLed": true, "LatLng": [51.5, -0.1]}
            ])))
            .mount(&server)
            .await;

        let client = client_for(&server);
        client.authenticate("climber", "pw").await.unwrap();
        let markers = client.map_markers().await.unwrap();
        assert_eq!(markers.len(), 1);
        assert_eq!(markers[0].name, "Wall Gym");
        assert_eq!(client.retry_count(), 0);
    }

    #[tokio::test]
    async fn test_credential_error_markup_fails_login() {
        let server = MockServer::start().await;
        mount_login_page(&server).await;
        Mock::given(method("POST"))
            .and(path("/Account/login"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<div class="validation-summary-errors"><ul><li>Invalid username or password</li></ul></div>"#,
            ))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client.authenticate("climber", "wrong").await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::AuthenticationFailed);
        assert!(err.login_error().is_some_and(LoginError::is_invalid_credentials));
        assert!(!client.is_authenticated());
        assert_eq!(client.login_stage(), LoginStage::Failed);
        // 即使已经收到 Cookie，失败的登录也不可用
        assert!(!client.session_snapshot().cookie_names.is_empty());
        let err = client.map_markers().await.unwrap_err();
        assert!(matches!(err.root(), BoardError::AuthenticationRequired));
    }

    #[tokio::test]
    async fn test_redirect_to_invalid_token_page() {
        let server = MockServer::start().await;
        mount_login_page(&server).await;
        Mock::given(method("POST"))
            .and(path("/Account/login"))
            .respond_with(ResponseTemplate::new(302).insert_header("Location", "/Error/InvalidToken"))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client.authenticate("climber", "pw").await.unwrap_err();
        assert!(err.login_error().is_some_and(LoginError::is_invalid_token));
        assert!(!client.is_authenticated());
    }

    #[tokio::test]
    async fn test_redirect_target_failure_is_fatal() {
        let server = MockServer::start().await;
        mount_login_page(&server).await;
        Mock::given(method("POST"))
            .and(path("/Account/login"))
            .respond_with(ResponseTemplate::new(302).insert_header("Location", "/Dashboard"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/Dashboard"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client.authenticate("climber", "pw").await.unwrap_err();
        assert!(matches!(
            err.login_error(),
            Some(LoginError::RedirectFailed { status: 500, .. })
        ));
        assert!(!client.is_authenticated());
    }

    #[tokio::test]
    async fn test_missing_login_form() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/account/login"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client.authenticate("climber", "pw").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProtocolViolation);
        assert!(matches!(err.login_error(), Some(LoginError::MissingLoginForm)));
        assert_eq!(client.login_stage(), LoginStage::Failed);
    }

    #[tokio::test]
    async fn test_login_page_non_200() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/account/login"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client.authenticate("climber", "pw").await.unwrap_err();
        assert!(matches!(err.login_error(), Some(LoginError::LoginPageStatus(503))));
    }

    #[tokio::test]
    async fn test_nested_401_revokes_session() {
        let server = MockServer::start().await;
        mount_successful_login(&server).await;
        Mock::given(method("GET"))
            .and(path("/MoonBoard/GetMapMarkers"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("x-responded-json", r#"{"status":401,"headers":{"location":"/account/login"}}"#)
                    .set_body_string("[]"),
            )
            .mount(&server)
            .await;

        let client = client_for(&server);
        client.authenticate("climber", "pw").await.unwrap();
        let err = client.map_markers().await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::AuthenticationFailed);
        assert!(!err.to_string().contains("rate limited"));
        let snapshot = client.session_snapshot();
        assert!(!snapshot.authenticated);
        assert_eq!(snapshot.stage, LoginStage::Unauthenticated);
        assert!(snapshot.cookie_names.is_empty());
    }

    #[tokio::test]
    async fn test_unparseable_nested_header_keeps_session() {
        let server = MockServer::start().await;
        mount_successful_login(&server).await;
        Mock::given(method("GET"))
            .and(path("/MoonBoard/GetMapMarkers"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("x-responded-json", "not json")
                    .set_body_string("[]"),
            )
            .mount(&server)
            .await;

        let client = client_for(&server);
        client.authenticate("climber", "pw").await.unwrap();
        let err = client.map_markers().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProtocolViolation);
        assert!(client.is_authenticated());
    }

    #[tokio::test]
    async fn test_empty_body_elsewhere_is_fatal() {
        let server = MockServer::start().await;
        mount_successful_login(&server).await;
        Mock::given(method("GET"))
            .and(path("/MoonBoard/GetProblems"))
            .respond_with(ResponseTemplate::new(200).set_body_string("  "))
            .mount(&server)
            .await;

        let client = client_for(&server);
        client.authenticate("climber", "pw").await.unwrap();
        let err = client
            .request::<Vec<serde_json::Value>>("/MoonBoard/GetProblems", RequestOptions::get())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProtocolViolation);
    }

    #[tokio::test]
    async fn test_caller_cannot_override_cookie_header() {
        let server = MockServer::start().await;
        mount_successful_login(&server).await;
        Mock::given(method("GET"))
            .and(path("/MoonBoard/Profile"))
            .and(header(
                "cookie",
                "ASP.NET_SessionId=s2; __RequestVerificationToken=c1; .ASPXAUTH=auth1; dash=1",
            ))
            .and(header("x-custom", "yes"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        client.authenticate("climber", "pw").await.unwrap();
        let options = RequestOptions::get()
            .header("Cookie", "evil=1")
            .header("X-Custom", "yes");
        let value: serde_json::Value = client.request("/MoonBoard/Profile", options).await.unwrap();
        assert_eq!(value["ok"], true);
    }
}
