//! 场馆数据抓取服务
//!
//! 按 board 依次抓取场馆并写入 `data/{board}.json`。
//! 单个 board 失败只记录到报告中，不中断其余 board。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

use crate::config::{AccountCredentials, AppConfig, Credentials};
use crate::error::BoardResult;
use crate::models::board::{BoardProtocol, BoardType};
use crate::models::pin::{AuroraPin, MoonboardPin, PinWithWalls, PinsFile};
use crate::providers::aurora::{AuroraClient, RetryPolicy};
use crate::providers::moonboard::MoonboardClient;
use crate::providers::twelve_climb::TwelveClimbClient;
use crate::session::RateLimiterRegistry;
use crate::storage::DataStore;

/// 单个 board 的场馆数据来源
#[async_trait]
pub trait PinSource: Send + Sync {
    fn board(&self) -> BoardType;

    /// 返回要写入 `data/{board}.json` 的内容（`{ "gyms": [...] }`）
    async fn fetch(&self, credentials: &Credentials) -> BoardResult<Value>;
}

fn to_pins_value<T: Serialize>(gyms: Vec<T>) -> BoardResult<Value> {
    Ok(serde_json::to_value(PinsFile::new(gyms))?)
}

/// Aurora 协议 board
pub struct AuroraSource {
    client: AuroraClient,
}

impl AuroraSource {
    pub fn new(client: AuroraClient) -> Self {
        Self { client }
    }

    async fn with_walls(&self, pins: Vec<AuroraPin>, token: &str) -> Vec<PinWithWalls> {
        let lookups = pins.into_iter().map(|pin| async move {
            match self.client.user(pin.id, token).await {
                Ok(Some(response)) => PinWithWalls {
                    pin,
                    walls: Some(response.user.walls),
                },
                Ok(None) => PinWithWalls::from(pin),
                Err(e) => {
                    tracing::warn!(
                        "[Scrape] {} 场馆 {} 墙体获取失败: {}",
                        self.client.board(),
                        pin.id,
                        e
                    );
                    PinWithWalls::from(pin)
                }
            }
        });
        join_all(lookups).await
    }
}

#[async_trait]
impl PinSource for AuroraSource {
    fn board(&self) -> BoardType {
        self.client.board()
    }

    async fn fetch(&self, credentials: &Credentials) -> BoardResult<Value> {
        let board = self.client.board();
        let pins = self.client.pins(None).await?.gyms;
        tracing::info!("[Scrape] {} 获取到 {} 个场馆", board, pins.len());

        let account = match &credentials.aurora {
            Some(account) if !pins.is_empty() => account,
            _ => return to_pins_value(pins),
        };

        let login = match self.client.login(&account.username, &account.password).await {
            Ok(login) => login,
            Err(e) => {
                tracing::error!("[Scrape] {} 登录失败，只保存场馆列表: {}", board, e);
                return to_pins_value(pins);
            }
        };

        let gyms = self.with_walls(pins, &login.token).await;
        let with_walls = gyms.iter().filter(|g| g.walls.is_some()).count();
        tracing::info!("[Scrape] {} 共 {} 个场馆带墙体信息", board, with_walls);
        to_pins_value(gyms)
    }
}

/// Moonboard，任何失败都降级为空列表
pub struct MoonboardSource {
    client: MoonboardClient,
}

impl MoonboardSource {
    pub fn new(client: MoonboardClient) -> Self {
        Self { client }
    }

    async fn markers(&self, account: &AccountCredentials) -> BoardResult<Vec<MoonboardPin>> {
        if !self.client.is_authenticated() {
            self.client
                .authenticate(&account.username, &account.password)
                .await?;
        }
        self.client.map_markers().await
    }
}

#[async_trait]
impl PinSource for MoonboardSource {
    fn board(&self) -> BoardType {
        BoardType::MoonBoard
    }

    async fn fetch(&self, credentials: &Credentials) -> BoardResult<Value> {
        let Some(account) = &credentials.moonboard else {
            tracing::warn!("[Scrape] 未配置 Moonboard 凭证，写入空列表");
            return to_pins_value(Vec::<Value>::new());
        };

        match self.markers(account).await {
            Ok(pins) => {
                tracing::info!("[Scrape] moonboard 获取到 {} 个场馆", pins.len());
                to_pins_value(pins)
            }
            Err(e) => {
                tracing::error!("[Scrape] moonboard 获取失败 ({}): {}", e.kind(), e);
                to_pins_value(Vec::<Value>::new())
            }
        }
    }
}

/// 12Climb KML 数据源
pub struct TwelveClimbSource {
    client: TwelveClimbClient,
}

impl TwelveClimbSource {
    pub fn new(client: TwelveClimbClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PinSource for TwelveClimbSource {
    fn board(&self) -> BoardType {
        BoardType::TwelveClimb
    }

    async fn fetch(&self, _credentials: &Credentials) -> BoardResult<Value> {
        to_pins_value(self.client.pins().await?)
    }
}

/// 单个 board 的抓取结果
#[derive(Debug, Clone, Serialize)]
pub struct BoardOutcome {
    pub board: BoardType,
    pub gyms: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BoardOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScrapeReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub boards: Vec<BoardOutcome>,
}

impl ScrapeReport {
    pub fn failed(&self) -> Vec<BoardType> {
        self.boards
            .iter()
            .filter(|o| !o.is_success())
            .map(|o| o.board)
            .collect()
    }

    pub fn total_gyms(&self) -> usize {
        self.boards.iter().map(|o| o.gyms).sum()
    }
}

/// 抓取服务
pub struct ScrapeService {
    store: DataStore,
    sources: Vec<Box<dyn PinSource>>,
}

impl ScrapeService {
    /// 按配置为指定 board 创建数据源，所有 Aurora 客户端共享同一个限流器
    pub fn new(config: &AppConfig, boards: &[BoardType]) -> BoardResult<Self> {
        let limiter = Arc::new(RateLimiterRegistry::new(&config.rate_limit));
        let retry = RetryPolicy::from(&config.retry);

        let mut sources: Vec<Box<dyn PinSource>> = Vec::with_capacity(boards.len());
        for &board in boards {
            let source: Box<dyn PinSource> = match board.protocol() {
                BoardProtocol::Aurora => {
                    let client = AuroraClient::new(board, limiter.clone(), &config.aurora)?
                        .with_retry_policy(retry);
                    Box::new(AuroraSource::new(client))
                }
                BoardProtocol::MoonboardSession => {
                    Box::new(MoonboardSource::new(MoonboardClient::new(&config.moonboard)?))
                }
                BoardProtocol::Kml => Box::new(TwelveClimbSource::new(TwelveClimbClient::new(
                    &config.twelve_climb,
                )?)),
            };
            sources.push(source);
        }

        Ok(Self::with_sources(
            DataStore::with_base_dir(&config.output_dir),
            sources,
        ))
    }

    pub fn with_sources(store: DataStore, sources: Vec<Box<dyn PinSource>>) -> Self {
        Self { store, sources }
    }

    pub fn boards(&self) -> Vec<BoardType> {
        self.sources.iter().map(|s| s.board()).collect()
    }

    async fn scrape_one(
        &self,
        source: &dyn PinSource,
        credentials: &Credentials,
    ) -> Result<usize, String> {
        let board = source.board();
        let data = source
            .fetch(credentials)
            .await
            .map_err(|e| format!("[{}] {}", e.kind(), e))?;
        let gyms = data
            .get("gyms")
            .and_then(Value::as_array)
            .map_or(0, Vec::len);
        let path = self
            .store
            .save_pins(board, &data)
            .map_err(|e| e.to_string())?;
        tracing::info!("[Scrape] {} 已保存 {} 个场馆到 {}", board, gyms, path.display());
        Ok(gyms)
    }

    /// 依次抓取所有 board
    pub async fn scrape_all(&self, credentials: &Credentials) -> ScrapeReport {
        let started_at = Utc::now();
        let mut boards = Vec::with_capacity(self.sources.len());

        for source in &self.sources {
            let board = source.board();
            tracing::info!("[Scrape] 开始抓取 {}", board);
            let outcome = match self.scrape_one(source.as_ref(), credentials).await {
                Ok(gyms) => BoardOutcome {
                    board,
                    gyms,
                    error: None,
                },
                Err(e) => {
                    tracing::error!("[Scrape] {} 抓取失败: {}", board, e);
                    BoardOutcome {
                        board,
                        gyms: 0,
                        error: Some(e),
                    }
                }
            };
            boards.push(outcome);
        }

        let report = ScrapeReport {
            started_at,
            finished_at: Utc::now(),
            boards,
        };
        tracing::info!(
            "[Scrape] 完成: {} 个 board，{} 个场馆，{} 个失败",
            report.boards.len(),
            report.total_gyms(),
            report.failed().len()
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AuroraConfig, MoonboardConfig};
    use crate::error::BoardError;
    use serde_json::json;
    use tempfile::TempDir;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct FailingSource;

    #[async_trait]
    impl PinSource for FailingSource {
        fn board(&self) -> BoardType {
            BoardType::DecoyBoardApp
        }

        async fn fetch(&self, _credentials: &Credentials) -> BoardResult<Value> {
            Err(BoardError::Http {
                status: 500,
                url: "https://decoyboardapp.com/v1/pins".to_string(),
            })
        }
    }

    fn aurora_source(server: &MockServer) -> AuroraSource {
        let limiter = Arc::new(RateLimiterRegistry::default());
        let client = AuroraClient::new(BoardType::KilterBoardApp, limiter, &AuroraConfig::default())
            .unwrap()
            .with_base_url(&server.uri())
            .unwrap();
        AuroraSource::new(client)
    }

    fn aurora_credentials() -> Credentials {
        Credentials {
            aurora: Some(AccountCredentials::new("climber", "secret")),
            moonboard: None,
        }
    }

    async fn mount_pins(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/v1/pins"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"gyms": [
                {"id": 1, "username": "g1", "name": "One", "latitude": 1.0, "longitude": 2.0},
                {"id": 2, "username": "g2", "name": "Two", "latitude": 3.0, "longitude": 4.0}
            ]})))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_aurora_source_adds_walls() {
        let server = MockServer::start().await;
        mount_pins(&server).await;
        Mock::given(method("POST"))
            .and(path("/v1/logins"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "t0k"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v2/users/1"))
            .and(header("authorization", "Bearer t0k"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"user": {
                "id": 1, "username": "g1",
                "walls": [{"uuid": "w1", "name": "Main"}]
            }})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v2/users/2"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let value = aurora_source(&server)
            .fetch(&aurora_credentials())
            .await
            .unwrap();

        assert_eq!(value["gyms"][0]["walls"][0]["name"], "Main");
        assert_eq!(value["gyms"][0]["name"], "One");
        assert!(value["gyms"][1].get("walls").is_none());
    }

    #[tokio::test]
    async fn test_aurora_source_failed_login_keeps_pins() {
        let server = MockServer::start().await;
        mount_pins(&server).await;
        Mock::given(method("POST"))
            .and(path("/v1/logins"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        let value = aurora_source(&server)
            .fetch(&aurora_credentials())
            .await
            .unwrap();
        assert_eq!(value["gyms"].as_array().unwrap().len(), 2);
        assert!(value["gyms"][0].get("walls").is_none());
    }

    #[tokio::test]
    async fn test_aurora_source_without_credentials_skips_login() {
        let server = MockServer::start().await;
        mount_pins(&server).await;
        Mock::given(method("POST"))
            .and(path("/v1/logins"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let value = aurora_source(&server)
            .fetch(&Credentials::default())
            .await
            .unwrap();
        assert_eq!(value["gyms"][1]["username"], "g2");
    }

    #[tokio::test]
    async fn test_scrape_all_continues_after_failure() {
        let server = MockServer::start().await;
        mount_pins(&server).await;
        let temp = TempDir::new().unwrap();

        let moonboard = MoonboardClient::new(&MoonboardConfig {
            host: server.uri(),
            ..MoonboardConfig::default()
        })
        .unwrap();
        let sources: Vec<Box<dyn PinSource>> = vec![
            Box::new(FailingSource),
            Box::new(aurora_source(&server)),
            Box::new(MoonboardSource::new(moonboard)),
        ];
        let service = ScrapeService::with_sources(DataStore::with_base_dir(temp.path()), sources);

        let report = service.scrape_all(&Credentials::default()).await;

        assert_eq!(report.failed(), vec![BoardType::DecoyBoardApp]);
        assert_eq!(report.boards[1].gyms, 2);
        assert_eq!(report.boards[2].gyms, 0);
        assert!(report.boards[2].is_success());
        assert_eq!(report.total_gyms(), 2);
        assert!(report.finished_at >= report.started_at);

        let store = DataStore::with_base_dir(temp.path());
        assert_eq!(store.load_pins(BoardType::MoonBoard).unwrap(), json!({"gyms": []}));
        assert!(store.load_pins(BoardType::KilterBoardApp).is_ok());
        assert!(store.load_pins(BoardType::DecoyBoardApp).is_err());
    }
}
