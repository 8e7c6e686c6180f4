//! 12Climb Provider - Google My Maps KML 数据源
//!
//! 公开数据，不需要登录，也不经过限流器。

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::Client;
use std::time::Duration;

use super::user_agent::random_mobile_user_agent;
use crate::config::KmlConfig;
use crate::converter::kml::parse_placemarks;
use crate::error::{BoardError, BoardResult};
use crate::models::pin::TwelveClimbPin;

pub struct TwelveClimbClient {
    client: Client,
    kml_url: String,
}

impl TwelveClimbClient {
    pub fn new(config: &KmlConfig) -> BoardResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(random_mobile_user_agent()));
        headers.insert(ACCEPT, HeaderValue::from_static("application/xml, text/xml, */*"));

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            kml_url: config.kml_url.clone(),
        })
    }

    pub fn kml_url(&self) -> &str {
        &self.kml_url
    }

    /// 下载 KML 并解析为场馆列表
    pub async fn pins(&self) -> BoardResult<Vec<TwelveClimbPin>> {
        tracing::info!("[12Climb] 下载 KML: {}", self.kml_url);
        let response = self.client.get(&self.kml_url).send().await?;
        let status = response.status();
        if !status.is_success() {
            tracing::error!("[12Climb] KML 下载失败: HTTP {}", status);
            return Err(BoardError::Http {
                status: status.as_u16(),
                url: self.kml_url.clone(),
            });
        }

        let kml = response.text().await?;
        let pins = parse_placemarks(&kml);
        tracing::info!("[12Climb] 解析到 {} 个场馆", pins.len());
        Ok(pins)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{headers, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_pins_from_kml_feed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/maps/d/kml"))
            .and(query_param("forcekml", "1"))
            .and(headers("accept", vec!["application/xml", "text/xml", "*/*"]))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "<kml><Placemark><name><![CDATA[Gym]]></name><coordinates>1.5,2.5,0</coordinates></Placemark></kml>",
            ))
            .mount(&server)
            .await;

        let client = TwelveClimbClient::new(&KmlConfig {
            kml_url: format!("{}/maps/d/kml?mid=abc&forcekml=1", server.uri()),
            timeout_secs: 5,
        })
        .unwrap();
        let pins = client.pins().await.unwrap();
        assert_eq!(pins.len(), 1);
        assert_eq!(pins[0].latitude, 2.5);
    }

    #[tokio::test]
    async fn test_http_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = TwelveClimbClient::new(&KmlConfig {
            kml_url: format!("{}/kml", server.uri()),
            timeout_secs: 5,
        })
        .unwrap();
        let err = client.pins().await.unwrap_err();
        assert!(matches!(err, BoardError::Http { status: 404, .. }));
    }
}
