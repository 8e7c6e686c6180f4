//! Aurora 私有 API 的用户 / 场馆 / 墙体模型
//!
//! 需要登录 token 才能访问。字段尽量宽松，未知字段忽略。

use serde::{Deserialize, Serialize};

/// 墙体
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wall {
    pub uuid: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub user_id: Option<u64>,
    #[serde(default)]
    pub product_id: Option<u64>,
    #[serde(default)]
    pub is_adjustable: bool,
    #[serde(default)]
    pub angle: Option<i64>,
    #[serde(default)]
    pub layout_id: Option<u64>,
    #[serde(default)]
    pub product_size_id: Option<u64>,
    #[serde(default)]
    pub hsm: Option<i64>,
    #[serde(default)]
    pub serial_number: Option<String>,
    #[serde(default)]
    pub is_listed: bool,
    #[serde(default)]
    pub set_ids: Vec<u64>,
}

/// 场馆详情
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Gym {
    #[serde(default)]
    pub user_id: Option<u64>,
    #[serde(default)]
    pub address1: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub email_address: Option<String>,
    #[serde(default)]
    pub homepage_url: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Social {
    #[serde(default)]
    pub followees_accepted: u64,
    #[serde(default)]
    pub followers_accepted: u64,
}

/// 用户（场馆账号）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub avatar_image: Option<String>,
    #[serde(default)]
    pub instagram_username: Option<String>,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub is_verified: bool,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub followee_state: Option<String>,
    #[serde(default)]
    pub gym: Option<Gym>,
    #[serde(default)]
    pub walls: Vec<Wall>,
    #[serde(default)]
    pub social: Option<Social>,
    #[serde(default)]
    pub circuits: Vec<serde_json::Value>,
}

/// `/v2/users/{id}` 的响应体
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserResponse {
    pub user: User,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_response_lenient() {
        let json = r#"{"user":{"id":12,"username":"gym12","walls":[{"uuid":"abc","name":"Main","angle":40,"set_ids":[1,2]}],"unknown":true}}"#;
        let resp: UserResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.user.id, 12);
        assert_eq!(resp.user.walls.len(), 1);
        assert_eq!(resp.user.walls[0].angle, Some(40));
        assert!(resp.user.gym.is_none());
    }
}
