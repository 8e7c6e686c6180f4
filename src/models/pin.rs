//! Pin（场馆位置）数据模型

use serde::{Deserialize, Serialize};

use super::user::Wall;

/// Aurora 系 API 返回的公开场馆
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuroraPin {
    pub id: u64,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// `/v1/pins?types=gym` 的响应体
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PinsResponse {
    #[serde(default)]
    pub gyms: Vec<AuroraPin>,
}

/// Moonboard 地图标记（字段沿用 PascalCase）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MoonboardPin {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub is_commercial: bool,
    #[serde(default)]
    pub is_led: bool,
    #[serde(default)]
    pub lat_lng: Option<[f64; 2]>,
}

/// 12Climb KML 中的场馆
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TwelveClimbPin {
    pub name: String,
    pub description: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// 带墙体信息的 Aurora 场馆
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PinWithWalls {
    #[serde(flatten)]
    pub pin: AuroraPin,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub walls: Option<Vec<Wall>>,
}

impl From<AuroraPin> for PinWithWalls {
    fn from(pin: AuroraPin) -> Self {
        Self { pin, walls: None }
    }
}

/// `data/{board}.json` 的文件结构
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PinsFile<T> {
    pub gyms: Vec<T>,
}

impl<T> PinsFile<T> {
    pub fn new(gyms: Vec<T>) -> Self {
        Self { gyms }
    }

    pub fn len(&self) -> usize {
        self.gyms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gyms.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_moonboard_pin_pascal_case() {
        let json = r#"{"Name":"Gym","Description":"d","Image":"/i.png","Latitude":51.5,"Longitude":-0.1,"IsCommercial":true,"IsLed":false,"LatLng":[51.5,-0.1],"Extra":1}"#;
        let pin: MoonboardPin = serde_json::from_str(json).unwrap();
        assert_eq!(pin.name, "Gym");
        assert!(pin.is_commercial);
        assert_eq!(pin.lat_lng, Some([51.5, -0.1]));
    }

    #[test]
    fn test_pin_with_walls_flattens() {
        let pin = AuroraPin {
            id: 7,
            username: "gym7".into(),
            name: "Gym Seven".into(),
            latitude: 1.0,
            longitude: 2.0,
        };
        let value = serde_json::to_value(PinWithWalls::from(pin)).unwrap();
        assert_eq!(value["id"], 7);
        assert_eq!(value["name"], "Gym Seven");
        assert!(value.get("walls").is_none());
    }
}
