//! 场馆数据 -> GeoJSON
//!
//! 每个 board 的 `data/{board}.json` 转成 Point FeatureCollection，
//! 合并时按 simplestyle-spec 补齐 `title`、`description` 和 `marker-color`。

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ConvertError;
use crate::models::board::BoardType;

fn feature_collection_type() -> String {
    "FeatureCollection".to_string()
}

fn feature_type() -> String {
    "Feature".to_string()
}

fn point_type() -> String {
    "Point".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    #[serde(rename = "type", default = "point_type")]
    pub kind: String,
    pub coordinates: Vec<f64>,
}

impl Geometry {
    pub fn point(longitude: f64, latitude: f64) -> Self {
        Self {
            kind: point_type(),
            coordinates: vec![longitude, latitude],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    #[serde(rename = "type", default = "feature_type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(default)]
    pub properties: Map<String, Value>,
    pub geometry: Geometry,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureCollection {
    #[serde(rename = "type", default = "feature_collection_type")]
    pub kind: String,
    #[serde(default)]
    pub features: Vec<Feature>,
}

impl Default for FeatureCollection {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl FeatureCollection {
    pub fn new(features: Vec<Feature>) -> Self {
        Self {
            kind: feature_collection_type(),
            features,
        }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

fn coordinate(gym: &Map<String, Value>, lower: &str, upper: &str) -> Option<f64> {
    gym.get(lower)
        .or_else(|| gym.get(upper))
        .and_then(Value::as_f64)
}

fn describe_id(id: Option<&Value>) -> String {
    match id {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => "unknown".to_string(),
    }
}

/// 把 `{ "gyms": [...] }` 转成 FeatureCollection
///
/// 每个场馆需要数值型的 `longitude`/`latitude`（Moonboard 为 `Longitude`/`Latitude`），
/// 整个场馆对象作为 properties，存在 `id` 时作为 feature id。
pub fn pins_to_feature_collection(data: &Value) -> Result<FeatureCollection, ConvertError> {
    let gyms = data
        .get("gyms")
        .and_then(Value::as_array)
        .ok_or(ConvertError::MissingGyms)?;

    let features = gyms
        .iter()
        .map(|gym| {
            let id = gym.get("id");
            let object = gym
                .as_object()
                .ok_or_else(|| ConvertError::InvalidCoordinates(describe_id(id)))?;
            let (Some(longitude), Some(latitude)) = (
                coordinate(object, "longitude", "Longitude"),
                coordinate(object, "latitude", "Latitude"),
            ) else {
                return Err(ConvertError::InvalidCoordinates(describe_id(id)));
            };
            Ok(Feature {
                kind: feature_type(),
                id: id.cloned(),
                properties: object.clone(),
                geometry: Geometry::point(longitude, latitude),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(FeatureCollection::new(features))
}

fn non_empty_str<'a>(properties: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    properties
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

/// 为单个 feature 补齐展示属性
pub fn style_feature(board: BoardType, mut feature: Feature) -> Feature {
    let properties = &feature.properties;
    let name = non_empty_str(properties, "name")
        .or_else(|| non_empty_str(properties, "Name"))
        .map(str::to_string);
    let description = non_empty_str(properties, "Description")
        .or_else(|| non_empty_str(properties, "description"))
        .map(str::to_string)
        .unwrap_or_else(|| match &name {
            Some(name) => format!("{} at {}", board.display_name(), name),
            None => board.display_name().to_string(),
        });
    let title = name.unwrap_or_else(|| board.display_name().to_string());

    let properties = &mut feature.properties;
    properties.remove("name");
    properties.remove("Name");
    properties.remove("Description");
    properties.insert("title".to_string(), Value::String(title));
    properties.insert("description".to_string(), Value::String(description));
    properties.insert(
        "marker-color".to_string(),
        Value::String(board.color().to_string()),
    );
    feature
}

/// 合并多个 board 的 FeatureCollection 并应用样式
pub fn combine<I>(collections: I) -> FeatureCollection
where
    I: IntoIterator<Item = (BoardType, FeatureCollection)>,
{
    let features = collections
        .into_iter()
        .flat_map(|(board, collection)| {
            collection
                .features
                .into_iter()
                .map(move |feature| style_feature(board, feature))
        })
        .collect();
    FeatureCollection::new(features)
}
