//! 数据格式转换模块
//!
//! - KML -> 12Climb 场馆
//! - 场馆 JSON -> GeoJSON

pub mod geojson;
pub mod kml;

pub use geojson::{combine, pins_to_feature_collection, style_feature, Feature, FeatureCollection, Geometry};
pub use kml::{clean_description, parse_placemarks};
