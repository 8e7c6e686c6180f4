//! 业务服务模块
//!
//! 抓取与 GeoJSON 转换的编排逻辑

mod geojson_service;
mod scrape_service;

pub use geojson_service::{CombineSummary, ConvertOutcome, ConvertReport, GeoJsonService};
pub use scrape_service::{
    AuroraSource, BoardOutcome, MoonboardSource, PinSource, ScrapeReport, ScrapeService,
    TwelveClimbSource,
};
