//! GeoJSON 转换服务
//!
//! `data/{board}.json` -> `geojson/{board}.geojson`，
//! 再把所有 board 合并为 `geojson/combined.geojson`。

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;

use crate::converter::geojson::{combine, pins_to_feature_collection, FeatureCollection};
use crate::error::{ConvertError, StorageError};
use crate::models::board::BoardType;
use crate::storage::DataStore;

#[derive(Debug, Clone, Serialize)]
pub struct ConvertOutcome {
    pub board: BoardType,
    pub features: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConvertReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub boards: Vec<ConvertOutcome>,
}

impl ConvertReport {
    pub fn failed(&self) -> Vec<BoardType> {
        self.boards
            .iter()
            .filter(|o| o.error.is_some())
            .map(|o| o.board)
            .collect()
    }

    pub fn has_failures(&self) -> bool {
        self.boards.iter().any(|o| o.error.is_some())
    }
}

/// 合并结果
#[derive(Debug, Clone, Serialize)]
pub struct CombineSummary {
    pub path: PathBuf,
    pub features: usize,
    /// 没有 geojson 文件而被跳过的 board
    pub skipped: Vec<BoardType>,
}

pub struct GeoJsonService {
    store: DataStore,
}

impl GeoJsonService {
    pub fn new(store: DataStore) -> Self {
        Self { store }
    }

    /// 转换单个 board
    pub fn convert(&self, board: BoardType) -> Result<usize, ConvertError> {
        let data = self.store.load_pins(board)?;
        let collection = pins_to_feature_collection(&data)?;
        let path = self.store.save_geojson(board, &collection)?;
        tracing::info!(
            "[GeoJSON] {} 转换完成: {} 个 feature -> {}",
            board,
            collection.len(),
            path.display()
        );
        Ok(collection.len())
    }

    /// 转换所有 board，失败的 board 记录在报告中
    pub fn convert_all(&self) -> ConvertReport {
        let started_at = Utc::now();
        let boards = BoardType::ALL
            .iter()
            .map(|&board| match self.convert(board) {
                Ok(features) => ConvertOutcome {
                    board,
                    features,
                    error: None,
                },
                Err(e) => {
                    tracing::error!("[GeoJSON] {} 转换失败: {}", board, e);
                    ConvertOutcome {
                        board,
                        features: 0,
                        error: Some(e.to_string()),
                    }
                }
            })
            .collect();

        ConvertReport {
            started_at,
            finished_at: Utc::now(),
            boards,
        }
    }

    /// 合并所有已有的 board GeoJSON 并添加展示样式
    pub fn combine_all(&self) -> Result<CombineSummary, StorageError> {
        let mut collections: Vec<(BoardType, FeatureCollection)> = Vec::new();
        let mut skipped = Vec::new();
        for &board in BoardType::ALL.iter() {
            match self.store.load_geojson(board)? {
                Some(collection) => collections.push((board, collection)),
                None => {
                    tracing::warn!("[GeoJSON] {} 没有 GeoJSON 文件，跳过", board);
                    skipped.push(board);
                }
            }
        }

        let combined = combine(collections);
        let path = self.store.save_combined(&combined)?;
        tracing::info!(
            "[GeoJSON] 合并完成: {} 个 feature -> {}",
            combined.len(),
            path.display()
        );
        Ok(CombineSummary {
            path,
            features: combined.len(),
            skipped,
        })
    }
}
