//! 本地数据存储
//!
//! 目录结构：
//! - `data/{board}.json`：抓取到的原始场馆数据
//! - `geojson/{board}.geojson`：单个 board 的 GeoJSON
//! - `geojson/combined.geojson`：合并后的 GeoJSON

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::converter::geojson::FeatureCollection;
use crate::error::StorageError;
use crate::models::board::BoardType;

const DATA_DIR: &str = "data";
const GEOJSON_DIR: &str = "geojson";
const COMBINED_FILE: &str = "combined.geojson";

pub struct DataStore {
    /// 存储根目录
    base_dir: PathBuf,
}

impl DataStore {
    /// 使用指定目录创建存储，子目录在写入时按需创建
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn data_path(&self, board: BoardType) -> PathBuf {
        self.base_dir.join(DATA_DIR).join(format!("{}.json", board.key()))
    }

    pub fn geojson_path(&self, board: BoardType) -> PathBuf {
        self.base_dir
            .join(GEOJSON_DIR)
            .join(format!("{}.geojson", board.key()))
    }

    pub fn combined_path(&self) -> PathBuf {
        self.base_dir.join(GEOJSON_DIR).join(COMBINED_FILE)
    }

    fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StorageError> {
        let path_str = path.display().to_string();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| StorageError::Io {
                path: parent.display().to_string(),
                source,
            })?;
        }
        let content = serde_json::to_string_pretty(value).map_err(|source| StorageError::Json {
            path: path_str.clone(),
            source,
        })?;
        fs::write(path, content).map_err(|source| StorageError::Io {
            path: path_str.clone(),
            source,
        })?;
        tracing::debug!("[DataStore] 已写入 {}", path_str);
        Ok(())
    }

    fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, StorageError> {
        let path_str = path.display().to_string();
        let content = fs::read_to_string(path).map_err(|source| StorageError::Io {
            path: path_str.clone(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| StorageError::Json {
            path: path_str,
            source,
        })
    }

    /// 写入 `data/{board}.json`
    pub fn save_pins<T: Serialize + ?Sized>(
        &self,
        board: BoardType,
        data: &T,
    ) -> Result<PathBuf, StorageError> {
        let path = self.data_path(board);
        Self::write_json(&path, data)?;
        Ok(path)
    }

    /// 读取 `data/{board}.json` 的原始 JSON
    pub fn load_pins(&self, board: BoardType) -> Result<serde_json::Value, StorageError> {
        Self::read_json(&self.data_path(board))
    }

    pub fn save_geojson(
        &self,
        board: BoardType,
        collection: &FeatureCollection,
    ) -> Result<PathBuf, StorageError> {
        let path = self.geojson_path(board);
        Self::write_json(&path, collection)?;
        Ok(path)
    }

    /// 文件不存在时返回 None
    pub fn load_geojson(&self, board: BoardType) -> Result<Option<FeatureCollection>, StorageError> {
        let path = self.geojson_path(board);
        if !path.exists() {
            return Ok(None);
        }
        Self::read_json(&path).map(Some)
    }

    pub fn save_combined(&self, collection: &FeatureCollection) -> Result<PathBuf, StorageError> {
        let path = self.combined_path();
        Self::write_json(&path, collection)?;
        Ok(path)
    }
}
