//! YAML 配置加载

use std::path::{Path, PathBuf};

use super::types::AppConfig;
use crate::error::ConfigError;

const CONFIG_DIR_NAME: &str = "boardmap";
const CONFIG_FILE_NAME: &str = "config.yaml";

/// 默认配置文件路径：`{config_dir}/boardmap/config.yaml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

/// 解析 YAML 字符串并校验
pub fn parse_config(content: &str, source: &str) -> Result<AppConfig, ConfigError> {
    let config: AppConfig = if content.trim().is_empty() {
        AppConfig::default()
    } else {
        serde_yaml::from_str(content).map_err(|source_err| ConfigError::Parse {
            path: source.to_string(),
            source: source_err,
        })?
    };
    config.validate().map_err(ConfigError::Invalid)?;
    Ok(config)
}

fn read_config_file(path: &Path) -> Result<AppConfig, ConfigError> {
    let path_str = path.display().to_string();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path_str.clone(),
        source,
    })?;
    parse_config(&content, &path_str)
}

/// 确定要读取的配置文件
///
/// 显式指定的路径必须存在；否则返回存在的默认路径，都没有时返回 None。
pub fn resolve_config_path(path: Option<&Path>) -> Result<Option<PathBuf>, ConfigError> {
    if let Some(path) = path {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        return Ok(Some(path.to_path_buf()));
    }
    Ok(default_config_path().filter(|p| p.exists()))
}

/// 加载配置，找不到配置文件时使用默认配置
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    match resolve_config_path(path)? {
        Some(path) => {
            tracing::info!("[Config] 加载配置文件: {}", path.display());
            read_config_file(&path)
        }
        None => {
            tracing::debug!("[Config] 未找到配置文件，使用默认配置");
            Ok(AppConfig::default())
        }
    }
}

/// 保存配置为 YAML
pub fn save_config(config: &AppConfig, path: &Path) -> Result<(), ConfigError> {
    let path_str = path.display().to_string();
    let yaml = serde_yaml::to_string(config).map_err(|source| ConfigError::Parse {
        path: path_str.clone(),
        source,
    })?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
            path: path_str.clone(),
            source,
        })?;
    }
    std::fs::write(path, yaml).map_err(|source| ConfigError::Io {
        path: path_str,
        source,
    })
}
