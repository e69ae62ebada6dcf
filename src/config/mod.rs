/// 统一配置系统
///
/// 提供TOML/JSON配置文件、环境变量覆盖和校验
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::error::ParticleError;

pub mod particle_system;

pub use particle_system::{EmitterConfig, ManagerConfig, ParticleSystemConfig};

/// 配置错误
#[derive(Error, Debug)]
pub enum ConfigError {
    /// 文件读取错误
    #[error("Config file error: {0}")]
    FileError(#[from] std::io::Error),
    /// 解析错误
    #[error("Config parse error: {0}")]
    ParseError(String),
    /// 验证错误
    #[error("Config validation error: {0}")]
    ValidationError(String),
    /// 粒子系统参数错误
    #[error("Config rejected by particle system: {0}")]
    Particle(#[from] ParticleError),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// 框架主配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FrameworkConfig {
    /// 日志配置
    #[serde(default)]
    pub logging: LoggingConfig,

    /// 新建粒子系统的默认配置
    #[serde(default)]
    pub defaults: ParticleSystemConfig,

    /// 管理器配置
    #[serde(default)]
    pub manager: ManagerConfig,
}

impl FrameworkConfig {
    /// 创建默认配置
    pub fn new() -> Self {
        Self::default()
    }

    /// 从TOML文件加载配置
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// 从TOML字符串解析配置
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// 从JSON文件加载配置
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// 从JSON字符串解析配置
    pub fn from_json_str(content: &str) -> ConfigResult<Self> {
        serde_json::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// 保存为TOML文件
    pub fn save_toml<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        fs::write(path, content).map_err(ConfigError::FileError)
    }

    /// 保存为JSON文件
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;
        fs::write(path, content).map_err(ConfigError::FileError)
    }

    /// 从环境变量覆盖配置
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = env::var("DPSF_LOG_LEVEL") {
            if let Some(level) = LogLevel::parse(&val) {
                self.logging.level = level;
            }
        }
        if let Ok(val) = env::var("DPSF_INITIAL_CAPACITY") {
            if let Ok(capacity) = val.parse() {
                self.defaults.initial_capacity = capacity;
            }
        }
        if let Ok(val) = env::var("DPSF_MAX_CAPACITY") {
            if let Ok(capacity) = val.parse() {
                self.defaults.max_capacity = capacity;
            }
        }
        if let Ok(val) = env::var("DPSF_SIMULATION_SPEED") {
            if let Ok(speed) = val.parse() {
                self.manager.simulation_speed = speed;
            }
        }
        if let Ok(val) = env::var("DPSF_UPDATES_PER_SECOND") {
            if let Ok(rate) = val.parse() {
                self.manager.updates_per_second = rate;
            }
        }
    }

    /// 验证配置
    pub fn validate(&self) -> ConfigResult<()> {
        self.defaults.validate()?;
        self.manager.validate()?;
        Ok(())
    }

    /// 自动查找并加载配置文件
    ///
    /// 按以下顺序查找：
    /// 1. ./dpsf.toml
    /// 2. ./dpsf.json
    /// 3. ~/.config/dpsf/config.toml
    /// 4. 使用默认配置
    pub fn load_or_default() -> Self {
        if let Ok(config) = Self::from_toml_file("dpsf.toml") {
            tracing::info!(target: "config", "Loaded config from dpsf.toml");
            return config;
        }

        if let Ok(config) = Self::from_json_file("dpsf.json") {
            tracing::info!(target: "config", "Loaded config from dpsf.json");
            return config;
        }

        if let Some(home) = env::var_os("HOME") {
            let config_path = PathBuf::from(home)
                .join(".config")
                .join("dpsf")
                .join("config.toml");

            if let Ok(config) = Self::from_toml_file(&config_path) {
                tracing::info!(target: "config", "Loaded config from {:?}", config_path);
                return config;
            }
        }

        tracing::info!(target: "config", "Using default configuration");
        Self::default()
    }
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别
    pub level: LogLevel,

    /// 是否输出到控制台
    pub log_to_console: bool,

    /// 是否输出 target
    #[serde(default)]
    pub show_targets: bool,
}

use crate::impl_default;

impl_default!(LoggingConfig {
    level: LogLevel::Info,
    log_to_console: true,
    show_targets: true,
});

/// 日志级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    /// 跟踪
    Trace,
    /// 调试
    Debug,
    /// 信息
    Info,
    /// 警告
    Warn,
    /// 错误
    Error,
}

impl LogLevel {
    /// 大小写不敏感地解析级别名称
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "trace" => Some(LogLevel::Trace),
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" | "warning" => Some(LogLevel::Warn),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::particles::MemoryManagementMode;

    #[test]
    fn test_default_config() {
        let config = FrameworkConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_serialization() {
        let config = FrameworkConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: FrameworkConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(config.defaults.max_capacity, parsed.defaults.max_capacity);
        assert_eq!(config.defaults.memory.mode, parsed.defaults.memory.mode);
    }

    #[test]
    fn test_json_serialization() {
        let config = FrameworkConfig::default();
        let json_str = serde_json::to_string(&config).unwrap();
        let parsed = FrameworkConfig::from_json_str(&json_str).unwrap();
        assert_eq!(
            config.defaults.initial_capacity,
            parsed.defaults.initial_capacity
        );
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = FrameworkConfig::from_toml_str(
            r#"
            [defaults]
            initial_capacity = 10
            max_capacity = 50

            [defaults.memory]
            mode = "ShrinkImmediately"
            "#,
        )
        .unwrap();
        assert_eq!(config.defaults.initial_capacity, 10);
        assert_eq!(config.defaults.max_capacity, 50);
        assert_eq!(config.defaults.memory.mode, MemoryManagementMode::ShrinkImmediately);
        assert_eq!(config.logging.level, LogLevel::Info);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_capacity_rejected() {
        let mut config = FrameworkConfig::default();
        config.defaults.max_capacity = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Particle(_))));
    }

    #[test]
    fn test_parse_error() {
        assert!(matches!(
            FrameworkConfig::from_toml_str("defaults = 3"),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_file_round_trip() {
        let dir = std::env::temp_dir().join(format!("dpsf-config-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("dpsf.toml");

        let mut config = FrameworkConfig::default();
        config.defaults.max_capacity = 4096;
        config.save_toml(&path).unwrap();
        let loaded = FrameworkConfig::from_toml_file(&path).unwrap();
        assert_eq!(loaded.defaults.max_capacity, 4096);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_log_level_parse() {
        assert_eq!(LogLevel::parse("WARNING"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::parse(" debug "), Some(LogLevel::Debug));
        assert_eq!(LogLevel::parse("loud"), None);
    }
}
