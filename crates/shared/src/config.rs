//! 配置管理模块
//!
//! 支持多层配置文件加载和环境变量覆盖，缺失的配置项使用默认值。

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;

/// 环境变量前缀（如 CFMT_ENGINE__TRACE_ENABLED -> engine.trace_enabled）
pub const ENV_PREFIX: &str = "CFMT";

/// 格式化引擎配置
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// 整数与浮点数是否视为不同类型
    pub strict_numeric_kinds: bool,
    /// 渲染时是否记录评估追踪
    pub trace_enabled: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            strict_numeric_kinds: true,
            trace_enabled: false,
        }
    }
}

/// 可观测性配置
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub log_level: String,
    /// 日志输出格式：json（结构化）或 pretty（人类可读）
    pub log_format: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
        }
    }
}

impl ObservabilityConfig {
    pub fn is_json(&self) -> bool {
        self.log_format.eq_ignore_ascii_case("json")
    }
}

/// 应用配置
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub service_name: String,
    pub environment: String,
    pub engine: EngineConfig,
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// 从配置文件和环境变量加载配置
    ///
    /// 加载顺序（后加载的会覆盖先加载的同名配置项）：
    /// 1. config/default.toml
    /// 2. config/{environment}.toml
    /// 3. config/{service_name}.toml
    /// 4. 环境变量（CFMT_ 前缀，层级分隔符 `__`）
    ///
    /// 配置目录由 `CONFIG_DIR` 指定，环境名由 `CFMT_ENV` 指定。
    pub fn load(service_name: &str) -> Result<Self, ConfigError> {
        let env = std::env::var("CFMT_ENV").unwrap_or_else(|_| "development".to_string());
        let config_dir = std::env::var("CONFIG_DIR").unwrap_or_else(|_| "config".to_string());

        Self::load_from(Path::new(&config_dir), service_name, &env)
    }

    /// 从指定目录加载配置
    pub fn load_from(config_dir: &Path, service_name: &str, env: &str) -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .set_default("service_name", service_name)?
            .set_default("environment", env)?
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            .add_source(File::from(config_dir.join(format!("{}.toml", env))).required(false))
            .add_source(
                File::from(config_dir.join(format!("{}.toml", service_name))).required(false),
            )
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// 是否为生产环境
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("cfmt-config-{}-{}", name, std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert!(config.engine.strict_numeric_kinds);
        assert!(!config.engine.trace_enabled);
        assert_eq!(config.observability.log_level, "info");
        assert!(!config.observability.is_json());
    }

    #[test]
    fn test_load_without_files() {
        let dir = scratch_dir("empty");

        let config = AppConfig::load_from(&dir, "format-engine", "test").unwrap();

        assert_eq!(config.service_name, "format-engine");
        assert_eq!(config.environment, "test");
        assert!(config.engine.strict_numeric_kinds);
        assert!(!config.is_production());
    }

    #[test]
    fn test_layered_files() {
        let dir = scratch_dir("layered");
        fs::write(
            dir.join("default.toml"),
            "[engine]\nstrict_numeric_kinds = false\n\n[observability]\nlog_level = \"warn\"\n",
        )
        .unwrap();
        fs::write(
            dir.join("production.toml"),
            "[observability]\nlog_level = \"error\"\n",
        )
        .unwrap();

        let config = AppConfig::load_from(&dir, "format-engine", "production").unwrap();

        assert!(!config.engine.strict_numeric_kinds);
        assert_eq!(config.observability.log_level, "error");
        assert!(config.is_production());

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_env_override() {
        let dir = scratch_dir("env");

        // SAFETY: 其他测试不读取该变量对应的配置项
        unsafe {
            std::env::set_var("CFMT_OBSERVABILITY__LOG_FORMAT", "json");
        }

        let config = AppConfig::load_from(&dir, "format-engine", "test").unwrap();

        unsafe {
            std::env::remove_var("CFMT_OBSERVABILITY__LOG_FORMAT");
        }

        assert!(config.observability.is_json());
    }
}
