//! 配置管理模块
//!
//! 支持多格式配置文件加载，环境变量覆盖，以及类型安全的配置访问。

use crate::observability::ObservabilityConfig;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;

/// 评估配置
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EvaluationConfig {
    /// 是否记录逐节点评估追踪
    #[serde(default)]
    pub trace_enabled: bool,
    /// 规则树未通过校验时是否拒绝评估
    #[serde(default)]
    pub fail_on_invalid: bool,
}

/// 应用配置
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub service_name: String,
    pub environment: String,
    #[serde(default)]
    pub observability: ObservabilityConfig,
    #[serde(default)]
    pub evaluation: EvaluationConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            service_name: "rule-engine".to_string(),
            environment: "development".to_string(),
            observability: ObservabilityConfig::default(),
            evaluation: EvaluationConfig::default(),
        }
    }
}

impl AppConfig {
    /// 从配置文件和环境变量加载配置
    ///
    /// 先读取工作目录下的 `.env`（如存在）。配置目录取自 `CONFIG_DIR`
    /// （默认 `config`），环境取自 `RULES_ENV`（默认 `development`），
    /// 加载顺序见 [`AppConfig::load_from`]。
    pub fn load(service_name: &str) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let env = std::env::var("RULES_ENV").unwrap_or_else(|_| "development".to_string());
        let config_dir = std::env::var("CONFIG_DIR").unwrap_or_else(|_| "config".to_string());

        Self::load_from(Path::new(&config_dir), service_name, &env)
    }

    /// 从指定目录加载配置
    ///
    /// 加载顺序（后加载的会覆盖先加载的同名配置项）：
    /// 1. {config_dir}/default.toml（默认配置）
    /// 2. {config_dir}/{environment}.toml（环境特定配置）
    /// 3. {config_dir}/{service_name}.toml（服务特定配置）
    /// 4. 环境变量（RULES_ 前缀，如 RULES_OBSERVABILITY__LOG_LEVEL -> observability.log_level）
    pub fn load_from(
        config_dir: &Path,
        service_name: &str,
        environment: &str,
    ) -> Result<Self, ConfigError> {
        let builder = Config::builder()
            // 默认配置
            .set_default("service_name", service_name)?
            .set_default("environment", environment)?
            // 加载默认配置文件
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // 加载环境特定配置
            .add_source(File::from(config_dir.join(format!("{}.toml", environment))).required(false))
            // 加载服务特定配置
            .add_source(
                File::from(config_dir.join(format!("{}.toml", service_name))).required(false),
            )
            // 环境变量覆盖
            .add_source(
                Environment::with_prefix("RULES")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }
}
