use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// 默认配置文件路径
pub const DEFAULT_CONFIG_FILE: &str = "kids_progress.toml";

/// 存储后端
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// SQLite 文件（或 `:memory:`）
    Sqlite,
    /// 进程内存，重启即丢失
    Memory,
}

impl FromStr for StorageBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sqlite" => Ok(StorageBackend::Sqlite),
            "memory" => Ok(StorageBackend::Memory),
            other => Err(ConfigError::EnvVarParseFailed {
                var_name: "STORAGE_BACKEND".to_string(),
                value: other.to_string(),
                expected_type: "sqlite | memory".to_string(),
            }),
        }
    }
}

/// 程序配置
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    // --- LLM 配置 ---
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    pub llm_model_name: String,
    pub llm_temperature: f32,
    pub llm_max_tokens: u32,
    /// 单次模型调用超时（秒）
    pub model_timeout_secs: u64,

    // --- 存储配置 ---
    pub storage_backend: StorageBackend,
    /// SQLite 数据库路径
    pub database_path: String,
    /// 单次存储操作超时（秒）
    pub storage_timeout_secs: u64,
    /// 评分标准 TOML 文件，存储为空时用于初始化
    pub rubric_file: Option<String>,

    // --- 批处理配置 ---
    /// 待处理请求（JSON Lines）
    pub requests_file: String,
    /// 处理结果输出（JSON Lines）
    pub responses_file: String,
    /// 同时处理的请求数量
    pub max_concurrent_requests: usize,

    // --- 日志配置 ---
    pub verbose_logging: bool,
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llm_api_key: String::new(),
            llm_api_base_url: "https://api.openai.com/v1".to_string(),
            llm_model_name: "gpt-4o-mini".to_string(),
            llm_temperature: 0.3,
            llm_max_tokens: 4096,
            model_timeout_secs: 60,
            storage_backend: StorageBackend::Sqlite,
            database_path: "kids_progress.db".to_string(),
            storage_timeout_secs: 10,
            rubric_file: Some("rubric.toml".to_string()),
            requests_file: "requests.jsonl".to_string(),
            responses_file: "responses.jsonl".to_string(),
            max_concurrent_requests: 4,
            verbose_logging: false,
            log_filter: "info".to_string(),
        }
    }
}

impl Config {
    /// 加载配置：配置文件（可选）→ 环境变量覆盖 → 校验
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("KIDS_PROGRESS_CONFIG")
            .unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());

        let base = if Path::new(&path).exists() {
            Self::from_file(&path)?
        } else {
            Self::default()
        };

        let config = base.with_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// 从 TOML 文件读取配置，未出现的字段使用默认值
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::File {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&content).map_err(|e| match e {
            ConfigError::File { reason, .. } => ConfigError::File {
                path: path.display().to_string(),
                reason,
            },
            other => other,
        })
    }

    /// 从 TOML 字符串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::File {
            path: String::new(),
            reason: e.to_string(),
        })
    }

    /// 使用环境变量覆盖配置项
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        Ok(Self {
            llm_api_key: env_string("LLM_API_KEY").unwrap_or(self.llm_api_key),
            llm_api_base_url: env_string("LLM_API_BASE_URL").unwrap_or(self.llm_api_base_url),
            llm_model_name: env_string("LLM_MODEL_NAME").unwrap_or(self.llm_model_name),
            llm_temperature: env_parse("LLM_TEMPERATURE", "f32")?.unwrap_or(self.llm_temperature),
            llm_max_tokens: env_parse("LLM_MAX_TOKENS", "u32")?.unwrap_or(self.llm_max_tokens),
            model_timeout_secs: env_parse("MODEL_TIMEOUT_SECS", "u64")?
                .unwrap_or(self.model_timeout_secs),
            storage_backend: match env_string("STORAGE_BACKEND") {
                Some(value) => value.parse()?,
                None => self.storage_backend,
            },
            database_path: env_string("DATABASE_PATH").unwrap_or(self.database_path),
            storage_timeout_secs: env_parse("STORAGE_TIMEOUT_SECS", "u64")?
                .unwrap_or(self.storage_timeout_secs),
            rubric_file: env_string("RUBRIC_FILE").or(self.rubric_file),
            requests_file: env_string("REQUESTS_FILE").unwrap_or(self.requests_file),
            responses_file: env_string("RESPONSES_FILE").unwrap_or(self.responses_file),
            max_concurrent_requests: env_parse("MAX_CONCURRENT_REQUESTS", "usize")?
                .unwrap_or(self.max_concurrent_requests),
            verbose_logging: env_parse("VERBOSE_LOGGING", "bool")?
                .unwrap_or(self.verbose_logging),
            log_filter: env_string("LOG_FILTER").unwrap_or(self.log_filter),
        })
    }

    /// 校验配置
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.llm_api_key.trim().is_empty() {
            return Err(ConfigError::MissingValue("LLM_API_KEY"));
        }
        if self.max_concurrent_requests == 0 {
            return Err(ConfigError::InvalidValue {
                name: "max_concurrent_requests",
                reason: "必须大于 0".to_string(),
            });
        }
        if self.model_timeout_secs == 0 || self.storage_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                name: "timeout",
                reason: "超时时间必须大于 0".to_string(),
            });
        }
        Ok(())
    }

    pub fn model_timeout(&self) -> Duration {
        Duration::from_secs(self.model_timeout_secs)
    }

    pub fn storage_timeout(&self) -> Duration {
        Duration::from_secs(self.storage_timeout_secs)
    }

    /// 日志过滤规则；`verbose_logging` 打开时输出本 crate 的调试日志
    pub fn log_directive(&self) -> String {
        if self.verbose_logging {
            format!("{},kids_progress=debug", self.log_filter)
        } else {
            self.log_filter.clone()
        }
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: FromStr>(name: &str, expected_type: &str) -> Result<Option<T>, ConfigError> {
    match env_string(name) {
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::EnvVarParseFailed {
                var_name: name.to_string(),
                value,
                expected_type: expected_type.to_string(),
            }),
        None => Ok(None),
    }
}
