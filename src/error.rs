use thiserror::Error;

use crate::models::turn::{FormKind, TurnKind};

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 路由错误（未知的表单类型或消息类型）
    #[error("路由错误: {0}")]
    Routing(#[from] RoutingError),
    /// 模型调用错误
    #[error("模型错误: {0}")]
    Model(#[from] ModelError),
    /// 模型输出解析错误
    #[error("解析错误: {0}")]
    Parse(#[from] ParseError),
    /// 业务校验错误
    #[error("校验错误: {0}")]
    Validation(#[from] ValidationError),
    /// 存储错误
    #[error("存储错误: {0}")]
    Storage(#[from] StorageError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 工作流阶段缺少前置阶段的结果
    #[error("工作流阶段缺少前置结果: {0}")]
    StageInput(&'static str),
    /// 工作流数据编码为 JSON 失败
    #[error("工作流数据编码失败: {0}")]
    Encoding(#[source] serde_json::Error),
}

impl AppError {
    /// 是否属于调用方的问题（边界层应映射为 4xx）
    ///
    /// 路由与校验错误属于请求本身的问题，其余均为服务端问题（5xx）。
    pub fn is_client_error(&self) -> bool {
        matches!(self, AppError::Routing(_) | AppError::Validation(_))
    }
}

/// 路由错误
#[derive(Debug, Error)]
pub enum RoutingError {
    /// 表单提交但表单类型无法识别或缺失
    #[error("无法识别的表单类型: {form_kind:?}")]
    UnknownFormKind { form_kind: Option<FormKind> },
    /// 无法识别的消息类型
    #[error("无法识别的消息类型: {turn_kind:?}")]
    UnsupportedTurnKind { turn_kind: TurnKind },
}

/// 模型调用错误
#[derive(Debug, Error)]
pub enum ModelError {
    /// API 调用失败
    #[error("模型 API 调用失败 (模型: {model}): {message}")]
    Invocation { model: String, message: String },
    /// 构建请求失败
    #[error("构建模型请求失败: {0}")]
    RequestBuild(String),
    /// 返回内容为空
    #[error("模型返回内容为空 (模型: {model})")]
    EmptyContent { model: String },
    /// 模型不支持结构化输出
    #[error("模型不支持结构化输出 (模型: {model})")]
    StructuredUnsupported { model: String },
    /// 调用超时
    #[error("模型调用超时 ({secs} 秒)")]
    Timeout { secs: u64 },
}

/// 模型输出解析错误
#[derive(Debug, Error)]
pub enum ParseError {
    /// 模型输出不是合法的 JSON 对象
    #[error("模型输出格式错误 ({reason}): {text}")]
    MalformedModelOutput { text: String, reason: String },
    /// 缺少必需字段
    #[error("模型输出缺少字段: {field}")]
    MissingField { field: String },
}

/// 业务校验错误
#[derive(Debug, Error)]
pub enum ValidationError {
    /// 分数超出 [1, 10]
    #[error("分数 {score} 超出范围 [1, 10] ({field})")]
    ScoreOutOfRange { field: String, score: i64 },
    /// 表单载荷缺少字段
    #[error("表单内容缺少字段: {field}")]
    MissingPayloadField { field: &'static str },
    /// 表单载荷无法解析
    #[error("表单内容无法解析: {0}")]
    InvalidPayload(String),
}

/// 存储错误
#[derive(Debug, Error)]
pub enum StorageError {
    /// SQLite 操作失败
    #[error("SQLite 操作失败: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// 文档序列化失败
    #[error("文档序列化失败: {0}")]
    Serialization(#[from] serde_json::Error),
    /// 存储操作超时
    #[error("存储操作 {operation} 超时 ({millis} 毫秒)")]
    Timeout { operation: &'static str, millis: u64 },
    /// 后台任务执行失败
    #[error("存储任务执行失败: {0}")]
    Task(String),
    /// 连接锁已中毒
    #[error("存储连接锁已中毒")]
    Poisoned,
    /// 存储中的时间戳无法解析
    #[error("时间戳无法解析: {0}")]
    InvalidTimestamp(String),
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 环境变量解析失败
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
    /// 必需配置缺失
    #[error("缺少必需配置: {0}")]
    MissingValue(&'static str),
    /// 配置值非法
    #[error("配置 {name} 的值非法: {reason}")]
    InvalidValue { name: &'static str, reason: String },
    /// 配置文件读取或解析失败
    #[error("配置文件 {path} 读取失败: {reason}")]
    File { path: String, reason: String },
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建字段缺失错误
    pub fn missing_field(field: impl Into<String>) -> Self {
        AppError::Parse(ParseError::MissingField {
            field: field.into(),
        })
    }

    /// 创建模型输出格式错误
    pub fn malformed_output(text: impl Into<String>, reason: impl ToString) -> Self {
        AppError::Parse(ParseError::MalformedModelOutput {
            text: text.into(),
            reason: reason.to_string(),
        })
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;

/// 存储层结果类型
pub type StorageResult<T> = Result<T, StorageError>;
