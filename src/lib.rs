//! # Kids Progress
//!
//! 儿童学习进度助手：把一条聊天消息或表单提交路由到对应的工作流，
//! 调用大模型评估，并把结果写入存储。
//!
//! ## 架构设计
//!
//! ### ① 客户端层（Clients）
//! - `clients/` - `ChatModel` 抽象与 OpenAI 兼容实现
//!
//! ### ② 存储层（Storage）
//! - `storage/` - `DocumentStore` 抽象（内存 / SQLite）与类型化仓库
//!
//! ### ③ 业务能力层（Services）
//! - `ModelGateway` - 带超时的模型调用
//! - `response_parser` / `structured` - 结构化输出与文本回退解析
//! - `AnalysisTools` - 作文历史查询与统计
//!
//! ### ④ 流程层（Workflow）
//! - `Supervisor` - 路由并执行子工作流，写入对话记录
//! - 写作 / 数学 / 分析 / 日常对话四个子工作流
//!
//! ### ⑤ 编排层（Orchestration）
//! - `orchestrator/batch_processor` - 批量读取请求，控制并发，写出结果
//! - `orchestrator/request_processor` - 单个请求处理

pub mod clients;
pub mod config;
pub mod error;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod storage;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use clients::{ChatMessage, ChatModel, OpenAiChatModel};
pub use config::Config;
pub use error::{AppError, AppResult};
pub use models::{ChatRequest, ChatResponse};
pub use orchestrator::App;
pub use services::ModelGateway;
pub use storage::{DocumentStore, MemoryStore, SqliteStore};
pub use workflow::Supervisor;
