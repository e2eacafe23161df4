//! 编排层（Orchestration Layer）
//!
//! ## 模块划分
//!
//! ### `batch_processor` - 批量请求处理器
//! - 管理应用生命周期（初始化、运行）
//! - 批量加载请求（Vec<RequestLine>）
//! - 控制并发数量（Semaphore）
//! - 写出结果文件并输出全局统计
//!
//! ### `request_processor` - 单个请求处理器
//! - 把一条请求交给 Supervisor
//! - 区分请求无效与服务端失败
//!
//! ## 层次关系
//!
//! ```text
//! batch_processor (处理 Vec<RequestLine>)
//!     ↓
//! request_processor (处理单条请求)
//!     ↓
//! workflow::Supervisor (路由 → 子工作流 → 写入对话)
//!     ↓
//! services (能力层：模型网关 / 输出解析 / 分析工具)
//!     ↓
//! storage + clients
//! ```

pub mod batch_processor;
pub mod request_processor;

pub use batch_processor::{App, ProcessingStats};
pub use request_processor::{process_request, RequestStatus, ResponseRecord};
