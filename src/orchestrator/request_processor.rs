//! 单个请求处理器 - 编排层
//!
//! 把一行请求交给 Supervisor，并把结果（或错误）整理成输出文件中的一行。

use serde::Serialize;
use tracing::{error, info, warn};

use crate::models::loaders::RequestLine;
use crate::models::ChatResponse;
use crate::workflow::Supervisor;

/// 单条请求的处理结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    /// 处理成功
    Success,
    /// 请求本身无效（格式错误、无法路由、载荷缺字段）
    Rejected,
    /// 服务端失败（模型、解析、存储）
    Failed,
}

/// 输出文件中的一行
#[derive(Debug, Clone, Serialize)]
pub struct ResponseRecord {
    pub line: usize,
    pub status: RequestStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<ChatResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ResponseRecord {
    fn success(line: usize, response: ChatResponse) -> Self {
        Self {
            line,
            status: RequestStatus::Success,
            response: Some(response),
            error: None,
        }
    }

    fn failure(line: usize, status: RequestStatus, error: String) -> Self {
        Self {
            line,
            status,
            response: None,
            error: Some(error),
        }
    }
}

/// 处理单条请求
pub async fn process_request(supervisor: &Supervisor, line: RequestLine) -> ResponseRecord {
    let line_number = line.line_number;

    let request = match line.request {
        Ok(request) => request,
        Err(e) => {
            warn!("[请求 {}] ⚠️ 无法解析: {}", line_number, e);
            return ResponseRecord::failure(line_number, RequestStatus::Rejected, e);
        }
    };

    match supervisor.handle(request).await {
        Ok(response) => {
            info!(
                "[请求 {}] ✓ 处理完成，助手消息 {}",
                line_number, response.ai_msg.id
            );
            ResponseRecord::success(line_number, response)
        }
        Err(e) if e.is_client_error() => {
            warn!("[请求 {}] 🚫 请求无效: {}", line_number, e);
            ResponseRecord::failure(line_number, RequestStatus::Rejected, e.to_string())
        }
        Err(e) => {
            error!("[请求 {}] ❌ 处理失败: {}", line_number, e);
            ResponseRecord::failure(line_number, RequestStatus::Failed, e.to_string())
        }
    }
}
