use crate::models::envelope::ChatRequest;
use anyhow::{Context, Result};
use std::path::Path;
use tokio::fs;

/// 请求文件中的一行
#[derive(Debug)]
pub struct RequestLine {
    /// 行号（从1开始）
    pub line_number: usize,
    /// 解析结果；格式错误的行保留错误信息，由调用方计入失败
    pub request: Result<ChatRequest, String>,
}

/// 从 JSON Lines 文件加载请求
pub async fn load_requests_file(path: &Path) -> Result<Vec<RequestLine>> {
    let content = fs::read_to_string(path)
        .await
        .with_context(|| format!("无法读取请求文件: {}", path.display()))?;

    Ok(parse_requests(&content))
}

/// 解析 JSON Lines 内容，跳过空行
pub fn parse_requests(content: &str) -> Vec<RequestLine> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| RequestLine {
            line_number: index + 1,
            request: serde_json::from_str(line).map_err(|e| e.to_string()),
        })
        .collect()
}
