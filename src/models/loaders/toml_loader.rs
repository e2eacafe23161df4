use crate::models::writing::RubricCriterion;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use tokio::fs;

/// 评分标准文件结构
///
/// ```toml
/// [[criteria]]
/// dimension = "Content and Ideas"
/// criterion = "Clarity of main idea"
/// ```
#[derive(Debug, Deserialize)]
struct RubricFile {
    #[serde(default)]
    criteria: Vec<RubricCriterion>,
}

/// 从 TOML 文件加载评分标准
pub async fn load_rubric_file(toml_file_path: &Path) -> Result<Vec<RubricCriterion>> {
    let content = fs::read_to_string(toml_file_path)
        .await
        .with_context(|| format!("无法读取评分标准文件: {}", toml_file_path.display()))?;

    let criteria = parse_rubric(&content)
        .with_context(|| format!("无法解析评分标准文件: {}", toml_file_path.display()))?;

    tracing::info!(
        "成功加载 {} 条评分标准: {}",
        criteria.len(),
        toml_file_path.display()
    );

    Ok(criteria)
}

/// 解析评分标准 TOML 内容
pub fn parse_rubric(content: &str) -> Result<Vec<RubricCriterion>> {
    let file: RubricFile = toml::from_str(content)?;

    for (index, entry) in file.criteria.iter().enumerate() {
        if entry.dimension.trim().is_empty() || entry.criterion.trim().is_empty() {
            anyhow::bail!("第 {} 条评分标准缺少 dimension 或 criterion", index + 1);
        }
    }

    Ok(file.criteria)
}
