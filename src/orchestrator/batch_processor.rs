//! 批量请求处理器 - 编排层
//!
//! ## 职责
//!
//! 1. **应用初始化**：打开存储、写入评分标准、创建模型客户端与 Supervisor
//! 2. **批量加载**：读取请求文件（`Vec<RequestLine>`）
//! 3. **并发控制**：使用 Semaphore 限制同时处理的请求数
//! 4. **分批处理**：每批完成后再开始下一批
//! 5. **结果输出**：按输入顺序写出 JSON Lines 结果文件，并汇总统计
//!
//! 单个请求的细节委托给 `request_processor`。

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use crate::clients::{ChatModel, OpenAiChatModel};
use crate::config::Config;
use crate::models::loaders::{load_requests_file, load_rubric_file, RequestLine};
use crate::orchestrator::request_processor::{self, RequestStatus, ResponseRecord};
use crate::services::ModelGateway;
use crate::storage::{open_store, DocumentStore, RubricRepository};
use crate::utils::logging::{
    log_batch_complete, log_batch_start, log_requests_loaded, log_startup, print_final_stats,
};
use crate::workflow::Supervisor;

/// 应用主结构
pub struct App {
    config: Config,
    supervisor: Arc<Supervisor>,
}

impl App {
    /// 初始化应用：按配置打开存储并连接真实模型
    pub async fn initialize(config: Config) -> Result<Self> {
        log_startup(&config);

        let store = open_store(&config).context("无法打开存储")?;
        info!("🗄️ 存储后端: {}", store.backend_name());

        let model: Arc<dyn ChatModel> = Arc::new(OpenAiChatModel::new(&config));
        Self::build(config, model, store).await
    }

    /// 使用给定的模型与存储组装应用
    pub async fn build(
        config: Config,
        model: Arc<dyn ChatModel>,
        store: Arc<dyn DocumentStore>,
    ) -> Result<Self> {
        seed_rubric(&config, Arc::clone(&store)).await?;

        let gateway = ModelGateway::new(model, config.model_timeout());
        info!("🤖 模型网关就绪: {}", gateway.model_name());

        Ok(Self {
            supervisor: Arc::new(Supervisor::new(gateway, store)),
            config,
        })
    }

    /// 运行应用主逻辑
    pub async fn run(&self) -> Result<()> {
        info!("\n📁 正在读取请求文件: {}", self.config.requests_file);
        let requests = load_requests_file(Path::new(&self.config.requests_file)).await?;

        if requests.is_empty() {
            warn!("⚠️ 请求文件中没有待处理的请求，程序结束");
            return Ok(());
        }

        let total = requests.len();
        log_requests_loaded(total, self.config.max_concurrent_requests);

        let records = self.process_all(requests).await?;
        write_responses(&self.config.responses_file, &records).await?;

        let stats = ProcessingStats::from_records(&records);
        print_final_stats(
            stats.success,
            stats.rejected,
            stats.failed,
            total,
            &self.config.responses_file,
        );

        Ok(())
    }

    /// 分批处理全部请求，结果保持输入顺序
    pub async fn process_all(&self, requests: Vec<RequestLine>) -> Result<Vec<ResponseRecord>> {
        let batch_size = self.config.max_concurrent_requests;
        let semaphore = Arc::new(Semaphore::new(batch_size));
        let total = requests.len();
        let total_batches = total.div_ceil(batch_size);

        let mut records = Vec::with_capacity(total);
        let mut pending = requests.into_iter();

        for batch_num in 1..=total_batches {
            let batch: Vec<RequestLine> = pending.by_ref().take(batch_size).collect();
            let start = (batch_num - 1) * batch_size + 1;
            log_batch_start(batch_num, total_batches, start, start + batch.len() - 1, total);

            let batch_records = self.process_batch(batch, Arc::clone(&semaphore)).await?;
            let success = batch_records
                .iter()
                .filter(|r| r.status == RequestStatus::Success)
                .count();
            log_batch_complete(batch_num, success, batch_records.len());

            records.extend(batch_records);
        }

        Ok(records)
    }

    /// 处理单个批次
    async fn process_batch(
        &self,
        batch: Vec<RequestLine>,
        semaphore: Arc<Semaphore>,
    ) -> Result<Vec<ResponseRecord>> {
        let mut handles = Vec::with_capacity(batch.len());

        for line in batch {
            let line_number = line.line_number;
            let permit = Arc::clone(&semaphore).acquire_owned().await?;
            let supervisor = Arc::clone(&self.supervisor);

            let handle = tokio::spawn(async move {
                let _permit = permit;
                request_processor::process_request(&supervisor, line).await
            });
            handles.push((line_number, handle));
        }

        let (line_numbers, handles): (Vec<usize>, Vec<_>) = handles.into_iter().unzip();
        let results = futures::future::join_all(handles).await;

        let records = line_numbers
            .into_iter()
            .zip(results)
            .map(|(line_number, result)| match result {
                Ok(record) => record,
                Err(e) => {
                    error!("[请求 {}] 任务执行失败: {}", line_number, e);
                    ResponseRecord {
                        line: line_number,
                        status: RequestStatus::Failed,
                        response: None,
                        error: Some(e.to_string()),
                    }
                }
            })
            .collect();

        Ok(records)
    }
}

/// 评分标准集合为空且文件存在时，从文件写入
async fn seed_rubric(config: &Config, store: Arc<dyn DocumentStore>) -> Result<()> {
    let Some(rubric_file) = config.rubric_file.as_deref() else {
        return Ok(());
    };

    let path = Path::new(rubric_file);
    if !path.exists() {
        warn!("⚠️ 评分标准文件不存在，跳过初始化: {}", rubric_file);
        return Ok(());
    }

    let criteria = load_rubric_file(path).await?;
    RubricRepository::new(store)
        .seed_if_empty(&criteria)
        .await
        .context("写入评分标准失败")?;
    Ok(())
}

/// 按行写出处理结果
async fn write_responses(path: &str, records: &[ResponseRecord]) -> Result<()> {
    let mut content = String::new();
    for record in records {
        content.push_str(&serde_json::to_string(record)?);
        content.push('\n');
    }

    tokio::fs::write(path, content)
        .await
        .with_context(|| format!("无法写入结果文件: {}", path))?;
    info!("💾 已写出 {} 条处理结果", records.len());
    Ok(())
}

/// 处理统计
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ProcessingStats {
    pub success: usize,
    pub rejected: usize,
    pub failed: usize,
}

impl ProcessingStats {
    pub fn from_records(records: &[ResponseRecord]) -> Self {
        records
            .iter()
            .fold(Self::default(), |mut stats, record| {
                match record.status {
                    RequestStatus::Success => stats.success += 1,
                    RequestStatus::Rejected => stats.rejected += 1,
                    RequestStatus::Failed => stats.failed += 1,
                }
                stats
            })
    }
}
