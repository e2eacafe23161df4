//! 阶段流水线
//!
//! 每个子工作流是一组按顺序执行的阶段：阶段读取当前状态，返回局部更新，
//! 由工作流把更新合并进状态后再进入下一阶段。任一阶段出错即终止。

use std::fmt::Debug;

use async_trait::async_trait;
use tracing::debug;

use crate::error::AppResult;

/// 由有序阶段组成的工作流
#[async_trait]
pub trait Pipeline: Send + Sync {
    type State: Send + Sync;
    type Stage: Copy + Debug + Send + Sync + 'static;
    type Update: Send;

    /// 工作流名称（日志用）
    fn name(&self) -> &'static str;

    /// 阶段执行顺序
    fn stages(&self) -> &'static [Self::Stage];

    /// 执行单个阶段
    async fn execute(&self, stage: Self::Stage, state: &Self::State) -> AppResult<Self::Update>;

    /// 合并阶段产出
    fn apply(&self, state: &mut Self::State, update: Self::Update);
}

/// 依次执行所有阶段，返回最终状态
pub async fn run_pipeline<P: Pipeline>(pipeline: &P, mut state: P::State) -> AppResult<P::State> {
    for stage in pipeline.stages() {
        debug!("[{}] 执行阶段 {:?}", pipeline.name(), stage);
        let update = pipeline.execute(*stage, &state).await?;
        pipeline.apply(&mut state, update);
    }
    Ok(state)
}
