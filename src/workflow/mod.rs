//! 流程层（Workflow）
//!
//! `Supervisor` 负责路由与落库，四个子工作流各自由有序阶段组成：
//!
//! ```text
//! Supervisor ──┬── WritingWorkflow  (Classify → FetchRubric → Evaluate → Persist → Respond)
//!              ├── MathWorkflow     (Prepare → Evaluate → Save)
//!              ├── AnalysisWorkflow (Classify → Answer)
//!              └── GeneralWorkflow  (Answer)
//! ```

pub mod analysis;
pub mod general;
pub mod math;
pub mod pipeline;
pub mod state;
pub mod supervisor;
pub mod writing;

pub use analysis::{AnalysisType, AnalysisWorkflow};
pub use general::GeneralWorkflow;
pub use math::MathWorkflow;
pub use pipeline::{run_pipeline, Pipeline};
pub use state::{SupervisorState, WorkflowOutcome};
pub use supervisor::{route_for_classification, Route, Supervisor};
pub use writing::WritingWorkflow;
