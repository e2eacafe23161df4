pub mod analysis_tools;
pub mod model_gateway;
pub mod response_parser;
pub mod structured;

pub use analysis_tools::{AnalysisTools, WritingDetails};
pub use model_gateway::ModelGateway;
pub use structured::{invoke_with_fallback, ModelOutput};
