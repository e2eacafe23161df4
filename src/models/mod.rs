pub mod envelope;
pub mod loaders;
pub mod math;
pub mod turn;
pub mod writing;

pub use envelope::{AiMessage, ChatRequest, ChatResponse, MathSubmission, WritingSubmission};
pub use loaders::{load_requests_file, load_rubric_file};
pub use math::{MathProblemArtifact, MistakePattern};
pub use turn::{ConversationTurn, FormKind, Role, TurnKind};
pub use writing::{
    CriterionScore, GenreSubjects, Rubric, RubricCriterion, RubricDimension, RubricScore, Weakness,
    WritingArtifact, WritingEvaluation,
};
