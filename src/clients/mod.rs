pub mod chat_model;
pub mod openai_client;

pub use chat_model::{ChatMessage, ChatModel, ChatRole, OutputSchema};
pub use openai_client::OpenAiChatModel;
