pub mod model;
pub mod openai;
pub mod scripted;

pub use model::{LanguageModel, Message, MessageRole};
pub use openai::OpenAiChat;
pub use scripted::ScriptedModel;
