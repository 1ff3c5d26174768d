//! 数据模型

pub mod openai;

pub use openai::{
    ChatCompletionRequest, ChatMessage, ImageDescriptor, ImageGenerationRequest,
    ImageGenerationResponse, SequentialOptions,
};
