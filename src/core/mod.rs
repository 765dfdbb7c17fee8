//! Core domain types

pub mod catalog;
pub mod chat;
pub mod resolution;
pub mod speech;

pub use catalog::{ChatModel, ImageKind, ImageModel, SpeechModel, Upscaler};
pub use chat::{ChatMessage, Conversation, Role};
pub use resolution::Resolution;
pub use speech::{Segment, Transcription};
