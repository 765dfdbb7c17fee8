//! On-disk state: chat transcripts and generated outputs

pub mod outputs;
pub mod transcripts;

pub use transcripts::SavedChat;
