//! Voice input and output: WebSocket recording sessions and speech synthesis.

pub mod buffer;
pub mod protocol;
pub mod session;
pub mod tts;

pub use protocol::{ClientMessage, ServerMessage};
pub use session::{VoicePipeline, VoiceSession};
pub use tts::{CommandSynthesizer, Synthesizer};
