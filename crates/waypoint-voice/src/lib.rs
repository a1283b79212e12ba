//! # Waypoint Voice - Agent Speech Output
//!
//! Gives each journey agent a voice. Text is synthesized by a [`TtsBackend`]
//! and played on a dedicated audio thread; pausing the conversation suspends
//! playback and drops queued utterances.
//!
//! ```text
//! ConversationOrchestrator ──speak──▶ VoiceSpeech ──▶ TtsBackend (Google / OpenAI)
//!                                        │
//!   PauseResumeController ──suspend──▶ VoiceOutput (rodio thread, one Sink per utterance)
//! ```

pub mod error;
pub mod speech;
pub mod tts;
pub mod voice_output;

pub use error::{VoiceError, VoiceResult};
pub use speech::{speech_for_mode, speech_or_silent, SilentSpeech, VoiceSpeech};
pub use tts::{
    backend_for_mode, decode_audio_content, google_request_body, openai_voice, GoogleCloudTts,
    OpenAiTts, PlaceholderTts, TtsBackend, VoiceProfile,
};
pub use voice_output::{PlaybackDone, VoiceOutput};
