//! Text-to-speech backends. Each agent speaks with its own [`VoiceProfile`].

use crate::error::{VoiceError, VoiceResult};
use base64::Engine as _;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;
use waypoint_core::Speaker;

const GOOGLE_TTS_URL: &str = "https://texttospeech.googleapis.com/v1";
const HTTP_TIMEOUT: Duration = Duration::from_secs(60);

/// Backend that turns text into encoded audio bytes (MP3/WAV).
pub trait TtsBackend: Send + Sync {
    /// Synthesize `text` in `speaker`'s voice. Return an empty vec to skip playback.
    fn synthesize(&self, text: &str, speaker: Speaker) -> VoiceResult<Vec<u8>>;
}

/// Returns empty audio so nothing plays.
#[derive(Debug, Default)]
pub struct PlaceholderTts;

impl TtsBackend for PlaceholderTts {
    fn synthesize(&self, _text: &str, _speaker: Speaker) -> VoiceResult<Vec<u8>> {
        Ok(Vec::new())
    }
}

/// Voice parameters for one agent.
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceProfile {
    pub language_code: &'static str,
    pub name: &'static str,
    pub ssml_gender: &'static str,
    pub speaking_rate: f32,
    pub pitch: f32,
}

impl VoiceProfile {
    /// AgentA gets a US voice, AgentB a British one.
    pub fn for_speaker(speaker: Speaker) -> Self {
        match speaker {
            Speaker::AgentA => Self {
                language_code: "en-US",
                name: "en-US-Neural2-D",
                ssml_gender: "MALE",
                speaking_rate: 0.9,
                pitch: 2.2,
            },
            Speaker::AgentB => Self {
                language_code: "en-GB",
                name: "en-GB-Neural2-B",
                ssml_gender: "MALE",
                speaking_rate: 0.9,
                pitch: 2.2,
            },
        }
    }
}

fn http_client() -> VoiceResult<reqwest::blocking::Client> {
    reqwest::blocking::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .map_err(|e| VoiceError::Tts(e.to_string()))
}

/// Request body for `text:synthesize`.
pub fn google_request_body(text: &str, profile: &VoiceProfile) -> serde_json::Value {
    serde_json::json!({
        "input": { "text": text },
        "voice": {
            "languageCode": profile.language_code,
            "name": profile.name,
            "ssmlGender": profile.ssml_gender,
        },
        "audioConfig": {
            "audioEncoding": "MP3",
            "speakingRate": profile.speaking_rate,
            "pitch": profile.pitch,
        },
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeResponse {
    audio_content: Option<String>,
}

/// Decode the base64 `audioContent` of a `text:synthesize` response.
pub fn decode_audio_content(body: &str) -> VoiceResult<Vec<u8>> {
    let response: SynthesizeResponse =
        serde_json::from_str(body).map_err(|e| VoiceError::Decode(e.to_string()))?;
    let content = response
        .audio_content
        .ok_or_else(|| VoiceError::Tts("response has no audioContent".to_string()))?;
    base64::engine::general_purpose::STANDARD
        .decode(content.as_bytes())
        .map_err(|e| VoiceError::Decode(e.to_string()))
}

/// Google Cloud Text-to-Speech, keyed by `GOOGLE_TTS_API_KEY`.
#[derive(Debug, Clone)]
pub struct GoogleCloudTts {
    pub base_url: String,
    api_key: String,
    client: reqwest::blocking::Client,
}

impl GoogleCloudTts {
    pub fn new(api_key: impl Into<String>) -> VoiceResult<Self> {
        Ok(Self {
            base_url: GOOGLE_TTS_URL.to_string(),
            api_key: api_key.into(),
            client: http_client()?,
        })
    }

    pub fn from_env() -> VoiceResult<Self> {
        let key = std::env::var("GOOGLE_TTS_API_KEY")
            .map_err(|_| VoiceError::Config("Google TTS requires GOOGLE_TTS_API_KEY".to_string()))?;
        Self::new(key)
    }
}

impl TtsBackend for GoogleCloudTts {
    fn synthesize(&self, text: &str, speaker: Speaker) -> VoiceResult<Vec<u8>> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(Vec::new());
        }
        let profile = VoiceProfile::for_speaker(speaker);
        let url = format!("{}/text:synthesize", self.base_url.trim_end_matches('/'));
        debug!(speaker = %speaker, voice = profile.name, "Google TTS request");
        let res = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&google_request_body(text, &profile))
            .send()
            .map_err(|e| VoiceError::Tts(e.to_string()))?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().unwrap_or_default();
            return Err(VoiceError::Tts(format!("TTS API error {}: {}", status, body)));
        }
        let body = res.text().map_err(|e| VoiceError::Tts(e.to_string()))?;
        decode_audio_content(&body)
    }
}

/// OpenAI voice for each agent.
pub fn openai_voice(speaker: Speaker) -> &'static str {
    match speaker {
        Speaker::AgentA => "onyx",
        Speaker::AgentB => "fable",
    }
}

/// OpenAI-compatible `/audio/speech` endpoint (OpenAI, OpenRouter, local servers).
#[derive(Debug, Clone)]
pub struct OpenAiTts {
    /// Base URL without trailing slash (e.g. https://api.openai.com/v1).
    pub base_url: String,
    api_key: String,
    /// tts-1 (fast) or tts-1-hd.
    pub model: String,
    client: reqwest::blocking::Client,
}

impl OpenAiTts {
    /// Build from TTS_API_URL, TTS_API_KEY and TTS_MODEL.
    pub fn from_env() -> VoiceResult<Self> {
        let base_url = std::env::var("TTS_API_URL")
            .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());
        let api_key = std::env::var("TTS_API_KEY")
            .map_err(|_| VoiceError::Config("TTS requires TTS_API_KEY".to_string()))?;
        let model = std::env::var("TTS_MODEL").unwrap_or_else(|_| "tts-1".to_string());
        Self::new(base_url, api_key, model)
    }

    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> VoiceResult<Self> {
        Ok(Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            client: http_client()?,
        })
    }
}

impl TtsBackend for OpenAiTts {
    fn synthesize(&self, text: &str, speaker: Speaker) -> VoiceResult<Vec<u8>> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(Vec::new());
        }
        let url = format!("{}/audio/speech", self.base_url.trim_end_matches('/'));
        let body = serde_json::json!({
            "model": self.model,
            "input": text,
            "voice": openai_voice(speaker),
        });
        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .map_err(|e| VoiceError::Tts(e.to_string()))?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().unwrap_or_default();
            return Err(VoiceError::Tts(format!("TTS API error {}: {}", status, body)));
        }
        let bytes = res.bytes().map_err(|e| VoiceError::Tts(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

/// Backend for a `tts_mode` setting: "google", "openai" or "placeholder".
pub fn backend_for_mode(mode: &str) -> VoiceResult<Box<dyn TtsBackend>> {
    match mode.to_ascii_lowercase().as_str() {
        "google" => Ok(Box::new(GoogleCloudTts::from_env()?)),
        "openai" => Ok(Box::new(OpenAiTts::from_env()?)),
        "placeholder" => Ok(Box::new(PlaceholderTts)),
        other => Err(VoiceError::Config(format!("unknown TTS backend: {}", other))),
    }
}
