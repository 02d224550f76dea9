//! Piper HTTP synthesis engine
//!
//! Talks to a piper TTS server over HTTP: a JSON request with the text and
//! length scale, WAV bytes back. Piper has no runtime speed control, so the
//! requested speed maps to its `length_scale` (inverse of speed) at
//! synthesis time.

use std::time::Duration;

use serde::Serialize;
use tracing::debug;

use super::{EngineError, SynthesisEngine};

/// Default request timeout; neural synthesis of a full chunk can take seconds
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Serialize)]
struct SynthesizeRequest<'a> {
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    voice: Option<&'a str>,
    length_scale: f32,
}

/// Synthesis engine backed by a piper HTTP server
pub struct PiperHttpEngine {
    client: reqwest::blocking::Client,
    endpoint: String,
    voice: Option<String>,
}

impl PiperHttpEngine {
    /// Create an engine for the given server URL (e.g. `http://127.0.0.1:5000`)
    pub fn new(base_url: &str, voice: Option<String>) -> Result<Self, EngineError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| EngineError::Http(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: format!("{}/synthesize", base_url.trim_end_matches('/')),
            voice: voice.filter(|v| !v.is_empty()),
        })
    }
}

impl SynthesisEngine for PiperHttpEngine {
    fn synthesize(&self, text: &str, speed: f32) -> Result<Vec<u8>, EngineError> {
        if text.trim().is_empty() {
            return Err(EngineError::InvalidInput("empty text".to_string()));
        }

        let request = SynthesizeRequest {
            text,
            voice: self.voice.as_deref(),
            length_scale: 1.0 / speed,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .map_err(|e| EngineError::Http(e.to_string()))?;

        if !response.status().is_success() {
            return Err(EngineError::Engine(format!(
                "server returned {}",
                response.status()
            )));
        }

        let bytes = response
            .bytes()
            .map_err(|e| EngineError::Http(e.to_string()))?;
        debug!(bytes = bytes.len(), "synthesized chunk over HTTP");
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_normalization() {
        let engine = PiperHttpEngine::new("http://localhost:5000/", None).unwrap();
        assert_eq!(engine.endpoint, "http://localhost:5000/synthesize");
    }

    #[test]
    fn test_empty_voice_is_dropped() {
        let engine = PiperHttpEngine::new("http://localhost:5000", Some(String::new())).unwrap();
        assert!(engine.voice.is_none());
    }

    #[test]
    fn test_rejects_empty_text() {
        let engine = PiperHttpEngine::new("http://localhost:5000", None).unwrap();
        assert!(matches!(
            engine.synthesize("", 1.0),
            Err(EngineError::InvalidInput(_))
        ));
    }
}
