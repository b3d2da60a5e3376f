//! Prediction model client
//!
//! Sends a recent candle window to the Gemini API and parses the
//! structured directional forecast back. The response schema pins the
//! output shape, including the up/down direction enums. Any failure
//! degrades to `Ok(None)`; a missed prediction skips one cycle and is
//! never fatal.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::config::PredictorConfig;
use crate::types::{AnalysisResponse, Candle, Symbol};

const SYSTEM_INSTRUCTION: &str = "You are an aggressive, precise quantitative crypto trader. \
Analyze the OHLCV window and commit to a direction. Never hedge: actionSignal must be BUY or SELL, \
and each horizon direction must be up or down based on the short-term microstructure \
(trend slope, volatility contraction, failed breakouts). Output strict JSON only.";

/// Source of directional forecasts
#[async_trait]
pub trait Predictor: Send + Sync {
    /// Analyze a candle window; None when the model gave no usable answer
    async fn analyze(&self, symbol: Symbol, candles: &[Candle])
        -> Result<Option<AnalysisResponse>>;
}

pub struct GeminiPredictor {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
    prompt_candles: usize,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

impl GeminiPredictor {
    pub fn new(cfg: &PredictorConfig) -> Result<Self> {
        let api_key =
            std::env::var("GEMINI_API_KEY").context("GEMINI_API_KEY is not set")?;
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(cfg.timeout_ms))
            .build()
            .context("Failed to build predictor HTTP client")?;

        Ok(Self {
            client,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            model: cfg.model.clone(),
            api_key,
            prompt_candles: cfg.prompt_candles,
        })
    }

    fn build_prompt(&self, symbol: Symbol, candles: &[Candle]) -> String {
        let start = candles.len().saturating_sub(self.prompt_candles);
        let window = &candles[start..];
        let current = window.last().map(|c| c.close).unwrap_or(0.0);

        let rows: Vec<Value> = window
            .iter()
            .map(|c| {
                json!({
                    "t": c.time,
                    "o": c.open,
                    "h": c.high,
                    "l": c.low,
                    "c": c.close,
                    "v": c.volume,
                })
            })
            .collect();

        format!(
            "Analyze {} at current price {}. OHLCV data: {}\n\
             Return JSON with actionSignal (BUY or SELL), trend_5m and trend_10m \
             (direction up/down, price_target, confidence, reasoning), \
             dimensions (8 scored dimensions), similarity (best matched historical \
             pattern) and summary.",
            symbol,
            current,
            serde_json::to_string(&rows).unwrap_or_default()
        )
    }
}

#[async_trait]
impl Predictor for GeminiPredictor {
    async fn analyze(
        &self,
        symbol: Symbol,
        candles: &[Candle],
    ) -> Result<Option<AnalysisResponse>> {
        if candles.is_empty() {
            warn!("No candles available for {}, skipping analysis", symbol);
            return Ok(None);
        }

        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );
        let body = json!({
            "systemInstruction": { "parts": [{ "text": SYSTEM_INSTRUCTION }] },
            "contents": [{ "parts": [{ "text": self.build_prompt(symbol, candles) }] }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": response_schema(),
            },
        });

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            warn!("Prediction request for {} failed: {} - {}", symbol, status, detail);
            return Ok(None);
        }

        let payload: GenerateResponse = response.json().await?;
        let Some(text) = extract_text(&payload) else {
            warn!("Prediction response for {} carried no text part", symbol);
            return Ok(None);
        };

        debug!("Prediction text for {}: {} bytes", symbol, text.len());
        Ok(parse_prediction(text))
    }
}

fn extract_text(response: &GenerateResponse) -> Option<&str> {
    let text = &response.candidates.first()?.content.parts.first()?.text;
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Parse the model's JSON answer; malformed output is dropped with a warning
fn parse_prediction(text: &str) -> Option<AnalysisResponse> {
    match serde_json::from_str(text) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            warn!("Failed to parse prediction response: {}", e);
            None
        }
    }
}

/// Structured-output schema: pins the answer shape and constrains the
/// per-horizon directions to up/down.
fn response_schema() -> Value {
    let trend = json!({
        "type": "OBJECT",
        "properties": {
            "direction": { "type": "STRING", "enum": ["up", "down"] },
            "price_target": { "type": "NUMBER" },
            "confidence": { "type": "NUMBER" },
            "reasoning": { "type": "STRING" }
        }
    });

    json!({
        "type": "OBJECT",
        "properties": {
            "actionSignal": { "type": "STRING", "enum": ["BUY", "SELL"] },
            "trend5m": trend.clone(),
            "trend10m": trend,
            "dimensions": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "name": { "type": "STRING" },
                        "score": { "type": "NUMBER" },
                        "insight": { "type": "STRING" },
                        "status": { "type": "STRING", "enum": ["positive", "negative", "neutral"] }
                    }
                }
            },
            "similarity": {
                "type": "OBJECT",
                "properties": {
                    "matched_pattern": { "type": "STRING" },
                    "similarity_score": { "type": "NUMBER" },
                    "historical_outcome": { "type": "STRING", "enum": ["Bullish", "Bearish", "Choppy"] },
                    "pattern_duration": { "type": "STRING" },
                    "trend_correlation": { "type": "NUMBER" },
                    "key_level": { "type": "STRING" }
                }
            },
            "summary": { "type": "STRING" }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TrendDirection;

    #[test]
    fn full_prediction_payload_parses() {
        let text = r#"{
            "actionSignal": "BUY",
            "trend5m": {
                "direction": "up",
                "price_target": 2520.0,
                "confidence": 0.72,
                "reasoning": "momentum building above VWAP"
            },
            "trend10m": {
                "direction": "down",
                "price_target": 2480.0,
                "confidence": 0.55,
                "reasoning": "resistance overhead"
            },
            "dimensions": [
                { "name": "Momentum", "score": 7.5, "insight": "rising", "status": "positive" }
            ],
            "similarity": {
                "matched_pattern": "ascending triangle",
                "similarity_score": 84.0,
                "historical_outcome": "Bullish",
                "pattern_duration": "4h",
                "trend_correlation": 76.0,
                "key_level": "2500"
            },
            "summary": "short squeeze setup"
        }"#;

        let parsed = parse_prediction(text).unwrap();
        assert_eq!(parsed.action_signal, "BUY");
        assert_eq!(parsed.trend_5m.direction, Some(TrendDirection::Up));
        assert_eq!(parsed.trend_10m.direction, Some(TrendDirection::Down));
        assert_eq!(parsed.dimensions.len(), 1);
        assert!((parsed.similarity.similarity_score - 84.0).abs() < 1e-9);
    }

    #[test]
    fn sparse_payload_parses_with_defaults() {
        // Schema properties are not required; a minimal answer still parses
        // and the missing directions surface as None for ingestion to veto.
        let text = r#"{"trend5m": {}, "trend10m": {"direction": "up"}}"#;
        let parsed = parse_prediction(text).unwrap();
        assert_eq!(parsed.trend_5m.direction, None);
        assert_eq!(parsed.trend_10m.direction, Some(TrendDirection::Up));
        assert!(parsed.action_signal.is_empty());
    }

    #[test]
    fn malformed_text_is_dropped() {
        assert!(parse_prediction("not json at all").is_none());
        assert!(parse_prediction("").is_none());
    }

    #[test]
    fn response_text_extraction_skips_empty_parts() {
        let response: GenerateResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":""}]}}]}"#,
        )
        .unwrap();
        assert!(extract_text(&response).is_none());

        let response: GenerateResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"{}"}]}}]}"#,
        )
        .unwrap();
        assert_eq!(extract_text(&response), Some("{}"));
    }
}
