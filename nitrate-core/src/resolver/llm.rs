//! Identity Resolver, Stage A (C3): an LLM filename parser.
//!
//! Talks to an OpenAI-compatible `/chat/completions` endpoint with a plain
//! `reqwest::Client`, the way `xchecker`'s OpenRouter backend does — no SDK,
//! just a JSON request/response pair and a tolerant parser around the text
//! the model actually returned.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use super::cache::Cache;
use super::retry::{retry_async, RetryPolicy};
use super::types::{FilenameGuess, MediaType};
use crate::error::{LibraryError, Result};

const SYSTEM_PROMPT: &str = "You parse video filenames into structured metadata. \
Strip resolution, codec, release-group, version, and extension noise. \
Map a trailing isolated number of two or more digits, or explicit S/E markers, \
to season and episode; if episodes are detected but no season is given, default \
season to 1. Respond with a single JSON object only, with keys: \
title (string), type (\"movie\" or \"tv\"), year (four-digit number or omit), \
season (integer, tv only), episode (integer, tv only). No prose, no markdown.";

const DEFAULT_CACHE_CAPACITY: usize = 128;
const OFFICIAL_OPENAI_HOST: &str = "api.openai.com";

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    pub timeout: Duration,
}

/// Stage A client: filename -> [`FilenameGuess`], cached and retried per
/// SPEC_FULL.md §4.3.
pub struct LlmResolver {
    http: reqwest::Client,
    config: LlmConfig,
    cache: Cache<String, FilenameGuess>,
}

#[derive(Debug)]
enum StageAError {
    /// Transport failure, timeout, or rate limit: retryable.
    Transient(String),
    /// Empty input, empty response, or malformed JSON: not retryable.
    Permanent(String),
}

impl LlmResolver {
    pub fn new(config: LlmConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LibraryError::Internal(format!("building http client: {e}")))?;

        Ok(Self {
            http,
            config,
            cache: Cache::new(DEFAULT_CACHE_CAPACITY),
        })
    }

    pub async fn parse_filename(&self, filename: &str) -> Result<FilenameGuess> {
        if filename.trim().is_empty() {
            return Err(LibraryError::LlmParse("empty filename".to_string()));
        }

        if let Some(cached) = self.cache.get(&filename.to_string()).await {
            return Ok(cached);
        }

        let result = retry_async(
            RetryPolicy::default(),
            |err| matches!(err, StageAError::Transient(_)),
            |_attempt| self.invoke_once(filename),
        )
        .await;

        let guess = match result {
            Ok(guess) => guess,
            Err(StageAError::Transient(msg)) => return Err(LibraryError::LlmTransport(msg)),
            Err(StageAError::Permanent(msg)) => return Err(LibraryError::LlmParse(msg)),
        };

        self.cache.put(filename.to_string(), guess.clone()).await;
        Ok(guess)
    }

    async fn invoke_once(&self, filename: &str) -> std::result::Result<FilenameGuess, StageAError> {
        let mut request = ChatRequest {
            model: self.config.model.clone(),
            temperature: self.config.temperature,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: filename.to_string(),
                },
            ],
            response_format: None,
        };

        if self.is_official_endpoint() {
            request.response_format = Some(ResponseFormat {
                format_type: "json_object".to_string(),
            });
        }

        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| StageAError::Transient(format!("llm request failed: {e}")))?;

        let status = response.status();
        if status.as_u16() == 429 || status.is_server_error() {
            return Err(StageAError::Transient(format!(
                "llm endpoint returned {status}"
            )));
        }
        if !status.is_success() {
            return Err(StageAError::Permanent(format!(
                "llm endpoint returned {status}"
            )));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| StageAError::Transient(format!("reading llm response: {e}")))?;

        let content = body
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .ok_or_else(|| StageAError::Permanent("llm response missing content".to_string()))?;

        parse_llm_json(&content).map_err(StageAError::Permanent)
    }

    fn is_official_endpoint(&self) -> bool {
        self.config
            .base_url
            .parse::<url::Url>()
            .ok()
            .and_then(|u| u.host_str().map(|h| h == OFFICIAL_OPENAI_HOST))
            .unwrap_or(false)
    }
}

/// Tolerant response parser (SPEC_FULL.md §4.3, §9): strip fenced code
/// blocks, strip `<think>...</think>`-style reasoning blocks, extract the
/// substring between the first `{` and the last `}`, then decode. No extra
/// heuristics beyond this pipeline — they would change test outcomes.
fn parse_llm_json(raw: &str) -> std::result::Result<FilenameGuess, String> {
    if raw.trim().is_empty() {
        return Err("empty llm response".to_string());
    }

    let without_fences = strip_code_fences(raw);
    let without_reasoning = strip_reasoning_tags(&without_fences);

    let start = without_reasoning
        .find('{')
        .ok_or_else(|| "no JSON object found in llm response".to_string())?;
    let end = without_reasoning
        .rfind('}')
        .ok_or_else(|| "no JSON object found in llm response".to_string())?;
    if end < start {
        return Err("malformed JSON object bounds in llm response".to_string());
    }

    let candidate = &without_reasoning[start..=end];
    let value: Value =
        serde_json::from_str(candidate).map_err(|e| format!("invalid JSON from llm: {e}"))?;

    parse_guess_value(value)
}

fn strip_code_fences(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut in_fence = false;
    for line in raw.lines() {
        if line.trim_start().starts_with("```") {
            in_fence = !in_fence;
            continue;
        }
        out.push_str(line);
        out.push('\n');
    }
    out
}

fn strip_reasoning_tags(raw: &str) -> String {
    const TAGS: [(&str, &str); 2] = [("<think>", "</think>"), ("<reasoning>", "</reasoning>")];
    let mut text = raw.to_string();
    for (open, close) in TAGS {
        while let Some(start) = text.find(open) {
            if let Some(end) = text[start..].find(close) {
                text.replace_range(start..start + end + close.len(), "");
            } else {
                text.replace_range(start..text.len(), "");
                break;
            }
        }
    }
    text
}

fn parse_guess_value(value: Value) -> std::result::Result<FilenameGuess, String> {
    let obj = value
        .as_object()
        .ok_or_else(|| "llm JSON is not an object".to_string())?;

    let title = obj
        .get("title")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| "llm JSON missing required 'title'".to_string())?
        .to_string();

    let media_type = match obj.get("type").and_then(Value::as_str) {
        Some("tv") => MediaType::Tv,
        Some("movie") => MediaType::Movie,
        // Missing or unrecognized type defaults to movie (SPEC_FULL.md §4.3).
        _ => MediaType::Movie,
    };

    let year = obj
        .get("year")
        .and_then(Value::as_i64)
        .map(|y| y as i32)
        .filter(|y| (1900..=2099).contains(y));

    let (season, episode) = match media_type {
        MediaType::Tv => {
            let episode = obj.get("episode").and_then(Value::as_u64).map(|e| e as u32);
            let season = obj
                .get("season")
                .and_then(Value::as_u64)
                .map(|s| s as u32)
                .or(episode.map(|_| 1));
            (season, episode)
        }
        MediaType::Movie => (None, None),
    };

    Ok(FilenameGuess {
        title,
        media_type,
        year,
        season,
        episode,
    })
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    temperature: f32,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}
