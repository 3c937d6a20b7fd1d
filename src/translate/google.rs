//! Google Translate free endpoint (unofficial `gtx` client).
//! GET `?client=gtx&sl=..&tl=..&dt=t&q=..`; the first segment of the first
//! sentence block (`[0][0][0]`) is the translation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;

use super::{accept_text, build_http_client, TranslateError, Translator};

pub const PROVIDER_ID: &str = "google";
pub const DEFAULT_BASE_URL: &str = "https://translate.googleapis.com/translate_a/single";

pub struct GoogleTranslateFree {
    http: reqwest::Client,
    base_url: String,
}

impl GoogleTranslateFree {
    pub fn new(timeout: Duration) -> Result<Self, TranslateError> {
        Self::with_base_url(DEFAULT_BASE_URL, timeout)
    }

    pub fn with_base_url(base_url: impl Into<String>, timeout: Duration) -> Result<Self, TranslateError> {
        Ok(Self {
            http: build_http_client(timeout)?,
            base_url: base_url.into(),
        })
    }

    fn request(&self, text: &str, source_lang: &str, target_lang: &str) -> reqwest::RequestBuilder {
        self.http.get(&self.base_url).query(&[
            ("client", "gtx"),
            ("sl", source_lang),
            ("tl", target_lang),
            ("dt", "t"),
            ("q", text),
        ])
    }
}

/// Extract `body[0][0][0]`.
fn parse_response(body: &Value) -> Result<String, TranslateError> {
    let segments = body
        .get(0)
        .and_then(Value::as_array)
        .ok_or_else(|| TranslateError::Malformed("expected sentence array at [0]".into()))?;
    let text = segments
        .first()
        .and_then(|segment| segment.get(0))
        .and_then(Value::as_str);
    accept_text(text)
}

#[async_trait]
impl Translator for GoogleTranslateFree {
    fn id(&self) -> &str {
        PROVIDER_ID
    }

    async fn translate(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
    ) -> Result<String, TranslateError> {
        let resp = self
            .request(text, source_lang, target_lang)
            .send()
            .await
            .map_err(TranslateError::from_transport)?;
        if resp.status() != StatusCode::OK {
            return Err(TranslateError::Status(resp.status().as_u16()));
        }
        let body: Value = resp
            .json()
            .await
            .map_err(|e| TranslateError::Malformed(e.to_string()))?;
        parse_response(&body)
    }
}
