//! MyMemory public API.
//! GET `?q=..&langpair=src|tgt`; success requires `responseStatus == 200` in
//! the body as well as HTTP 200.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;

use super::{accept_text, build_http_client, TranslateError, Translator};

pub const PROVIDER_ID: &str = "mymemory";
pub const DEFAULT_BASE_URL: &str = "https://api.mymemory.translated.net/get";

pub struct MyMemory {
    http: reqwest::Client,
    base_url: String,
}

impl MyMemory {
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
        let langpair = format!("{source_lang}|{target_lang}");
        self.http
            .get(&self.base_url)
            .query(&[("q", text), ("langpair", langpair.as_str())])
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MyMemoryResponse {
    /// Numeric on success; some error replies carry a string here.
    response_status: serde_json::Value,
    response_data: Option<MyMemoryData>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MyMemoryData {
    translated_text: Option<String>,
}

fn parse_response(body: &str) -> Result<String, TranslateError> {
    let parsed: MyMemoryResponse =
        serde_json::from_str(body).map_err(|e| TranslateError::Malformed(e.to_string()))?;
    match parsed.response_status.as_i64() {
        Some(200) => {}
        Some(code) => return Err(TranslateError::ProviderStatus(code)),
        None => {
            return Err(TranslateError::Malformed(format!(
                "non-numeric responseStatus {}",
                parsed.response_status
            )))
        }
    }
    accept_text(
        parsed
            .response_data
            .as_ref()
            .and_then(|d| d.translated_text.as_deref()),
    )
}

#[async_trait]
impl Translator for MyMemory {
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
        let body = resp.text().await.map_err(TranslateError::from_transport)?;
        parse_response(&body)
    }
}
