//! LibreTranslate public instance.
//! POST form `q, source, target, format=text`; reply `{"translatedText": ..}`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;

use super::{accept_text, build_http_client, TranslateError, Translator};

pub const PROVIDER_ID: &str = "libretranslate";
pub const DEFAULT_BASE_URL: &str = "https://libretranslate.de/translate";

pub struct LibreTranslate {
    http: reqwest::Client,
    base_url: String,
}

impl LibreTranslate {
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
        self.http.post(&self.base_url).form(&[
            ("q", text),
            ("source", source_lang),
            ("target", target_lang),
            ("format", "text"),
        ])
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LibreResponse {
    translated_text: Option<String>,
}

fn parse_response(body: &str) -> Result<String, TranslateError> {
    let parsed: LibreResponse =
        serde_json::from_str(body).map_err(|e| TranslateError::Malformed(e.to_string()))?;
    accept_text(parsed.translated_text.as_deref())
}

#[async_trait]
impl Translator for LibreTranslate {
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
