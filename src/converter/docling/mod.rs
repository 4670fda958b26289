//! HTTP client for a docling-serve instance.
//!
//! Files are posted to `/v1/convert/file` with `to_formats=json`; the lossless DoclingDocument in
//! `document.json_content` is flattened into [`ConvertedDocument`] elements in body order.

mod schema;

use super::{ConversionError, ConversionOptions, DocumentConverter, InputFormat};
use crate::document::ConvertedDocument;
use async_trait::async_trait;
use reqwest::{Client, Method, multipart};
use schema::ConvertResponse;
use std::path::Path;
use std::time::Duration;

const CONVERT_PATH: &str = "v1/convert/file";
const HEALTH_PATH: &str = "health";

/// Converter that delegates to docling-serve.
pub struct DoclingServeConverter {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl DoclingServeConverter {
    /// Build a client for the instance at `base_url`.
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ConversionError> {
        let base_url = normalize_base_url(base_url).map_err(ConversionError::Configuration)?;
        let client = Client::builder()
            .user_agent(concat!("docchunk/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;

        tracing::debug!(
            url = %base_url,
            has_api_key = api_key.as_deref().is_some_and(|key| !key.is_empty()),
            timeout_secs = timeout.as_secs(),
            "Initialized docling-serve client"
        );
        Ok(Self {
            client,
            base_url,
            api_key,
        })
    }

    /// Check that the instance answers its health endpoint.
    pub async fn probe(&self) -> Result<(), ConversionError> {
        let response = self.request(Method::GET, HEALTH_PATH).send().await?;
        if response.status().is_success() {
            tracing::debug!(url = %self.base_url, "docling-serve is healthy");
            return Ok(());
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(ConversionError::UnexpectedStatus { status, body })
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let mut request = self.client.request(method, url);
        if let Some(api_key) = &self.api_key
            && !api_key.is_empty()
        {
            request = request.header("X-Api-Key", api_key);
        }
        request
    }
}

#[async_trait]
impl DocumentConverter for DoclingServeConverter {
    fn name(&self) -> &'static str {
        "docling"
    }

    fn supports(&self, _format: InputFormat) -> bool {
        true
    }

    async fn convert(
        &self,
        path: &Path,
        format: InputFormat,
        options: &ConversionOptions,
    ) -> Result<ConvertedDocument, ConversionError> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("upload.{}", format.as_str()));

        let form = multipart::Form::new()
            .text("to_formats", "json")
            .text("image_export_mode", "placeholder")
            .text("do_ocr", options.do_ocr.to_string())
            .text("do_table_structure", options.do_table_structure.to_string())
            .part("files", multipart::Part::bytes(bytes).file_name(file_name));

        tracing::debug!(%format, do_ocr = options.do_ocr, "Sending document to docling-serve");
        let response = self
            .request(Method::POST, CONVERT_PATH)
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = ConversionError::UnexpectedStatus { status, body };
            tracing::error!(error = %error, "docling-serve conversion failed");
            return Err(error);
        }

        let payload: ConvertResponse = response.json().await?;
        if payload.status.as_deref() == Some("failure") {
            return Err(ConversionError::InvalidResponse(format!(
                "conversion failed: {}",
                serde_json::Value::from(payload.errors)
            )));
        }
        if !payload.errors.is_empty() {
            tracing::warn!(errors = payload.errors.len(), "docling-serve reported partial errors");
        }

        let document = payload.document.json_content.ok_or_else(|| {
            ConversionError::InvalidResponse("response has no json_content".into())
        })?;
        Ok(document.into_converted())
    }
}

fn normalize_base_url(url: &str) -> Result<String, String> {
    let parsed = reqwest::Url::parse(url).map_err(|err| format!("{url}: {err}"))?;
    Ok(parsed.as_str().trim_end_matches('/').to_string())
}
