//! reqwest-backed prediction endpoint.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Url};
use tracing::debug;

use super::{IMAGE_FIELD, IMAGE_FILE_NAME, PredictionEndpoint, PredictionResult};
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::processing::JpegPayload;

/// `POST {endpoint}/predict` with a multipart body.
pub struct HttpEndpoint {
    client: Client,
    url: Url,
}

impl HttpEndpoint {
    pub fn new(config: &ClientConfig) -> ClientResult<Self> {
        config.validate()?;
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ClientError::transport_source("build_client", e))?;
        Ok(Self {
            client,
            url: config.predict_url()?,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl PredictionEndpoint for HttpEndpoint {
    async fn predict(&self, payload: JpegPayload) -> ClientResult<PredictionResult> {
        let len = payload.bytes.len();
        let part = Part::bytes(payload.bytes)
            .file_name(IMAGE_FILE_NAME)
            .mime_str("image/jpeg")
            .map_err(|e| ClientError::transport_source("build_form", e))?;
        let form = Form::new().part(IMAGE_FIELD, part);

        debug!(url = %self.url, len, "sending prediction request");
        let response = self
            .client
            .post(self.url.clone())
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                ClientError::transport_source("predict", e).with_context(format!("POST {}", self.url))
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::http_status("predict", status.as_u16())
                .with_context(format!("POST {}", self.url)));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| ClientError::transport_source("read_response", e))?;
        PredictionResult::from_json(&body)
    }
}
