// src/notify/transport.rs

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

const TELEGRAM_API: &str = "https://api.telegram.org";

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Request failed: {0}")]
    RequestFailed(String),
    #[error("Rejected: {0}")]
    Rejected(String),
}

/// Delivers one text to one destination.
pub trait Transport: Send + Sync {
    fn send(&self, destination: i64, text: &str) -> Result<(), DeliveryError>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn send(&self, destination: i64, text: &str) -> Result<(), DeliveryError> {
        (**self).send(destination, text)
    }
}

pub struct TelegramTransport {
    api_base: String,
    token: String,
    client: Client,
}

#[derive(Serialize)]
struct SendMessagePayload<'a> {
    chat_id: i64,
    text: &'a str,
    disable_web_page_preview: bool,
}

#[derive(Deserialize)]
struct ApiResponse {
    ok: bool,
    description: Option<String>,
}

impl TelegramTransport {
    pub fn new(token: String, timeout: Duration) -> Result<Self, DeliveryError> {
        Self::with_api_base(token, TELEGRAM_API.to_string(), timeout)
    }

    pub fn with_api_base(
        token: String,
        api_base: String,
        timeout: Duration,
    ) -> Result<Self, DeliveryError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DeliveryError::RequestFailed(e.to_string()))?;

        Ok(Self {
            api_base: api_base.trim_end_matches('/').to_string(),
            token,
            client,
        })
    }
}

impl Transport for TelegramTransport {
    fn send(&self, destination: i64, text: &str) -> Result<(), DeliveryError> {
        let payload = SendMessagePayload {
            chat_id: destination,
            text,
            disable_web_page_preview: true,
        };

        let resp = self
            .client
            .post(format!("{}/bot{}/sendMessage", self.api_base, self.token))
            .json(&payload)
            .send()
            .map_err(|e| DeliveryError::RequestFailed(e.to_string()))?;

        let status = resp.status();
        let body: Option<ApiResponse> = resp.json().ok();

        match body {
            Some(ApiResponse { ok: true, .. }) if status.is_success() => Ok(()),
            Some(ApiResponse { description, .. }) => Err(DeliveryError::Rejected(format!(
                "{}: {}",
                status,
                description.unwrap_or_else(|| "no description".to_string())
            ))),
            None => Err(DeliveryError::Rejected(format!("{status}: unreadable body"))),
        }
    }
}

/// Writes notifications to the log instead of sending them.
pub struct LogTransport;

impl Transport for LogTransport {
    fn send(&self, destination: i64, text: &str) -> Result<(), DeliveryError> {
        info!(destination, text, "notification (log transport)");
        Ok(())
    }
}
