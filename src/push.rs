use crate::ports::PushTransport;
use anyhow::{Context, Result};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const EXPO_PUSH_URL: &str = "https://exp.host/--/api/v2/push/send";

pub fn is_expo_token(token: &str) -> bool {
    token.contains("ExponentPushToken") || token.contains("ExpoPushToken")
}

#[derive(Debug, Serialize)]
struct ExpoMessage<'a> {
    to: &'a str,
    title: &'a str,
    body: &'a str,
    sound: &'static str,
    data: &'a serde_json::Value,
    badge: u32,
}

pub struct ExpoPush {
    client: reqwest::blocking::Client,
    endpoint: String,
}

impl ExpoPush {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .context("push client setup failed")?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
        })
    }
}

impl PushTransport for ExpoPush {
    fn send(&self, device_token: &str, title: &str, body: &str, data: &serde_json::Value) -> bool {
        if !is_expo_token(device_token) {
            debug!("skipping push: not an Expo token");
            return false;
        }

        let msg = ExpoMessage {
            to: device_token,
            title,
            body,
            sound: "default",
            data,
            badge: 1,
        };

        match self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&msg)
            .send()
        {
            Ok(resp) if resp.status().is_success() => true,
            Ok(resp) => {
                warn!(status = %resp.status(), "push rejected");
                false
            }
            Err(e) => {
                warn!(error = %e, "push request failed");
                false
            }
        }
    }
}

/// Logs instead of delivering. Used when push is disabled.
pub struct LogPush;

impl PushTransport for LogPush {
    fn send(&self, _device_token: &str, title: &str, body: &str, data: &serde_json::Value) -> bool {
        info!(title, body, data = %data, "push (not delivered)");
        true
    }
}
