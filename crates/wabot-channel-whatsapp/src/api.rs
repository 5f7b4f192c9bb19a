//! HTTP client for the WhatsApp bridge process.
//!
//! The bridge owns the multi-device protocol, session encryption and
//! credential storage; this client only consumes its small HTTP surface.

use std::time::Duration;

use anyhow::{Context, bail};
use reqwest::{Client, RequestBuilder};

use crate::types::{BridgeStatus, SendTextParams, WaEnvelope};

/// HTTP client for the bridge API.
pub struct BridgeApi {
    client: Client,
    base_url: String,
    api_token: Option<String>,
}

impl BridgeApi {
    /// Create a new API client for the bridge at `base_url`.
    pub fn new(base_url: &str, api_token: Option<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .expect("failed to build reqwest client");
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token,
        }
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.api_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Link status, bot identity and pending QR code.
    pub async fn status(&self) -> anyhow::Result<BridgeStatus> {
        let resp = self
            .authorize(self.client.get(format!("{}/status", self.base_url)))
            .send()
            .await
            .context("status request failed")?;
        if !resp.status().is_success() {
            bail!("status failed: {}", resp.status());
        }
        resp.json().await.context("status response parse failed")
    }

    /// Long-poll for message events with a sequence number of at least
    /// `after`. Returns an empty batch when `timeout_secs` elapses first.
    pub async fn poll_messages(
        &self,
        after: i64,
        timeout_secs: u64,
    ) -> anyhow::Result<Vec<WaEnvelope>> {
        let resp = self
            .authorize(self.client.get(format!("{}/messages", self.base_url)))
            .query(&[("after", after.to_string()), ("timeout", timeout_secs.to_string())])
            .send()
            .await
            .context("messages request failed")?;
        if !resp.status().is_success() {
            bail!("messages failed: {}", resp.status());
        }
        resp.json().await.context("messages response parse failed")
    }

    /// Send a plain text message to `jid`.
    pub async fn send_text(&self, jid: &str, text: &str) -> anyhow::Result<()> {
        let resp = self
            .authorize(self.client.post(format!("{}/send", self.base_url)))
            .json(&SendTextParams { jid, text })
            .send()
            .await
            .context("send request failed")?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            bail!("send failed ({status}): {body}");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trimmed() {
        let api = BridgeApi::new("http://127.0.0.1:8077/", None);
        assert_eq!(api.base_url, "http://127.0.0.1:8077");
    }
}
