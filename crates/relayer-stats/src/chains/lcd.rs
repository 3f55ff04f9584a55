// LCD (REST) client for Cosmos SDK chains

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use super::RemoteChainClient;
use crate::error::RemoteError;

/// Default client state path exposed by ibc-go
pub const DEFAULT_CLIENT_STATE_PATH: &str = "/ibc/core/channel/v1/channels/{channel_id}/ports/{port_id}/client_state";

pub struct LcdClient {
    client: Client,
}

impl LcdClient {
    /// Create a client whose requests give up after `timeout`
    pub fn new(timeout: Duration) -> Result<Self, RemoteError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    fn client_state_url(lcd: &str, client_state_path: &str, port_id: &str, channel_id: &str) -> String {
        let template = if client_state_path.is_empty() {
            DEFAULT_CLIENT_STATE_PATH
        } else {
            client_state_path
        };
        let path = template
            .replace("{channel_id}", channel_id)
            .replace("{port_id}", port_id);
        format!("{}{}", lcd.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl RemoteChainClient for LcdClient {
    async fn client_id_for_channel(
        &self,
        lcd: &str,
        client_state_path: &str,
        port_id: &str,
        channel_id: &str,
    ) -> Result<String, RemoteError> {
        let url = Self::client_state_url(lcd, client_state_path, port_id, channel_id);
        debug!("Querying client state: {}", url);

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(RemoteError::Status {
                status: response.status().as_u16(),
                url,
            });
        }

        let result: Value = response
            .json()
            .await
            .map_err(|e| RemoteError::Malformed(format!("{}: {}", url, e)))?;

        result
            .get("identified_client_state")
            .and_then(|s| s.get("client_id"))
            .and_then(|id| id.as_str())
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .ok_or_else(|| RemoteError::Malformed(format!("no client id in response from {}", url)))
    }
}
