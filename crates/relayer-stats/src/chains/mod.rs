// Remote chain access used to discover light client ids

use async_trait::async_trait;

use crate::error::RemoteError;

pub mod lcd;

pub use lcd::LcdClient;

/// Read access to a chain's IBC light client state
#[async_trait]
pub trait RemoteChainClient: Send + Sync {
    /// Client id bound to `port_id`/`channel_id`, read from the LCD at `lcd`
    /// using the `client_state_path` template
    async fn client_id_for_channel(
        &self,
        lcd: &str,
        client_state_path: &str,
        port_id: &str,
        channel_id: &str,
    ) -> Result<String, RemoteError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_trait_object_compiles() {
        struct FixedClient;

        #[async_trait]
        impl RemoteChainClient for FixedClient {
            async fn client_id_for_channel(&self, _: &str, _: &str, _: &str, channel_id: &str) -> Result<String, RemoteError> {
                Ok(format!("07-tendermint-{}", channel_id.trim_start_matches("channel-")))
            }
        }

        let client: Box<dyn RemoteChainClient> = Box::new(FixedClient);
        let id = client.client_id_for_channel("http://lcd", "/p", "transfer", "channel-7").await.unwrap();
        assert_eq!(id, "07-tendermint-7");
    }
}
