// HTTP Transport - reqwest client for POST /gossip
//
// One request per round. Connection failures, timeouts, non-2xx statuses and
// undecodable bodies all come back as errors for the caller to log.

use crate::sync::GossipPayload;
use crate::transport::{GossipTransport, PeerAddress, TransportConfig, TransportError};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;

/// Gossip client over HTTP/1.1
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
    config: TransportConfig,
}

impl HttpTransport {
    pub fn new(config: TransportConfig) -> Result<Self, TransportError> {
        config.validate()?;
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(config.connect_timeout())
            .build()
            .map_err(|e| TransportError::InvalidConfig(e.to_string()))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }
}

fn classify(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::ConnectionFailed(err.to_string())
    }
}

#[async_trait]
impl GossipTransport for HttpTransport {
    async fn exchange(
        &self,
        peer: &PeerAddress,
        payload: &GossipPayload,
    ) -> Result<GossipPayload, TransportError> {
        let body = payload.to_json()?;

        let response = self
            .client
            .post(peer.gossip_url())
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }

        let bytes = response.bytes().await.map_err(classify)?;
        Ok(GossipPayload::from_json_limited(
            &bytes,
            self.config.max_payload_bytes,
        )?)
    }
}
