//! Broadcast dispatch for the closest-aircraft selection.
//!
//! Fire-and-forget HTTP POST of the payload as JSON.

use planeradar_core::presentation::BroadcastPayload;

/// Posts broadcast payloads to the relay URL.
#[derive(Clone)]
pub struct BroadcastDispatcher {
    url: String,
    client: reqwest::Client,
}

impl BroadcastDispatcher {
    pub fn new(url: &str) -> Self {
        BroadcastDispatcher {
            url: url.to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Fire-and-forget POST. The response is ignored; failures are logged.
    /// Must be called from within a tokio runtime.
    pub fn send(&self, payload: BroadcastPayload) {
        let client = self.client.clone();
        let url = self.url.clone();

        tokio::spawn(async move {
            match client.post(&url).json(&payload).send().await {
                Ok(_) => log::debug!("broadcast {} sent", payload.callsign),
                Err(e) => log::warn!("broadcast POST to {url} failed: {e}"),
            }
        });
    }
}
