//! GENA HTTP client for subscription operations.
//!
//! Handles only the HTTP side of eventing: SUBSCRIBE, renewal and
//! UNSUBSCRIBE against a service's event path.

use reqwest::{Client, Method};

use super::gena::{GenaError, GenaResult};
use super::services::SonosService;

/// Response from a successful GENA subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscribeResponse {
    /// The subscription ID returned by the speaker.
    pub sid: String,
    /// The timeout the speaker granted, in seconds.
    pub timeout_secs: u64,
}

/// HTTP client for GENA (UPnP eventing) operations.
///
/// State management is delegated to `GenaSubscriptionStore`.
#[derive(Debug, Clone)]
pub struct GenaClient {
    client: Client,
}

fn method(name: &str) -> GenaResult<Method> {
    Method::from_bytes(name.as_bytes()).map_err(|_| GenaError::InvalidMethod(name.to_string()))
}

fn event_url(base_url: &str, service: SonosService) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), service.event_path())
}

/// Parses a `TIMEOUT: Second-N` header, falling back to `requested`.
fn extract_timeout_secs(response: &reqwest::Response, requested: u64) -> u64 {
    response
        .headers()
        .get("TIMEOUT")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().strip_prefix("Second-"))
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(requested)
}

impl GenaClient {
    /// Creates a new GENA client with the given HTTP client.
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Sends a SUBSCRIBE request to create a new subscription.
    ///
    /// # Arguments
    /// * `base_url` - Device base URL
    /// * `service` - The UPnP service to subscribe to
    /// * `callback_url` - URL where NOTIFY events should be sent
    /// * `timeout_secs` - Requested subscription lifetime
    ///
    /// # Errors
    /// Non-2xx status or a response without a `SID` header.
    pub async fn subscribe(
        &self,
        base_url: &str,
        service: SonosService,
        callback_url: &str,
        timeout_secs: u64,
    ) -> GenaResult<SubscribeResponse> {
        let url = event_url(base_url, service);
        log::debug!("[GENA] SUBSCRIBE {} -> {}", url, callback_url);

        let response = self
            .client
            .request(method("SUBSCRIBE")?, &url)
            .header("CALLBACK", format!("<{}>", callback_url))
            .header("NT", "upnp:event")
            .header("TIMEOUT", format!("Second-{}", timeout_secs))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GenaError::SubscriptionFailed(response.status().as_u16()));
        }

        let sid = response
            .headers()
            .get("SID")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or(GenaError::MissingSid)?;

        Ok(SubscribeResponse {
            sid,
            timeout_secs: extract_timeout_secs(&response, timeout_secs),
        })
    }

    /// Re-issues SUBSCRIBE with an existing SID.
    ///
    /// # Returns
    /// The timeout granted by the speaker.
    pub async fn renew(
        &self,
        base_url: &str,
        service: SonosService,
        sid: &str,
        timeout_secs: u64,
    ) -> GenaResult<u64> {
        let url = event_url(base_url, service);

        let response = self
            .client
            .request(method("SUBSCRIBE")?, &url)
            .header("SID", sid)
            .header("TIMEOUT", format!("Second-{}", timeout_secs))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GenaError::RenewalFailed(response.status().as_u16()));
        }

        Ok(extract_timeout_secs(&response, timeout_secs))
    }

    /// Sends an UNSUBSCRIBE request.
    ///
    /// # Returns
    /// `true` if the speaker acknowledged it. Failure is never an error.
    pub async fn unsubscribe(&self, base_url: &str, service: SonosService, sid: &str) -> bool {
        let url = event_url(base_url, service);
        let Ok(unsubscribe) = method("UNSUBSCRIBE") else {
            return false;
        };

        match self.client.request(unsubscribe, &url).header("SID", sid).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                log::debug!("[GENA] UNSUBSCRIBE {} failed: {}", url, e);
                false
            }
        }
    }
}
