//! Group coordination commands.
//!
//! Both commands are fire-and-forget: a 200 response only means the speaker
//! accepted the request. The resulting grouping is only authoritative once
//! the topology has been fetched again.

use reqwest::Client;

use super::retry::with_retry;
use super::services::SonosService;
use super::soap::{SoapRequestBuilder, SoapResult};
use crate::protocol_constants::GROUP_FOLLOW_SCHEME;

/// Points a speaker's transport at a coordinator so it follows that group.
///
/// # Arguments
/// * `client` - The HTTP client to use for the request
/// * `base_url` - Base URL of the speaker that joins
/// * `coordinator_id` - Device id of the coordinator (RINCON_xxx format)
pub async fn join_group(client: &Client, base_url: &str, coordinator_id: &str) -> SoapResult<()> {
    let group_uri = format!("{}{}", GROUP_FOLLOW_SCHEME, coordinator_id);

    log::info!(
        "[Sonos] Joining {} to coordinator {} (uri: {})",
        base_url,
        coordinator_id,
        group_uri
    );

    with_retry("SetAVTransportURI", || {
        SoapRequestBuilder::new(client, base_url)
            .service(SonosService::AVTransport)
            .action("SetAVTransportURI")
            .instance_id()
            .arg("CurrentURI", group_uri.as_str())
            .arg("CurrentURIMetaData", "")
            .send()
    })
    .await?;

    Ok(())
}

/// Makes a speaker leave its current group and become standalone.
///
/// Safe to call on a speaker that is already standalone.
pub async fn leave_group(client: &Client, base_url: &str) -> SoapResult<()> {
    log::info!("[Sonos] Speaker {} leaving group (becoming standalone)", base_url);

    SoapRequestBuilder::new(client, base_url)
        .service(SonosService::AVTransport)
        .action("BecomeCoordinatorOfStandaloneGroup")
        .instance_id()
        .send()
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    #[tokio::test]
    async fn join_sets_follow_uri() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/MediaRenderer/AVTransport/Control")
            .match_header(
                "soapaction",
                "\"urn:schemas-upnp-org:service:AVTransport:1#SetAVTransportURI\"",
            )
            .match_body(Matcher::Regex(
                "<CurrentURI>x-rincon:RINCON_COORD</CurrentURI>".into(),
            ))
            .with_status(200)
            .with_body("<s:Envelope/>")
            .expect(1)
            .create_async()
            .await;

        join_group(&Client::new(), &server.url(), "RINCON_COORD")
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn leave_becomes_standalone() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/MediaRenderer/AVTransport/Control")
            .match_header(
                "soapaction",
                "\"urn:schemas-upnp-org:service:AVTransport:1#BecomeCoordinatorOfStandaloneGroup\"",
            )
            .with_status(200)
            .with_body("<s:Envelope/>")
            .create_async()
            .await;

        leave_group(&Client::new(), &server.url()).await.unwrap();
        mock.assert_async().await;
    }
}
