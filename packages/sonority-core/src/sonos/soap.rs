//! Low-level SOAP protocol implementation for UPnP communication.
//!
//! This module handles the raw SOAP envelope building, HTTP transport,
//! and fault detection. For high-level commands, see `rendering.rs`,
//! `transport.rs` and `zone_groups.rs`.

use reqwest::{Client, StatusCode};
use thiserror::Error;

use super::services::SonosService;
use super::xml::{escape_xml, extract_raw, extract_value};

// ─────────────────────────────────────────────────────────────────────────────
// Error Types
// ─────────────────────────────────────────────────────────────────────────────

/// Errors that can occur during SOAP operations.
#[derive(Debug, Error)]
pub enum SoapError {
    /// HTTP request to the speaker failed (connect error or timeout).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Speaker returned a non-200 HTTP status without a SOAP fault.
    #[error("HTTP error {0}: {1}")]
    HttpStatus(u16, String),

    /// Speaker returned a SOAP fault response.
    #[error("SOAP fault: {0}")]
    Fault(String),

    /// Response body could not be decoded as text.
    #[error("Response body is not valid text")]
    NoData,

    /// A required value was missing from the response.
    #[error("Failed to parse SOAP response")]
    Parse,
}

/// Convenient Result alias for SOAP operations.
pub type SoapResult<T> = Result<T, SoapError>;

impl SoapError {
    /// Returns true if this error is transient and the operation should be retried.
    ///
    /// Transient UPnP fault codes:
    /// - 701: Transition not available (device changing states)
    /// - 714: Illegal seek target (previous source still loading)
    /// - 716: Resource not found (device busy initializing)
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            // Network timeouts can also be transient
            SoapError::Http(e) => e.is_timeout(),
            _ => self.is_transient_fault(),
        }
    }

    /// Returns true for the transient UPnP faults only, never for timeouts.
    #[must_use]
    pub fn is_transient_fault(&self) -> bool {
        match self {
            SoapError::Fault(msg) => {
                msg.contains("701")
                    || msg.contains("714")
                    || msg.contains("716")
                    || msg.to_lowercase().contains("transition")
            }
            _ => false,
        }
    }

    /// Returns the UPnP error code carried by a fault, if any.
    #[must_use]
    pub fn upnp_error_code(&self) -> Option<u16> {
        match self {
            SoapError::Fault(msg) => msg
                .rsplit_once("errorCode ")
                .and_then(|(_, rest)| rest.trim_end_matches(')').parse().ok()),
            _ => None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// SOAP Request/Response
// ─────────────────────────────────────────────────────────────────────────────

/// Builds the SOAP 1.1 envelope for one action.
///
/// The envelope is a single line with no leading whitespace; speakers reject
/// documents with whitespace before the root element.
pub(crate) fn build_envelope(service_urn: &str, action: &str, args: &[(&str, &str)]) -> String {
    let mut body = format!(
        r#"<?xml version="1.0" encoding="utf-8"?><s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/" s:encodingStyle="http://schemas.xmlsoap.org/soap/encoding/"><s:Body><u:{} xmlns:u="{}">"#,
        action, service_urn
    );

    for (k, v) in args {
        body.push_str(&format!("<{k}>{}</{k}>", escape_xml(v)));
    }

    body.push_str(&format!("</u:{}></s:Body></s:Envelope>", action));
    body
}

/// Sends a SOAP request to a speaker.
///
/// This is the core transport function for all UPnP SOAP operations.
/// It builds the SOAP envelope, POSTs it to `base_url + endpoint`, and
/// classifies the response.
///
/// # Arguments
/// * `client` - The HTTP client (carries the connect and total timeouts)
/// * `base_url` - Device base URL, e.g. `http://192.168.1.20:1400`
/// * `endpoint` - The control URL path (e.g., "/MediaRenderer/AVTransport/Control")
/// * `service_urn` - The UPnP service URN
/// * `action` - The SOAP action name (e.g., "Play", "GetVolume")
/// * `args` - Key-value pairs for action arguments (order is preserved)
///
/// # Returns
/// The raw response body on success.
///
/// # Errors
/// - `Fault` when the body is a SOAP fault (speakers send these with status 500)
/// - `HttpStatus` for any other non-200 status
/// - `NoData` when a 200 body is not valid UTF-8
pub async fn send_soap_request(
    client: &Client,
    base_url: &str,
    endpoint: &str,
    service_urn: &str,
    action: &str,
    args: &[(&str, &str)],
) -> SoapResult<String> {
    let url = format!("{}{}", base_url.trim_end_matches('/'), endpoint);
    let body = build_envelope(service_urn, action, args);

    log::debug!("[SOAP] {} -> {} (body: {} bytes)", action, url, body.len());
    log::trace!("[SOAP] Request body: {}", body);

    let start = std::time::Instant::now();
    let res = client
        .post(&url)
        .header("Content-Type", "text/xml; charset=utf-8")
        .header("SOAPAction", format!("\"{}#{}\"", service_urn, action))
        .body(body)
        .send()
        .await;

    log::trace!(
        "[SOAP] {} completed in {:?}: {:?}",
        action,
        start.elapsed(),
        res.as_ref().map(|r| r.status())
    );

    let res = res?;
    let status = res.status();
    let bytes = res.bytes().await?;

    if status != StatusCode::OK {
        let body = String::from_utf8_lossy(&bytes);
        // SOAP faults arrive with status 500
        if let Some(fault) = extract_fault(&body) {
            log::debug!("[SOAP] {} fault: {}", action, fault);
            return Err(SoapError::Fault(fault));
        }
        return Err(SoapError::HttpStatus(status.as_u16(), body.into_owned()));
    }

    let response_text = String::from_utf8(bytes.to_vec()).map_err(|_| SoapError::NoData)?;

    log::trace!("[SOAP] Response body: {}", response_text);
    Ok(response_text)
}

/// Extracts the fault string and UPnP error code from a SOAP fault response.
fn extract_fault(xml: &str) -> Option<String> {
    extract_raw(xml, "Fault")?;

    let fault_string =
        extract_value(xml, "faultstring").unwrap_or_else(|| "Unknown SOAP fault".to_string());
    Some(match extract_value(xml, "errorCode") {
        Some(code) => format!("{} (errorCode {})", fault_string, code.trim()),
        None => fault_string,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// SOAP Request Builder
// ─────────────────────────────────────────────────────────────────────────────

/// Builder for constructing and sending SOAP requests.
///
/// Provides a fluent API that reduces boilerplate when making SOAP calls.
///
/// # Example
/// ```ignore
/// let response = SoapRequestBuilder::new(&client, "http://192.168.1.100:1400")
///     .service(SonosService::AVTransport)
///     .action("Play")
///     .instance_id()
///     .arg("Speed", "1")
///     .send()
///     .await?;
/// ```
pub struct SoapRequestBuilder<'a> {
    client: &'a Client,
    base_url: &'a str,
    service: Option<SonosService>,
    action: Option<&'a str>,
    args: Vec<(&'a str, String)>,
}

impl<'a> SoapRequestBuilder<'a> {
    /// Creates a new SOAP request builder.
    ///
    /// # Arguments
    /// * `client` - The HTTP client to use for the request
    /// * `base_url` - Base URL of the speaker
    #[must_use]
    pub fn new(client: &'a Client, base_url: &'a str) -> Self {
        Self {
            client,
            base_url,
            service: None,
            action: None,
            args: Vec::new(),
        }
    }

    /// Sets the service for this request.
    #[must_use]
    pub fn service(mut self, service: SonosService) -> Self {
        self.service = Some(service);
        self
    }

    /// Sets the SOAP action name.
    #[must_use]
    pub fn action(mut self, action: &'a str) -> Self {
        self.action = Some(action);
        self
    }

    /// Adds an argument to the SOAP request.
    ///
    /// Arguments are included in the SOAP body in the order they are added.
    #[must_use]
    pub fn arg(mut self, key: &'a str, value: impl Into<String>) -> Self {
        self.args.push((key, value.into()));
        self
    }

    /// Adds the standard InstanceID="0" argument used by most actions.
    #[must_use]
    pub fn instance_id(self) -> Self {
        self.arg("InstanceID", "0")
    }

    /// Sends the SOAP request and returns the response body.
    ///
    /// # Errors
    /// Returns `SoapError` if the service or action is not set, or if the
    /// request fails.
    pub async fn send(self) -> SoapResult<String> {
        let service = self
            .service
            .ok_or_else(|| SoapError::Fault("SoapRequestBuilder: service not set".into()))?;
        let action = self
            .action
            .ok_or_else(|| SoapError::Fault("SoapRequestBuilder: action not set".into()))?;

        // Convert to slice of (&str, &str) - preserves insertion order
        let args: Vec<(&str, &str)> = self.args.iter().map(|(k, v)| (*k, v.as_str())).collect();

        send_soap_request(
            self.client,
            self.base_url,
            service.control_path(),
            service.urn(),
            action,
            &args,
        )
        .await
    }

    /// Returns the request parts without sending (for testing).
    ///
    /// # Returns
    /// Tuple of (service, action, args) if both service and action are set.
    #[cfg(test)]
    pub fn into_parts(self) -> Option<(SonosService, &'a str, Vec<(&'a str, String)>)> {
        let service = self.service?;
        let action = self.action?;
        Some((service, action, self.args))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn test_client() -> Client {
        Client::new()
    }

    #[test]
    fn builder_captures_args_in_order() {
        let client = test_client();
        let parts = SoapRequestBuilder::new(&client, "http://192.168.1.100:1400")
            .service(SonosService::RenderingControl)
            .action("SetVolume")
            .instance_id()
            .arg("Channel", "Master")
            .arg("DesiredVolume", "75")
            .into_parts();

        let (service, action, args) = parts.expect("should have parts");
        assert_eq!(service, SonosService::RenderingControl);
        assert_eq!(action, "SetVolume");
        assert_eq!(args.len(), 3);
        assert_eq!(args[0], ("InstanceID", "0".to_string()));
        assert_eq!(args[1], ("Channel", "Master".to_string()));
        assert_eq!(args[2], ("DesiredVolume", "75".to_string()));
    }

    #[test]
    fn into_parts_returns_none_without_service_or_action() {
        let client = test_client();
        assert!(SoapRequestBuilder::new(&client, "http://h:1400")
            .action("GetVolume")
            .into_parts()
            .is_none());
        assert!(SoapRequestBuilder::new(&client, "http://h:1400")
            .service(SonosService::RenderingControl)
            .into_parts()
            .is_none());
    }

    #[test]
    fn envelope_escapes_argument_values() {
        let envelope = build_envelope(
            SonosService::AVTransport.urn(),
            "SetAVTransportURI",
            &[("InstanceID", "0"), ("CurrentURI", "http://h/a?x=1&y=<2>")],
        );

        assert!(envelope.starts_with("<?xml"));
        assert!(envelope.contains(
            r#"<u:SetAVTransportURI xmlns:u="urn:schemas-upnp-org:service:AVTransport:1">"#
        ));
        assert!(envelope.contains("<CurrentURI>http://h/a?x=1&amp;y=&lt;2&gt;</CurrentURI>"));
        assert!(envelope.ends_with("</u:SetAVTransportURI></s:Body></s:Envelope>"));
    }

    #[tokio::test]
    async fn sends_action_header_and_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/MediaRenderer/AVTransport/Control")
            .match_header(
                "soapaction",
                "\"urn:schemas-upnp-org:service:AVTransport:1#Play\"",
            )
            .match_header("content-type", "text/xml; charset=utf-8")
            .match_body(Matcher::AllOf(vec![
                Matcher::Regex("<InstanceID>0</InstanceID>".into()),
                Matcher::Regex("<Speed>1</Speed>".into()),
            ]))
            .with_status(200)
            .with_body("<s:Envelope><s:Body><u:PlayResponse/></s:Body></s:Envelope>")
            .create_async()
            .await;

        let client = test_client();
        let body = SoapRequestBuilder::new(&client, &server.url())
            .service(SonosService::AVTransport)
            .action("Play")
            .instance_id()
            .arg("Speed", "1")
            .send()
            .await
            .expect("request succeeds");

        assert!(body.contains("PlayResponse"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn fault_body_becomes_fault_with_error_code() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/MediaRenderer/AVTransport/Control")
            .with_status(500)
            .with_body(
                "<s:Envelope><s:Body><s:Fault><faultcode>s:Client</faultcode>\
                 <faultstring>UPnPError</faultstring><detail><UPnPError>\
                 <errorCode>701</errorCode></UPnPError></detail></s:Fault></s:Body></s:Envelope>",
            )
            .create_async()
            .await;

        let client = test_client();
        let err = SoapRequestBuilder::new(&client, &server.url())
            .service(SonosService::AVTransport)
            .action("Next")
            .instance_id()
            .send()
            .await
            .unwrap_err();

        assert!(matches!(err, SoapError::Fault(_)));
        assert_eq!(err.upnp_error_code(), Some(701));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn non_200_without_fault_is_http_status() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/ZoneGroupTopology/Control")
            .with_status(404)
            .with_body("not here")
            .create_async()
            .await;

        let client = test_client();
        let err = SoapRequestBuilder::new(&client, &server.url())
            .service(SonosService::ZoneGroupTopology)
            .action("GetZoneGroupState")
            .send()
            .await
            .unwrap_err();

        assert!(matches!(err, SoapError::HttpStatus(404, _)));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn undecodable_body_is_no_data() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/MediaRenderer/RenderingControl/Control")
            .with_status(200)
            .with_body(vec![0xff, 0xfe, 0xfd])
            .create_async()
            .await;

        let client = test_client();
        let err = SoapRequestBuilder::new(&client, &server.url())
            .service(SonosService::RenderingControl)
            .action("GetVolume")
            .instance_id()
            .send()
            .await
            .unwrap_err();

        assert!(matches!(err, SoapError::NoData));
    }

    #[tokio::test]
    async fn undecodable_error_body_keeps_status() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/MediaRenderer/AVTransport/Control")
            .with_status(503)
            .with_body(vec![b'b', b'u', b's', b'y', 0xff])
            .create_async()
            .await;

        let client = test_client();
        let err = SoapRequestBuilder::new(&client, &server.url())
            .service(SonosService::AVTransport)
            .action("Stop")
            .instance_id()
            .send()
            .await
            .unwrap_err();

        match err {
            SoapError::HttpStatus(status, body) => {
                assert_eq!(status, 503);
                assert!(body.starts_with("busy"));
            }
            other => panic!("expected HttpStatus, got {other:?}"),
        }
    }
}
