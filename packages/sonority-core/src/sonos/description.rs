//! Device description retrieval.
//!
//! Resolves a discovered (host, port) into a [`Device`] by fetching the
//! UPnP description document. A responder whose document has no `UDN` is
//! not a speaker this crate can address and is ignored.

use reqwest::{Client, StatusCode};

use super::soap::{SoapError, SoapResult};
use super::types::{Device, DeviceCategory};
use super::xml::extract_value;
use crate::protocol_constants::{DEVICE_DESCRIPTION_PATH, UDN_PREFIX};

/// Parses a device description document.
///
/// Returns `None` when the mandatory `UDN` is missing or empty. The room
/// name falls back to `friendlyName`; every other field defaults to empty.
#[must_use]
pub fn parse_device_description(xml: &str, host: &str, port: u16) -> Option<Device> {
    let udn = extract_value(xml, "UDN")?;
    let id = udn.trim();
    let id = id.strip_prefix(UDN_PREFIX).unwrap_or(id).to_string();
    if id.is_empty() {
        return None;
    }

    let name = extract_value(xml, "roomName")
        .filter(|n| !n.is_empty())
        .or_else(|| extract_value(xml, "friendlyName"))
        .unwrap_or_default();
    let model_name = extract_value(xml, "modelName").unwrap_or_default();

    Some(Device {
        id,
        host: host.to_string(),
        port,
        name,
        category: DeviceCategory::from_model_name(&model_name),
        model_name,
        model_number: extract_value(xml, "modelNumber").unwrap_or_default(),
        software_version: extract_value(xml, "softwareVersion").unwrap_or_default(),
        hardware_version: extract_value(xml, "hardwareVersion").unwrap_or_default(),
        is_coordinator: false,
    })
}

/// Fetches and parses the description document of the device at `host:port`.
///
/// # Returns
/// `Ok(None)` for a non-conforming responder, `Ok(Some(device))` otherwise.
///
/// # Errors
/// Transport failures and non-200 statuses.
pub async fn fetch_device(client: &Client, host: &str, port: u16) -> SoapResult<Option<Device>> {
    let url = format!("http://{}:{}{}", host, port, DEVICE_DESCRIPTION_PATH);
    log::debug!("[Description] GET {}", url);

    let response = client.get(&url).send().await?;
    let status = response.status();
    let body = response.text().await?;

    if status != StatusCode::OK {
        return Err(SoapError::HttpStatus(status.as_u16(), body));
    }

    let device = parse_device_description(&body, host, port);
    if device.is_none() {
        log::debug!("[Description] {} has no UDN, ignoring", url);
    }
    Ok(device)
}
