//! Zone group topology parsing and retrieval.
//!
//! `GetZoneGroupState` returns the topology as an HTML-escaped document
//! inside the SOAP body. Groups are resolved against the set of devices whose
//! descriptions have been fetched: a member that was never resolved is
//! dropped, and a group whose coordinator was never resolved is dropped
//! entirely.

use std::collections::{HashMap, HashSet};

use reqwest::Client;

use super::services::SonosService;
use super::soap::{SoapRequestBuilder, SoapResult};
use super::types::{Device, Group};
use super::xml::{extract_attribute, extract_elements, extract_value};

/// Fetches the raw `GetZoneGroupState` response from any speaker.
///
/// # Arguments
/// * `client` - The HTTP client to use for the request
/// * `base_url` - Base URL of any speaker on the network
pub async fn get_topology(client: &Client, base_url: &str) -> SoapResult<String> {
    SoapRequestBuilder::new(client, base_url)
        .service(SonosService::ZoneGroupTopology)
        .action("GetZoneGroupState")
        .send()
        .await
}

/// Returns true for members that cannot play audio on their own.
fn is_hidden_member(member: &str) -> bool {
    extract_attribute(member, "Invisible").as_deref() == Some("1")
        || extract_attribute(member, "IsZoneBridge").as_deref() == Some("1")
}

/// Builds the display name: coordinator's name first, then other distinct names.
fn group_name(coordinator: &Device, members: &[Device]) -> String {
    let mut other_names: Vec<&str> = Vec::new();
    for m in members {
        let name = m.name.as_str();
        if name != coordinator.name && !other_names.contains(&name) {
            other_names.push(name);
        }
    }

    if other_names.is_empty() {
        coordinator.name.clone()
    } else {
        format!("{}, {}", coordinator.name, other_names.join(", "))
    }
}

/// Parses one `<ZoneGroup>` fragment. Returns `None` if its coordinator is unknown.
fn parse_group(fragment: &str, known: &HashMap<String, Device>) -> Option<Group> {
    let coordinator_id = extract_attribute(fragment, "Coordinator")?;
    let Some(known_coordinator) = known.get(&coordinator_id) else {
        log::debug!(
            "[Topology] Dropping group with unresolved coordinator {}",
            coordinator_id
        );
        return None;
    };

    let mut coordinator = known_coordinator.clone();
    coordinator.is_coordinator = true;

    let mut members = vec![coordinator.clone()];
    for member in extract_elements(fragment, "ZoneGroupMember") {
        let Some(uuid) = extract_attribute(member, "UUID") else {
            continue;
        };

        if uuid == coordinator_id {
            if let Some(zone_name) = extract_attribute(member, "ZoneName") {
                coordinator.name = zone_name.clone();
                members[0].name = zone_name;
            }
            continue;
        }

        if is_hidden_member(member) {
            continue;
        }

        let Some(device) = known.get(&uuid) else {
            log::debug!("[Topology] Dropping unresolved member {}", uuid);
            continue;
        };

        let mut device = device.clone();
        device.is_coordinator = false;
        if let Some(zone_name) = extract_attribute(member, "ZoneName") {
            device.name = zone_name;
        }
        members.push(device);
    }

    Some(Group {
        name: group_name(&coordinator, &members),
        coordinator,
        members,
        volume: 0,
        muted: false,
    })
}

/// Every device id the topology mentions, including satellites and hidden members.
fn mentioned_ids(doc: &str) -> HashSet<String> {
    extract_elements(doc, "ZoneGroupMember")
        .into_iter()
        .chain(extract_elements(doc, "Satellite"))
        .filter_map(|m| extract_attribute(m, "UUID"))
        .collect()
}

/// Parses a topology document into groups of known devices.
///
/// Accepts either a full `GetZoneGroupState` response (the embedded
/// document is decoded first) or an already-decoded topology document.
/// Groups keep document order. Known devices the topology never mentions
/// become singleton groups after the parsed ones.
#[must_use]
pub fn parse_groups(xml: &str, known: &HashMap<String, Device>) -> Vec<Group> {
    let decoded = extract_value(xml, "ZoneGroupState");
    let doc = decoded.as_deref().unwrap_or(xml);

    let mut groups: Vec<Group> = extract_elements(doc, "ZoneGroup")
        .into_iter()
        .filter_map(|fragment| parse_group(fragment, known))
        .collect();

    let mentioned = mentioned_ids(doc);
    let mut unplaced: Vec<&Device> = known
        .values()
        .filter(|d| !mentioned.contains(&d.id))
        .filter(|d| !groups.iter().any(|g| g.contains(&d.id)))
        .collect();
    unplaced.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));

    for device in unplaced {
        let mut coordinator = device.clone();
        coordinator.is_coordinator = true;
        groups.push(Group {
            name: coordinator.name.clone(),
            members: vec![coordinator.clone()],
            coordinator,
            volume: 0,
            muted: false,
        });
    }

    groups
}
