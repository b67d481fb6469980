//! DIDL-Lite metadata decoding and building.
//!
//! Speakers describe queue entries and the current track with DIDL-Lite
//! documents embedded HTML-escaped inside SOAP responses. Callers extract
//! the embedded document with [`extract_value`](super::xml::extract_value)
//! (which decodes it once) and pass the result here.

use super::types::Track;
use super::xml::{escape_xml, extract_attribute, extract_elements, extract_value, parse_duration};

/// Opening tag of every DIDL-Lite document built by this crate.
const DIDL_HEADER: &str = r#"<DIDL-Lite xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:upnp="urn:schemas-upnp-org:metadata-1-0/upnp/" xmlns:r="urn:schemas-rinconnetworks-com:metadata-1-0/" xmlns="urn:schemas-upnp-org:metadata-1-0/DIDL-Lite/">"#;

/// Namespace of the vendor `desc` element that names a music service account.
const RINCON_METADATA_NS: &str = "urn:schemas-rinconnetworks-com:metadata-1-0/";

// ─────────────────────────────────────────────────────────────────────────────
// Decoding
// ─────────────────────────────────────────────────────────────────────────────

/// Decodes one `<item>` (or `<container>`) fragment into a [`Track`].
fn parse_item(item: &str) -> Track {
    let res = extract_elements(item, "res").into_iter().next();

    let duration_secs = res
        .and_then(|r| extract_attribute(r, "duration"))
        .map(|d| parse_duration(&d))
        .unwrap_or(0);

    Track {
        id: extract_attribute(item, "id"),
        title: extract_value(item, "dc:title").unwrap_or_default(),
        artist: extract_value(item, "dc:creator")
            .or_else(|| extract_value(item, "upnp:artist"))
            .filter(|s| !s.is_empty()),
        album: extract_value(item, "upnp:album").filter(|s| !s.is_empty()),
        album_art_uri: extract_value(item, "upnp:albumArtURI").filter(|s| !s.is_empty()),
        uri: extract_value(item, "res").filter(|s| !s.is_empty()),
        item_class: extract_value(item, "upnp:class"),
        duration_secs,
        track_number: extract_value(item, "upnp:originalTrackNumber")
            .and_then(|n| n.trim().parse().ok()),
    }
}

/// Parses every `<item>` of a decoded DIDL-Lite document, in document order.
///
/// Items without a title are still returned; a malformed document yields
/// whatever items could be matched.
#[must_use]
pub fn parse_didl_items(didl: &str) -> Vec<Track> {
    extract_elements(didl, "item")
        .into_iter()
        .map(parse_item)
        .collect()
}

/// Parses the current-track fragment reported by `GetPositionInfo`.
///
/// The speaker reports the resource URI and duration separately from the
/// metadata; those values take precedence over anything inside the fragment.
/// Returns `None` when neither metadata nor a URI is present (empty transport).
#[must_use]
pub fn parse_didl_track(
    didl: Option<&str>,
    uri: Option<&str>,
    duration_secs: u64,
) -> Option<Track> {
    let uri = uri.filter(|u| !u.is_empty());
    let didl = didl.filter(|d| !d.is_empty() && *d != "NOT_IMPLEMENTED");

    let mut track = match didl {
        Some(d) => extract_elements(d, "item")
            .into_iter()
            .next()
            .map(parse_item)
            .unwrap_or_default(),
        None if uri.is_some() => Track::default(),
        None => return None,
    };

    if let Some(u) = uri {
        track.uri = Some(u.to_string());
    }
    if duration_secs > 0 {
        track.duration_secs = duration_secs;
    }

    // Radio streams carry the current song in r:streamContent.
    if track.title.is_empty() {
        if let Some(content) = didl
            .and_then(|d| extract_value(d, "r:streamContent"))
            .filter(|s| !s.is_empty())
        {
            track.title = content;
        }
    }

    Some(track)
}

// ─────────────────────────────────────────────────────────────────────────────
// Building
// ─────────────────────────────────────────────────────────────────────────────

/// Fields of a single DIDL-Lite item to hand to `SetAVTransportURI` or
/// `AddURIToQueue`.
#[derive(Debug, Clone, Default)]
pub struct DidlItem<'a> {
    pub id: &'a str,
    pub parent_id: &'a str,
    pub title: &'a str,
    pub artist: Option<&'a str>,
    pub album: Option<&'a str>,
    pub album_art_uri: Option<&'a str>,
    pub item_class: &'a str,
    /// Resource URI, when the item carries one.
    pub uri: Option<&'a str>,
    /// Vendor service descriptor for catalog items.
    pub service_desc: Option<&'a str>,
}

/// Formats a DIDL-Lite document for one item.
///
/// Field values are escaped exactly once here. The SOAP layer escapes the
/// whole document once more when it becomes an argument, which is the
/// nesting speakers expect.
#[must_use]
pub fn format_didl_item(item: &DidlItem<'_>) -> String {
    let mut didl = String::from(DIDL_HEADER);
    didl.push_str(&format!(
        r#"<item id="{}" parentID="{}" restricted="true">"#,
        escape_xml(item.id),
        escape_xml(item.parent_id)
    ));
    didl.push_str(&format!("<dc:title>{}</dc:title>", escape_xml(item.title)));

    if let Some(artist) = item.artist {
        didl.push_str(&format!("<dc:creator>{}</dc:creator>", escape_xml(artist)));
    }
    if let Some(album) = item.album {
        didl.push_str(&format!("<upnp:album>{}</upnp:album>", escape_xml(album)));
    }
    if let Some(art) = item.album_art_uri {
        didl.push_str(&format!(
            "<upnp:albumArtURI>{}</upnp:albumArtURI>",
            escape_xml(art)
        ));
    }

    didl.push_str(&format!(
        "<upnp:class>{}</upnp:class>",
        escape_xml(item.item_class)
    ));

    if let Some(uri) = item.uri {
        didl.push_str(&format!(
            r#"<res protocolInfo="http-get:*:*:*">{}</res>"#,
            escape_xml(uri)
        ));
    }
    if let Some(desc) = item.service_desc {
        didl.push_str(&format!(
            r#"<desc id="cdudn" nameSpace="{}">{}</desc>"#,
            RINCON_METADATA_NS,
            escape_xml(desc)
        ));
    }

    didl.push_str("</item></DIDL-Lite>");
    didl
}
