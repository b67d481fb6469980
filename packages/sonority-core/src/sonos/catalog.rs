//! Bridge from an external music catalog to playable speaker URIs.
//!
//! The control engine never interprets what a bridge produces: both the URI
//! and the DIDL-Lite envelope are handed unchanged to the transport actions.

use super::didl::{format_didl_item, DidlItem};

/// Class of items produced for catalog tracks.
const MUSIC_TRACK_CLASS: &str = "object.item.audioItem.musicTrack";

/// Resolves external catalog items into URIs and metadata a speaker accepts.
pub trait CatalogBridge: Send + Sync {
    /// Returns the playable URI for a catalog item.
    fn playable_uri(&self, item_id: &str) -> String;

    /// Returns the DIDL-Lite metadata envelope for a catalog item.
    fn metadata(&self, item_id: &str, title: &str) -> String;
}

/// Catalog bridge for a music service account registered on the speakers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VendorCatalogBridge {
    pub service_id: u32,
    pub flags: u32,
    pub serial_number: u32,
}

impl VendorCatalogBridge {
    #[must_use]
    pub fn new(service_id: u32, flags: u32, serial_number: u32) -> Self {
        Self {
            service_id,
            flags,
            serial_number,
        }
    }

    /// Service type advertised in the `desc` element.
    fn service_type(&self) -> u64 {
        u64::from(self.service_id) * 256 + 7
    }

    fn encode_id(item_id: &str) -> String {
        item_id.replace(':', "%3a")
    }
}

impl CatalogBridge for VendorCatalogBridge {
    fn playable_uri(&self, item_id: &str) -> String {
        format!(
            "x-sonos-http:{}?sid={}&flags={}&sn={}",
            Self::encode_id(item_id),
            self.service_id,
            self.flags,
            self.serial_number
        )
    }

    fn metadata(&self, item_id: &str, title: &str) -> String {
        let id = format!("10032020{}", Self::encode_id(item_id));
        let desc = format!(
            "SA_RINCON{}_X_#Svc{}-0-Token",
            self.service_type(),
            self.service_type()
        );

        format_didl_item(&DidlItem {
            id: &id,
            parent_id: "",
            title,
            item_class: MUSIC_TRACK_CLASS,
            service_desc: Some(&desc),
            ..Default::default()
        })
    }
}
