//! Transport (AVTransport) and queue (ContentDirectory) commands.
//!
//! All functions are stateless wrappers around one SOAP action, except
//! [`get_transport_info`] which merges three concurrent reads. Queue
//! positions use the speaker's own 1-based addressing.

use std::time::Duration;

use reqwest::Client;

use super::didl::{parse_didl_items, parse_didl_track};
use super::retry::{with_fault_retry, with_retry};
use super::services::SonosService;
use super::soap::{SoapRequestBuilder, SoapResult};
use super::types::{
    PlayMode, PlaybackState, PositionInfo, QueueAddResult, QueuePage, TransportInfo,
};
use super::xml::{extract_value, format_hms, parse_duration};
use crate::protocol_constants::{QUEUE_CONTAINER_ID, QUEUE_URI_SCHEME};

/// Metadata fields requested when browsing the queue.
const QUEUE_BROWSE_FILTER: &str =
    "dc:title,res,dc:creator,upnp:artist,upnp:album,upnp:albumArtURI,upnp:originalTrackNumber";

fn av_transport<'a>(client: &'a Client, base_url: &'a str, action: &'a str) -> SoapRequestBuilder<'a> {
    SoapRequestBuilder::new(client, base_url)
        .service(SonosService::AVTransport)
        .action(action)
        .instance_id()
}

fn parse_u32(xml: &str, tag: &str) -> u32 {
    extract_value(xml, tag)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(0)
}

// ─────────────────────────────────────────────────────────────────────────────
// Playback
// ─────────────────────────────────────────────────────────────────────────────

/// Starts or resumes playback.
pub async fn play(client: &Client, base_url: &str) -> SoapResult<()> {
    with_retry("Play", || av_transport(client, base_url, "Play").arg("Speed", "1").send()).await?;
    Ok(())
}

pub async fn pause(client: &Client, base_url: &str) -> SoapResult<()> {
    av_transport(client, base_url, "Pause").send().await?;
    Ok(())
}

pub async fn stop(client: &Client, base_url: &str) -> SoapResult<()> {
    av_transport(client, base_url, "Stop").send().await?;
    Ok(())
}

pub async fn next(client: &Client, base_url: &str) -> SoapResult<()> {
    av_transport(client, base_url, "Next").send().await?;
    Ok(())
}

pub async fn previous(client: &Client, base_url: &str) -> SoapResult<()> {
    av_transport(client, base_url, "Previous").send().await?;
    Ok(())
}

/// Seeks to an absolute position within the current track.
pub async fn seek(client: &Client, base_url: &str, position_secs: u64) -> SoapResult<()> {
    let target = format_hms(position_secs);
    with_retry("Seek", || {
        av_transport(client, base_url, "Seek")
            .arg("Unit", "REL_TIME")
            .arg("Target", target.as_str())
            .send()
    })
    .await?;
    Ok(())
}

/// Jumps to a 1-based track number in the queue.
pub async fn seek_track(client: &Client, base_url: &str, track_number: u32) -> SoapResult<()> {
    let target = track_number.to_string();
    with_retry("Seek", || {
        av_transport(client, base_url, "Seek")
            .arg("Unit", "TRACK_NR")
            .arg("Target", target.as_str())
            .send()
    })
    .await?;
    Ok(())
}

pub async fn set_play_mode(client: &Client, base_url: &str, mode: PlayMode) -> SoapResult<()> {
    av_transport(client, base_url, "SetPlayMode")
        .arg("NewPlayMode", mode.as_upnp())
        .send()
        .await?;
    Ok(())
}

/// Points the transport at a URI with optional DIDL-Lite metadata.
///
/// The metadata string is sent as-is (escaped once more by the envelope).
pub async fn set_transport_uri(
    client: &Client,
    base_url: &str,
    uri: &str,
    metadata: &str,
) -> SoapResult<()> {
    with_retry("SetAVTransportURI", || {
        av_transport(client, base_url, "SetAVTransportURI")
            .arg("CurrentURI", uri)
            .arg("CurrentURIMetaData", metadata)
            .send()
    })
    .await?;
    Ok(())
}

/// Points the coordinator's transport at its own queue.
pub async fn play_from_queue(client: &Client, base_url: &str, coordinator_id: &str) -> SoapResult<()> {
    let uri = format!("{}{}#0", QUEUE_URI_SCHEME, coordinator_id);
    set_transport_uri(client, base_url, &uri, "").await
}

// ─────────────────────────────────────────────────────────────────────────────
// Sleep Timer & Crossfade
// ─────────────────────────────────────────────────────────────────────────────

/// Configures the sleep timer. `None` cancels it.
pub async fn configure_sleep_timer(
    client: &Client,
    base_url: &str,
    duration: Option<Duration>,
) -> SoapResult<()> {
    let value = duration
        .map(|d| format_hms(d.as_secs()))
        .unwrap_or_default();

    av_transport(client, base_url, "ConfigureSleepTimer")
        .arg("NewSleepTimerDuration", value)
        .send()
        .await?;
    Ok(())
}

/// Returns the remaining sleep-timer time, `None` when no timer is set.
pub async fn get_sleep_timer(client: &Client, base_url: &str) -> SoapResult<Option<Duration>> {
    let response = av_transport(client, base_url, "GetRemainingSleepTimerDuration")
        .send()
        .await?;

    let remaining = extract_value(&response, "RemainingSleepTimerDuration")
        .map(|v| parse_duration(v.trim()))
        .unwrap_or(0);
    Ok((remaining > 0).then(|| Duration::from_secs(remaining)))
}

pub async fn get_crossfade(client: &Client, base_url: &str) -> SoapResult<bool> {
    let response = av_transport(client, base_url, "GetCrossfadeMode").send().await?;
    Ok(extract_value(&response, "CrossfadeMode").is_some_and(|v| v.trim() == "1"))
}

pub async fn set_crossfade(client: &Client, base_url: &str, enabled: bool) -> SoapResult<()> {
    av_transport(client, base_url, "SetCrossfadeMode")
        .arg("CrossfadeMode", if enabled { "1" } else { "0" })
        .send()
        .await?;
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Queue
// ─────────────────────────────────────────────────────────────────────────────

/// Browses one page of the coordinator's queue.
///
/// Each returned track's `track_number` is its 1-based queue position.
///
/// # Arguments
/// * `start` - 0-based index of the first item to return
/// * `count` - Maximum number of items to return
pub async fn browse_queue(
    client: &Client,
    base_url: &str,
    start: u32,
    count: u32,
) -> SoapResult<QueuePage> {
    let response = SoapRequestBuilder::new(client, base_url)
        .service(SonosService::ContentDirectory)
        .action("Browse")
        .arg("ObjectID", QUEUE_CONTAINER_ID)
        .arg("BrowseFlag", "BrowseDirectChildren")
        .arg("Filter", QUEUE_BROWSE_FILTER)
        .arg("StartingIndex", start.to_string())
        .arg("RequestedCount", count.to_string())
        .arg("SortCriteria", "")
        .send()
        .await?;

    let mut tracks = extract_value(&response, "Result")
        .map(|didl| parse_didl_items(&didl))
        .unwrap_or_default();
    for (offset, track) in (1..).zip(tracks.iter_mut()) {
        track.track_number = Some(start + offset);
    }

    Ok(QueuePage {
        tracks,
        number_returned: parse_u32(&response, "NumberReturned"),
        total_matches: parse_u32(&response, "TotalMatches"),
    })
}

/// Adds a URI to the queue.
///
/// # Arguments
/// * `position` - 1-based insert position, or 0 to enqueue after the
///   current track ("play next")
pub async fn add_uri_to_queue(
    client: &Client,
    base_url: &str,
    uri: &str,
    metadata: &str,
    position: u32,
) -> SoapResult<QueueAddResult> {
    let play_next = position == 0;

    let response = with_fault_retry("AddURIToQueue", || {
        av_transport(client, base_url, "AddURIToQueue")
            .arg("EnqueuedURI", uri)
            .arg("EnqueuedURIMetaData", metadata)
            .arg("DesiredFirstTrackNumberEnqueued", position.to_string())
            .arg("EnqueueAsNext", if play_next { "1" } else { "0" })
            .send()
    })
    .await?;

    Ok(QueueAddResult {
        first_track_number: parse_u32(&response, "FirstTrackNumberEnqueued"),
        tracks_added: parse_u32(&response, "NumTracksAdded"),
        queue_length: parse_u32(&response, "NewQueueLength"),
        play_next,
    })
}

/// Removes the track at a 1-based queue position.
pub async fn remove_track(client: &Client, base_url: &str, track_number: u32) -> SoapResult<()> {
    av_transport(client, base_url, "RemoveTrackFromQueue")
        .arg("ObjectID", format!("{}/{}", QUEUE_CONTAINER_ID, track_number))
        .arg("UpdateID", "0")
        .send()
        .await?;
    Ok(())
}

pub async fn clear_queue(client: &Client, base_url: &str) -> SoapResult<()> {
    av_transport(client, base_url, "RemoveAllTracksFromQueue")
        .send()
        .await?;
    Ok(())
}

/// Moves `count` tracks starting at `starting_index` before `insert_before`.
///
/// All three values are 1-based and passed through unchanged.
pub async fn reorder_queue(
    client: &Client,
    base_url: &str,
    starting_index: u32,
    count: u32,
    insert_before: u32,
) -> SoapResult<()> {
    av_transport(client, base_url, "ReorderTracksInQueue")
        .arg("StartingIndex", starting_index.to_string())
        .arg("NumberOfTracks", count.to_string())
        .arg("InsertBefore", insert_before.to_string())
        .arg("UpdateID", "0")
        .send()
        .await?;
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// State Retrieval
// ─────────────────────────────────────────────────────────────────────────────

/// Reads `GetPositionInfo`.
pub async fn get_position_info(client: &Client, base_url: &str) -> SoapResult<PositionInfo> {
    let response = av_transport(client, base_url, "GetPositionInfo").send().await?;

    Ok(PositionInfo {
        track: parse_u32(&response, "Track"),
        track_duration_secs: extract_value(&response, "TrackDuration")
            .map(|d| parse_duration(d.trim()))
            .unwrap_or(0),
        track_metadata: extract_value(&response, "TrackMetaData")
            .filter(|m| !m.is_empty() && m != "NOT_IMPLEMENTED"),
        track_uri: extract_value(&response, "TrackURI").filter(|u| !u.is_empty()),
        rel_time_secs: extract_value(&response, "RelTime")
            .map(|t| parse_duration(t.trim()))
            .unwrap_or(0),
    })
}

async fn get_playback_state(client: &Client, base_url: &str) -> SoapResult<PlaybackState> {
    let response = av_transport(client, base_url, "GetTransportInfo").send().await?;
    Ok(extract_value(&response, "CurrentTransportState")
        .map(|s| PlaybackState::from_upnp(s.trim()))
        .unwrap_or_default())
}

async fn get_play_mode(client: &Client, base_url: &str) -> SoapResult<PlayMode> {
    let response = av_transport(client, base_url, "GetTransportSettings")
        .send()
        .await?;
    Ok(extract_value(&response, "PlayMode")
        .map(|m| PlayMode::from_upnp(m.trim()))
        .unwrap_or_default())
}

/// Reads position, transport state and play mode concurrently and merges them.
///
/// Any failing read fails the whole call. `track_count` is left at 0; the
/// queue length is not part of these three responses.
pub async fn get_transport_info(client: &Client, base_url: &str) -> SoapResult<TransportInfo> {
    let (position, state, play_mode) = tokio::try_join!(
        get_position_info(client, base_url),
        get_playback_state(client, base_url),
        get_play_mode(client, base_url),
    )?;

    let track = parse_didl_track(
        position.track_metadata.as_deref(),
        position.track_uri.as_deref(),
        position.track_duration_secs,
    );

    Ok(TransportInfo {
        state,
        track,
        play_mode,
        position_secs: position.rel_time_secs as f64,
        track_count: 0,
        track_index: position.track,
    })
}
