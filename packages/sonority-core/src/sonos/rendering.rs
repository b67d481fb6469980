//! Volume, mute and equalizer control.
//!
//! Group-level actions (GroupRenderingControl) go to the coordinator and
//! affect the whole group. Per-speaker actions (RenderingControl) go to an
//! individual member. Setters clamp before anything is sent; getters default
//! a missing value instead of failing.

use reqwest::Client;

use super::services::SonosService;
use super::soap::{SoapRequestBuilder, SoapResult};
use super::types::{Channel, EqSettings};
use super::xml::extract_value;
use crate::protocol_constants::{EQ_RANGE, MAX_VOLUME};

/// Clamps a requested volume into the wire range.
#[must_use]
pub fn clamp_volume(volume: i32) -> u8 {
    volume.clamp(0, MAX_VOLUME) as u8
}

/// Clamps a requested bass or treble level into the wire range.
#[must_use]
pub fn clamp_eq(level: i32) -> i32 {
    level.clamp(-EQ_RANGE, EQ_RANGE)
}

fn parse_bool(value: Option<String>) -> bool {
    value.is_some_and(|v| v.trim() == "1" || v.trim().eq_ignore_ascii_case("true"))
}

fn parse_int<T: std::str::FromStr + Default>(value: Option<String>) -> T {
    value.and_then(|v| v.trim().parse().ok()).unwrap_or_default()
}

fn bool_arg(value: bool) -> &'static str {
    if value {
        "1"
    } else {
        "0"
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Group Volume Control
// ─────────────────────────────────────────────────────────────────────────────

/// Gets the current group volume from the coordinator (0-100).
///
/// # Arguments
/// * `client` - The HTTP client to use for the request
/// * `coordinator_url` - Base URL of the group coordinator
pub async fn get_group_volume(client: &Client, coordinator_url: &str) -> SoapResult<u8> {
    let response = SoapRequestBuilder::new(client, coordinator_url)
        .service(SonosService::GroupRenderingControl)
        .action("GetGroupVolume")
        .instance_id()
        .send()
        .await?;

    Ok(clamp_volume(parse_int(extract_value(&response, "CurrentVolume"))))
}

/// Sets the group volume on the coordinator, clamped to 0-100.
pub async fn set_group_volume(
    client: &Client,
    coordinator_url: &str,
    volume: i32,
) -> SoapResult<()> {
    SoapRequestBuilder::new(client, coordinator_url)
        .service(SonosService::GroupRenderingControl)
        .action("SetGroupVolume")
        .instance_id()
        .arg("DesiredVolume", clamp_volume(volume).to_string())
        .send()
        .await?;

    Ok(())
}

/// Gets the current group mute state from the coordinator.
pub async fn get_group_mute(client: &Client, coordinator_url: &str) -> SoapResult<bool> {
    let response = SoapRequestBuilder::new(client, coordinator_url)
        .service(SonosService::GroupRenderingControl)
        .action("GetGroupMute")
        .instance_id()
        .send()
        .await?;

    Ok(parse_bool(extract_value(&response, "CurrentMute")))
}

/// Sets the group mute state on the coordinator.
pub async fn set_group_mute(client: &Client, coordinator_url: &str, mute: bool) -> SoapResult<()> {
    SoapRequestBuilder::new(client, coordinator_url)
        .service(SonosService::GroupRenderingControl)
        .action("SetGroupMute")
        .instance_id()
        .arg("DesiredMute", bool_arg(mute))
        .send()
        .await?;

    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Per-Speaker Control
// ─────────────────────────────────────────────────────────────────────────────

/// Gets one channel's volume from an individual speaker (0-100).
pub async fn get_volume(client: &Client, base_url: &str, channel: Channel) -> SoapResult<u8> {
    let response = SoapRequestBuilder::new(client, base_url)
        .service(SonosService::RenderingControl)
        .action("GetVolume")
        .instance_id()
        .arg("Channel", channel.as_str())
        .send()
        .await?;

    Ok(clamp_volume(parse_int(extract_value(&response, "CurrentVolume"))))
}

/// Sets one channel's volume on an individual speaker, clamped to 0-100.
///
/// # Arguments
/// * `client` - The HTTP client to use for the request
/// * `base_url` - Base URL of the speaker
/// * `channel` - Channel to adjust
/// * `volume` - Requested level; out-of-range values are clamped
pub async fn set_volume(
    client: &Client,
    base_url: &str,
    channel: Channel,
    volume: i32,
) -> SoapResult<()> {
    SoapRequestBuilder::new(client, base_url)
        .service(SonosService::RenderingControl)
        .action("SetVolume")
        .instance_id()
        .arg("Channel", channel.as_str())
        .arg("DesiredVolume", clamp_volume(volume).to_string())
        .send()
        .await?;

    Ok(())
}

/// Gets one channel's mute state from an individual speaker.
pub async fn get_mute(client: &Client, base_url: &str, channel: Channel) -> SoapResult<bool> {
    let response = SoapRequestBuilder::new(client, base_url)
        .service(SonosService::RenderingControl)
        .action("GetMute")
        .instance_id()
        .arg("Channel", channel.as_str())
        .send()
        .await?;

    Ok(parse_bool(extract_value(&response, "CurrentMute")))
}

/// Sets one channel's mute state on an individual speaker.
pub async fn set_mute(
    client: &Client,
    base_url: &str,
    channel: Channel,
    mute: bool,
) -> SoapResult<()> {
    SoapRequestBuilder::new(client, base_url)
        .service(SonosService::RenderingControl)
        .action("SetMute")
        .instance_id()
        .arg("Channel", channel.as_str())
        .arg("DesiredMute", bool_arg(mute))
        .send()
        .await?;

    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Equalizer
// ─────────────────────────────────────────────────────────────────────────────

pub async fn get_bass(client: &Client, base_url: &str) -> SoapResult<i32> {
    let response = SoapRequestBuilder::new(client, base_url)
        .service(SonosService::RenderingControl)
        .action("GetBass")
        .instance_id()
        .send()
        .await?;

    Ok(clamp_eq(parse_int(extract_value(&response, "CurrentBass"))))
}

/// Sets bass, clamped to -10..=10.
pub async fn set_bass(client: &Client, base_url: &str, level: i32) -> SoapResult<()> {
    SoapRequestBuilder::new(client, base_url)
        .service(SonosService::RenderingControl)
        .action("SetBass")
        .instance_id()
        .arg("DesiredBass", clamp_eq(level).to_string())
        .send()
        .await?;

    Ok(())
}

pub async fn get_treble(client: &Client, base_url: &str) -> SoapResult<i32> {
    let response = SoapRequestBuilder::new(client, base_url)
        .service(SonosService::RenderingControl)
        .action("GetTreble")
        .instance_id()
        .send()
        .await?;

    Ok(clamp_eq(parse_int(extract_value(&response, "CurrentTreble"))))
}

/// Sets treble, clamped to -10..=10.
pub async fn set_treble(client: &Client, base_url: &str, level: i32) -> SoapResult<()> {
    SoapRequestBuilder::new(client, base_url)
        .service(SonosService::RenderingControl)
        .action("SetTreble")
        .instance_id()
        .arg("DesiredTreble", clamp_eq(level).to_string())
        .send()
        .await?;

    Ok(())
}

pub async fn get_loudness(client: &Client, base_url: &str, channel: Channel) -> SoapResult<bool> {
    let response = SoapRequestBuilder::new(client, base_url)
        .service(SonosService::RenderingControl)
        .action("GetLoudness")
        .instance_id()
        .arg("Channel", channel.as_str())
        .send()
        .await?;

    Ok(parse_bool(extract_value(&response, "CurrentLoudness")))
}

pub async fn set_loudness(
    client: &Client,
    base_url: &str,
    channel: Channel,
    loudness: bool,
) -> SoapResult<()> {
    SoapRequestBuilder::new(client, base_url)
        .service(SonosService::RenderingControl)
        .action("SetLoudness")
        .instance_id()
        .arg("Channel", channel.as_str())
        .arg("DesiredLoudness", bool_arg(loudness))
        .send()
        .await?;

    Ok(())
}

/// Reads bass, treble and master loudness concurrently.
///
/// Fails if any of the three reads fails.
pub async fn get_eq(client: &Client, base_url: &str) -> SoapResult<EqSettings> {
    let (bass, treble, loudness) = tokio::try_join!(
        get_bass(client, base_url),
        get_treble(client, base_url),
        get_loudness(client, base_url, Channel::Master),
    )?;

    Ok(EqSettings {
        bass,
        treble,
        loudness,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use rstest::rstest;

    const RENDERING_PATH: &str = "/MediaRenderer/RenderingControl/Control";

    fn action_header(action: &str) -> String {
        format!("\"urn:schemas-upnp-org:service:RenderingControl:1#{action}\"")
    }

    #[rstest]
    #[case(-5, 0)]
    #[case(0, 0)]
    #[case(42, 42)]
    #[case(100, 100)]
    #[case(500, 100)]
    fn volume_is_clamped(#[case] requested: i32, #[case] wire: u8) {
        assert_eq!(clamp_volume(requested), wire);
    }

    #[rstest]
    #[case(-50, -10)]
    #[case(-3, -3)]
    #[case(11, 10)]
    fn eq_is_clamped(#[case] requested: i32, #[case] wire: i32) {
        assert_eq!(clamp_eq(requested), wire);
    }

    #[rstest]
    #[case(-5, "0")]
    #[case(500, "100")]
    #[tokio::test]
    async fn set_volume_sends_clamped_value(#[case] requested: i32, #[case] wire: &str) {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", RENDERING_PATH)
            .match_header("soapaction", action_header("SetVolume").as_str())
            .match_body(Matcher::AllOf(vec![
                Matcher::Regex("<Channel>Master</Channel>".into()),
                Matcher::Regex(format!("<DesiredVolume>{wire}</DesiredVolume>")),
            ]))
            .with_status(200)
            .with_body("<s:Envelope/>")
            .create_async()
            .await;

        set_volume(&Client::new(), &server.url(), Channel::Master, requested)
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn missing_volume_defaults_to_zero() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", RENDERING_PATH)
            .with_status(200)
            .with_body("<s:Envelope><s:Body><u:GetVolumeResponse/></s:Body></s:Envelope>")
            .create_async()
            .await;

        let volume = get_volume(&Client::new(), &server.url(), Channel::Master)
            .await
            .unwrap();
        assert_eq!(volume, 0);
    }

    #[tokio::test]
    async fn group_volume_targets_group_service() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/MediaRenderer/GroupRenderingControl/Control")
            .match_header(
                "soapaction",
                "\"urn:schemas-upnp-org:service:GroupRenderingControl:1#GetGroupVolume\"",
            )
            .with_status(200)
            .with_body(
                "<s:Envelope><s:Body><u:GetGroupVolumeResponse>\
                 <CurrentVolume>37</CurrentVolume></u:GetGroupVolumeResponse></s:Body></s:Envelope>",
            )
            .create_async()
            .await;

        assert_eq!(
            get_group_volume(&Client::new(), &server.url()).await.unwrap(),
            37
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn get_eq_merges_three_reads() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", RENDERING_PATH)
            .match_header("soapaction", action_header("GetBass").as_str())
            .with_body("<u:GetBassResponse><CurrentBass>-4</CurrentBass></u:GetBassResponse>")
            .create_async()
            .await;
        server
            .mock("POST", RENDERING_PATH)
            .match_header("soapaction", action_header("GetTreble").as_str())
            .with_body("<u:GetTrebleResponse><CurrentTreble>6</CurrentTreble></u:GetTrebleResponse>")
            .create_async()
            .await;
        server
            .mock("POST", RENDERING_PATH)
            .match_header("soapaction", action_header("GetLoudness").as_str())
            .with_body(
                "<u:GetLoudnessResponse><CurrentLoudness>1</CurrentLoudness></u:GetLoudnessResponse>",
            )
            .create_async()
            .await;

        let eq = get_eq(&Client::new(), &server.url()).await.unwrap();
        assert_eq!(
            eq,
            EqSettings {
                bass: -4,
                treble: 6,
                loudness: true
            }
        );
    }

    #[tokio::test]
    async fn get_eq_fails_when_any_read_fails() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", RENDERING_PATH)
            .match_header("soapaction", action_header("GetTreble").as_str())
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;
        server
            .mock("POST", RENDERING_PATH)
            .with_body("<s:Envelope/>")
            .create_async()
            .await;

        assert!(get_eq(&Client::new(), &server.url()).await.is_err());
    }
}
