//! Local queue edits mirrored against the device's 1-based queue addressing.
//!
//! The coordinator applies these to its cached queue before issuing the
//! matching SOAP action, so the snapshot moves immediately.

use serde::Serialize;

use crate::sonos::types::{EnqueueMode, Track};

/// Arguments of a `ReorderTracksInQueue` action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReorderRequest {
    pub starting_index: u32,
    pub number_of_tracks: u32,
    pub insert_before: u32,
}

/// Maps a 0-based local move onto the device's 1-based reorder arguments.
#[must_use]
pub fn reorder_request(source: usize, destination: usize) -> ReorderRequest {
    ReorderRequest {
        starting_index: source as u32 + 1,
        number_of_tracks: 1,
        insert_before: destination as u32 + 1,
    }
}

/// Moves the track at `source` so it sits before the track originally at
/// `destination`. A destination past the end appends.
///
/// Returns false when `source` is out of range or the move is a no-op.
pub fn move_track(queue: &mut Vec<Track>, source: usize, destination: usize) -> bool {
    if source >= queue.len() || source == destination {
        return false;
    }
    let track = queue.remove(source);
    let target = if destination > source {
        destination - 1
    } else {
        destination
    };
    queue.insert(target.min(queue.len()), track);
    renumber(queue);
    true
}

/// Removes the track at 0-based `index`. Returns false when out of range.
pub fn remove_track(queue: &mut Vec<Track>, index: usize) -> bool {
    if index >= queue.len() {
        return false;
    }
    queue.remove(index);
    renumber(queue);
    true
}

/// Rewrites every track number to its 1-based position.
pub fn renumber(queue: &mut [Track]) {
    for (i, track) in queue.iter_mut().enumerate() {
        track.track_number = Some(i as u32 + 1);
    }
}

/// Queue position handed to `AddURIToQueue` for an enqueue mode.
///
/// 0 asks the device to insert after the current track.
#[must_use]
pub fn enqueue_position(mode: EnqueueMode, track_count: u32) -> u32 {
    match mode {
        EnqueueMode::AddToEnd => track_count + 1,
        EnqueueMode::PlayNext | EnqueueMode::PlayNow => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn queue(n: usize) -> Vec<Track> {
        let mut q: Vec<Track> = (0..n)
            .map(|i| Track {
                title: format!("t{i}"),
                ..Default::default()
            })
            .collect();
        renumber(&mut q);
        q
    }

    fn titles(q: &[Track]) -> Vec<&str> {
        q.iter().map(|t| t.title.as_str()).collect()
    }

    #[test]
    fn reorder_uses_one_based_indices() {
        assert_eq!(
            reorder_request(0, 2),
            ReorderRequest {
                starting_index: 1,
                number_of_tracks: 1,
                insert_before: 3,
            }
        );
    }

    #[rstest]
    #[case(0, 2, &["t1", "t0", "t2", "t3", "t4"])]
    #[case(4, 0, &["t4", "t0", "t1", "t2", "t3"])]
    #[case(1, 5, &["t0", "t2", "t3", "t4", "t1"])]
    #[case(3, 1, &["t0", "t3", "t1", "t2", "t4"])]
    fn move_inserts_before_original_destination(
        #[case] source: usize,
        #[case] destination: usize,
        #[case] expected: &[&str],
    ) {
        let mut q = queue(5);
        assert!(move_track(&mut q, source, destination));
        assert_eq!(titles(&q), expected);
        assert_eq!(q[4].track_number, Some(5));
    }

    #[test]
    fn move_out_of_range_is_rejected() {
        let mut q = queue(3);
        assert!(!move_track(&mut q, 3, 0));
        assert!(!move_track(&mut q, 1, 1));
        assert_eq!(titles(&q), ["t0", "t1", "t2"]);
    }

    #[test]
    fn remove_renumbers() {
        let mut q = queue(3);
        assert!(remove_track(&mut q, 0));
        assert_eq!(titles(&q), ["t1", "t2"]);
        assert_eq!(q[0].track_number, Some(1));
        assert!(!remove_track(&mut q, 2));
    }

    #[rstest]
    #[case(EnqueueMode::AddToEnd, 7, 8)]
    #[case(EnqueueMode::PlayNext, 7, 0)]
    #[case(EnqueueMode::PlayNow, 7, 0)]
    fn enqueue_positions(#[case] mode: EnqueueMode, #[case] count: u32, #[case] expected: u32) {
        assert_eq!(enqueue_position(mode, count), expected);
    }
}
