//! Video discovery and candidate selection.
//!
//! Candidates are ranked by readiness tier first, then by visible area with
//! an off-screen penalty. Any property that could not be read counts as
//! "unknown" and scores zero; a failing element never aborts selection.

use serde::{Deserialize, Serialize};

use crate::types::{Rect, VideoId, Viewport};

// ─── Constants ────────────────────────────────────────────────────

/// Score multiplier for a box that does not intersect the viewport.
pub const OFFSCREEN_PENALTY: f64 = 0.2;

/// Same-origin frames scanned per discovery pass.
pub const MAX_FRAMES_SCANNED: usize = 8;

/// Primary player containers for sites whose generic enumeration order is
/// unreliable. Matched by host substring.
pub const SITE_PLAYERS: [(&str, &str); 1] = [(
    "youtube.com",
    "#movie_player video, .html5-video-player video, ytd-player video",
)];

pub fn site_player_selector(host: &str) -> Option<&'static str> {
    SITE_PLAYERS
        .iter()
        .find(|(fragment, _)| host.contains(fragment))
        .map(|(_, selector)| *selector)
}

// ─── Media state ──────────────────────────────────────────────────

/// HTML media `readyState` levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReadyState {
    HaveNothing,
    HaveMetadata,
    HaveCurrentData,
    HaveFutureData,
    HaveEnoughData,
}

impl ReadyState {
    pub fn from_level(level: u8) -> Self {
        match level {
            0 => Self::HaveNothing,
            1 => Self::HaveMetadata,
            2 => Self::HaveCurrentData,
            3 => Self::HaveFutureData,
            _ => Self::HaveEnoughData,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaState {
    pub paused: bool,
    pub ended: bool,
    pub ready_state: ReadyState,
}

impl MediaState {
    pub fn playing(ready_state: ReadyState) -> Self {
        Self {
            paused: false,
            ended: false,
            ready_state,
        }
    }

    pub fn paused(ready_state: ReadyState) -> Self {
        Self {
            paused: true,
            ended: false,
            ready_state,
        }
    }
}

/// One enumerated video. `None` fields could not be read.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VideoProbe {
    pub id: VideoId,
    pub media: Option<MediaState>,
    pub rect: Option<Rect>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tier {
    /// Not paused, not ended, at least current data buffered.
    Playing,
    /// At least metadata loaded.
    Metadata,
    Unknown,
}

pub fn tier(probe: &VideoProbe) -> Tier {
    match probe.media {
        Some(m) if !m.paused && !m.ended && m.ready_state >= ReadyState::HaveCurrentData => {
            Tier::Playing
        }
        Some(m) if m.ready_state >= ReadyState::HaveMetadata => Tier::Metadata,
        _ => Tier::Unknown,
    }
}

/// Visible area, penalized when the box lies outside `layout`.
pub fn score(probe: &VideoProbe, layout: Viewport) -> f64 {
    let Some(rect) = probe.rect else {
        return 0.0;
    };
    let area = rect.area();
    if !area.is_finite() {
        return 0.0;
    }
    if rect.intersects(layout) {
        area
    } else {
        area * OFFSCREEN_PENALTY
    }
}

/// Best PiP candidate: top score among playing videos, else among videos
/// with metadata, else the first enumerated video.
pub fn select_best(candidates: &[VideoProbe], layout: Viewport) -> Option<VideoId> {
    best_in_tier(candidates, layout, Tier::Playing)
        .or_else(|| best_in_tier(candidates, layout, Tier::Metadata))
        .or_else(|| candidates.first().map(|c| c.id))
}

fn best_in_tier(candidates: &[VideoProbe], layout: Viewport, wanted: Tier) -> Option<VideoId> {
    let mut best: Option<(VideoId, f64)> = None;
    for probe in candidates.iter().filter(|c| tier(c) == wanted) {
        let s = score(probe, layout);
        // Ties keep the earlier candidate.
        if best.is_none_or(|(_, top)| s > top) {
            best = Some((probe.id, s));
        }
    }
    best.map(|(id, _)| id)
}

// ─── Discovery ────────────────────────────────────────────────────

/// Contents of one embedded frame.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameAccess {
    SameOrigin(Vec<VideoProbe>),
    /// Inaccessible by design; skipped silently.
    CrossOrigin,
}

/// Read-only view of a page's document tree.
pub trait VideoDocument {
    /// Video elements of the main document in document order.
    fn videos(&self) -> Vec<VideoProbe>;
    /// First video matching `selector`, if any.
    fn query_video(&self, selector: &str) -> Option<VideoProbe>;
    fn frame_count(&self) -> usize;
    fn frame(&self, index: usize) -> FrameAccess;
}

/// Enumerate candidates: main document, the site's primary player moved to
/// the front when known, then videos of the first few same-origin frames.
pub fn discover<D: VideoDocument + ?Sized>(doc: &D, host: &str) -> Vec<VideoProbe> {
    let mut videos = doc.videos();

    if let Some(player) = site_player_selector(host).and_then(|sel| doc.query_video(sel)) {
        if !videos.iter().any(|v| v.id == player.id) {
            videos.insert(0, player);
        }
    }

    for index in 0..doc.frame_count().min(MAX_FRAMES_SCANNED) {
        if let FrameAccess::SameOrigin(frame_videos) = doc.frame(index) {
            videos.extend(frame_videos);
        }
    }

    videos
}

// ─── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const LAYOUT: Viewport = Viewport {
        width: 1280,
        height: 720,
    };

    fn probe(id: u64, media: Option<MediaState>, rect: Option<Rect>) -> VideoProbe {
        VideoProbe {
            id: VideoId(id),
            media,
            rect,
        }
    }

    fn on_screen(w: f64, h: f64) -> Option<Rect> {
        Some(Rect::new(10.0, 10.0, w, h))
    }

    fn off_screen(w: f64, h: f64) -> Option<Rect> {
        Some(Rect::new(10.0, 5_000.0, w, h))
    }

    #[test]
    fn playing_beats_larger_paused() {
        let a = probe(1, Some(MediaState::paused(ReadyState::HaveEnoughData)), on_screen(100.0, 100.0));
        let b = probe(2, Some(MediaState::playing(ReadyState::HaveCurrentData)), on_screen(50.0, 50.0));
        assert_eq!(select_best(&[a, b], LAYOUT), Some(VideoId(2)));
    }

    #[test]
    fn lone_paused_video_is_fallback() {
        let a = probe(1, Some(MediaState::paused(ReadyState::HaveEnoughData)), on_screen(100.0, 100.0));
        assert_eq!(select_best(&[a], LAYOUT), Some(VideoId(1)));
    }

    #[test]
    fn offscreen_penalty_small_visible_loses() {
        // 10*10*1.0 = 100 < 100*100*0.2 = 2000
        let small = probe(1, Some(MediaState::playing(ReadyState::HaveEnoughData)), on_screen(10.0, 10.0));
        let big_off = probe(2, Some(MediaState::playing(ReadyState::HaveEnoughData)), off_screen(100.0, 100.0));
        assert_eq!(select_best(&[small, big_off], LAYOUT), Some(VideoId(2)));
    }

    #[test]
    fn offscreen_penalty_large_visible_wins() {
        // 50*50*1.0 = 2500 > 2000
        let visible = probe(1, Some(MediaState::playing(ReadyState::HaveEnoughData)), on_screen(50.0, 50.0));
        let big_off = probe(2, Some(MediaState::playing(ReadyState::HaveEnoughData)), off_screen(100.0, 100.0));
        assert_eq!(select_best(&[big_off, visible], LAYOUT), Some(VideoId(1)));
    }

    #[test]
    fn offscreen_penalty_exact_tie_keeps_first() {
        // 40*50 = 2000 == 100*100*0.2
        let visible = probe(1, Some(MediaState::playing(ReadyState::HaveEnoughData)), on_screen(40.0, 50.0));
        let big_off = probe(2, Some(MediaState::playing(ReadyState::HaveEnoughData)), off_screen(100.0, 100.0));
        assert_eq!(score(&visible, LAYOUT), score(&big_off, LAYOUT));
        assert_eq!(select_best(&[big_off, visible], LAYOUT), Some(VideoId(2)));
        assert_eq!(select_best(&[visible, big_off], LAYOUT), Some(VideoId(1)));
    }

    #[test]
    fn metadata_tier_used_when_nothing_plays() {
        let unknown = probe(1, None, on_screen(800.0, 400.0));
        let meta_small = probe(2, Some(MediaState::paused(ReadyState::HaveMetadata)), on_screen(20.0, 20.0));
        let meta_big = probe(3, Some(MediaState::paused(ReadyState::HaveMetadata)), on_screen(200.0, 200.0));
        assert_eq!(select_best(&[unknown, meta_small, meta_big], LAYOUT), Some(VideoId(3)));
    }

    #[test]
    fn unreadable_elements_fall_to_first_enumerated() {
        let a = probe(1, None, None);
        let b = probe(2, Some(MediaState::paused(ReadyState::HaveNothing)), on_screen(300.0, 300.0));
        assert_eq!(select_best(&[a, b], LAYOUT), Some(VideoId(1)));
        assert_eq!(select_best(&[], LAYOUT), None);
    }

    #[test]
    fn playing_without_current_data_is_not_tier_one() {
        let buffering = probe(1, Some(MediaState::playing(ReadyState::HaveMetadata)), on_screen(10.0, 10.0));
        assert_eq!(tier(&buffering), Tier::Metadata);
        let ended = probe(2, Some(MediaState { paused: false, ended: true, ready_state: ReadyState::HaveEnoughData }), None);
        assert_eq!(tier(&ended), Tier::Metadata);
    }

    #[test]
    fn missing_rect_scores_zero() {
        let p = probe(1, Some(MediaState::playing(ReadyState::HaveEnoughData)), None);
        assert_eq!(score(&p, LAYOUT), 0.0);
    }

    struct FakeDoc {
        main: Vec<VideoProbe>,
        player: Option<VideoProbe>,
        frames: Vec<FrameAccess>,
    }

    impl VideoDocument for FakeDoc {
        fn videos(&self) -> Vec<VideoProbe> {
            self.main.clone()
        }
        fn query_video(&self, _selector: &str) -> Option<VideoProbe> {
            self.player
        }
        fn frame_count(&self) -> usize {
            self.frames.len()
        }
        fn frame(&self, index: usize) -> FrameAccess {
            self.frames[index].clone()
        }
    }

    #[test]
    fn site_player_is_prepended_once() {
        let player = probe(9, None, None);
        let doc = FakeDoc {
            main: vec![probe(1, None, None)],
            player: Some(player),
            frames: vec![],
        };
        let ids: Vec<u64> = discover(&doc, "www.youtube.com").iter().map(|v| v.id.0).collect();
        assert_eq!(ids, vec![9, 1]);

        let doc = FakeDoc {
            main: vec![probe(1, None, None), player],
            player: Some(player),
            frames: vec![],
        };
        let ids: Vec<u64> = discover(&doc, "www.youtube.com").iter().map(|v| v.id.0).collect();
        assert_eq!(ids, vec![1, 9]);
    }

    #[test]
    fn player_selector_ignored_on_other_hosts() {
        let doc = FakeDoc {
            main: vec![probe(1, None, None)],
            player: Some(probe(9, None, None)),
            frames: vec![],
        };
        assert_eq!(discover(&doc, "vimeo.com").len(), 1);
    }

    #[test]
    fn frames_scanned_up_to_cap_and_cross_origin_skipped() {
        let mut frames = vec![FrameAccess::CrossOrigin];
        for i in 0..MAX_FRAMES_SCANNED + 3 {
            frames.push(FrameAccess::SameOrigin(vec![probe(100 + i as u64, None, None)]));
        }
        let doc = FakeDoc {
            main: vec![],
            player: None,
            frames,
        };
        let found = discover(&doc, "example.com");
        // First slot was cross-origin, so one fewer same-origin frame fits.
        assert_eq!(found.len(), MAX_FRAMES_SCANNED - 1);
        assert_eq!(found[0].id, VideoId(100));
    }
}
