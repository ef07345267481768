//! Association engine: matches each frame's detections to persistent tracks.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::ConfigError;
use crate::tracker::error::TrackError;
use crate::tracker::matching::{self, AssignmentResult, Similarity};
use crate::tracker::projection::Calibration;
use crate::tracker::rect::Rect;
use crate::tracker::tracked_object::{DisplayRecord, TrackId, TrackedObject};

/// How a frame's detections are paired with tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Association {
    /// Each detection takes its best qualifying track, one call at a time
    #[default]
    Sequential,
    /// All of a frame's detections are solved together as a one-to-one assignment
    Global,
}

/// Configuration for the [`TrackedObjectList`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Confidence given to a newly created track
    pub seed_confidence: f64,
    /// Fraction of the remaining gap to 1.0 recovered on each match
    pub match_gain: f64,
    /// Multiplier applied to confidence for each frame without a match
    pub decay: f64,
    /// Tracks below this confidence are dropped
    pub min_confidence: f64,
    /// Tracks are dropped after this many consecutive misses
    pub max_miss: u32,
    /// Centroid distance bound in pixels for a detection to match a track
    pub max_centroid_distance: f64,
    /// Centroid distance bound as a fraction of the track's width; the tighter bound applies
    pub max_centroid_width_ratio: f64,
    /// Bound on |A_track - A_det| / max(A_track, A_det)
    pub max_area_difference_ratio: f64,
    /// Weight kept by the previous velocity estimate on each match
    pub velocity_smoothing: f64,
    pub association: Association,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            seed_confidence: 0.1,
            match_gain: 0.2,
            decay: 0.85,
            min_confidence: 0.02,
            max_miss: 20,
            max_centroid_distance: 64.0,
            max_centroid_width_ratio: 0.75,
            max_area_difference_ratio: 0.5,
            velocity_smoothing: 0.5,
            association: Association::Sequential,
        }
    }
}

impl TrackerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let unit = |name: &'static str, v: f64| {
            if (0.0..=1.0).contains(&v) {
                Ok(())
            } else {
                Err(ConfigError::OutOfRange { name, value: v })
            }
        };
        unit("seed_confidence", self.seed_confidence)?;
        unit("match_gain", self.match_gain)?;
        unit("min_confidence", self.min_confidence)?;
        unit("velocity_smoothing", self.velocity_smoothing)?;
        if !(self.decay >= 0.0 && self.decay < 1.0) {
            return Err(ConfigError::OutOfRange {
                name: "decay",
                value: self.decay,
            });
        }
        if self.seed_confidence < self.min_confidence {
            return Err(ConfigError::Invalid(
                "seed_confidence must not be below min_confidence".into(),
            ));
        }
        if self.max_miss == 0 {
            return Err(ConfigError::Invalid("max_miss must be at least 1".into()));
        }
        for (name, value) in [
            ("max_centroid_distance", self.max_centroid_distance),
            ("max_centroid_width_ratio", self.max_centroid_width_ratio),
            ("max_area_difference_ratio", self.max_area_difference_ratio),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::OutOfRange { name, value });
            }
        }
        Ok(())
    }

    /// How far a detection's centroid may sit from `track`'s and still match it.
    ///
    /// Neighbouring bins in a row are about one width apart, so small tracks
    /// get a bound tighter than `max_centroid_distance`.
    pub fn centroid_bound(&self, track: &Rect) -> f64 {
        self.max_centroid_distance
            .min(self.max_centroid_width_ratio * track.width as f64)
    }
}

/// All live tracks, in creation order.
///
/// Mutated only from the frame-processing thread: call
/// [`adjust_for_motion`](Self::adjust_for_motion) once, then
/// [`process_detection`](Self::process_detection) per detection, then
/// [`next_frame`](Self::next_frame) unless playback is paused.
#[derive(Debug, Clone)]
pub struct TrackedObjectList {
    tracks: Vec<TrackedObject>,
    calibration: Calibration,
    config: TrackerConfig,
    next_id: u32,
    frame_id: u64,
}

impl TrackedObjectList {
    pub fn new(calibration: Calibration, config: TrackerConfig) -> Self {
        Self {
            tracks: Vec::new(),
            calibration,
            config,
            next_id: 0,
            frame_id: 0,
        }
    }

    /// Build a list after checking both configuration inputs.
    pub fn try_new(calibration: Calibration, config: TrackerConfig) -> Result<Self, ConfigError> {
        if !calibration.is_valid() {
            return Err(ConfigError::Invalid(format!(
                "invalid calibration {calibration:?}"
            )));
        }
        config.validate()?;
        Ok(Self::new(calibration, config))
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Frames advanced so far.
    pub fn frame_id(&self) -> u64 {
        self.frame_id
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn tracks(&self) -> &[TrackedObject] {
        &self.tracks
    }

    pub fn get(&self, id: TrackId) -> Option<&TrackedObject> {
        self.tracks.iter().find(|t| t.id() == id)
    }

    /// Rotate every track by the platform's turn since the previous frame.
    pub fn adjust_for_motion(&mut self, delta_degrees: f64) -> Result<(), TrackError> {
        if !delta_degrees.is_finite() {
            warn!(delta_degrees, "ignoring non-finite motion delta");
            return Err(TrackError::NonFinite("motion delta"));
        }
        if delta_degrees == 0.0 {
            return Ok(());
        }
        for track in &mut self.tracks {
            track.rotate(delta_degrees);
        }
        Ok(())
    }

    /// Match one detection to the best qualifying track, or start a new track.
    pub fn process_detection(&mut self, rect: Rect) -> Result<TrackId, TrackError> {
        check_rect(&rect)?;

        let best = self
            .tracks
            .iter()
            .enumerate()
            .filter_map(|(idx, track)| {
                let sim = Similarity::between(
                    &track.rect(),
                    &rect,
                    self.config.centroid_bound(&track.rect()),
                    self.config.max_area_difference_ratio,
                );
                sim.qualifies().then_some((idx, sim.score()))
            })
            // Ties resolve to the oldest track
            .min_by(|a, b| a.1.total_cmp(&b.1));

        match best {
            Some((idx, _)) => {
                self.update_track(idx, rect);
                Ok(self.tracks[idx].id())
            }
            None => Ok(self.create_track(rect)),
        }
    }

    /// Solve a whole frame's detections as a one-to-one assignment.
    ///
    /// The result holds one entry per input rectangle, in input order. Invalid
    /// rectangles are reported and skipped without affecting the others.
    pub fn associate(&mut self, rects: &[Rect]) -> Vec<Result<TrackId, TrackError>> {
        let checked: Vec<Result<(), TrackError>> = rects.iter().map(check_rect).collect();
        let valid: Vec<usize> = (0..rects.len()).filter(|&i| checked[i].is_ok()).collect();

        let track_rects: Vec<Rect> = self.tracks.iter().map(|t| t.rect()).collect();
        let det_rects: Vec<Rect> = valid.iter().map(|&i| rects[i]).collect();
        let config = self.config;
        let costs = matching::similarity_cost(
            &track_rects,
            &det_rects,
            |track| config.centroid_bound(track),
            config.max_area_difference_ratio,
        );
        let AssignmentResult { matches, .. } = matching::linear_assignment(&costs);

        let mut matched_track = vec![None; rects.len()];
        for (itrack, idet) in matches {
            matched_track[valid[idet]] = Some(itrack);
        }

        // New tracks are appended, so matched indices stay valid
        let mut results = Vec::with_capacity(rects.len());
        for (input, check) in checked.into_iter().enumerate() {
            let result = match (check, matched_track[input]) {
                (Err(e), _) => Err(e),
                (Ok(()), Some(itrack)) => {
                    self.update_track(itrack, rects[input]);
                    Ok(self.tracks[itrack].id())
                }
                (Ok(()), None) => Ok(self.create_track(rects[input])),
            };
            results.push(result);
        }
        results
    }

    /// Age every track by one frame and drop the ones that ran out.
    ///
    /// Skip this while playback is paused, otherwise tracks missing from the
    /// repeated frame get aged out.
    pub fn next_frame(&mut self) {
        self.frame_id += 1;
        let TrackerConfig {
            decay,
            min_confidence,
            max_miss,
            ..
        } = self.config;

        self.tracks.retain_mut(|track| {
            let keep = track.advance(decay, min_confidence, max_miss);
            if !keep {
                debug!(
                    id = %track.id(),
                    confidence = track.confidence(),
                    misses = track.miss_count(),
                    "track removed"
                );
            }
            keep
        });
    }

    /// Snapshot of every live track in list order, regardless of confidence.
    pub fn display(&self) -> Vec<DisplayRecord> {
        self.tracks.iter().map(TrackedObject::display).collect()
    }

    /// Replace the contents of `out` with the current snapshot.
    pub fn get_display(&self, out: &mut Vec<DisplayRecord>) {
        out.clear();
        out.extend(self.tracks.iter().map(TrackedObject::display));
    }

    /// Log the state of every live track.
    pub fn print(&self) {
        for track in &self.tracks {
            let r = track.rect();
            info!(
                id = %track.id(),
                x = r.x,
                y = r.y,
                width = r.width,
                height = r.height,
                confidence = format_args!("{:.3}", track.confidence()),
                distance = format_args!("{:.1}", track.distance()),
                angle = format_args!("{:.1}", track.angle()),
                state = ?track.state(),
                "track"
            );
        }
    }

    fn update_track(&mut self, idx: usize, rect: Rect) {
        let TrackerConfig {
            match_gain,
            velocity_smoothing,
            ..
        } = self.config;
        self.tracks[idx].update(rect, &self.calibration, match_gain, velocity_smoothing);
    }

    fn create_track(&mut self, rect: Rect) -> TrackId {
        let id = self.allocate_id();
        let mut track = TrackedObject::new(id, rect, &self.calibration, self.config.seed_confidence);
        track.activate();
        debug!(%id, x = rect.x, y = rect.y, width = rect.width, height = rect.height, "track created");
        self.tracks.push(track);
        id
    }

    fn allocate_id(&mut self) -> TrackId {
        loop {
            let id = TrackId(self.next_id);
            self.next_id = self.next_id.wrapping_add(1);
            if self.get(id).is_none() {
                return id;
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn track_mut(&mut self, id: TrackId) -> Option<&mut TrackedObject> {
        self.tracks.iter_mut().find(|t| t.id() == id)
    }
}

fn check_rect(rect: &Rect) -> Result<(), TrackError> {
    if rect.is_valid() {
        Ok(())
    } else {
        warn!(?rect, "rejecting malformed detection");
        Err(TrackError::InvalidRect {
            x: rect.x,
            y: rect.y,
            width: rect.width,
            height: rect.height,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::TrackState;

    fn list() -> TrackedObjectList {
        TrackedObjectList::new(Calibration::default(), TrackerConfig::default())
    }

    fn assert_bounded(list: &TrackedObjectList) {
        for t in list.tracks() {
            assert!((0.0..=1.0).contains(&t.confidence()), "{}", t.confidence());
        }
    }

    #[test]
    fn test_first_detection_creates_track() {
        let mut list = list();
        let id = list.process_detection(Rect::new(10.0, 10.0, 50.0, 50.0)).unwrap();
        assert_eq!(list.len(), 1);
        let track = list.get(id).unwrap();
        assert_eq!(track.confidence(), TrackerConfig::default().seed_confidence);
        assert_eq!(track.state(), TrackState::Tracked);
        assert_eq!(id.to_string(), "A");
    }

    #[test]
    fn test_created_track_is_tracked_before_next_frame() {
        let mut list = list();
        let results = list.associate(&[Rect::new(10.0, 10.0, 50.0, 50.0)]);
        let id = results[0].clone().unwrap();
        assert_eq!(list.get(id).unwrap().state(), TrackState::Tracked);
        assert!(list.get(id).unwrap().hit_this_frame());

        list.next_frame();
        let track = list.get(id).unwrap();
        assert_eq!(track.state(), TrackState::Tracked);
        assert_eq!(track.miss_count(), 0);
    }

    #[test]
    fn test_near_identical_detection_updates_track() {
        let mut list = list();
        let id = list.process_detection(Rect::new(10.0, 10.0, 50.0, 50.0)).unwrap();
        list.track_mut(id).unwrap().set_confidence(0.5);

        let again = list.process_detection(Rect::new(12.0, 11.0, 49.0, 51.0)).unwrap();
        assert_eq!(again, id);
        assert_eq!(list.len(), 1);
        let track = list.get(id).unwrap();
        assert!(track.confidence() > 0.5);
        assert_eq!(track.rect(), Rect::new(12.0, 11.0, 49.0, 51.0));
        assert_eq!(track.state(), TrackState::Tracked);
    }

    #[test]
    fn test_distant_detection_creates_second_track() {
        let mut list = list();
        let a = list.process_detection(Rect::new(10.0, 10.0, 50.0, 50.0)).unwrap();
        let b = list.process_detection(Rect::new(400.0, 10.0, 50.0, 50.0)).unwrap();
        assert_ne!(a, b);
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_size_mismatch_creates_second_track() {
        let mut list = list();
        list.process_detection(Rect::new(100.0, 100.0, 40.0, 40.0)).unwrap();
        // Same center, four times the area
        list.process_detection(Rect::new(80.0, 80.0, 80.0, 80.0)).unwrap();
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_best_scoring_track_wins() {
        let mut list = list();
        let left = list.process_detection(Rect::new(100.0, 100.0, 60.0, 60.0)).unwrap();
        // Centers 70px apart, bound is 45px: too far to match each other
        let right = list.process_detection(Rect::new(170.0, 100.0, 60.0, 60.0)).unwrap();
        assert_ne!(left, right);

        // 40px from left, 30px from right: both qualify, right scores better
        let id = list.process_detection(Rect::new(140.0, 100.0, 60.0, 60.0)).unwrap();
        assert_eq!(id, right);
    }

    #[test]
    fn test_adjacent_bins_get_separate_tracks() {
        // Two 60px bins side by side: centers 60px apart, under the 64px cap
        let mut list = list();
        let left = list.process_detection(Rect::new(100.0, 200.0, 60.0, 80.0)).unwrap();
        let right = list.process_detection(Rect::new(160.0, 200.0, 60.0, 80.0)).unwrap();
        assert_ne!(left, right);
        assert_eq!(list.len(), 2);

        // A large bin still gets the full pixel bound
        let config = TrackerConfig::default();
        assert_eq!(config.centroid_bound(&Rect::new(0.0, 0.0, 60.0, 80.0)), 45.0);
        assert_eq!(config.centroid_bound(&Rect::new(0.0, 0.0, 200.0, 80.0)), 64.0);
    }

    #[test]
    fn test_invalid_rect_rejected_without_mutation() {
        let mut list = list();
        list.process_detection(Rect::new(10.0, 10.0, 50.0, 50.0)).unwrap();
        let before = list.display();

        for bad in [
            Rect::new(10.0, 10.0, 0.0, 50.0),
            Rect::new(10.0, 10.0, 50.0, -5.0),
            Rect::new(f32::NAN, 10.0, 50.0, 50.0),
        ] {
            assert!(matches!(
                list.process_detection(bad),
                Err(TrackError::InvalidRect { .. })
            ));
        }
        assert_eq!(list.display(), before);
    }

    #[test]
    fn test_unmatched_track_decays_then_removed() {
        let mut list = list();
        let id = list.process_detection(Rect::new(10.0, 10.0, 50.0, 50.0)).unwrap();
        list.next_frame();
        assert_eq!(list.get(id).unwrap().state(), TrackState::Tracked);

        let mut last = list.get(id).unwrap().confidence();
        while let Some(track) = list.get(id) {
            assert!(track.confidence() <= last);
            last = track.confidence();
            list.next_frame();
            assert_bounded(&list);
        }
        assert!(list.is_empty());
    }

    #[test]
    fn test_track_at_min_confidence_removed() {
        let mut list = list();
        let keep = list.process_detection(Rect::new(300.0, 10.0, 50.0, 50.0)).unwrap();
        let drop = list.process_detection(Rect::new(10.0, 10.0, 50.0, 50.0)).unwrap();
        list.next_frame();
        list.track_mut(drop)
            .unwrap()
            .set_confidence(TrackerConfig::default().min_confidence);

        list.process_detection(Rect::new(300.0, 10.0, 50.0, 50.0)).unwrap();
        list.next_frame();
        assert_eq!(list.len(), 1);
        assert!(list.get(drop).is_none());
        assert!(list.get(keep).is_some());
    }

    #[test]
    fn test_removed_after_max_miss() {
        let config = TrackerConfig {
            max_miss: 5,
            decay: 0.99,
            ..TrackerConfig::default()
        };
        let mut list = TrackedObjectList::new(Calibration::default(), config);
        let id = list.process_detection(Rect::new(10.0, 10.0, 50.0, 50.0)).unwrap();
        list.next_frame();
        for _ in 0..4 {
            list.next_frame();
            assert!(list.get(id).is_some());
        }
        list.next_frame();
        assert!(list.get(id).is_none());
    }

    #[test]
    fn test_stale_track_recovers_without_reset() {
        let mut list = list();
        let rect = Rect::new(10.0, 10.0, 50.0, 50.0);
        let id = list.process_detection(rect).unwrap();
        list.next_frame();
        list.process_detection(rect).unwrap();
        list.next_frame();
        list.next_frame();
        let stale = list.get(id).unwrap();
        assert_eq!(stale.state(), TrackState::Stale);
        let before = stale.confidence();

        list.process_detection(rect).unwrap();
        let track = list.get(id).unwrap();
        assert_eq!(track.state(), TrackState::Tracked);
        assert_eq!(track.miss_count(), 0);
        assert!(track.confidence() > before);
        assert!(track.confidence() < 1.0);
    }

    #[test]
    fn test_adjust_for_motion_shifts_angles_only() {
        let mut list = list();
        list.process_detection(Rect::new(10.0, 10.0, 50.0, 50.0)).unwrap();
        list.process_detection(Rect::new(400.0, 200.0, 30.0, 30.0)).unwrap();
        let before = list.display();

        list.adjust_for_motion(90.0).unwrap();
        let after = list.display();

        for (b, a) in before.iter().zip(&after) {
            assert_eq!(a.rect, b.rect);
            assert_eq!(a.distance, b.distance);
            assert_eq!(a.ratio, b.ratio);
            let shift = (a.angle - b.angle).rem_euclid(360.0);
            assert!((shift - 90.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_adjust_for_motion_rejects_nan() {
        let mut list = list();
        list.process_detection(Rect::new(10.0, 10.0, 50.0, 50.0)).unwrap();
        let before = list.display();
        assert!(list.adjust_for_motion(f64::NAN).is_err());
        assert_eq!(list.display(), before);
    }

    #[test]
    fn test_display_is_idempotent_and_ordered() {
        let mut list = list();
        for x in [10.0, 200.0, 400.0] {
            list.process_detection(Rect::new(x, 10.0, 50.0, 50.0)).unwrap();
        }
        let first = list.display();
        let mut second = Vec::new();
        list.get_display(&mut second);
        assert_eq!(first, second);
        let ids: Vec<_> = first.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![TrackId(0), TrackId(1), TrackId(2)]);
    }

    #[test]
    fn test_ids_not_reused() {
        let mut list = list();
        let a = list.process_detection(Rect::new(10.0, 10.0, 50.0, 50.0)).unwrap();
        while list.get(a).is_some() {
            list.next_frame();
        }
        let b = list.process_detection(Rect::new(10.0, 10.0, 50.0, 50.0)).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_associate_is_one_to_one() {
        let mut list = list();
        let id = list.process_detection(Rect::new(100.0, 100.0, 40.0, 40.0)).unwrap();
        list.next_frame();

        // Both detections qualify for the single track; only one may take it
        let results = list.associate(&[
            Rect::new(104.0, 100.0, 40.0, 40.0),
            Rect::new(101.0, 100.0, 40.0, 40.0),
        ]);
        let ids: Vec<_> = results.into_iter().map(Result::unwrap).collect();
        assert_eq!(ids[1], id);
        assert_ne!(ids[0], id);
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_associate_reports_invalid_rects() {
        let mut list = list();
        let results = list.associate(&[
            Rect::new(10.0, 10.0, 50.0, 50.0),
            Rect::new(10.0, 10.0, -1.0, 50.0),
        ]);
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_associate_mixes_matches_creations_and_rejections() {
        let mut list = list();
        let existing = list.process_detection(Rect::new(100.0, 100.0, 60.0, 60.0)).unwrap();
        list.next_frame();

        let results = list.associate(&[
            Rect::new(400.0, 100.0, 60.0, 60.0),
            Rect::new(f32::NAN, 0.0, 60.0, 60.0),
            Rect::new(102.0, 101.0, 60.0, 60.0),
        ]);
        assert_eq!(results.len(), 3);
        let created = results[0].clone().unwrap();
        assert_ne!(created, existing);
        assert!(matches!(results[1], Err(TrackError::InvalidRect { .. })));
        assert_eq!(results[2], Ok(existing));
        assert_eq!(list.len(), 2);
        assert_eq!(list.get(existing).unwrap().rect(), Rect::new(102.0, 101.0, 60.0, 60.0));
    }

    #[test]
    fn test_config_validation() {
        assert!(TrackerConfig::default().validate().is_ok());
        let bad = TrackerConfig {
            decay: 1.0,
            ..TrackerConfig::default()
        };
        assert!(bad.validate().is_err());
        let bad = TrackerConfig {
            seed_confidence: 0.01,
            min_confidence: 0.05,
            ..TrackerConfig::default()
        };
        assert!(bad.validate().is_err());
        let bad = TrackerConfig {
            max_centroid_width_ratio: 0.0,
            ..TrackerConfig::default()
        };
        assert!(bad.validate().is_err());
        assert!(TrackedObjectList::try_new(Calibration::new(0.0, 640.0, 69.0), TrackerConfig::default()).is_err());
    }
}
