//! Directional people counting from track trajectories.
//!
//! A configured boundary line splits the plane into side A and side B.
//! Each frame the side of every established track is recorded; a change
//! of recorded side between consecutive frames is one crossing and emits
//! exactly one event. There is no debouncing beyond the track having been
//! established on each side, so a person lingering on the line produces
//! one event per discrete flip in either direction.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::track::{Track, TrackId};

/// The counting boundary: a line through two points, with a polarity flag
/// for mounting orientations where the A->B transition means an exit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundaryConfig {
    pub a: [f32; 2],
    pub b: [f32; 2],
    /// Swap which crossing direction counts as an entry.
    pub invert: bool,
}

impl Default for BoundaryConfig {
    fn default() -> Self {
        // The sensor's boresight line x = 0; walking from negative to
        // positive x is an entry.
        Self {
            a: [0.0, 0.0],
            b: [0.0, 1.0],
            invert: false,
        }
    }
}

/// Which half-plane a position falls in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Side {
    A,
    B,
}

/// Direction of one counted crossing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Entry,
    Exit,
}

/// One irreversible counting decision. Immutable once emitted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountEvent {
    pub direction: Direction,
    pub frame_number: u32,
    pub track_id: TrackId,
    pub timestamp: DateTime<Utc>,
}

/// Running entry/exit totals since pipeline start.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CountTotals {
    pub entries: u64,
    pub exits: u64,
}

/// Converts track motion into entry/exit events.
///
/// Owns the per-track side memory; the tracker stays boundary-agnostic.
pub struct CountingLogic {
    boundary: BoundaryConfig,
    last_side: HashMap<TrackId, Side>,
    totals: CountTotals,
}

impl CountingLogic {
    pub fn new(boundary: BoundaryConfig) -> Self {
        Self {
            boundary,
            last_side: HashMap::new(),
            totals: CountTotals::default(),
        }
    }

    pub fn totals(&self) -> CountTotals {
        self.totals
    }

    /// Side of the boundary a position falls on. Positions exactly on the
    /// line count as side A so the function is total and a crossing still
    /// fires exactly once.
    pub fn side_of(&self, position: [f32; 2]) -> Side {
        let (a, b) = (self.boundary.a, self.boundary.b);
        let cross = (b[0] - a[0]) * (position[1] - a[1]) - (b[1] - a[1]) * (position[0] - a[0]);
        if cross >= 0.0 {
            Side::A
        } else {
            Side::B
        }
    }

    /// Record this frame's established tracks and emit crossing events.
    ///
    /// `terminated` carries tracks removed this frame with their final
    /// estimate: a side flip on that last observation still counts.
    pub fn update(
        &mut self,
        frame_number: u32,
        tracks: &[Track],
        terminated: &[Track],
    ) -> Vec<CountEvent> {
        let mut events = Vec::new();

        for track in tracks.iter().filter(|t| t.is_established()) {
            self.observe(track, frame_number, &mut events);
        }

        for track in terminated {
            // Only tracks that were established before termination have
            // side memory; tentative noise never counts.
            if self.last_side.contains_key(&track.id) {
                self.observe(track, frame_number, &mut events);
                self.last_side.remove(&track.id);
            }
        }

        events
    }

    fn observe(&mut self, track: &Track, frame_number: u32, events: &mut Vec<CountEvent>) {
        let side = self.side_of([track.x, track.y]);
        let previous = self.last_side.insert(track.id, side);
        if let Some(prev) = previous {
            if prev != side {
                let direction = self.direction_of(prev);
                match direction {
                    Direction::Entry => self.totals.entries += 1,
                    Direction::Exit => self.totals.exits += 1,
                }
                info!(
                    track = track.id.0,
                    frame = frame_number,
                    ?direction,
                    "boundary crossing"
                );
                events.push(CountEvent {
                    direction,
                    frame_number,
                    track_id: track.id,
                    timestamp: Utc::now(),
                });
            }
        }
    }

    fn direction_of(&self, from: Side) -> Direction {
        let entry = match from {
            Side::A => true,  // A -> B
            Side::B => false, // B -> A
        };
        if entry != self.boundary.invert {
            Direction::Entry
        } else {
            Direction::Exit
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::TrackState;

    fn track_at(id: u32, x: f32, y: f32, state: TrackState) -> Track {
        Track {
            id: TrackId(id),
            x,
            y,
            vx: 0.0,
            vy: 0.0,
            state,
            age: 10,
            hits: 5,
            misses: 0,
        }
    }

    fn logic() -> CountingLogic {
        CountingLogic::new(BoundaryConfig::default())
    }

    #[test]
    fn monotonic_crossing_emits_exactly_one_entry() {
        let mut counter = logic();
        let mut all_events = Vec::new();
        // Walk from x = -2 to x = +2 in small steps.
        for (frame, step) in (0..9).enumerate() {
            let x = -2.0 + step as f32 * 0.5;
            let tracks = vec![track_at(1, x, 1.0, TrackState::Confirmed)];
            all_events.extend(counter.update(frame as u32, &tracks, &[]));
        }
        assert_eq!(all_events.len(), 1);
        assert_eq!(all_events[0].direction, Direction::Entry);
        assert_eq!(counter.totals(), CountTotals { entries: 1, exits: 0 });
    }

    #[test]
    fn round_trip_emits_entry_then_exit() {
        let mut counter = logic();
        let path = [-1.0, 1.0, -1.0];
        let mut events = Vec::new();
        for (frame, &x) in path.iter().enumerate() {
            let tracks = vec![track_at(1, x, 1.0, TrackState::Confirmed)];
            events.extend(counter.update(frame as u32, &tracks, &[]));
        }
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].direction, Direction::Entry);
        assert_eq!(events[1].direction, Direction::Exit);
        assert_eq!(counter.totals(), CountTotals { entries: 1, exits: 1 });
    }

    #[test]
    fn oscillation_counts_every_discrete_flip() {
        let mut counter = logic();
        let path = [-0.1, 0.1, -0.1, 0.1];
        let mut events = Vec::new();
        for (frame, &x) in path.iter().enumerate() {
            let tracks = vec![track_at(1, x, 1.0, TrackState::Confirmed)];
            events.extend(counter.update(frame as u32, &tracks, &[]));
        }
        assert_eq!(events.len(), 3);
        assert_eq!(counter.totals(), CountTotals { entries: 2, exits: 1 });
    }

    #[test]
    fn tentative_tracks_never_count() {
        let mut counter = logic();
        for (frame, x) in [-1.0f32, 1.0].into_iter().enumerate() {
            let tracks = vec![track_at(1, x, 1.0, TrackState::Tentative)];
            assert!(counter.update(frame as u32, &tracks, &[]).is_empty());
        }
        assert_eq!(counter.totals(), CountTotals::default());
    }

    #[test]
    fn coasting_tracks_still_count() {
        let mut counter = logic();
        let before = vec![track_at(1, -0.2, 1.0, TrackState::Confirmed)];
        counter.update(0, &before, &[]);
        let after = vec![track_at(1, 0.2, 1.0, TrackState::Coasting)];
        let events = counter.update(1, &after, &[]);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].direction, Direction::Entry);
    }

    #[test]
    fn crossing_on_the_final_observation_counts() {
        let mut counter = logic();
        let alive = vec![track_at(1, -0.3, 1.0, TrackState::Confirmed)];
        counter.update(0, &alive, &[]);

        // The track is terminated this frame, last estimate on the far side.
        let mut dead = track_at(1, 0.3, 1.0, TrackState::Terminated);
        dead.misses = 6;
        let events = counter.update(1, &[], &[dead]);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].direction, Direction::Entry);
    }

    #[test]
    fn terminated_tentative_leaves_no_memory_and_no_event() {
        let mut counter = logic();
        let dead = track_at(2, 0.5, 1.0, TrackState::Terminated);
        let events = counter.update(0, &[], &[dead]);
        assert!(events.is_empty());
    }

    #[test]
    fn inverted_polarity_swaps_directions() {
        let mut counter = CountingLogic::new(BoundaryConfig {
            invert: true,
            ..BoundaryConfig::default()
        });
        let mut events = Vec::new();
        for (frame, x) in [-1.0f32, 1.0].into_iter().enumerate() {
            let tracks = vec![track_at(1, x, 1.0, TrackState::Confirmed)];
            events.extend(counter.update(frame as u32, &tracks, &[]));
        }
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].direction, Direction::Exit);
        assert_eq!(counter.totals(), CountTotals { entries: 0, exits: 1 });
    }

    #[test]
    fn oblique_boundary_sides_follow_the_line() {
        // Diagonal boundary through the origin at 45 degrees.
        let counter = CountingLogic::new(BoundaryConfig {
            a: [0.0, 0.0],
            b: [1.0, 1.0],
            invert: false,
        });
        assert_eq!(counter.side_of([0.0, 1.0]), Side::A);
        assert_eq!(counter.side_of([1.0, 0.0]), Side::B);
        // On the line counts as A.
        assert_eq!(counter.side_of([2.0, 2.0]), Side::A);
    }
}
