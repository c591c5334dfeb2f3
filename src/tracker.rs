//! Frame-to-frame association and track lifecycle management.
//!
//! Tracks move through `Tentative -> Confirmed -> Coasting -> Terminated`.
//! Association is greedy nearest-match: track/cluster pairs are processed
//! in increasing cost order and assigned when both sides are still free
//! and the cost is under the gate. Per-frame object counts are single
//! digit, so the greedy heuristic's error is negligible against optimal
//! assignment while keeping latency fixed.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cluster::Cluster;
use crate::track::{Track, TrackId, TrackState};

/// Tracking thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Consecutive matches (creation included) to confirm a tentative track.
    pub n_confirm: u32,
    /// Consecutive misses a coasting track survives before termination.
    pub n_timeout: u32,
    /// Association gate: maximum predicted-to-observed distance, meters.
    pub g_max: f32,
    /// Gate widening per coasted frame, as a fraction of `g_max`. Stands
    /// in for the growing state uncertainty of an unmeasured track.
    pub gate_growth: f32,
    /// Frame period, seconds.
    pub dt: f32,
    /// Position gain of the constant-velocity filter.
    pub alpha: f32,
    /// Velocity gain of the constant-velocity filter.
    pub beta: f32,
    /// Tracks beyond this range have left the field of view, meters.
    pub max_range: f32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            n_confirm: 3,
            n_timeout: 5,
            g_max: 1.0,
            gate_growth: 0.25,
            dt: 0.1,
            alpha: 0.6,
            beta: 0.3,
            max_range: 14.0,
        }
    }
}

/// What one frame step did to the track set.
#[derive(Debug, Clone, Default)]
pub struct StepSummary {
    /// Ids of tracks spawned this frame.
    pub spawned: Vec<TrackId>,
    /// Tracks terminated this frame, carrying their final estimate so
    /// downstream consumers can act on the last observation.
    pub terminated: Vec<Track>,
}

/// Owner of the persistent track set.
///
/// The arena is mutated exclusively here, one frame at a time; everything
/// downstream reads it between steps.
pub struct TrackManager {
    config: TrackerConfig,
    tracks: Vec<Track>,
    next_id: u32,
}

impl TrackManager {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            tracks: Vec::new(),
            next_id: 0,
        }
    }

    /// All live tracks, tentative included.
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Confirmed and coasting tracks only.
    pub fn established(&self) -> impl Iterator<Item = &Track> {
        self.tracks.iter().filter(|t| t.is_established())
    }

    /// Advance the track set by one frame of clusters.
    pub fn step(&mut self, clusters: &[Cluster]) -> StepSummary {
        let cfg = self.config;
        let mut summary = StepSummary::default();

        for t in &mut self.tracks {
            t.age += 1;
            t.predict(cfg.dt);
        }

        // Gated candidate pairs, cheapest first. Ties broken by index so
        // the assignment is deterministic.
        let mut pairs: Vec<(f32, usize, usize)> = Vec::new();
        for (ti, t) in self.tracks.iter().enumerate() {
            let gate = cfg.g_max * (1.0 + t.misses as f32 * cfg.gate_growth);
            for (ci, c) in clusters.iter().enumerate() {
                let dx = t.x - c.centroid[0];
                let dy = t.y - c.centroid[1];
                let cost = (dx * dx + dy * dy).sqrt();
                if cost < gate {
                    pairs.push((cost, ti, ci));
                }
            }
        }
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)).then(a.2.cmp(&b.2)));

        let mut track_match: Vec<Option<usize>> = vec![None; self.tracks.len()];
        let mut cluster_taken = vec![false; clusters.len()];
        for (_, ti, ci) in pairs {
            if track_match[ti].is_none() && !cluster_taken[ci] {
                track_match[ti] = Some(ci);
                cluster_taken[ci] = true;
            }
        }

        for (ti, t) in self.tracks.iter_mut().enumerate() {
            match track_match[ti] {
                Some(ci) => {
                    let c = &clusters[ci];
                    t.correct(c.centroid, cfg.dt, cfg.alpha, cfg.beta);
                    t.misses = 0;
                    t.hits = t.hits.saturating_add(1);
                    match t.state {
                        TrackState::Tentative if t.hits >= cfg.n_confirm => {
                            t.state = TrackState::Confirmed;
                            debug!(id = t.id.0, age = t.age, "track confirmed");
                        }
                        TrackState::Coasting => t.state = TrackState::Confirmed,
                        _ => {}
                    }
                }
                None => {
                    t.hits = 0;
                    match t.state {
                        // Transient noise: one miss kills a tentative track.
                        TrackState::Tentative => t.state = TrackState::Terminated,
                        TrackState::Confirmed => {
                            t.state = TrackState::Coasting;
                            t.misses = 1;
                        }
                        TrackState::Coasting => {
                            t.misses += 1;
                            if t.misses > cfg.n_timeout {
                                t.state = TrackState::Terminated;
                                debug!(id = t.id.0, "track timed out");
                            }
                        }
                        TrackState::Terminated => {}
                    }
                }
            }

            if t.state != TrackState::Terminated && t.range() > cfg.max_range {
                t.state = TrackState::Terminated;
                debug!(id = t.id.0, range = t.range(), "track left field of view");
            }
        }

        for (ci, c) in clusters.iter().enumerate() {
            if cluster_taken[ci] {
                continue;
            }
            let r = (c.centroid[0] * c.centroid[0] + c.centroid[1] * c.centroid[1]).sqrt();
            if r > cfg.max_range {
                continue;
            }
            let id = TrackId(self.next_id);
            self.next_id += 1;
            let mut t = Track::spawn(id, c.centroid, c.mean_velocity);
            if cfg.n_confirm <= 1 {
                t.state = TrackState::Confirmed;
            }
            summary.spawned.push(id);
            self.tracks.push(t);
        }

        let mut kept = Vec::with_capacity(self.tracks.len());
        for t in self.tracks.drain(..) {
            if t.state == TrackState::Terminated {
                summary.terminated.push(t);
            } else {
                kept.push(t);
            }
        }
        self.tracks = kept;

        summary
    }
}
