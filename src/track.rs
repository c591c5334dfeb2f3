//! Persistent track state and the constant-velocity filter.

use serde::{Deserialize, Serialize};

/// Stable identity of a track. Never changes over a track's lifetime and
/// never reused within a run.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct TrackId(pub u32);

/// Lifecycle state of a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackState {
    /// Fresh hypothesis; dies on its first missed frame.
    Tentative,
    /// Established object, matched this frame.
    Confirmed,
    /// Established object sustained by extrapolation only.
    Coasting,
    /// Removed from the active set; no further mutation.
    Terminated,
}

/// One persistent object hypothesis.
///
/// Position and velocity are the filter estimate, not the raw measurement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Track {
    pub id: TrackId,
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub state: TrackState,
    /// Frames since creation.
    pub age: u32,
    /// Consecutive matched frames; creation counts as the first.
    pub hits: u32,
    /// Consecutive missed frames.
    pub misses: u32,
}

impl Track {
    /// Spawn a tentative track on an unmatched cluster centroid.
    ///
    /// The initial velocity is the cluster's radial doppler projected
    /// along the line of sight; the filter refines it as matches arrive.
    pub fn spawn(id: TrackId, centroid: [f32; 2], radial_velocity: f32) -> Self {
        let range = (centroid[0] * centroid[0] + centroid[1] * centroid[1]).sqrt();
        let (vx, vy) = if range > f32::EPSILON {
            (
                radial_velocity * centroid[0] / range,
                radial_velocity * centroid[1] / range,
            )
        } else {
            (0.0, 0.0)
        };
        Track {
            id,
            x: centroid[0],
            y: centroid[1],
            vx,
            vy,
            state: TrackState::Tentative,
            age: 0,
            hits: 1,
            misses: 0,
        }
    }

    /// Advance the estimate one frame on the current velocity. During
    /// coasting this is the only update the track receives.
    pub fn predict(&mut self, dt: f32) {
        self.x += self.vx * dt;
        self.y += self.vy * dt;
    }

    /// Blend the predicted state with a matched measurement.
    ///
    /// Fixed-gain alpha-beta form: `alpha` weighs the position residual,
    /// `beta` feeds it back into velocity. Call after [`Track::predict`].
    pub fn correct(&mut self, measurement: [f32; 2], dt: f32, alpha: f32, beta: f32) {
        let rx = measurement[0] - self.x;
        let ry = measurement[1] - self.y;
        self.x += alpha * rx;
        self.y += alpha * ry;
        if dt > f32::EPSILON {
            self.vx += beta * rx / dt;
            self.vy += beta * ry / dt;
        }
    }

    /// Whether this track participates in counting and association gating
    /// as an established object.
    pub fn is_established(&self) -> bool {
        matches!(self.state, TrackState::Confirmed | TrackState::Coasting)
    }

    /// Distance from the sensor, meters.
    pub fn range(&self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }
}
