//! Density-link clustering of detection points.
//!
//! Two points are linked when their planar distance is below `d_max` and
//! their radial-velocity difference is below `v_max`; a cluster is a
//! maximal connected component of the link graph with at least
//! `min_points` members. Fixed-radius linking is robust to the irregular
//! point density of radar returns and separates objects moving at
//! different speeds even when they overlap spatially. Components below
//! `min_points` are returned as noise and never retained across frames.

use serde::{Deserialize, Serialize};

use crate::points::DetectionPoint;

/// Clustering thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Maximum planar distance between linked points, meters.
    pub d_max: f32,
    /// Maximum radial-velocity difference between linked points, m/s.
    pub v_max: f32,
    /// Minimum component size; smaller components are noise.
    pub min_points: usize,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        // Tuned for a person-sized return blob at indoor ranges.
        Self {
            d_max: 0.6,
            v_max: 0.5,
            min_points: 3,
        }
    }
}

/// A group of detection points believed to be one physical object.
///
/// Holds indices into the frame's point list, never the points themselves;
/// the data is absorbed into track state and the cluster is discarded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cluster {
    /// Member indices into the input point slice, ascending.
    pub members: Vec<usize>,
    /// Mean position of the members, meters.
    pub centroid: [f32; 2],
    /// Mean radial velocity of the members, m/s.
    pub mean_velocity: f32,
}

/// Partition of one frame's points into clusters and residual noise.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Clustering {
    /// Ordered by lowest member index, independent of input order.
    pub clusters: Vec<Cluster>,
    /// Indices of points in no cluster, ascending.
    pub noise: Vec<usize>,
}

fn linked(a: &DetectionPoint, b: &DetectionPoint, config: &ClusterConfig) -> bool {
    let dx = a.x - b.x;
    let dy = a.y - b.y;
    let dv = a.velocity - b.velocity;
    (dx * dx + dy * dy) < config.d_max * config.d_max && dv.abs() < config.v_max
}

/// Cluster one frame's detection points.
///
/// Assignment is by connectivity, not distance-to-centroid, so the
/// partition is fully determined by the link graph and the input order
/// cannot change it.
pub fn cluster_points(points: &[DetectionPoint], config: &ClusterConfig) -> Clustering {
    let mut out = Clustering::default();
    let mut assigned = vec![false; points.len()];

    for seed in 0..points.len() {
        if assigned[seed] {
            continue;
        }

        // Flood the connected component around the seed.
        let mut members = vec![seed];
        assigned[seed] = true;
        let mut cursor = 0;
        while cursor < members.len() {
            let current = members[cursor];
            cursor += 1;
            for other in 0..points.len() {
                if !assigned[other] && linked(&points[current], &points[other], config) {
                    assigned[other] = true;
                    members.push(other);
                }
            }
        }

        if members.len() < config.min_points {
            out.noise.extend(members);
            continue;
        }

        members.sort_unstable();
        let n = members.len() as f32;
        let (mut cx, mut cy, mut cv) = (0.0f32, 0.0f32, 0.0f32);
        for &idx in &members {
            cx += points[idx].x;
            cy += points[idx].y;
            cv += points[idx].velocity;
        }
        out.clusters.push(Cluster {
            members,
            centroid: [cx / n, cy / n],
            mean_velocity: cv / n,
        });
    }

    out.noise.sort_unstable();
    out.clusters.sort_by_key(|c| c.members[0]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn point(x: f32, y: f32, velocity: f32) -> DetectionPoint {
        DetectionPoint {
            x,
            y,
            velocity,
            snr_db: 10.0,
            noise_db: None,
        }
    }

    fn config() -> ClusterConfig {
        ClusterConfig {
            d_max: 0.5,
            v_max: 0.3,
            min_points: 2,
        }
    }

    #[test]
    fn close_points_share_a_cluster() {
        let points = vec![point(0.0, 1.0, 0.5), point(0.2, 1.1, 0.55)];
        let out = cluster_points(&points, &config());
        assert_eq!(out.clusters.len(), 1);
        assert_eq!(out.clusters[0].members, vec![0, 1]);
        assert!(out.noise.is_empty());
    }

    #[test]
    fn distant_or_fast_diverging_points_never_merge() {
        // Spatially apart.
        let spatial = vec![
            point(0.0, 1.0, 0.0),
            point(0.0, 1.1, 0.0),
            point(3.0, 1.0, 0.0),
            point(3.0, 1.1, 0.0),
        ];
        let out = cluster_points(&spatial, &config());
        assert_eq!(out.clusters.len(), 2);

        // Overlapping in space, separated in velocity.
        let doppler = vec![
            point(0.0, 1.0, 0.0),
            point(0.1, 1.0, 0.05),
            point(0.0, 1.05, 1.5),
            point(0.1, 1.05, 1.55),
        ];
        let out = cluster_points(&doppler, &config());
        assert_eq!(out.clusters.len(), 2);
    }

    #[test]
    fn chained_links_form_one_component() {
        // a-b and b-c linked, a-c not directly; connectivity joins all.
        let points = vec![
            point(0.0, 1.0, 0.0),
            point(0.4, 1.0, 0.0),
            point(0.8, 1.0, 0.0),
        ];
        let out = cluster_points(&points, &config());
        assert_eq!(out.clusters.len(), 1);
        assert_eq!(out.clusters[0].members, vec![0, 1, 2]);
    }

    #[test]
    fn partition_is_order_independent() {
        let forward = vec![
            point(0.0, 1.0, 0.0),
            point(0.2, 1.0, 0.0),
            point(2.0, 2.0, 0.8),
            point(2.2, 2.0, 0.9),
            point(5.0, 5.0, 0.0), // lone noise point
        ];
        let mut reversed = forward.clone();
        reversed.reverse();

        let a = cluster_points(&forward, &config());
        let b = cluster_points(&reversed, &config());

        assert_eq!(a.clusters.len(), b.clusters.len());
        assert_eq!(a.noise.len(), b.noise.len());
        for (ca, cb) in a.clusters.iter().zip(b.clusters.iter().rev()) {
            assert_relative_eq!(ca.centroid[0], cb.centroid[0], epsilon = 1e-6);
            assert_relative_eq!(ca.centroid[1], cb.centroid[1], epsilon = 1e-6);
            assert_eq!(ca.members.len(), cb.members.len());
        }
    }

    #[test]
    fn undersized_components_are_noise() {
        let cfg = ClusterConfig {
            min_points: 3,
            ..config()
        };
        let points = vec![point(0.0, 1.0, 0.0), point(0.1, 1.0, 0.0)];
        let out = cluster_points(&points, &cfg);
        assert!(out.clusters.is_empty());
        assert_eq!(out.noise, vec![0, 1]);
    }

    #[test]
    fn centroid_and_velocity_are_member_means() {
        let points = vec![
            point(1.0, 2.0, 0.4),
            point(2.0, 3.0, 0.6),
            point(1.5, 2.5, 0.5),
        ];
        let cfg = ClusterConfig {
            d_max: 2.0,
            v_max: 1.0,
            min_points: 2,
        };
        let out = cluster_points(&points, &cfg);
        assert_eq!(out.clusters.len(), 1);
        let c = &out.clusters[0];
        assert_relative_eq!(c.centroid[0], 1.5, epsilon = 1e-6);
        assert_relative_eq!(c.centroid[1], 2.5, epsilon = 1e-6);
        assert_relative_eq!(c.mean_velocity, 0.5, epsilon = 1e-6);
    }

    #[test]
    fn empty_input_yields_empty_partition() {
        let out = cluster_points(&[], &ClusterConfig::default());
        assert!(out.clusters.is_empty());
        assert!(out.noise.is_empty());
    }
}
