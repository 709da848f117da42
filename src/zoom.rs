/// Default clustering radius in pixels at the widest zoom tier.
pub const DEFAULT_BASE_RADIUS: f64 = 50.0;

/// Zoom level from which clustering is disabled.
pub const NO_CLUSTERING_ZOOM: f64 = 10.0;

/// Zoom level from which only near-coincident points merge.
pub const NEAR_COINCIDENT_ZOOM: f64 = 8.0;

/// Zoom level from which the base radius is halved.
pub const HALF_RADIUS_ZOOM: f64 = 5.0;

/// Fixed radius of the near-coincident tier, independent of the base radius.
pub const NEAR_COINCIDENT_RADIUS: f64 = 15.0;

/// Maps a zoom level to a clustering radius using fixed tiers.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ZoomPolicy {
    /// Radius in pixels used below the half-radius tier
    pub base_radius: f64,
}

impl Default for ZoomPolicy {
    fn default() -> Self {
        ZoomPolicy {
            base_radius: DEFAULT_BASE_RADIUS,
        }
    }
}

impl ZoomPolicy {
    /// A policy whose two widest tiers derive from `base_radius`.
    pub fn new(base_radius: f64) -> Self {
        ZoomPolicy { base_radius }
    }

    /// Clustering radius in pixels for the given zoom.
    ///
    /// | zoom          | radius            |
    /// |---------------|-------------------|
    /// | `>= 10`       | `0`               |
    /// | `[8, 10)`     | `15`              |
    /// | `[5, 8)`      | `base_radius / 2` |
    /// | `< 5`         | `base_radius`     |
    pub fn radius(&self, zoom: f64) -> f64 {
        if zoom >= NO_CLUSTERING_ZOOM {
            0.0
        } else if zoom >= NEAR_COINCIDENT_ZOOM {
            NEAR_COINCIDENT_RADIUS
        } else if zoom >= HALF_RADIUS_ZOOM {
            self.base_radius * 0.5
        } else {
            self.base_radius
        }
    }
}
