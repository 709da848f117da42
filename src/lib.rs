#![forbid(unsafe_code)]

//! Zoom-aware clustering of map pins and reconciliation of the rendered marker layer.
//!
//! [`ClusterEngine`] groups pins that fall within a zoom-dependent pixel radius of a seed pin.
//! [`MarkerReconciler`] turns successive clusterings into `add_marker` / `remove_marker` calls
//! on a [`MarkerSink`], and [`MapController`] ties both to the lifetime of one map.

mod cluster;
mod controller;
mod interchange;
mod marker;
mod projection;
mod reconcile;
mod zoom;

use serde::{Deserialize, Serialize};

pub use cluster::{cluster, Cluster, ClusterEngine, ClusterError, Clustering, Point};
pub use controller::{MapController, MapError, MapReadyError};
pub use interchange::{clusters_to_geojson, points_from_geojson, GeoJsonError, ImportedPoints};
pub use marker::{
    abbreviate_count, LatLng, MarkerCommand, MarkerIdScheme, MarkerSink, MarkerVisual,
    MemorySink, PrefixedIds,
};
pub use projection::{pixel_distance, project, world_size, Pixel, TILE_SIZE};
pub use reconcile::{AddPolicy, MarkerReconciler, ReconcileError, ReconcileReport};
pub use zoom::{ZoomPolicy, DEFAULT_BASE_RADIUS};

/// Clustering and reconciliation options
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Cluster radius in pixels at the widest zoom tier
    pub base_radius: f64,

    /// Whether unchanged markers are sent to the sink again on every pass
    pub add_policy: AddPolicy,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            base_radius: DEFAULT_BASE_RADIUS,
            add_policy: AddPolicy::Always,
        }
    }
}

impl Options {
    /// Parse options from JSON, missing fields taking their defaults.
    pub fn from_json(input: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(input)
    }
}
