use crate::projection::{project, Pixel};
use crate::zoom::ZoomPolicy;
use serde::{Deserialize, Serialize};

/// A map pin.
///
/// Identity is `id`. The `payload` is carried through clustering untouched and handed back
/// inside the cluster members.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Point<T = ()> {
    /// Pin identifier
    pub id: String,

    /// Latitude in degrees
    pub lat: f64,

    /// Longitude in degrees
    pub lng: f64,

    /// Caller data attached to the pin
    pub payload: T,
}

impl Point {
    /// Create a pin without payload.
    pub fn new(id: impl Into<String>, lat: f64, lng: f64) -> Self {
        Point::with_payload(id, lat, lng, ())
    }
}

impl<T> Point<T> {
    /// Create a pin carrying `payload`.
    pub fn with_payload(id: impl Into<String>, lat: f64, lng: f64, payload: T) -> Self {
        Point {
            id: id.into(),
            lat,
            lng,
            payload,
        }
    }

    /// Whether the coordinates can be projected: both finite and latitude within [-90, 90].
    pub fn has_valid_coordinates(&self) -> bool {
        self.lat.is_finite() && self.lng.is_finite() && (-90.0..=90.0).contains(&self.lat)
    }
}

/// A group of pins rendered as one marker.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Cluster<T = ()> {
    /// Identifier of the seed pin the cluster grew from
    pub id: String,

    /// Latitude of the marker
    pub lat: f64,

    /// Longitude of the marker
    pub lng: f64,

    /// Number of pins in the cluster
    pub point_count: usize,

    /// Member pins in input order, seed first
    pub members: Vec<Point<T>>,

    /// Indicates whether more than one pin was merged
    pub is_cluster: bool,
}

impl<T> Cluster<T> {
    /// Build a cluster from a non-empty group whose first member is the seed.
    ///
    /// A single member keeps its exact coordinates, larger groups sit at the arithmetic mean
    /// of the member latitudes and longitudes.
    fn from_group(members: Vec<Point<T>>) -> Self {
        let point_count = members.len();
        let id = members[0].id.clone();

        let (lat, lng) = if point_count == 1 {
            (members[0].lat, members[0].lng)
        } else {
            let (sum_lat, sum_lng) = members
                .iter()
                .fold((0.0, 0.0), |(lat, lng), p| (lat + p.lat, lng + p.lng));

            (sum_lat / point_count as f64, sum_lng / point_count as f64)
        };

        Cluster {
            id,
            lat,
            lng,
            point_count,
            members,
            is_cluster: point_count > 1,
        }
    }
}

/// Errors raised for clustering parameters that cannot produce a radius or a projection.
#[derive(thiserror::Error, Clone, Debug, PartialEq)]
pub enum ClusterError {
    /// The zoom level is NaN or infinite.
    #[error("zoom level must be finite, got {0}")]
    InvalidZoom(f64),

    /// The base radius is NaN, infinite or negative.
    #[error("base radius must be finite and non-negative, got {0}")]
    InvalidBaseRadius(f64),
}

/// Result of one clustering pass.
#[derive(Clone, Debug, PartialEq)]
pub struct Clustering<T = ()> {
    /// Clusters in seed order
    pub clusters: Vec<Cluster<T>>,

    /// Input points dropped because their coordinates cannot be projected
    pub rejected: Vec<Point<T>>,

    /// Zoom the pass ran at
    pub zoom: f64,

    /// Radius in pixels the pass used
    pub radius: f64,
}

impl<T> Clustering<T> {
    /// Number of points across all clusters.
    pub fn point_count(&self) -> usize {
        self.clusters.iter().map(|c| c.point_count).sum()
    }
}

/// Greedy seed-anchored clustering over projected pixel distance.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ClusterEngine {
    policy: ZoomPolicy,
}

impl ClusterEngine {
    /// Create an engine using the given base radius for its zoom policy.
    ///
    /// # Arguments
    ///
    /// - `base_radius`: Radius in pixels at the widest zoom tier.
    ///
    /// # Returns
    ///
    /// The engine, or [`ClusterError::InvalidBaseRadius`] if the radius is negative or not finite.
    pub fn new(base_radius: f64) -> Result<Self, ClusterError> {
        if !base_radius.is_finite() || base_radius < 0.0 {
            return Err(ClusterError::InvalidBaseRadius(base_radius));
        }

        Ok(ClusterEngine {
            policy: ZoomPolicy::new(base_radius),
        })
    }

    /// The zoom policy mapping zoom levels to radii.
    pub fn policy(&self) -> &ZoomPolicy {
        &self.policy
    }

    /// Partition `points` into clusters for the given zoom.
    ///
    /// Points are visited in input order. Each unprocessed point becomes a seed and absorbs
    /// every later unprocessed point whose pixel distance to the seed is strictly below the
    /// zoom radius. Distance is measured to the seed only, so a chain of points each close to
    /// its neighbour does not merge transitively.
    ///
    /// Points that cannot be projected are dropped and returned in [`Clustering::rejected`].
    ///
    /// # Arguments
    ///
    /// - `points`: Pins in caller order.
    /// - `zoom`: Current map zoom level.
    ///
    /// # Returns
    ///
    /// The clustering, or [`ClusterError::InvalidZoom`] if the zoom is not finite.
    pub fn cluster<T>(
        &self,
        points: Vec<Point<T>>,
        zoom: f64,
    ) -> Result<Clustering<T>, ClusterError> {
        if !zoom.is_finite() {
            return Err(ClusterError::InvalidZoom(zoom));
        }

        let radius = self.policy.radius(zoom);
        let (valid, rejected): (Vec<_>, Vec<_>) =
            points.into_iter().partition(|p| p.has_valid_coordinates());

        if !rejected.is_empty() {
            log::warn!(
                "dropped {} point(s) with invalid coordinates before clustering",
                rejected.len()
            );
        }

        let groups = group_by_seed(&valid, zoom, radius);
        let mut slots: Vec<Option<Point<T>>> = valid.into_iter().map(Some).collect();

        let clusters: Vec<Cluster<T>> = groups
            .into_iter()
            .map(|group| {
                let members = group
                    .into_iter()
                    .filter_map(|i| slots[i].take())
                    .collect::<Vec<_>>();

                Cluster::from_group(members)
            })
            .collect();

        log::debug!(
            "clustered {} point(s) into {} marker(s) at zoom {} (radius {}px)",
            slots.len(),
            clusters.len(),
            zoom,
            radius
        );

        Ok(Clustering {
            clusters,
            rejected,
            zoom,
            radius,
        })
    }

    /// Cluster borrowed `points`, leaving their payloads with the caller.
    ///
    /// The grouping is the same as [`ClusterEngine::cluster`]. Each member and rejected point
    /// carries its index into `points` as payload.
    ///
    /// # Arguments
    ///
    /// - `points`: Pins in caller order.
    /// - `zoom`: Current map zoom level.
    ///
    /// # Returns
    ///
    /// The clustering, or [`ClusterError::InvalidZoom`] if the zoom is not finite.
    pub fn cluster_indexed<T>(
        &self,
        points: &[Point<T>],
        zoom: f64,
    ) -> Result<Clustering<usize>, ClusterError> {
        let indexed = points
            .iter()
            .enumerate()
            .map(|(i, p)| Point::with_payload(p.id.clone(), p.lat, p.lng, i))
            .collect();

        self.cluster(indexed, zoom)
    }
}

/// Cluster `points` at `zoom` with a one-off engine.
///
/// See [`ClusterEngine::cluster`].
pub fn cluster<T>(
    points: Vec<Point<T>>,
    zoom: f64,
    base_radius: f64,
) -> Result<Clustering<T>, ClusterError> {
    ClusterEngine::new(base_radius)?.cluster(points, zoom)
}

/// Group point indices around seeds, every index appearing exactly once.
///
/// # Arguments
///
/// - `points`: Points with projectable coordinates.
/// - `zoom`: The zoom level used for projection.
/// - `radius`: Strict upper bound on the pixel distance to the seed.
///
/// # Returns
///
/// Groups of indices into `points`, each starting with its seed and otherwise in input order.
fn group_by_seed<T>(points: &[Point<T>], zoom: f64, radius: f64) -> Vec<Vec<usize>> {
    let pixels: Vec<Pixel> = points.iter().map(|p| project(p.lat, p.lng, zoom)).collect();
    let mut processed = vec![false; points.len()];
    let mut groups = Vec::new();

    for seed in 0..points.len() {
        if processed[seed] {
            continue;
        }

        processed[seed] = true;
        let mut group = vec![seed];

        // Nothing is strictly closer than a zero radius
        if radius > 0.0 {
            for other in (seed + 1)..points.len() {
                if !processed[other] && pixels[seed].distance(&pixels[other]) < radius {
                    processed[other] = true;
                    group.push(other);
                }
            }
        }

        groups.push(group);
    }

    groups
}
