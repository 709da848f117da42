use crate::cluster::Cluster;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::convert::Infallible;

/// Geographic position of a marker.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    /// Create a position from degrees.
    pub fn new(lat: f64, lng: f64) -> Self {
        LatLng { lat, lng }
    }
}

/// What a marker should look like, handed to the sink alongside its position.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerVisual {
    /// Indicates whether the marker stands for several pins
    pub is_cluster: bool,

    /// Number of pins behind the marker
    pub point_count: usize,

    /// Abbreviated point count for clusters, the pin id otherwise
    pub label: String,
}

impl MarkerVisual {
    /// Describe how `cluster` should be drawn.
    ///
    /// # Arguments
    ///
    /// - `cluster`: The cluster the marker stands for.
    ///
    /// # Returns
    ///
    /// A visual labelled with the abbreviated point count for clusters, or with the pin id
    /// for single pins.
    pub fn for_cluster<T>(cluster: &Cluster<T>) -> Self {
        let label = if cluster.is_cluster {
            abbreviate_count(cluster.point_count)
        } else {
            cluster.id.clone()
        };

        MarkerVisual {
            is_cluster: cluster.is_cluster,
            point_count: cluster.point_count,
            label,
        }
    }
}

/// Abbreviate a point count for display.
///
/// # Arguments
///
/// - `count`: The number of points.
///
/// # Returns
///
/// `"999"` below a thousand, one decimal of thousands up to ten thousand (`"1.2k"`), whole
/// thousands above (`"12k"`).
pub fn abbreviate_count(count: usize) -> String {
    let count = count as f64;

    if count >= 10000.0 {
        format!("{}k", (count / 1000.0).round())
    } else if count >= 1000.0 {
        format!("{}k", (count / 100.0).round() / 10.0)
    } else {
        count.to_string()
    }
}

/// The map layer markers are rendered into.
///
/// Calls are synchronous. Adding a marker under an id that is already shown replaces it.
pub trait MarkerSink {
    /// Failure reported by the sink.
    type Error: std::error::Error + 'static;

    /// Show (or replace) the marker `id` at `position`.
    fn add_marker(
        &mut self,
        id: &str,
        position: LatLng,
        visual: &MarkerVisual,
    ) -> Result<(), Self::Error>;

    /// Take the marker `id` off the map.
    fn remove_marker(&mut self, id: &str) -> Result<(), Self::Error>;
}

impl<S: MarkerSink + ?Sized> MarkerSink for &mut S {
    type Error = S::Error;

    #[inline]
    fn add_marker(
        &mut self,
        id: &str,
        position: LatLng,
        visual: &MarkerVisual,
    ) -> Result<(), Self::Error> {
        (**self).add_marker(id, position, visual)
    }

    #[inline]
    fn remove_marker(&mut self, id: &str) -> Result<(), Self::Error> {
        (**self).remove_marker(id)
    }
}

/// A command received by a [`MemorySink`].
#[derive(Clone, Debug, PartialEq)]
pub enum MarkerCommand {
    Add {
        id: String,
        position: LatLng,
        visual: MarkerVisual,
    },
    Remove {
        id: String,
    },
}

/// Keeps markers in memory and records every command it receives.
///
/// Useful for tests and for hosts that apply the markers in a later frame.
#[derive(Clone, Debug, Default)]
pub struct MemorySink {
    markers: BTreeMap<String, (LatLng, MarkerVisual)>,
    commands: Vec<MarkerCommand>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Markers currently on the layer.
    pub fn markers(&self) -> &BTreeMap<String, (LatLng, MarkerVisual)> {
        &self.markers
    }

    /// Every command received so far, oldest first.
    pub fn commands(&self) -> &[MarkerCommand] {
        &self.commands
    }

    /// Consumes and returns the recorded commands.
    pub fn take_commands(&mut self) -> Vec<MarkerCommand> {
        std::mem::take(&mut self.commands)
    }
}

impl MarkerSink for MemorySink {
    type Error = Infallible;

    fn add_marker(
        &mut self,
        id: &str,
        position: LatLng,
        visual: &MarkerVisual,
    ) -> Result<(), Self::Error> {
        self.markers.insert(id.to_string(), (position, visual.clone()));
        self.commands.push(MarkerCommand::Add {
            id: id.to_string(),
            position,
            visual: visual.clone(),
        });

        Ok(())
    }

    fn remove_marker(&mut self, id: &str) -> Result<(), Self::Error> {
        self.markers.remove(id);
        self.commands.push(MarkerCommand::Remove { id: id.to_string() });

        Ok(())
    }
}

/// Derives the marker id a cluster is rendered under.
pub trait MarkerIdScheme {
    fn marker_id<T>(&self, cluster: &Cluster<T>) -> String;
}

/// `"cluster-<seed id>"` for clusters, `"pin-<point id>"` for single pins.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrefixedIds {
    /// Prefix for multi-pin markers
    pub cluster_prefix: String,

    /// Prefix for single-pin markers
    pub pin_prefix: String,
}

impl Default for PrefixedIds {
    fn default() -> Self {
        PrefixedIds {
            cluster_prefix: "cluster-".to_string(),
            pin_prefix: "pin-".to_string(),
        }
    }
}

impl MarkerIdScheme for PrefixedIds {
    fn marker_id<T>(&self, cluster: &Cluster<T>) -> String {
        let prefix = if cluster.is_cluster {
            &self.cluster_prefix
        } else {
            &self.pin_prefix
        };

        format!("{prefix}{}", cluster.id)
    }
}
