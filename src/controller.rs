use crate::cluster::{Cluster, ClusterEngine, ClusterError, Clustering, Point};
use crate::marker::{MarkerIdScheme, MarkerSink, PrefixedIds};
use crate::reconcile::{MarkerReconciler, ReconcileError, ReconcileReport};
use crate::Options;
use std::fmt;

/// Errors that can occur during a [`MapController`] pass.
#[derive(thiserror::Error, Debug)]
pub enum MapError<E: std::error::Error + 'static> {
    #[error(transparent)]
    Cluster(#[from] ClusterError),

    #[error(transparent)]
    Reconcile(#[from] ReconcileError<E>),
}

/// Errors returned when attaching a [`MapController`] to a ready map.
#[derive(thiserror::Error)]
pub enum MapReadyError<C, E: std::error::Error + 'static> {
    /// The options or the zoom are unusable. Nothing was sent to the sink.
    #[error(transparent)]
    Config(#[from] ClusterError),

    /// The first render stopped partway. The controller still tracks every marker the sink
    /// accepted, so a later pass or [`MapController::clear`] settles the layer.
    #[error("initial render failed")]
    Render {
        controller: Box<C>,
        #[source]
        source: ReconcileError<E>,
    },
}

impl<C, E: std::error::Error + 'static> MapReadyError<C, E> {
    /// The controller handed back by a failed initial render.
    pub fn into_controller(self) -> Option<C> {
        match self {
            MapReadyError::Config(_) => None,
            MapReadyError::Render { controller, .. } => Some(*controller),
        }
    }
}

impl<C, E: std::error::Error + 'static> fmt::Debug for MapReadyError<C, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapReadyError::Config(err) => f.debug_tuple("Config").field(err).finish(),
            MapReadyError::Render { source, .. } => f
                .debug_struct("Render")
                .field("source", source)
                .finish_non_exhaustive(),
        }
    }
}

/// Clusters and renders the pins of one map, from map-ready until unmount.
///
/// The controller owns the marker sink, the current pins and zoom, and the reconciler that
/// remembers which markers are on the layer. Changing the pins or the zoom re-clusters and
/// reconciles within the same call.
pub struct MapController<T, S, I = PrefixedIds> {
    engine: ClusterEngine,
    reconciler: MarkerReconciler<I>,
    sink: S,
    zoom: f64,
    points: Vec<Point<T>>,
    points_loaded: bool,
    clustering: Option<Clustering<usize>>,
}

impl<T, S: MarkerSink> MapController<T, S> {
    /// Attach to a map that just became ready.
    ///
    /// # Arguments
    ///
    /// - `sink`: The map's marker layer.
    /// - `options`: Clustering and reconciliation options.
    /// - `zoom`: The map's current zoom.
    /// - `initial_points`: Pins known before the map was ready, rendered immediately.
    ///
    /// # Returns
    ///
    /// The controller. If the initial render fails the controller comes back inside
    /// [`MapReadyError::Render`].
    pub fn on_map_ready(
        sink: S,
        options: &Options,
        zoom: f64,
        initial_points: Option<Vec<Point<T>>>,
    ) -> Result<Self, MapReadyError<Self, S::Error>> {
        let reconciler = MarkerReconciler::new(options.add_policy);

        MapController::with_reconciler(sink, options, reconciler, zoom, initial_points)
    }
}

impl<T, S: MarkerSink, I: MarkerIdScheme> MapController<T, S, I> {
    /// Like [`MapController::on_map_ready`] but with a caller-built reconciler.
    pub fn with_reconciler(
        sink: S,
        options: &Options,
        reconciler: MarkerReconciler<I>,
        zoom: f64,
        initial_points: Option<Vec<Point<T>>>,
    ) -> Result<Self, MapReadyError<Self, S::Error>> {
        if !zoom.is_finite() {
            return Err(ClusterError::InvalidZoom(zoom).into());
        }

        let mut controller = MapController {
            engine: ClusterEngine::new(options.base_radius)?,
            reconciler,
            sink,
            zoom,
            points: Vec::new(),
            points_loaded: false,
            clustering: None,
        };

        if let Some(points) = initial_points {
            if let Err(err) = controller.set_points(points) {
                return Err(match err {
                    MapError::Cluster(err) => MapReadyError::Config(err),
                    MapError::Reconcile(source) => {
                        log::warn!(
                            "initial render failed with {} marker(s) on the layer: {source}",
                            controller.reconciler.len()
                        );

                        MapReadyError::Render {
                            controller: Box::new(controller),
                            source,
                        }
                    }
                });
            }
        }

        Ok(controller)
    }

    /// Replace the pins and re-render.
    pub fn set_points(
        &mut self,
        points: Vec<Point<T>>,
    ) -> Result<ReconcileReport, MapError<S::Error>> {
        self.points = points;
        self.points_loaded = true;

        self.refresh()
    }

    /// Move to another zoom level and re-render if pins have been loaded.
    pub fn set_zoom(&mut self, zoom: f64) -> Result<ReconcileReport, MapError<S::Error>> {
        if !zoom.is_finite() {
            return Err(ClusterError::InvalidZoom(zoom).into());
        }

        self.zoom = zoom;

        if !self.points_loaded {
            return Ok(ReconcileReport::default());
        }

        self.refresh()
    }

    /// Re-cluster the current pins at the current zoom and reconcile the layer.
    pub fn refresh(&mut self) -> Result<ReconcileReport, MapError<S::Error>> {
        self.clustering = None;

        let clustering = self.engine.cluster_indexed(&self.points, self.zoom)?;
        let clustering = self.clustering.insert(clustering);

        Ok(self
            .reconciler
            .reconcile(&clustering.clusters, &mut self.sink)?)
    }

    /// Remove every marker from the layer, keeping the pins.
    pub fn clear(&mut self) -> Result<usize, MapError<S::Error>> {
        self.clustering = None;

        Ok(self.reconciler.clear(&mut self.sink)?)
    }

    /// Detach from an unmounting map, handing the sink back.
    pub fn unmount(self) -> S {
        log::debug!(
            "unmounting map controller with {} rendered marker(s)",
            self.reconciler.len()
        );

        self.sink
    }

    /// Current zoom level.
    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    /// Whether a point list has been supplied, even an empty one.
    pub fn points_loaded(&self) -> bool {
        self.points_loaded
    }

    /// Pins of the latest point list, in caller order.
    pub fn points(&self) -> &[Point<T>] {
        &self.points
    }

    /// Clusters of the latest pass.
    ///
    /// Member payloads are indices into [`MapController::points`]; use
    /// [`MapController::members`] to get the pins themselves.
    pub fn clusters(&self) -> &[Cluster<usize>] {
        self.clustering
            .as_ref()
            .map(|clustering| clustering.clusters.as_slice())
            .unwrap_or_default()
    }

    /// The pins behind one of [`MapController::clusters`], seed first.
    pub fn members<'a>(
        &'a self,
        cluster: &'a Cluster<usize>,
    ) -> impl Iterator<Item = &'a Point<T>> + 'a {
        cluster
            .members
            .iter()
            .filter_map(|member| self.points.get(member.payload))
    }

    /// Pins dropped by the latest pass because of invalid coordinates.
    pub fn rejected(&self) -> impl Iterator<Item = &Point<T>> + '_ {
        self.clustering
            .iter()
            .flat_map(|clustering| &clustering.rejected)
            .filter_map(|point| self.points.get(point.payload))
    }

    /// The reconciler tracking the rendered markers.
    pub fn reconciler(&self) -> &MarkerReconciler<I> {
        &self.reconciler
    }

    /// The marker layer.
    pub fn sink(&self) -> &S {
        &self.sink
    }
}
