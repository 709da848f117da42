use crate::cluster::Cluster;
use crate::marker::{LatLng, MarkerIdScheme, MarkerSink, MarkerVisual, PrefixedIds};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// When a marker that is already rendered gets sent to the sink again.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddPolicy {
    /// Re-add every marker on every pass, relying on the sink to replace by id.
    #[default]
    Always,

    /// Skip markers whose id, position and visual match what was last sent.
    SkipUnchanged,
}

/// Errors that can occur while applying a pass to a [`MarkerSink`].
///
/// The reconciler only records sink calls that succeeded, so after an error its rendered set
/// matches what the sink accepted and the next pass picks up from there.
#[derive(thiserror::Error, Debug)]
pub enum ReconcileError<E: std::error::Error + 'static> {
    /// The sink refused to remove a stale marker.
    #[error("failed to remove marker {id:?}")]
    Remove {
        id: String,
        #[source]
        source: E,
    },

    /// The sink refused to add a marker.
    #[error("failed to add marker {id:?}")]
    Add {
        id: String,
        #[source]
        source: E,
    },
}

/// Counts of the sink calls made by one pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Markers sent with `add_marker`
    pub added: usize,

    /// Markers left alone under [`AddPolicy::SkipUnchanged`]
    pub skipped: usize,

    /// Stale markers sent with `remove_marker`
    pub removed: usize,
}

#[derive(Clone, Debug, PartialEq)]
struct RenderedMarker {
    position: LatLng,
    visual: MarkerVisual,
}

/// Keeps a marker layer in sync with successive clusterings.
///
/// Owns the set of marker ids currently on the layer. Each pass removes the ids that no
/// longer correspond to a cluster and adds the ones that do.
#[derive(Clone, Debug)]
pub struct MarkerReconciler<I = PrefixedIds> {
    ids: I,
    policy: AddPolicy,
    rendered: BTreeMap<String, RenderedMarker>,
}

impl Default for MarkerReconciler {
    fn default() -> Self {
        MarkerReconciler::new(AddPolicy::default())
    }
}

impl MarkerReconciler {
    /// A reconciler with nothing rendered, using [`PrefixedIds`].
    pub fn new(policy: AddPolicy) -> Self {
        MarkerReconciler::with_ids(PrefixedIds::default(), policy)
    }
}

impl<I: MarkerIdScheme> MarkerReconciler<I> {
    /// A reconciler with nothing rendered, deriving marker ids with `ids`.
    pub fn with_ids(ids: I, policy: AddPolicy) -> Self {
        MarkerReconciler {
            ids,
            policy,
            rendered: BTreeMap::new(),
        }
    }

    /// When markers get re-sent to the sink.
    pub fn policy(&self) -> AddPolicy {
        self.policy
    }

    /// Ids currently on the layer, sorted.
    pub fn rendered_ids(&self) -> impl Iterator<Item = &str> {
        self.rendered.keys().map(String::as_str)
    }

    /// Whether the marker `id` is on the layer.
    pub fn is_rendered(&self, id: &str) -> bool {
        self.rendered.contains_key(id)
    }

    /// Number of markers on the layer.
    pub fn len(&self) -> usize {
        self.rendered.len()
    }

    /// Whether the layer holds no markers.
    pub fn is_empty(&self) -> bool {
        self.rendered.is_empty()
    }

    /// Bring the sink in line with `clusters`.
    ///
    /// Stale markers are removed first, in id order, then every cluster is added in the order
    /// given. When two clusters map to the same marker id only the first is rendered.
    ///
    /// # Arguments
    ///
    /// - `clusters`: The clustering to render.
    /// - `sink`: The marker layer.
    ///
    /// # Returns
    ///
    /// The sink calls made, or the first sink failure. On failure the rendered set keeps
    /// every call that succeeded before it.
    pub fn reconcile<T, S: MarkerSink>(
        &mut self,
        clusters: &[Cluster<T>],
        sink: &mut S,
    ) -> Result<ReconcileReport, ReconcileError<S::Error>> {
        let mut report = ReconcileReport::default();
        let mut next_ids = HashSet::with_capacity(clusters.len());
        let mut next = Vec::with_capacity(clusters.len());

        for cluster in clusters {
            let id = self.ids.marker_id(cluster);

            if !next_ids.insert(id.clone()) {
                log::warn!("marker id {id:?} derived twice in one pass, keeping the first");
                continue;
            }

            next.push((
                id,
                RenderedMarker {
                    position: LatLng::new(cluster.lat, cluster.lng),
                    visual: MarkerVisual::for_cluster(cluster),
                },
            ));
        }

        let stale: Vec<String> = self
            .rendered
            .keys()
            .filter(|id| !next_ids.contains(*id))
            .cloned()
            .collect();

        for id in stale {
            log::trace!("removing marker {id:?}");

            if let Err(source) = sink.remove_marker(&id) {
                return Err(ReconcileError::Remove { id, source });
            }

            self.rendered.remove(&id);
            report.removed += 1;
        }

        for (id, marker) in next {
            if self.policy == AddPolicy::SkipUnchanged && self.rendered.get(&id) == Some(&marker)
            {
                report.skipped += 1;
                continue;
            }

            log::trace!("adding marker {id:?}");

            if let Err(source) = sink.add_marker(&id, marker.position, &marker.visual) {
                return Err(ReconcileError::Add { id, source });
            }

            self.rendered.insert(id, marker);
            report.added += 1;
        }

        log::debug!(
            "reconciled {} marker(s): {} added, {} skipped, {} removed",
            self.rendered.len(),
            report.added,
            report.skipped,
            report.removed
        );

        Ok(report)
    }

    /// Remove every rendered marker from the sink.
    pub fn clear<S: MarkerSink>(
        &mut self,
        sink: &mut S,
    ) -> Result<usize, ReconcileError<S::Error>> {
        self.reconcile::<(), S>(&[], sink)
            .map(|report| report.removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::{cluster, Point};
    use crate::marker::{MarkerCommand, MemorySink};

    #[derive(thiserror::Error, Debug)]
    #[error("marker layer unavailable")]
    struct LayerUnavailable;

    /// Delegates to a [`MemorySink`] until a given call number fails.
    #[derive(Default)]
    struct FlakySink {
        inner: MemorySink,
        calls: usize,
        fail_on: Option<usize>,
    }

    impl FlakySink {
        fn tick(&mut self) -> Result<(), LayerUnavailable> {
            self.calls += 1;

            if self.fail_on == Some(self.calls) {
                Err(LayerUnavailable)
            } else {
                Ok(())
            }
        }
    }

    impl MarkerSink for FlakySink {
        type Error = LayerUnavailable;

        fn add_marker(
            &mut self,
            id: &str,
            position: LatLng,
            visual: &MarkerVisual,
        ) -> Result<(), Self::Error> {
            self.tick()?;
            self.inner.add_marker(id, position, visual).unwrap();
            Ok(())
        }

        fn remove_marker(&mut self, id: &str) -> Result<(), Self::Error> {
            self.tick()?;
            self.inner.remove_marker(id).unwrap();
            Ok(())
        }
    }

    fn clusters_for(points: &[(&str, f64, f64)], zoom: f64) -> Vec<Cluster> {
        let points = points
            .iter()
            .map(|(id, lat, lng)| Point::new(*id, *lat, *lng))
            .collect();

        cluster(points, zoom, 50.0).unwrap().clusters
    }

    fn removed_ids(commands: &[MarkerCommand]) -> Vec<&str> {
        commands
            .iter()
            .filter_map(|c| match c {
                MarkerCommand::Remove { id } => Some(id.as_str()),
                MarkerCommand::Add { .. } => None,
            })
            .collect()
    }

    fn added_ids(commands: &[MarkerCommand]) -> Vec<&str> {
        commands
            .iter()
            .filter_map(|c| match c {
                MarkerCommand::Add { id, .. } => Some(id.as_str()),
                MarkerCommand::Remove { .. } => None,
            })
            .collect()
    }

    const PINS: [(&str, f64, f64); 3] = [
        ("A", 44.970, -93.270),
        ("B", 44.971, -93.271),
        ("C", 40.000, -100.000),
    ];

    #[test]
    fn test_first_pass_adds_everything() {
        let mut reconciler = MarkerReconciler::new(AddPolicy::Always);
        let mut sink = MemorySink::new();

        let report = reconciler
            .reconcile(&clusters_for(&PINS, 3.0), &mut sink)
            .unwrap();

        assert_eq!(
            report,
            ReconcileReport {
                added: 2,
                skipped: 0,
                removed: 0
            }
        );
        assert_eq!(added_ids(sink.commands()), vec!["cluster-A", "pin-C"]);
        assert_eq!(
            reconciler.rendered_ids().collect::<Vec<_>>(),
            vec!["cluster-A", "pin-C"]
        );
    }

    #[test]
    fn test_unchanged_pass_removes_nothing() {
        let mut reconciler = MarkerReconciler::new(AddPolicy::Always);
        let mut sink = MemorySink::new();
        let clusters = clusters_for(&PINS, 3.0);

        reconciler.reconcile(&clusters, &mut sink).unwrap();
        let before: Vec<String> = reconciler.rendered_ids().map(String::from).collect();
        sink.take_commands();

        let report = reconciler.reconcile(&clusters, &mut sink).unwrap();

        assert_eq!(report.removed, 0);
        assert!(removed_ids(sink.commands()).is_empty());
        assert_eq!(
            reconciler.rendered_ids().map(String::from).collect::<Vec<_>>(),
            before
        );
    }

    #[test]
    fn test_skip_unchanged_policy_makes_no_calls() {
        let mut reconciler = MarkerReconciler::new(AddPolicy::SkipUnchanged);
        let mut sink = MemorySink::new();
        let clusters = clusters_for(&PINS, 3.0);

        reconciler.reconcile(&clusters, &mut sink).unwrap();
        sink.take_commands();

        let report = reconciler.reconcile(&clusters, &mut sink).unwrap();

        assert_eq!(
            report,
            ReconcileReport {
                added: 0,
                skipped: 2,
                removed: 0
            }
        );
        assert!(sink.commands().is_empty());
    }

    #[test]
    fn test_skip_unchanged_policy_resends_moved_markers() {
        let mut reconciler = MarkerReconciler::new(AddPolicy::SkipUnchanged);
        let mut sink = MemorySink::new();

        reconciler
            .reconcile(&clusters_for(&PINS, 3.0), &mut sink)
            .unwrap();
        sink.take_commands();

        // A and B still merge but their centroid shifts; C is untouched.
        let moved = [
            ("A", 44.970, -93.270),
            ("B", 44.975, -93.275),
            ("C", 40.000, -100.000),
        ];
        let report = reconciler
            .reconcile(&clusters_for(&moved, 3.0), &mut sink)
            .unwrap();

        assert_eq!(report.added, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(added_ids(sink.commands()), vec!["cluster-A"]);
    }

    #[test]
    fn test_zooming_in_replaces_cluster_with_pins() {
        let mut reconciler = MarkerReconciler::new(AddPolicy::Always);
        let mut sink = MemorySink::new();

        reconciler
            .reconcile(&clusters_for(&PINS, 3.0), &mut sink)
            .unwrap();
        sink.take_commands();

        let report = reconciler
            .reconcile(&clusters_for(&PINS, 12.0), &mut sink)
            .unwrap();

        assert_eq!(report.removed, 1);
        assert_eq!(removed_ids(sink.commands()), vec!["cluster-A"]);
        assert_eq!(added_ids(sink.commands()), vec!["pin-A", "pin-B", "pin-C"]);
        assert_eq!(
            sink.markers().keys().map(String::as_str).collect::<Vec<_>>(),
            vec!["pin-A", "pin-B", "pin-C"]
        );
    }

    #[test]
    fn test_removed_point_is_removed_exactly_once() {
        let mut reconciler = MarkerReconciler::new(AddPolicy::Always);
        let mut sink = MemorySink::new();

        reconciler
            .reconcile(&clusters_for(&PINS, 12.0), &mut sink)
            .unwrap();

        let without_c = clusters_for(&PINS[..2], 12.0);

        reconciler.reconcile(&without_c, &mut sink).unwrap();
        reconciler.reconcile(&without_c, &mut sink).unwrap();

        assert_eq!(removed_ids(sink.commands()), vec!["pin-C"]);
        assert!(!reconciler.is_rendered("pin-C"));
        assert_eq!(reconciler.len(), 2);
    }

    #[test]
    fn test_no_double_add_within_a_pass() {
        let mut reconciler = MarkerReconciler::new(AddPolicy::Always);
        let mut sink = MemorySink::new();

        // Two pins sharing an id never merge at zoom 12 and would map to the same marker.
        let clusters = clusters_for(&[("dup", 10.0, 10.0), ("dup", -10.0, -10.0)], 12.0);
        let report = reconciler.reconcile(&clusters, &mut sink).unwrap();

        assert_eq!(report.added, 1);
        assert_eq!(added_ids(sink.commands()), vec!["pin-dup"]);
        assert_eq!(sink.markers()["pin-dup"].0, LatLng::new(10.0, 10.0));
    }

    #[test]
    fn test_clear_removes_everything() {
        let mut reconciler = MarkerReconciler::new(AddPolicy::Always);
        let mut sink = MemorySink::new();

        reconciler
            .reconcile(&clusters_for(&PINS, 12.0), &mut sink)
            .unwrap();

        assert_eq!(reconciler.clear(&mut sink).unwrap(), 3);
        assert!(reconciler.is_empty());
        assert!(sink.markers().is_empty());
    }

    #[test]
    fn test_failed_add_keeps_only_accepted_markers() {
        let mut reconciler = MarkerReconciler::new(AddPolicy::Always);
        let mut sink = FlakySink {
            fail_on: Some(2),
            ..FlakySink::default()
        };

        let err = reconciler
            .reconcile(&clusters_for(&PINS, 12.0), &mut sink)
            .unwrap_err();

        assert!(matches!(&err, ReconcileError::Add { id, .. } if id == "pin-B"));
        assert_eq!(err.to_string(), "failed to add marker \"pin-B\"");
        assert_eq!(reconciler.rendered_ids().collect::<Vec<_>>(), vec!["pin-A"]);

        // Next pass converges: the layer ends up holding exactly the current markers.
        sink.fail_on = None;
        reconciler
            .reconcile(&clusters_for(&PINS[1..], 12.0), &mut sink)
            .unwrap();

        assert_eq!(
            sink.inner.markers().keys().map(String::as_str).collect::<Vec<_>>(),
            vec!["pin-B", "pin-C"]
        );
        assert_eq!(
            reconciler.rendered_ids().collect::<Vec<_>>(),
            vec!["pin-B", "pin-C"]
        );
    }

    #[test]
    fn test_failed_remove_keeps_stale_marker_for_next_pass() {
        let mut reconciler = MarkerReconciler::new(AddPolicy::Always);
        let mut sink = FlakySink::default();

        reconciler
            .reconcile(&clusters_for(&PINS, 12.0), &mut sink)
            .unwrap();

        // Calls 1..=3 were the adds above; the next call is the removal of pin-C.
        sink.fail_on = Some(4);
        let err = reconciler
            .reconcile(&clusters_for(&PINS[..2], 12.0), &mut sink)
            .unwrap_err();

        assert!(matches!(&err, ReconcileError::Remove { id, .. } if id == "pin-C"));
        assert!(reconciler.is_rendered("pin-C"));

        reconciler
            .reconcile(&clusters_for(&PINS[..2], 12.0), &mut sink)
            .unwrap();

        assert!(!reconciler.is_rendered("pin-C"));
        assert!(!sink.inner.markers().contains_key("pin-C"));
    }
}
