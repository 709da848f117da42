//! GeoJSON import of pins and export of clusters.

use crate::cluster::{Cluster, Point};
use crate::marker::abbreviate_count;
use geojson::{feature::Id, Feature, FeatureCollection, GeoJson, Geometry, JsonObject, Value};
use serde_json::json;

/// Errors that can occur while reading pins from GeoJSON.
#[derive(thiserror::Error, Debug)]
pub enum GeoJsonError {
    /// The input is not valid GeoJSON.
    #[error("invalid GeoJSON: {0}")]
    Parse(#[from] geojson::Error),

    /// The input is valid GeoJSON but not a feature collection.
    #[error("expected a FeatureCollection")]
    NotAFeatureCollection,
}

/// Pins read from a feature collection.
#[derive(Clone, Debug, PartialEq)]
pub struct ImportedPoints {
    /// One pin per point feature, in collection order
    pub points: Vec<Point<JsonObject>>,

    /// Features skipped because they carry no point geometry
    pub skipped: usize,
}

/// Read pins from a GeoJSON `FeatureCollection`.
///
/// The pin id is the feature id, string or number, falling back to the feature's position in
/// the collection. The feature properties become the pin payload.
///
/// # Arguments
///
/// - `input`: GeoJSON text.
///
/// # Returns
///
/// The pins and the number of skipped features.
pub fn points_from_geojson(input: &str) -> Result<ImportedPoints, GeoJsonError> {
    let collection = match input.parse::<GeoJson>()? {
        GeoJson::FeatureCollection(collection) => collection,
        _ => return Err(GeoJsonError::NotAFeatureCollection),
    };

    let mut points = Vec::with_capacity(collection.features.len());
    let mut skipped = 0;

    for (i, feature) in collection.features.into_iter().enumerate() {
        let position = match feature.geometry.as_ref().map(|g| &g.value) {
            Some(Value::Point(position)) if position.len() >= 2 => [position[0], position[1]],
            _ => {
                skipped += 1;
                continue;
            }
        };

        let id = match feature.id {
            Some(Id::String(id)) => id,
            Some(Id::Number(n)) => n.to_string(),
            None => i.to_string(),
        };

        points.push(Point::with_payload(
            id,
            position[1],
            position[0],
            feature.properties.unwrap_or_default(),
        ));
    }

    if skipped > 0 {
        log::warn!("skipped {skipped} feature(s) without point geometry");
    }

    Ok(ImportedPoints { points, skipped })
}

/// Convert clusters into a GeoJSON `FeatureCollection` of points.
///
/// Every feature carries `cluster`, `cluster_id`, `point_count`, `point_count_abbreviated`
/// and the `member_ids` of the pins it stands for.
pub fn clusters_to_geojson<T>(clusters: &[Cluster<T>]) -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features: clusters.iter().map(cluster_feature).collect(),
        foreign_members: None,
    }
}

fn cluster_feature<T>(cluster: &Cluster<T>) -> Feature {
    let member_ids: Vec<&str> = cluster.members.iter().map(|p| p.id.as_str()).collect();

    let mut properties = JsonObject::new();
    properties.insert("cluster".to_string(), json!(cluster.is_cluster));
    properties.insert("cluster_id".to_string(), json!(cluster.id));
    properties.insert("point_count".to_string(), json!(cluster.point_count));
    properties.insert(
        "point_count_abbreviated".to_string(),
        json!(abbreviate_count(cluster.point_count)),
    );
    properties.insert("member_ids".to_string(), json!(member_ids));

    Feature {
        bbox: None,
        geometry: Some(Geometry::new(Value::Point(vec![cluster.lng, cluster.lat]))),
        id: Some(Id::String(cluster.id.clone())),
        properties: Some(properties),
        foreign_members: None,
    }
}
