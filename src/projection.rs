use std::f64::consts::PI;

/// Size in pixels of a single tile at zoom 0.
pub const TILE_SIZE: f64 = 256.0;

/// Planar pixel coordinates in the Web-Mercator world at some zoom level.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pixel {
    pub x: f64,
    pub y: f64,
}

impl Pixel {
    /// Euclidean distance in pixels.
    pub fn distance(&self, other: &Pixel) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Width (and height) of the world in pixels at the given zoom level.
///
/// # Arguments
///
/// - `zoom`: The zoom level, fractional zooms allowed.
///
/// # Returns
///
/// `256 * 2^zoom`.
pub fn world_size(zoom: f64) -> f64 {
    TILE_SIZE * zoom.exp2()
}

/// Project a geographic coordinate onto the pixel plane.
///
/// No clamping is applied near the poles; the projection diverges at ±90°.
///
/// # Arguments
///
/// - `lat`: Latitude in degrees.
/// - `lng`: Longitude in degrees.
/// - `zoom`: The zoom level.
///
/// # Returns
///
/// The pixel coordinates of the point.
pub fn project(lat: f64, lng: f64, zoom: f64) -> Pixel {
    let size = world_size(zoom);

    Pixel {
        x: lng_x(lng) * size,
        y: lat_y(lat) * size,
    }
}

/// Pixel distance between two geographic coordinates at the given zoom.
pub fn pixel_distance(a: (f64, f64), b: (f64, f64), zoom: f64) -> f64 {
    project(a.0, a.1, zoom).distance(&project(b.0, b.1, zoom))
}

/// Convert longitude to spherical mercator in the [0..1] range.
///
/// # Arguments
///
/// - `lng`: The longitude value to be converted.
///
/// # Returns
///
/// The converted value of the given longitude. Longitudes outside ±180 fall outside [0..1].
fn lng_x(lng: f64) -> f64 {
    (lng + 180.0) / 360.0
}

/// Convert latitude to spherical mercator.
///
/// # Arguments
///
/// - `lat`: The latitude value to be converted.
///
/// # Returns
///
/// The converted value of the given latitude, in [0..1] inside the Web-Mercator latitude
/// band and unbounded towards the poles.
fn lat_y(lat: f64) -> f64 {
    let sin = lat.to_radians().sin();

    0.5 - ((1.0 + sin) / (1.0 - sin)).ln() / (4.0 * PI)
}
