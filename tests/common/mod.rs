use pin_cluster::{points_from_geojson, ImportedPoints, Options, Point};
use std::{fs, path::Path};

#[allow(dead_code)]
pub fn get_options(base_radius: f64) -> Options {
    Options {
        base_radius,
        ..Options::default()
    }
}

#[allow(dead_code)]
pub fn load_pins() -> ImportedPoints {
    let file_path = Path::new("./tests/common/pins.json");
    let json_string = fs::read_to_string(file_path).expect("pins.json was not found");

    points_from_geojson(&json_string).expect("pins.json was not parsed")
}

#[allow(dead_code)]
pub fn example_points() -> Vec<Point> {
    vec![
        Point::new("A", 44.970, -93.270),
        Point::new("B", 44.971, -93.271),
        Point::new("C", 40.000, -100.000),
    ]
}
