//! Client-facing rendering of path results

mod to_geojson;
