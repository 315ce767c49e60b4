//! Conversion between the geographic reference system of the client
//! (longitude/latitude) and the projected system the network is stored in.
//!
//! Coordinates are always passed easting first: `(lon, lat)` on the
//! geographic side and `(x, y)` on the projected side.
//!
//! The projected side is a transverse Mercator projection evaluated with the
//! 6th order Krüger series, which stays well below a millimetre of error
//! across a metropolitan area. Supported codes are the NAD83 MTM zones used
//! by Québec data (EPSG:32181 to 32190) and the WGS84 UTM zones.

use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};

use geo::{Coord, LineString, Point};

use crate::Error;

pub const WGS84_EPSG: u32 = 4326;
pub const MTM_ZONE_7_EPSG: u32 = 32187;

/// Geographic codes treated as coincident with WGS84 at street scale.
const GEOGRAPHIC_CODES: [u32; 3] = [4326, 4269, 4617];

#[derive(Debug, Clone, Copy)]
struct Ellipsoid {
    a: f64,
    f: f64,
}

const GRS80: Ellipsoid = Ellipsoid {
    a: 6_378_137.0,
    f: 1.0 / 298.257_222_101,
};

const WGS84: Ellipsoid = Ellipsoid {
    a: 6_378_137.0,
    f: 1.0 / 298.257_223_563,
};

/// Transverse Mercator with precomputed Krüger coefficients
#[derive(Debug, Clone)]
struct TransverseMercator {
    lon0: f64,
    k0: f64,
    false_easting: f64,
    false_northing: f64,
    e: f64,
    rectifying_radius: f64,
    alpha: [f64; 6],
    beta: [f64; 6],
    northing_origin: f64,
}

impl TransverseMercator {
    fn new(
        ellipsoid: Ellipsoid,
        lon0_deg: f64,
        lat0_deg: f64,
        k0: f64,
        false_easting: f64,
        false_northing: f64,
    ) -> Self {
        let f = ellipsoid.f;
        let n = f / (2.0 - f);
        let (n2, n3) = (n * n, n * n * n);
        let (n4, n5, n6) = (n3 * n, n3 * n2, n3 * n3);

        let rectifying_radius =
            ellipsoid.a / (1.0 + n) * (1.0 + n2 / 4.0 + n4 / 64.0 + n6 / 256.0);

        let alpha = [
            n / 2.0 - 2.0 * n2 / 3.0 + 5.0 * n3 / 16.0 + 41.0 * n4 / 180.0 - 127.0 * n5 / 288.0
                + 7891.0 * n6 / 37800.0,
            13.0 * n2 / 48.0 - 3.0 * n3 / 5.0 + 557.0 * n4 / 1440.0 + 281.0 * n5 / 630.0
                - 1_983_433.0 * n6 / 1_935_360.0,
            61.0 * n3 / 240.0 - 103.0 * n4 / 140.0 + 15061.0 * n5 / 26880.0
                + 167_603.0 * n6 / 181_440.0,
            49561.0 * n4 / 161_280.0 - 179.0 * n5 / 168.0 + 6_601_661.0 * n6 / 7_257_600.0,
            34729.0 * n5 / 80640.0 - 3_418_889.0 * n6 / 1_995_840.0,
            212_378_941.0 * n6 / 319_334_400.0,
        ];

        let beta = [
            n / 2.0 - 2.0 * n2 / 3.0 + 37.0 * n3 / 96.0 - n4 / 360.0 - 81.0 * n5 / 512.0
                + 96199.0 * n6 / 604_800.0,
            n2 / 48.0 + n3 / 15.0 - 437.0 * n4 / 1440.0 + 46.0 * n5 / 105.0
                - 1_118_711.0 * n6 / 3_870_720.0,
            17.0 * n3 / 480.0 - 37.0 * n4 / 840.0 - 209.0 * n5 / 4480.0 + 5569.0 * n6 / 90720.0,
            4397.0 * n4 / 161_280.0 - 11.0 * n5 / 504.0 - 830_251.0 * n6 / 7_257_600.0,
            4583.0 * n5 / 161_280.0 - 108_847.0 * n6 / 3_991_680.0,
            20_648_693.0 * n6 / 638_668_800.0,
        ];

        let mut tm = Self {
            lon0: lon0_deg.to_radians(),
            k0,
            false_easting,
            false_northing,
            e: (f * (2.0 - f)).sqrt(),
            rectifying_radius,
            alpha,
            beta,
            northing_origin: 0.0,
        };
        tm.northing_origin = tm.forward_raw(0.0, lat0_deg.to_radians()).1;
        tm
    }

    /// (easting, northing) relative to the projection origin, unscaled by offsets
    fn forward_raw(&self, lambda: f64, phi: f64) -> (f64, f64) {
        let sin_phi = phi.sin();
        let tau = (sin_phi.atanh() - self.e * (self.e * sin_phi).atanh()).sinh();

        let xi_p = tau.atan2(lambda.cos());
        let eta_p = (lambda.sin() / (1.0 + tau * tau).sqrt()).atanh();

        let (mut xi, mut eta) = (xi_p, eta_p);
        for (j, coeff) in self.alpha.iter().enumerate() {
            let k = 2.0 * (j as f64 + 1.0);
            xi += coeff * (k * xi_p).sin() * (k * eta_p).cosh();
            eta += coeff * (k * xi_p).cos() * (k * eta_p).sinh();
        }

        let scale = self.k0 * self.rectifying_radius;
        (scale * eta, scale * xi)
    }

    fn forward(&self, lon: f64, lat: f64) -> (f64, f64) {
        let lambda = normalize_radians(lon.to_radians() - self.lon0);
        let (x, y) = self.forward_raw(lambda, lat.to_radians());
        (
            self.false_easting + x,
            self.false_northing + y - self.northing_origin,
        )
    }

    fn inverse(&self, x: f64, y: f64) -> (f64, f64) {
        let scale = self.k0 * self.rectifying_radius;
        let xi = (y - self.false_northing + self.northing_origin) / scale;
        let eta = (x - self.false_easting) / scale;

        let (mut xi_p, mut eta_p) = (xi, eta);
        for (j, coeff) in self.beta.iter().enumerate() {
            let k = 2.0 * (j as f64 + 1.0);
            xi_p -= coeff * (k * xi).sin() * (k * eta).cosh();
            eta_p -= coeff * (k * xi).cos() * (k * eta).sinh();
        }

        let chi = (xi_p.sin() / eta_p.cosh()).asin();
        let lambda = eta_p.sinh().atan2(xi_p.cos());
        let phi = self.geodetic_latitude(chi);

        (
            normalize_radians(self.lon0 + lambda).to_degrees(),
            phi.to_degrees(),
        )
    }

    /// Inverts the conformal latitude by fixed-point iteration
    fn geodetic_latitude(&self, chi: f64) -> f64 {
        let conformal = (FRAC_PI_4 + chi / 2.0).tan();
        let mut phi = chi;
        for _ in 0..15 {
            let es = self.e * phi.sin();
            let next =
                2.0 * (conformal * ((1.0 + es) / (1.0 - es)).powf(self.e / 2.0)).atan() - FRAC_PI_2;
            if (next - phi).abs() < 1e-14 {
                return next;
            }
            phi = next;
        }
        phi
    }

    fn from_epsg(code: u32) -> Result<Self, Error> {
        match code {
            // NAD83 / MTM zones 1..=10
            32181..=32190 => {
                let zone = code - 32180;
                let lon0 = match zone {
                    1 => -53.0,
                    2 => -56.0,
                    z => -(58.5 + 3.0 * f64::from(z - 3)),
                };
                Ok(Self::new(GRS80, lon0, 0.0, 0.9999, 304_800.0, 0.0))
            }
            // WGS84 / UTM north and south
            32601..=32660 | 32701..=32760 => {
                let zone = code % 100;
                let lon0 = -183.0 + 6.0 * f64::from(zone);
                let false_northing = if code > 32700 { 10_000_000.0 } else { 0.0 };
                Ok(Self::new(WGS84, lon0, 0.0, 0.9996, 500_000.0, false_northing))
            }
            other => Err(Error::UnsupportedCrs(other)),
        }
    }
}

fn normalize_radians(angle: f64) -> f64 {
    let two_pi = 2.0 * std::f64::consts::PI;
    let wrapped = (angle + std::f64::consts::PI).rem_euclid(two_pi) - std::f64::consts::PI;
    // keep +180° instead of folding it onto -180°
    if wrapped == -std::f64::consts::PI && angle > 0.0 {
        std::f64::consts::PI
    } else {
        wrapped
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrsKind {
    Geographic,
    Projected,
}

/// Converts points between a fixed geographic and a fixed projected system.
///
/// Built once at process start and shared read-only by every request.
#[derive(Debug, Clone)]
pub struct CrsTransformer {
    geographic: u32,
    projected: u32,
    projection: TransverseMercator,
}

impl CrsTransformer {
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedCrs`] if either code is not supported.
    pub fn new(geographic: u32, projected: u32) -> Result<Self, Error> {
        if !GEOGRAPHIC_CODES.contains(&geographic) {
            return Err(Error::UnsupportedCrs(geographic));
        }
        Ok(Self {
            geographic,
            projected,
            projection: TransverseMercator::from_epsg(projected)?,
        })
    }

    pub fn geographic_epsg(&self) -> u32 {
        self.geographic
    }

    pub fn projected_epsg(&self) -> u32 {
        self.projected
    }

    /// Tells whether data tagged with `epsg` is on the geographic or the
    /// projected side of this transformer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedCrs`] for any other code.
    pub fn classify(&self, epsg: u32) -> Result<CrsKind, Error> {
        if epsg == self.projected {
            Ok(CrsKind::Projected)
        } else if GEOGRAPHIC_CODES.contains(&epsg) {
            Ok(CrsKind::Geographic)
        } else {
            Err(Error::UnsupportedCrs(epsg))
        }
    }

    /// `(lon, lat)` in degrees to `(x, y)` in projected units.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCoordinate`] for non-finite or out of range input.
    pub fn to_projected(&self, lon: f64, lat: f64) -> Result<(f64, f64), Error> {
        if !lon.is_finite() || !lat.is_finite() {
            return Err(Error::invalid_coordinate(lon, lat, "not a finite number"));
        }
        if !(-180.0..=180.0).contains(&lon) || !(-90.0..=90.0).contains(&lat) {
            return Err(Error::invalid_coordinate(
                lon,
                lat,
                "outside the longitude/latitude domain",
            ));
        }
        let (x, y) = self.projection.forward(lon, lat);
        if !x.is_finite() || !y.is_finite() {
            return Err(Error::invalid_coordinate(lon, lat, "not projectable"));
        }
        Ok((x, y))
    }

    /// `(x, y)` in projected units to `(lon, lat)` in degrees.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCoordinate`] for non-finite input or input the
    /// projection cannot invert.
    pub fn to_geographic(&self, x: f64, y: f64) -> Result<(f64, f64), Error> {
        if !x.is_finite() || !y.is_finite() {
            return Err(Error::invalid_coordinate(x, y, "not a finite number"));
        }
        let (lon, lat) = self.projection.inverse(x, y);
        if !lon.is_finite() || !lat.is_finite() {
            return Err(Error::invalid_coordinate(x, y, "not invertible"));
        }
        Ok((lon, lat))
    }

    pub fn point_to_projected(&self, point: Point<f64>) -> Result<Point<f64>, Error> {
        let (x, y) = self.to_projected(point.x(), point.y())?;
        Ok(Point::new(x, y))
    }

    pub fn point_to_geographic(&self, point: Point<f64>) -> Result<Point<f64>, Error> {
        let (lon, lat) = self.to_geographic(point.x(), point.y())?;
        Ok(Point::new(lon, lat))
    }

    pub fn line_to_projected(&self, line: &LineString<f64>) -> Result<LineString<f64>, Error> {
        line.coords()
            .map(|c| self.to_projected(c.x, c.y).map(|(x, y)| Coord { x, y }))
            .collect::<Result<Vec<_>, _>>()
            .map(LineString::new)
    }

    pub fn line_to_geographic(&self, line: &LineString<f64>) -> Result<LineString<f64>, Error> {
        line.coords()
            .map(|c| self.to_geographic(c.x, c.y).map(|(x, y)| Coord { x, y }))
            .collect::<Result<Vec<_>, _>>()
            .map(LineString::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mtm7() -> CrsTransformer {
        CrsTransformer::new(WGS84_EPSG, MTM_ZONE_7_EPSG).unwrap()
    }

    #[test]
    fn central_meridian_maps_to_false_easting() {
        let (x, y) = mtm7().to_projected(-70.5, 45.0).unwrap();
        assert!((x - 304_800.0).abs() < 1e-6);
        // k0 * meridian arc of GRS80 at 45°
        assert!((y - 4_984_445.883).abs() < 0.01, "y = {y}");
    }

    #[test]
    fn quebec_city_lands_in_zone_7_range() {
        let (x, y) = mtm7().to_projected(-71.2080, 46.8139).unwrap();
        assert!((x - 250_771.157).abs() < 0.01, "x = {x}");
        assert!((y - 5_186_283.200).abs() < 0.01, "y = {y}");
    }

    #[test]
    fn round_trip_within_tolerance() {
        let transformer = mtm7();
        let points = [
            (-71.2080, 46.8139),
            (-73.5673, 45.5017),
            (-70.5, 45.0),
            (-69.0, 48.5),
            (-72.9, 46.2),
        ];
        for (lon, lat) in points {
            let (x, y) = transformer.to_projected(lon, lat).unwrap();
            let (lon2, lat2) = transformer.to_geographic(x, y).unwrap();
            assert!((lon - lon2).abs() < 1e-6, "lon {lon} -> {lon2}");
            assert!((lat - lat2).abs() < 1e-6, "lat {lat} -> {lat2}");
        }
    }

    #[test]
    fn axis_order_is_easting_first() {
        let transformer = mtm7();
        // West of the central meridian gives an easting below the false easting
        let (x, y) = transformer.to_projected(-71.5, 46.0).unwrap();
        assert!(x < 304_800.0);
        assert!(y > 5_000_000.0);

        let (lon, lat) = transformer.to_geographic(x, y).unwrap();
        assert!(lon < -71.0 && lat > 45.0);
    }

    #[test]
    fn utm_round_trip() {
        let transformer = CrsTransformer::new(WGS84_EPSG, 32618).unwrap();
        let (x, y) = transformer.to_projected(-75.0, 45.0).unwrap();
        assert!((x - 500_000.0).abs() < 1e-6);
        let (lon, lat) = transformer.to_geographic(x, y).unwrap();
        assert!((lon + 75.0).abs() < 1e-9);
        assert!((lat - 45.0).abs() < 1e-9);
    }

    #[test]
    fn rejects_malformed_input() {
        let transformer = mtm7();
        assert!(matches!(
            transformer.to_projected(f64::NAN, 45.0),
            Err(Error::InvalidCoordinate { .. })
        ));
        assert!(matches!(
            transformer.to_projected(-71.0, 95.0),
            Err(Error::InvalidCoordinate { .. })
        ));
        assert!(matches!(
            transformer.to_geographic(f64::INFINITY, 0.0),
            Err(Error::InvalidCoordinate { .. })
        ));
    }

    #[test]
    fn unsupported_codes() {
        assert!(matches!(
            CrsTransformer::new(WGS84_EPSG, 3857),
            Err(Error::UnsupportedCrs(3857))
        ));
        assert!(matches!(
            CrsTransformer::new(32187, 32187),
            Err(Error::UnsupportedCrs(32187))
        ));
    }

    #[test]
    fn classify_source_codes() {
        let transformer = mtm7();
        assert_eq!(transformer.classify(32187).unwrap(), CrsKind::Projected);
        assert_eq!(transformer.classify(4326).unwrap(), CrsKind::Geographic);
        assert!(transformer.classify(32188).is_err());
    }

    #[test]
    fn line_reprojection_keeps_vertex_order() {
        let transformer = mtm7();
        let line = LineString::from(vec![(-71.21, 46.81), (-71.20, 46.82)]);
        let projected = transformer.line_to_projected(&line).unwrap();
        let back = transformer.line_to_geographic(&projected).unwrap();
        for (a, b) in line.coords().zip(back.coords()) {
            assert!((a.x - b.x).abs() < 1e-6 && (a.y - b.y).abs() < 1e-6);
        }
    }
}
