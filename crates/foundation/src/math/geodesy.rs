/// WGS84 semi-major axis (meters).
pub const WGS84_A: f64 = 6_378_137.0;
/// IUGG mean Earth radius (meters), used for great-circle distances.
pub const MEAN_EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Geographic position in degrees, GeoJSON axis order.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct LonLat {
    pub lon_deg: f64,
    pub lat_deg: f64,
}

impl LonLat {
    pub const fn new(lon_deg: f64, lat_deg: f64) -> Self {
        Self { lon_deg, lat_deg }
    }

    pub fn is_finite(&self) -> bool {
        self.lon_deg.is_finite() && self.lat_deg.is_finite()
    }
}

/// Great-circle distance between two positions (meters). NaN if either
/// position is NaN.
pub fn haversine_m(a: LonLat, b: LonLat) -> f64 {
    let lat_a = a.lat_deg.to_radians();
    let lat_b = b.lat_deg.to_radians();
    let d_lat = lat_b - lat_a;
    let d_lon = (b.lon_deg - a.lon_deg).to_radians();

    let h = (d_lat * 0.5).sin().powi(2) + lat_a.cos() * lat_b.cos() * (d_lon * 0.5).sin().powi(2);
    2.0 * MEAN_EARTH_RADIUS_M * h.sqrt().clamp(0.0, 1.0).asin()
}

/// Length of an open path (meters), summed segment by segment.
pub fn path_length_m(points: &[LonLat]) -> f64 {
    points
        .windows(2)
        .map(|pair| haversine_m(pair[0], pair[1]))
        .sum()
}

/// Unsigned area of a closed ring on the sphere of radius `WGS84_A` (square meters).
///
/// Uses the spherical-excess approximation
/// `R²/2 · Σ (λ[i+1] − λ[i−1]) · sin φ[i]` over the cyclic vertex list.
/// A closing vertex equal to the first one is ignored. Rings with fewer than
/// three distinct vertices have zero area.
pub fn ring_area_m2(ring: &[LonLat]) -> f64 {
    let ring = without_closing_duplicate(ring);
    let n = ring.len();
    if n < 3 {
        return 0.0;
    }

    let mut total = 0.0;
    for i in 0..n {
        let lower = ring[(i + n - 1) % n];
        let middle = ring[i];
        let upper = ring[(i + 1) % n];
        total += (upper.lon_deg.to_radians() - lower.lon_deg.to_radians())
            * middle.lat_deg.to_radians().sin();
    }

    (total * WGS84_A * WGS84_A * 0.5).abs()
}

/// Area of a polygon given as outer ring followed by holes (square meters).
///
/// Holes are subtracted from the outer ring; the result never goes below zero.
pub fn polygon_area_m2(rings: &[Vec<LonLat>]) -> f64 {
    let Some((outer, holes)) = rings.split_first() else {
        return 0.0;
    };
    let holes: f64 = holes.iter().map(|h| ring_area_m2(h)).sum();
    (ring_area_m2(outer) - holes).max(0.0)
}

fn without_closing_duplicate(ring: &[LonLat]) -> &[LonLat] {
    match (ring.first(), ring.last()) {
        (Some(first), Some(last)) if ring.len() >= 2 => {
            if (first.lon_deg - last.lon_deg).abs() < 1e-12
                && (first.lat_deg - last.lat_deg).abs() < 1e-12
            {
                &ring[..ring.len() - 1]
            } else {
                ring
            }
        }
        _ => ring,
    }
}
