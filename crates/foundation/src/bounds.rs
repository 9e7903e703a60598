use crate::math::LonLat;

/// Lon/lat bounding box in degrees.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LonLatBounds {
    pub min: LonLat,
    pub max: LonLat,
}

impl LonLatBounds {
    pub fn new(min: LonLat, max: LonLat) -> Self {
        LonLatBounds { min, max }
    }

    pub fn from_point(p: LonLat) -> Self {
        LonLatBounds { min: p, max: p }
    }

    pub fn extend(&mut self, p: LonLat) {
        self.min.lon_deg = self.min.lon_deg.min(p.lon_deg);
        self.min.lat_deg = self.min.lat_deg.min(p.lat_deg);
        self.max.lon_deg = self.max.lon_deg.max(p.lon_deg);
        self.max.lat_deg = self.max.lat_deg.max(p.lat_deg);
    }

    pub fn union(&mut self, other: &LonLatBounds) {
        self.extend(other.min);
        self.extend(other.max);
    }

    /// Grows the box by `fraction` of its size on every side.
    pub fn padded(&self, fraction: f64) -> Self {
        let dx = (self.max.lon_deg - self.min.lon_deg) * fraction;
        let dy = (self.max.lat_deg - self.min.lat_deg) * fraction;
        LonLatBounds {
            min: LonLat::new(self.min.lon_deg - dx, self.min.lat_deg - dy),
            max: LonLat::new(self.max.lon_deg + dx, self.max.lat_deg + dy),
        }
    }
}

/// Accumulates positions into optional bounds.
pub fn extend_bounds(bounds: &mut Option<LonLatBounds>, p: LonLat) {
    match bounds {
        Some(b) => b.extend(p),
        None => *bounds = Some(LonLatBounds::from_point(p)),
    }
}

#[cfg(test)]
mod tests {
    use super::{LonLatBounds, extend_bounds};
    use crate::math::LonLat;

    #[test]
    fn extend_grows_box() {
        let mut b = None;
        extend_bounds(&mut b, LonLat::new(-51.0, -24.0));
        extend_bounds(&mut b, LonLat::new(-50.0, -25.0));
        let b = b.unwrap();
        assert_eq!(b.min, LonLat::new(-51.0, -25.0));
        assert_eq!(b.max, LonLat::new(-50.0, -24.0));
    }

    #[test]
    fn padded_expands_on_every_side() {
        let b = LonLatBounds::new(LonLat::new(0.0, 0.0), LonLat::new(10.0, 20.0)).padded(0.1);
        assert_eq!(b.min, LonLat::new(-1.0, -2.0));
        assert_eq!(b.max, LonLat::new(11.0, 22.0));
    }
}
