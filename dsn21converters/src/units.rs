//!
//! # Unit Conversion
//!
//! Native boards measure in integer nanometres with y down.
//! DSN measures in a declared unit with y up, and coordinates within a `resolution` scope
//! count steps of `1 / value` of that unit.
//!

// Local imports
use crate::board::Point;
use dsn21::{DsnPoint, DsnUnits, UnitRes};

/// # Unit Converter
///
/// Converts between nanometres and values counted in `1 / value` steps of `units`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitConverter {
    pub units: DsnUnits,
    pub value: i32,
}
impl UnitConverter {
    /// Converter for exported designs, written in whole micrometres
    pub fn export() -> Self {
        Self {
            units: DsnUnits::Um,
            value: 1,
        }
    }
    /// Nanometres per unit of `units`
    pub fn nm_per_unit(units: DsnUnits) -> f64 {
        match units {
            DsnUnits::Inch => 25.4e6,
            DsnUnits::Mil => 25.4e3,
            DsnUnits::Cm => 1e7,
            DsnUnits::Mm => 1e6,
            DsnUnits::Um => 1e3,
        }
    }
    fn scale(&self) -> f64 {
        Self::nm_per_unit(self.units) / f64::from(self.value.max(1))
    }
    /// Convert distance `nm` to DSN units
    pub fn to_dsn(&self, nm: i64) -> f64 {
        nm as f64 / self.scale()
    }
    /// Convert DSN distance `v` to nanometres, rounding to the nearest
    pub fn from_dsn(&self, v: f64) -> i64 {
        (v * self.scale()).round() as i64
    }
    /// Convert native point `p` to DSN, negating y
    pub fn to_dsn_point(&self, p: Point) -> DsnPoint {
        DsnPoint::new(self.to_dsn(p.x), -self.to_dsn(p.y))
    }
    /// Convert DSN point `p` to native, negating y
    pub fn from_dsn_point(&self, p: DsnPoint) -> Point {
        Point::new(self.from_dsn(p.x), self.from_dsn(-p.y))
    }
}
impl From<&UnitRes> for UnitConverter {
    /// Create a converter for the unit scope `u`.
    /// Plain `unit` declarations carry a value of one.
    fn from(u: &UnitRes) -> Self {
        Self {
            units: u.units,
            value: u.value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_exports_micrometres() {
        let cv = UnitConverter::export();
        assert_eq!(cv.to_dsn(600_000), 600.0);
        assert_eq!(cv.to_dsn_point(Point::new(10_000_000, 5_000_000)), DsnPoint::new(10_000, -5_000));
        assert_eq!(cv.to_dsn_point(Point::new(1_000, 0)).y.to_string(), "0");
    }
    #[test]
    fn it_scales_by_resolution() {
        let cv = UnitConverter::from(&UnitRes::resolution(DsnUnits::Um, 10));
        assert_eq!(cv.from_dsn(308250.0), 30_825_000);
        assert_eq!(cv.from_dsn_point(DsnPoint::new(3000, -4000)), Point::new(300_000, 400_000));
        let mil = UnitConverter::from(&UnitRes::unit(DsnUnits::Mil));
        assert_eq!(mil.from_dsn(10.0), 254_000);
        let inch = UnitConverter::from(&UnitRes::default());
        assert_eq!(inch.from_dsn(2_540_000.0), 25_400_000);
    }
}
