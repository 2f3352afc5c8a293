use serde::Serialize;

/// Reserves held in a single band.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Band {
    /// Stable-asset reserve
    pub x: f64,
    /// Risky-asset reserve
    pub y: f64,
}

/// Amounts moved by one leg of a trade inside a single band.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Leg {
    /// Risky asset leaving the band (negative when the band buys it)
    pub dy: f64,
    /// Stable asset entering the band (negative when the band pays it out)
    pub dx: f64,
}

impl Band {
    pub fn is_empty(&self) -> bool {
        self.x <= 0.0 && self.y <= 0.0
    }

    /// Band value in stable units at execution price `e`.
    pub fn value_at(&self, e: f64) -> f64 {
        self.x + self.y * e
    }

    /// Fraction of the band's value held in the risky asset at price `e`.
    pub fn imbalance(&self, e: f64) -> f64 {
        let risky = self.y * e;
        let total = self.x + risky;
        if total <= 0.0 { 0.0 } else { risky / total }
    }

    /// Composition `x / (x + y*m)`: 0 means all risky (band bottom), 1 all stable (band top).
    pub fn composition(&self, mid: f64) -> f64 {
        let total = self.x + self.y * mid;
        if total <= 0.0 { 0.0 } else { self.x / total }
    }

    /// Convert reserves at price `e` until the composition reaches `target`.
    ///
    /// The exchange happens at `e`, so `value_at(e)` is unchanged by the leg.
    pub(crate) fn convert_to(&mut self, target: f64, e: f64, mid: f64) -> Leg {
        let target = target.clamp(0.0, 1.0);
        let weighted = self.x + self.y * mid;
        if weighted <= 0.0 {
            return Leg { dy: 0.0, dx: 0.0 };
        }
        let mut dy = (target * weighted - self.x) / (e * (1.0 - target) + target * mid);
        // exhausting one side must not leave ulp-sized dust or negatives
        if target >= 1.0 {
            dy = self.y;
        } else if target <= 0.0 {
            dy = -self.x / e;
        }
        let dx = dy * e;
        self.x = if target <= 0.0 { 0.0 } else { (self.x + dx).max(0.0) };
        self.y = if target >= 1.0 { 0.0 } else { (self.y - dy).max(0.0) };
        Leg { dy, dx }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversion_is_value_neutral_and_hits_target() {
        let mut band = Band { x: 40.0, y: 0.6 };
        let before = band.value_at(99.5);
        let leg = band.convert_to(0.8, 99.5, 99.75);
        assert!(leg.dy > 0.0);
        assert!((band.value_at(99.5) - before).abs() < 1e-9);
        assert!((band.composition(99.75) - 0.8).abs() < 1e-12);
    }

    #[test]
    fn full_conversion_empties_one_side_exactly() {
        let mut band = Band { x: 10.0, y: 1.0 };
        band.convert_to(1.0, 100.0, 100.0);
        assert_eq!(band.y, 0.0);
        assert_eq!(band.x, 110.0);
        band.convert_to(0.0, 90.0, 100.0);
        assert_eq!(band.x, 0.0);
        assert!((band.y - 110.0 / 90.0).abs() < 1e-12);
    }
}
