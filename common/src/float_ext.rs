pub trait FloatExt: Copy {
    /// Equality within `crate::EPSILON`.
    fn approximately_eq(self, other: Self) -> bool;

    /// Equality within an explicit absolute tolerance.
    fn within(self, other: Self, tolerance: f64) -> bool;
}

impl FloatExt for f32 {
    fn approximately_eq(self, other: Self) -> bool {
        self.within(other, crate::EPSILON)
    }

    fn within(self, other: Self, tolerance: f64) -> bool {
        ((self - other).abs() as f64) < tolerance
    }
}

impl FloatExt for f64 {
    fn approximately_eq(self, other: Self) -> bool {
        self.within(other, crate::EPSILON)
    }

    fn within(self, other: Self, tolerance: f64) -> bool {
        (self - other).abs() < tolerance
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn f32_approximately_eq() {
        assert!(1.0_f32.approximately_eq(1.0));
        assert!(0.0_f32.approximately_eq(0.0));
        assert!((0.1_f32 + 0.2_f32).approximately_eq(0.3));
        assert!(!1.0_f32.approximately_eq(1.001));
    }

    #[test]
    fn f64_approximately_eq() {
        assert!(1.0_f64.approximately_eq(1.0));
        assert!((0.1_f64 + 0.2_f64).approximately_eq(0.3));
        assert!(!1.0_f64.approximately_eq(1.0001));
    }

    #[test]
    fn nan_is_never_equal() {
        assert!(!f32::NAN.approximately_eq(f32::NAN));
        assert!(!f64::NAN.within(0.0, 1.0));
    }

    #[test]
    fn explicit_tolerance() {
        // host verification threshold
        assert!(2.50004_f32.within(2.5, 1e-4));
        assert!(!2.5002_f32.within(2.5, 1e-4));
        assert!(7.99_f64.within(8.0, 0.02));
    }

    #[test]
    fn within_is_symmetric() {
        let a = 1.0_f64;
        let b = 1.00005_f64;
        assert_eq!(a.within(b, 1e-4), b.within(a, 1e-4));
    }
}
