/// `base^exp` for a signed integer exponent.
pub fn powi(base: f64, exp: i32) -> f64 {
    base.powi(exp)
}

/// Linear interpolation between `a` and `b`.
#[inline]
pub fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

/// Maps `x` from the segment `[x1, x2]` onto `[y1, y2]`. Returns `y1` when the
/// segment is degenerate.
#[inline]
pub fn interpolate(x1: f64, y1: f64, x2: f64, y2: f64, x: f64) -> f64 {
    if x2 == x1 {
        y1
    } else {
        lerp(y1, y2, (x - x1) / (x2 - x1))
    }
}

/// Floor division: rounds toward negative infinity.
#[inline]
pub fn floor_div(value: f64, divisor: f64) -> i32 {
    (value / divisor).floor() as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn powi_negative_exponent() {
        assert_eq!(powi(4.0, -2), 1.0 / 16.0);
        assert_eq!(powi(4.0, 0), 1.0);
    }

    #[test]
    fn floor_div_rounds_down() {
        assert_eq!(floor_div(150.0, 100.0), 1);
        assert_eq!(floor_div(-0.1, 100.0), -1);
        assert_eq!(floor_div(-100.0, 100.0), -1);
    }

    #[test]
    fn interpolate_degenerate_segment() {
        assert_eq!(interpolate(1.0, 5.0, 1.0, 9.0, 3.0), 5.0);
        assert_eq!(interpolate(0.0, 0.0, 10.0, 100.0, 2.5), 25.0);
    }
}
