// Signal value helpers shared by the input map and the sources

/// Value a fully pressed digital control reports
pub const PRESSED: i16 = i16::MAX;

/// Absolute value of a signal without overflowing on `i16::MIN`
pub fn magnitude(value: i16) -> u16 {
    value.unsigned_abs()
}

/// Convert a normalized analog reading (-1.0 to 1.0) into a signal value
///
/// Out-of-range readings are clamped; NaN reads as neutral.
pub fn from_normalized(value: f32) -> i16 {
    if value.is_nan() {
        return 0;
    }
    let clamped = clamp(value, -1.0, 1.0);
    (clamped * i16::MAX as f32).round() as i16
}

/// Convert a signal value back into the -1.0 to 1.0 range
pub fn to_normalized(value: i16) -> f32 {
    clamp(value as f32 / i16::MAX as f32, -1.0, 1.0)
}

/// Clamp a value between min and max
fn clamp<T: PartialOrd>(value: T, min: T, max: T) -> T {
    if value < min {
        min
    } else if value > max {
        max
    } else {
        value
    }
}
