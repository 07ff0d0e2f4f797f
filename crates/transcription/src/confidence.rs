//! Confidence estimate for vendors that do not report one.

/// Bonus applied in high-accuracy mode before capping.
const HIGH_ACCURACY_BONUS: f64 = 0.05;

/// Derives a confidence score from the transcript length in characters.
///
/// | length | base | cap  |
/// |--------|------|------|
/// | > 50   | 0.95 | 0.98 |
/// | > 20   | 0.85 | 0.95 |
/// | > 5    | 0.75 | 0.90 |
/// | else   | 0.60 | 0.85 |
pub fn derived_confidence(text: &str, high_accuracy: bool) -> f32 {
    let length = text.chars().count();
    let (base, cap) = if length > 50 {
        (0.95, 0.98)
    } else if length > 20 {
        (0.85, 0.95)
    } else if length > 5 {
        (0.75, 0.90)
    } else {
        (0.60, 0.85)
    };
    let bonus = if high_accuracy { HIGH_ACCURACY_BONUS } else { 0.0 };
    f64::min(cap, base + bonus) as f32
}
