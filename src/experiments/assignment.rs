use rand::Rng;

use super::config::Variant;

/// Weighted random pick, normalised against the actual weight sum.
///
/// Draws `r` in `[0, total)` and walks the list subtracting weights until the
/// remainder drops to zero or below. A zero (or non-finite) total falls back
/// to the first variant. Returns `None` only for an empty slice.
pub fn select_variant<'a, R: Rng>(variants: &'a [Variant], rng: &mut R) -> Option<&'a Variant> {
    let first = variants.first()?;
    let total: f64 = variants.iter().map(|v| v.weight.max(0.0)).sum();
    if !total.is_finite() || total <= 0.0 {
        return Some(first);
    }

    let mut remainder = rng.gen::<f64>() * total;
    for variant in variants {
        remainder -= variant.weight.max(0.0);
        if remainder <= 0.0 {
            return Some(variant);
        }
    }

    // Floating-point drift can leave a sliver of remainder after the last arm.
    Some(first)
}
