//! Aggregate progress over jobs of different sizes.

/// Weighted mean of per-job fractions.
///
/// Each item is `(expected_work, fraction)`. Jobs with unknown work weigh as
/// much as the average known job (or 1.0 when no size is known at all), so a
/// queue of unprobed files still advances evenly.
pub fn aggregate<I>(items: I) -> f32
where
    I: IntoIterator<Item = (Option<f64>, f32)>,
{
    let items: Vec<(Option<f64>, f32)> = items.into_iter().collect();
    if items.is_empty() {
        return 0.0;
    }

    let known: Vec<f64> = items
        .iter()
        .filter_map(|(w, _)| *w)
        .filter(|w| w.is_finite() && *w > 0.0)
        .collect();
    let placeholder = if known.is_empty() {
        1.0
    } else {
        known.iter().sum::<f64>() / known.len() as f64
    };

    let mut total = 0.0;
    let mut done = 0.0;
    for (weight, fraction) in items {
        let weight = weight
            .filter(|w| w.is_finite() && *w > 0.0)
            .unwrap_or(placeholder);
        total += weight;
        done += weight * f64::from(fraction.clamp(0.0, 1.0));
    }
    (done / total) as f32
}
