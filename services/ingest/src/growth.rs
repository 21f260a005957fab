/// Period-over-period growth in percent.
///
/// `None` when there is no positive prior value to compare against, or when
/// either input is NaN.
pub fn growth(current: f64, prior: f64) -> Option<f64> {
    if current.is_nan() || prior.is_nan() || prior <= 0.0 {
        return None;
    }
    Some((current - prior) / prior * 100.0)
}
