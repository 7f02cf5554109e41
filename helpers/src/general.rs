/// argmin returns the index of the first minimum value yielded by x, or None if x is empty.
/// Ties are resolved in favour of the lowest index.
pub fn argmin<T, I>(x: I) -> Option<usize>
where
    T: PartialOrd,
    I: IntoIterator<Item = T>,
{
    let mut iter = x.into_iter().enumerate();
    let (mut idx_min, mut val_min) = iter.next()?;

    for (i, val) in iter {
        if val < val_min {
            val_min = val;
            idx_min = i;
        }
    }

    Some(idx_min)
}

/// wrap_unit maps x onto the half-open interval [0.0, 1.0[.
pub fn wrap_unit(x: f64) -> f64 {
    let wrapped = x.rem_euclid(1.0);

    // rem_euclid may round up to exactly 1.0 for tiny negative inputs
    if wrapped >= 1.0 {
        0.0
    } else {
        wrapped
    }
}

/// lin_interp returns the linearly interpolated value at x for given discrete data points xp, fp.
/// xp must be non-decreasing and have the same length as fp. Values outside the covered range are
/// clamped to the first or last entry of fp. Inspired by numpy.interp.
pub fn lin_interp(x: f64, xp: &[f64], fp: &[f64]) -> f64 {
    debug_assert_eq!(xp.len(), fp.len(), "Number of items in xp and fp must be equal!");

    let (Some(&x_first), Some(&f_first), Some(&f_last)) = (xp.first(), fp.first(), fp.last())
    else {
        return 0.0;
    };

    if x <= x_first {
        return f_first;
    }

    // first index whose support point is >= x
    let i = xp.partition_point(|&xi| xi < x);

    if i >= xp.len() {
        return f_last;
    }

    let dx = xp[i] - xp[i - 1];
    if dx <= 0.0 {
        return fp[i];
    }

    fp[i - 1] + (x - xp[i - 1]) * (fp[i] - fp[i - 1]) / dx
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn argmin_prefers_lowest_index_on_ties() {
        assert_eq!(argmin(vec![3.0, 1.0, 1.0, 2.0]), Some(1));
        assert_eq!(argmin(Vec::<f64>::new()), None);
        assert_eq!(argmin([5, 4, 3]), Some(2));
    }

    #[test]
    fn wrap_unit_stays_in_half_open_interval() {
        assert_abs_diff_eq!(wrap_unit(1.25), 0.25, epsilon = 1e-12);
        assert_abs_diff_eq!(wrap_unit(-0.25), 0.75, epsilon = 1e-12);
        assert_eq!(wrap_unit(1.0), 0.0);
        assert!(wrap_unit(-1e-20) < 1.0);
    }

    #[test]
    fn lin_interp_matches_numpy_behaviour() {
        let xp = [0.0, 1.0, 3.0];
        let fp = [0.0, 10.0, 30.0];
        assert_abs_diff_eq!(lin_interp(-1.0, &xp, &fp), 0.0);
        assert_abs_diff_eq!(lin_interp(0.5, &xp, &fp), 5.0);
        assert_abs_diff_eq!(lin_interp(2.0, &xp, &fp), 20.0);
        assert_abs_diff_eq!(lin_interp(5.0, &xp, &fp), 30.0);
    }
}
