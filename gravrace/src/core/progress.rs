use crate::core::track::TrackCurve;
use crate::error::SimError;
use glam::DVec3;
use helpers::general::argmin;

pub const DEFAULT_PROGRESS_SAMPLES: usize = 1000;

/// ProgressEstimator maps world positions to normalized track progress by a linear scan over a
/// fixed set of curve samples. The scan is O(sample count) and meant for low update rates.
#[derive(Debug, Clone)]
pub struct ProgressEstimator {
    samples: Vec<DVec3>,
}

impl ProgressEstimator {
    pub fn new(curve: &TrackCurve, sample_count: usize) -> Result<ProgressEstimator, SimError> {
        if sample_count == 0 {
            return Err(SimError::InvalidParameter {
                name: "progress_samples",
                reason: "must be at least 1".to_owned(),
            });
        }

        Ok(ProgressEstimator {
            samples: curve.sample(sample_count),
        })
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// estimate returns index / sample count of the closest sample. Equally distant samples
    /// resolve to the lowest index.
    pub fn estimate(&self, position: DVec3) -> f64 {
        let idx = argmin(self.samples.iter().map(|s| s.distance_squared(position))).unwrap_or(0);
        idx as f64 / self.samples.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::track::generate_loop_points;
    use approx::assert_abs_diff_eq;

    #[test]
    fn progress_round_trips_through_the_curve() {
        let curve = TrackCurve::new(generate_loop_points(32, 400.0, 100.0, 2.0)).unwrap();
        let estimator = ProgressEstimator::new(&curve, DEFAULT_PROGRESS_SAMPLES).unwrap();
        let resolution = 1.0 / DEFAULT_PROGRESS_SAMPLES as f64;

        for i in 0..97 {
            let t = i as f64 / 97.0;
            let p = estimator.estimate(curve.point_at(t));
            assert!((p - t).abs() <= resolution, "t = {}, estimate = {}", t, p);
            assert!((0.0..1.0).contains(&p));
        }
    }

    #[test]
    fn exact_samples_map_to_their_index() {
        let curve = TrackCurve::new(generate_loop_points(16, 100.0, 0.0, 0.0)).unwrap();
        let estimator = ProgressEstimator::new(&curve, 10).unwrap();
        assert_abs_diff_eq!(estimator.estimate(curve.point_at(0.3)), 0.3);
        assert_eq!(estimator.estimate(curve.point_at(0.0)), 0.0);
    }

    #[test]
    fn zero_samples_are_rejected() {
        let curve = TrackCurve::new(generate_loop_points(16, 100.0, 0.0, 0.0)).unwrap();
        assert!(ProgressEstimator::new(&curve, 0).is_err());
    }
}
