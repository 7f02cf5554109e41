use crate::error::SimError;
use glam::DVec3;
use helpers::general::{lin_interp, wrap_unit};
use rand::Rng;
use serde::Deserialize;
use std::f64::consts::TAU;

/// Minimum number of control points for a closed track.
pub const MIN_CONTROL_POINTS: usize = 3;

/// Number of chords used to approximate the arc length of the curve.
const ARC_LENGTH_DIVISIONS: usize = 200;

/// Parameter distance used for the central difference in tangent_at.
const TANGENT_DELTA: f64 = 1e-4;

/// * `name` - Track name
/// * `num_points` - Number of generated control points (ignored if `control_points` is set)
/// * `lap_radius` - (m) Approximate radius of the generated loop
/// * `height_variation` - (m) Maximum vertical offset of the generated loop
/// * `phase` - Phase of the height variation, drawn randomly if not set
/// * `control_points` - (m) Explicit control points, replaces the generated loop if not empty
/// * `control_points_file` - CSV file in input/tracks/ the control points are read from
/// * `tube_radius` - (m) Radius of the enclosing tunnel, no containment if <= 0
/// * `checkpoint_t` - Curve parameter of the start/finish checkpoint volume
/// * `checkpoint_radius` - (m) Half extent of the checkpoint volume
/// * `obstacles` - Obstacles placed along the track
#[derive(Debug, Deserialize, Clone)]
pub struct TrackPars {
    pub name: String,
    #[serde(default = "default_num_points")]
    pub num_points: usize,
    #[serde(default = "default_lap_radius")]
    pub lap_radius: f64,
    #[serde(default = "default_height_variation")]
    pub height_variation: f64,
    #[serde(default)]
    pub phase: Option<f64>,
    #[serde(default)]
    pub control_points: Vec<[f64; 3]>,
    #[serde(default)]
    pub control_points_file: Option<String>,
    #[serde(default = "default_tube_radius")]
    pub tube_radius: f64,
    #[serde(default = "default_checkpoint_t")]
    pub checkpoint_t: f64,
    #[serde(default = "default_checkpoint_radius")]
    pub checkpoint_radius: f64,
    #[serde(default)]
    pub obstacles: Vec<ObstaclePars>,
}

/// * `t` - Curve parameter the obstacle is anchored at
/// * `offset` - (m) Offset from the anchor point on the curve
/// * `half_extents` - (m) Half size of the obstacle box
#[derive(Debug, Deserialize, Clone)]
pub struct ObstaclePars {
    pub t: f64,
    #[serde(default)]
    pub offset: [f64; 3],
    pub half_extents: [f64; 3],
}

fn default_num_points() -> usize {
    32
}

fn default_lap_radius() -> f64 {
    400.0
}

fn default_height_variation() -> f64 {
    100.0
}

fn default_tube_radius() -> f64 {
    30.0
}

fn default_checkpoint_t() -> f64 {
    0.98
}

fn default_checkpoint_radius() -> f64 {
    35.0
}

impl TrackPars {
    /// Returns a generated loop track with default dimensions.
    pub fn generated(name: &str, phase: Option<f64>) -> TrackPars {
        TrackPars {
            name: name.to_owned(),
            num_points: default_num_points(),
            lap_radius: default_lap_radius(),
            height_variation: default_height_variation(),
            phase,
            control_points: Vec::new(),
            control_points_file: None,
            tube_radius: default_tube_radius(),
            checkpoint_t: default_checkpoint_t(),
            checkpoint_radius: default_checkpoint_radius(),
            obstacles: Vec::new(),
        }
    }
}

/// generate_loop_points places `num_points` points on a circle of radius `lap_radius` in the xz
/// plane and lifts them by a smooth sinusoidal height variation.
pub fn generate_loop_points(
    num_points: usize,
    lap_radius: f64,
    height_variation: f64,
    phase: f64,
) -> Vec<DVec3> {
    (0..num_points)
        .map(|i| {
            let angle = i as f64 / num_points as f64 * TAU;
            DVec3::new(
                angle.cos() * lap_radius,
                (i as f64 * 0.5 + phase).sin() * height_variation,
                angle.sin() * lap_radius,
            )
        })
        .collect()
}

/// TrackCurve is a closed centripetal Catmull-Rom spline through its control points. Queries are
/// parametrised by normalized arc length u in [0.0, 1.0[ and wrap around at 1.0.
#[derive(Debug, Clone)]
pub struct TrackCurve {
    points: Vec<DVec3>,
    arc_lengths: Vec<f64>,
    arc_params: Vec<f64>,
}

impl TrackCurve {
    pub fn new(points: Vec<DVec3>) -> Result<TrackCurve, SimError> {
        if points.len() < MIN_CONTROL_POINTS {
            return Err(SimError::TooFewControlPoints {
                min: MIN_CONTROL_POINTS,
                got: points.len(),
            });
        }

        if let Some(index) = points.iter().position(|p| !p.is_finite()) {
            return Err(SimError::NonFiniteControlPoint { index });
        }

        let mut curve = TrackCurve {
            points,
            arc_lengths: Vec::with_capacity(ARC_LENGTH_DIVISIONS + 1),
            arc_params: Vec::with_capacity(ARC_LENGTH_DIVISIONS + 1),
        };

        // cumulative chord lengths are the lookup table for the u -> t mapping
        let mut last = curve.point(0.0);
        let mut sum = 0.0;
        curve.arc_lengths.push(0.0);
        curve.arc_params.push(0.0);

        for i in 1..=ARC_LENGTH_DIVISIONS {
            let t = i as f64 / ARC_LENGTH_DIVISIONS as f64;
            let cur = curve.point(t);
            sum += cur.distance(last);
            curve.arc_lengths.push(sum);
            curve.arc_params.push(t);
            last = cur;
        }

        if !(sum > f64::EPSILON) || !sum.is_finite() {
            return Err(SimError::ZeroLengthTrack);
        }

        Ok(curve)
    }

    /// from_pars builds the curve from explicit control points if available, otherwise it
    /// generates a loop. A missing phase is drawn from rng.
    pub fn from_pars<R: Rng>(track_pars: &TrackPars, rng: &mut R) -> Result<TrackCurve, SimError> {
        if !track_pars.control_points.is_empty() {
            let points = track_pars
                .control_points
                .iter()
                .map(|&p| DVec3::from_array(p))
                .collect();
            return TrackCurve::new(points);
        }

        let phase = track_pars
            .phase
            .unwrap_or_else(|| rng.gen_range(0.0..TAU));

        TrackCurve::new(generate_loop_points(
            track_pars.num_points,
            track_pars.lap_radius,
            track_pars.height_variation,
            phase,
        ))
    }

    pub fn control_points(&self) -> &[DVec3] {
        &self.points
    }

    /// length returns the approximated arc length of one lap.
    pub fn length(&self) -> f64 {
        *self.arc_lengths.last().unwrap_or(&0.0)
    }

    /// point_at returns the position at normalized arc length u.
    pub fn point_at(&self, u: f64) -> DVec3 {
        self.point(self.u_to_t(wrap_unit(u)))
    }

    /// tangent_at returns the unit tangent at normalized arc length u.
    pub fn tangent_at(&self, u: f64) -> DVec3 {
        let t = self.u_to_t(wrap_unit(u));
        let p1 = self.point(wrap_unit(t - TANGENT_DELTA));
        let p2 = self.point(wrap_unit(t + TANGENT_DELTA));
        (p2 - p1).normalize_or_zero()
    }

    /// sample returns count points at equidistant arc length parameters i / count.
    pub fn sample(&self, count: usize) -> Vec<DVec3> {
        (0..count)
            .map(|i| self.point_at(i as f64 / count as f64))
            .collect()
    }

    fn u_to_t(&self, u: f64) -> f64 {
        lin_interp(u * self.length(), &self.arc_lengths, &self.arc_params)
    }

    /// point evaluates the spline at the raw (non arc length) parameter t in [0.0, 1.0].
    fn point(&self, t: f64) -> DVec3 {
        let l = self.points.len();
        let p = l as f64 * t;
        let seg = p.floor();
        let weight = p - seg;
        let i = (seg as i64).rem_euclid(l as i64) as usize;

        let p0 = self.points[(i + l - 1) % l];
        let p1 = self.points[i];
        let p2 = self.points[(i + 1) % l];
        let p3 = self.points[(i + 2) % l];

        // centripetal parametrisation: knot distance is the square root of the chord length
        let mut dt0 = p0.distance_squared(p1).powf(0.25);
        let mut dt1 = p1.distance_squared(p2).powf(0.25);
        let mut dt2 = p2.distance_squared(p3).powf(0.25);

        if dt1 < 1e-4 {
            dt1 = 1.0;
        }
        if dt0 < 1e-4 {
            dt0 = dt1;
        }
        if dt2 < 1e-4 {
            dt2 = dt1;
        }

        let m1 = ((p1 - p0) / dt0 - (p2 - p0) / (dt0 + dt1) + (p2 - p1) / dt1) * dt1;
        let m2 = ((p2 - p1) / dt1 - (p3 - p1) / (dt1 + dt2) + (p3 - p2) / dt2) * dt1;

        // cubic Hermite segment between p1 and p2
        let c0 = p1;
        let c1 = m1;
        let c2 = -3.0 * p1 + 3.0 * p2 - 2.0 * m1 - m2;
        let c3 = 2.0 * p1 - 2.0 * p2 + m1 + m2;

        let w2 = weight * weight;
        c0 + c1 * weight + c2 * w2 + c3 * w2 * weight
    }
}
