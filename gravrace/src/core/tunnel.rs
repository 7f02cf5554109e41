use crate::core::track::TrackCurve;
use crate::error::SimError;
use glam::{DVec2, DVec3};

/// Number of tubular segments the tunnel centerline is sampled with.
pub const TUNNEL_SEGMENTS: usize = 200;

/// Containment is the geometric query the flight integrator needs from the track surface.
pub trait Containment {
    /// probe casts a vertical ray through position and returns true if it meets the tunnel.
    fn probe(&self, position: DVec3) -> bool;

    /// closest_surface_point returns the point on the tunnel surface closest to position.
    fn closest_surface_point(&self, position: DVec3) -> DVec3;
}

/// TubeTunnel is a tube of constant radius swept along a sampled track centerline.
#[derive(Debug, Clone)]
pub struct TubeTunnel {
    centerline: Vec<DVec3>,
    radius: f64,
}

impl TubeTunnel {
    pub fn new(curve: &TrackCurve, radius: f64, segments: usize) -> Result<TubeTunnel, SimError> {
        if !(radius > 0.0) {
            return Err(SimError::InvalidParameter {
                name: "tube_radius",
                reason: format!("must be positive, is {}", radius),
            });
        }
        if segments < 3 {
            return Err(SimError::InvalidParameter {
                name: "segments",
                reason: format!("need at least 3 tunnel segments, got {}", segments),
            });
        }

        Ok(TubeTunnel {
            centerline: curve.sample(segments),
            radius,
        })
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// segments iterates over the closed centerline polyline.
    fn segments(&self) -> impl Iterator<Item = (DVec3, DVec3)> + '_ {
        let n = self.centerline.len();
        (0..n).map(move |i| (self.centerline[i], self.centerline[(i + 1) % n]))
    }

    /// closest_centerline_point returns the point on the centerline polyline closest to position.
    fn closest_centerline_point(&self, position: DVec3) -> DVec3 {
        let mut best = self.centerline[0];
        let mut best_dist = f64::INFINITY;

        for (a, b) in self.segments() {
            let c = closest_point_on_segment(position, a, b);
            let d = c.distance_squared(position);
            if d < best_dist {
                best_dist = d;
                best = c;
            }
        }

        best
    }
}

impl Containment for TubeTunnel {
    fn probe(&self, position: DVec3) -> bool {
        // a vertical ray meets the tube if the craft lies inside its footprint on the ground plane
        let p = DVec2::new(position.x, position.z);
        let r2 = self.radius * self.radius;

        self.segments().any(|(a, b)| {
            let c = closest_point_on_segment_2d(p, DVec2::new(a.x, a.z), DVec2::new(b.x, b.z));
            c.distance_squared(p) <= r2
        })
    }

    fn closest_surface_point(&self, position: DVec3) -> DVec3 {
        let center = self.closest_centerline_point(position);
        let dir = (position - center).normalize_or_zero();
        let dir = if dir == DVec3::ZERO { DVec3::Y } else { dir };
        center + dir * self.radius
    }
}

fn closest_point_on_segment(p: DVec3, a: DVec3, b: DVec3) -> DVec3 {
    let ab = b - a;
    let len2 = ab.length_squared();
    if len2 <= f64::EPSILON {
        return a;
    }
    let s = ((p - a).dot(ab) / len2).clamp(0.0, 1.0);
    a + ab * s
}

fn closest_point_on_segment_2d(p: DVec2, a: DVec2, b: DVec2) -> DVec2 {
    let ab = b - a;
    let len2 = ab.length_squared();
    if len2 <= f64::EPSILON {
        return a;
    }
    let s = ((p - a).dot(ab) / len2).clamp(0.0, 1.0);
    a + ab * s
}
