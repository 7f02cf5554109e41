use glam::{DMat3, DQuat, DVec3};
use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box in world coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: DVec3,
    pub max: DVec3,
}

impl Aabb {
    pub fn from_center_half_extents(center: DVec3, half_extents: DVec3) -> Aabb {
        let half_extents = half_extents.abs();
        Aabb {
            min: center - half_extents,
            max: center + half_extents,
        }
    }

    /// from_oriented returns the world-space box enclosing a box with the given half extents that
    /// is rotated by orientation and centred at center.
    pub fn from_oriented(center: DVec3, half_extents: DVec3, orientation: DQuat) -> Aabb {
        let rot = DMat3::from_quat(orientation);
        let h = half_extents.abs();
        let extent = rot.x_axis.abs() * h.x + rot.y_axis.abs() * h.y + rot.z_axis.abs() * h.z;
        Aabb::from_center_half_extents(center, extent)
    }

    /// intersects returns true if both boxes overlap, touching faces count as overlap.
    pub fn intersects(&self, other: &Aabb) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    pub fn contains_point(&self, p: DVec3) -> bool {
        p.cmpge(self.min).all() && p.cmple(self.max).all()
    }

    pub fn center(&self) -> DVec3 {
        (self.min + self.max) * 0.5
    }
}
