//! Pairwise inter-object force policy, covering the four standard
//! repulsion/adhesion variants between spheres and cylinders.

use crate::geometry::Vec3;

/// A force result: the vector applied, split between the two endpoints.
/// `proximal_share` is in `[0, 1]`: the fraction transmitted to the first
/// (proximal, for a cylinder) endpoint; the remainder applies to the
/// second. Spheres ignore the split and take the whole vector.
#[derive(Debug, Clone, Copy, Default)]
pub struct ForceResult {
    pub force: Vec3,
    pub proximal_share: f64,
}

impl ForceResult {
    pub fn whole(force: Vec3) -> Self {
        Self { force, proximal_share: 1.0 }
    }

    pub fn zero() -> Self {
        Self { force: Vec3::ZERO, proximal_share: 1.0 }
    }
}

/// A moving endpoint's instantaneous geometry, enough to evaluate any of
/// the four pairwise force variants against it.
#[derive(Debug, Clone, Copy)]
pub struct SphereGeometry {
    pub center: Vec3,
    pub radius: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct CylinderGeometry {
    pub proximal: Vec3,
    pub distal: Vec3,
    pub radius: f64,
}

pub trait InterObjectForce: Send + Sync {
    fn sphere_sphere(&self, a: SphereGeometry, b: SphereGeometry) -> ForceResult;
    fn sphere_cylinder(&self, sphere: SphereGeometry, cylinder: CylinderGeometry) -> ForceResult;
    fn cylinder_cylinder(&self, a: CylinderGeometry, b: CylinderGeometry) -> ForceResult;

    fn cylinder_sphere(&self, cylinder: CylinderGeometry, sphere: SphereGeometry) -> ForceResult {
        let r = self.sphere_cylinder(sphere, cylinder);
        ForceResult { force: r.force * -1.0, proximal_share: 1.0 - r.proximal_share }
    }
}

/// Smoothed hard repulsion plus short-range adhesion.
pub struct DefaultForce {
    pub repulsion_k: f64,
    pub adhesion_gamma: f64,
    pub adhesion_range: f64,
}

impl Default for DefaultForce {
    fn default() -> Self {
        Self { repulsion_k: 2.0, adhesion_gamma: 1.0, adhesion_range: 0.0 }
    }
}

impl DefaultForce {
    /// `F = (k*delta - gamma*sqrt(r*delta)) / |c1-c2| * (c1-c2)` for
    /// overlap `delta = r1 + r2 - |c1-c2|`, harmonic radius
    /// `r = r1*r2/(r1+r2)`.
    fn sphere_sphere_vector(&self, c1: Vec3, r1: f64, c2: Vec3, r2: f64) -> Vec3 {
        let d = c1 - c2;
        let dist = d.norm();
        let delta = r1 + r2 - dist;
        let adhesive_delta = delta.max(-self.adhesion_range);
        if adhesive_delta <= 0.0 && delta <= -self.adhesion_range {
            return Vec3::ZERO;
        }
        let r = if r1 + r2 > 1e-12 { r1 * r2 / (r1 + r2) } else { 0.0 };
        let magnitude = if delta >= 0.0 {
            self.repulsion_k * delta - self.adhesion_gamma * (r * delta).max(0.0).sqrt()
        } else {
            -self.adhesion_gamma * (r * adhesive_delta.max(0.0)).sqrt()
        };
        if dist < 1e-12 {
            return Vec3::ZERO;
        }
        d * (magnitude / dist)
    }

    /// Closest point on segment `[a,b]` to `p`, clamped to `[0,1]`.
    fn closest_point_on_segment(p: Vec3, a: Vec3, b: Vec3) -> (Vec3, f64) {
        let ab = b - a;
        let len2 = ab.norm_squared();
        if len2 < 1e-14 {
            return (a, 0.0);
        }
        let t = ((p - a).dot(ab) / len2).clamp(0.0, 1.0);
        (a + ab * t, t)
    }

    /// Closest points between two segments, via the standard
    /// Catmull-style clamped projection.
    fn closest_points_between_segments(p1: Vec3, q1: Vec3, p2: Vec3, q2: Vec3) -> (Vec3, Vec3, f64, f64) {
        let d1 = q1 - p1;
        let d2 = q2 - p2;
        let r = p1 - p2;
        let a = d1.norm_squared();
        let e = d2.norm_squared();
        let f = d2.dot(r);

        if a < 1e-14 && e < 1e-14 {
            return (p1, p2, 0.0, 0.0);
        }
        let (mut s, mut t);
        if a < 1e-14 {
            s = 0.0;
            t = (f / e).clamp(0.0, 1.0);
        } else {
            let c = d1.dot(r);
            if e < 1e-14 {
                t = 0.0;
                s = (-c / a).clamp(0.0, 1.0);
            } else {
                let b = d1.dot(d2);
                let denom = a * e - b * b;
                s = if denom.abs() > 1e-14 { ((b * f - c * e) / denom).clamp(0.0, 1.0) } else { 0.0 };
                t = (b * s + f) / e;
                if t < 0.0 {
                    t = 0.0;
                    s = (-c / a).clamp(0.0, 1.0);
                } else if t > 1.0 {
                    t = 1.0;
                    s = ((b - c) / a).clamp(0.0, 1.0);
                }
            }
        }
        (p1 + d1 * s, p2 + d2 * t, s, t)
    }
}

impl InterObjectForce for DefaultForce {
    fn sphere_sphere(&self, a: SphereGeometry, b: SphereGeometry) -> ForceResult {
        ForceResult::whole(self.sphere_sphere_vector(a.center, a.radius, b.center, b.radius))
    }

    fn sphere_cylinder(&self, sphere: SphereGeometry, cylinder: CylinderGeometry) -> ForceResult {
        let (closest, t) = Self::closest_point_on_segment(sphere.center, cylinder.proximal, cylinder.distal);
        let force = self.sphere_sphere_vector(sphere.center, sphere.radius, closest, cylinder.radius);
        // share applied to the proximal end is the complement of how far
        // along the segment the contact point sits.
        ForceResult { force: force * -1.0, proximal_share: 1.0 - t }
    }

    fn cylinder_cylinder(&self, a: CylinderGeometry, b: CylinderGeometry) -> ForceResult {
        let (pa, pb, s, _t) = Self::closest_points_between_segments(a.proximal, a.distal, b.proximal, b.distal);
        let force = self.sphere_sphere_vector(pa, a.radius, pb, b.radius);
        ForceResult { force, proximal_share: 1.0 - s }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlapping_spheres_repel() {
        let force = DefaultForce::default();
        let a = SphereGeometry { center: Vec3::new(0.0, 0.0, 0.0), radius: 5.0 };
        let b = SphereGeometry { center: Vec3::new(3.0, 0.0, 0.0), radius: 5.0 };
        let r = force.sphere_sphere(a, b);
        assert!(r.force.x < 0.0, "a should be pushed away from b, toward -x");
    }

    #[test]
    fn distant_spheres_feel_no_repulsion() {
        let force = DefaultForce::default();
        let a = SphereGeometry { center: Vec3::new(0.0, 0.0, 0.0), radius: 1.0 };
        let b = SphereGeometry { center: Vec3::new(100.0, 0.0, 0.0), radius: 1.0 };
        let r = force.sphere_sphere(a, b);
        assert!(r.force.norm() < 1e-9);
    }

    #[test]
    fn sphere_cylinder_projects_onto_segment() {
        let force = DefaultForce::default();
        let sphere = SphereGeometry { center: Vec3::new(5.0, 2.0, 0.0), radius: 3.0 };
        let cyl = CylinderGeometry { proximal: Vec3::new(0.0, 0.0, 0.0), distal: Vec3::new(10.0, 0.0, 0.0), radius: 1.0 };
        let r = force.sphere_cylinder(sphere, cyl);
        assert!(r.proximal_share >= 0.0 && r.proximal_share <= 1.0);
    }

    #[test]
    fn cylinder_cylinder_closest_points_clamped() {
        let a = CylinderGeometry { proximal: Vec3::new(0.0, 0.0, 0.0), distal: Vec3::new(10.0, 0.0, 0.0), radius: 1.0 };
        let b = CylinderGeometry { proximal: Vec3::new(5.0, 5.0, 0.0), distal: Vec3::new(5.0, -5.0, 1.0), radius: 1.0 };
        let force = DefaultForce::default();
        let r = force.cylinder_cylinder(a, b);
        assert!(r.proximal_share >= 0.0 && r.proximal_share <= 1.0);
    }
}
