//! Substance templates and instances.
//!
//! A `Substance` is the extracellular kind living on a `PhysicalNode`; an
//! `IntracellularSubstance` is the membrane/cytoplasmic kind living on a
//! `PhysicalObject`. Both share the invariant `quantity == concentration *
//! owner_volume`; the two differ in what "owner_volume" means (Voronoi
//! volume vs. the object's own volume or length) and in a couple of extra
//! flags the intracellular kind carries.

use serde::{Deserialize, Serialize};

/// Reserved substance id that always reads as concentration 1.0 ("unit"),
/// useful as a sentinel for rules that don't key off a real chemical field.
pub const UNIT_SUBSTANCE_ID: &str = "U";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Substance {
    pub id: String,
    pub color: [f32; 4],
    /// Diffusion constant D >= 0.
    pub diffusion_constant: f64,
    /// Degradation constant d >= 0.
    pub degradation_constant: f64,
    pub concentration: f64,
    pub quantity: f64,
}

impl Substance {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            color: [1.0, 1.0, 1.0, 1.0],
            diffusion_constant: 1000.0,
            degradation_constant: 0.0,
            concentration: 0.0,
            quantity: 0.0,
        }
    }

    pub fn with_diffusion(mut self, d: f64) -> Self {
        self.diffusion_constant = d;
        self
    }

    pub fn with_degradation(mut self, d: f64) -> Self {
        self.degradation_constant = d;
        self
    }

    /// Recompute `quantity` from `concentration` given the current owner
    /// volume, preserving the `Q = C * V` invariant.
    pub fn sync_quantity_from_concentration(&mut self, owner_volume: f64) {
        self.quantity = self.concentration * owner_volume;
    }

    /// Recompute `concentration` from `quantity` given the current owner
    /// volume.
    pub fn sync_concentration_from_quantity(&mut self, owner_volume: f64) {
        self.concentration = if owner_volume > 1e-14 {
            self.quantity / owner_volume
        } else {
            0.0
        };
    }

    /// Exponential decay over one step of length `dt`: `Q *= exp(-d*dt)`,
    /// then `C` is refreshed from the (unchanged) owner volume.
    pub fn degrade(&mut self, dt: f64, owner_volume: f64) {
        if self.degradation_constant > 1e-14 {
            self.quantity *= (-self.degradation_constant * dt).exp();
            self.sync_concentration_from_quantity(owner_volume);
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntracellularSubstance {
    pub substance: Substance,
    /// Whether neighbors may sense this substance as if it were
    /// extracellular.
    pub visible_from_outside: bool,
    /// When false, quantity scales with length (cylinders) rather than
    /// volume.
    pub volume_dependent: bool,
    /// Asymmetric partitioning ratio used at soma division: the fraction
    /// of quantity retained by the "first" daughter (the one returned by
    /// `PhysicalSphere::divide`'s caller as the original entity).
    pub partition_ratio: f64,
}

impl IntracellularSubstance {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            substance: Substance::new(id),
            visible_from_outside: false,
            volume_dependent: true,
            partition_ratio: 0.5,
        }
    }

    pub fn id(&self) -> &str {
        &self.substance.id
    }

    /// The denominator to use for `Q = C * owner_scale`: a volume for
    /// volume-dependent substances, the physical object's length otherwise.
    pub fn owner_scale(&self, volume: f64, length: f64) -> f64 {
        if self.volume_dependent { volume } else { length }
    }
}

/// Solve the analytic two-reservoir diffusion of §4.F between quantities
/// `q_a`/`q_b` held in volumes `v_a`/`v_b`, `distance` apart, over `dt`.
/// Returns the new `(q_a, q_b)`. Skips (returns the inputs unchanged) when
/// `diffusion_constant` is negligible.
pub fn diffuse_two_reservoirs(
    diffusion_constant: f64,
    distance: f64,
    v_a: f64,
    v_b: f64,
    q_a: f64,
    q_b: f64,
    dt: f64,
) -> (f64, f64) {
    if diffusion_constant < 1e-14 || distance < 1e-14 {
        return (q_a, q_b);
    }
    let q_tot = q_a + q_b;
    let a = diffusion_constant / distance;
    let m = a * (1.0 / v_a + 1.0 / v_b);
    let n = a * q_tot / v_b;
    if m.abs() < 1e-14 {
        return (q_a, q_b);
    }
    let k = q_a - n / m;
    let new_q_a = k * (-m * dt).exp() + n / m;
    let new_q_b = q_tot - new_q_a;
    (new_q_a, new_q_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diffusion_conserves_total_quantity() {
        let (qa, qb) = diffuse_two_reservoirs(500.0, 10.0, 4.0, 6.0, 8.0, 2.0, 0.01);
        assert!(((qa + qb) - 10.0).abs() < 1e-9);
    }

    #[test]
    fn diffusion_moves_toward_equal_concentration_over_many_steps() {
        let mut q_a = 10.0_f64;
        let mut q_b = 0.0_f64;
        let (v_a, v_b, d, dist) = (5.0, 5.0, 800.0, 10.0);
        for _ in 0..500 {
            let (na, nb) = diffuse_two_reservoirs(d, dist, v_a, v_b, q_a, q_b, 0.01);
            q_a = na;
            q_b = nb;
        }
        assert!((q_a - q_b).abs() < 1e-3);
    }

    #[test]
    fn zero_diffusion_constant_is_a_no_op() {
        let (qa, qb) = diffuse_two_reservoirs(0.0, 10.0, 4.0, 6.0, 8.0, 2.0, 0.01);
        assert_eq!((qa, qb), (8.0, 2.0));
    }

    #[test]
    fn degrade_applies_exponential_decay() {
        let mut s = Substance::new("A").with_degradation(1.0);
        s.quantity = 1.0;
        s.degrade(1.0, 1.0);
        assert!((s.quantity - (-1.0_f64).exp()).abs() < 1e-12);
    }
}
