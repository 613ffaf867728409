//! `PhysicalSphere`: a point-mass soma. Free functions over a
//! `hecs::World` entity carrying `ObjectCore` + `SphereState` (+
//! `NodeRecord` for its triangulation site), rather than a class
//! hierarchy.

use hecs::{Entity, World};
use rand::Rng;

use crate::components::{CylinderState, ObjectCore, SphereState};
use crate::error::{SimError, SimResult};
use crate::force::{DefaultForce, ForceResult, InterObjectForce, SphereGeometry};
use crate::geometry::Vec3;
use crate::node::NodeRecord;
use crate::physical_cylinder;

const MIN_DIAMETER: f64 = 0.5;

pub fn volume_of_diameter(diameter: f64) -> f64 {
    std::f64::consts::FRAC_PI_6 * diameter.powi(3)
}

pub fn diameter_of_volume(volume: f64) -> f64 {
    (volume / std::f64::consts::FRAC_PI_6).max(0.0).cbrt()
}

/// Spawn a new sphere entity with its own `NodeRecord` (so it can be
/// inserted into the triangulation by the caller) and default `SphereState`.
pub fn spawn(world: &mut World, position: Vec3, diameter: f64, mass: f64, adherence: f64) -> Entity {
    let mut core = ObjectCore::new(position, diameter, mass, adherence);
    core.volume = volume_of_diameter(diameter);
    world.spawn((core, SphereState::default(), NodeRecord::default()))
}

/// `change_volume`/`change_diameter`: integrate size over `dt`,
/// clip to a minimum, and refresh the diameter/volume pair in lockstep.
pub fn change_volume(world: &mut World, sphere: Entity, speed: f64, dt: f64) -> SimResult<()> {
    let mut core = world.get::<&mut ObjectCore>(sphere).map_err(|_| SimError::EntityNotFound)?;
    let new_volume = (core.volume + speed * dt).max(volume_of_diameter(MIN_DIAMETER));
    core.volume = new_volume;
    core.diameter = diameter_of_volume(new_volume);
    Ok(())
}

pub fn change_diameter(world: &mut World, sphere: Entity, speed: f64, dt: f64) -> SimResult<()> {
    let mut core = world.get::<&mut ObjectCore>(sphere).map_err(|_| SimError::EntityNotFound)?;
    let new_diameter = (core.diameter + speed * dt).max(MIN_DIAMETER);
    core.diameter = new_diameter;
    core.volume = volume_of_diameter(new_diameter);
    Ok(())
}

/// `add_new_physical_cylinder`: create a daughter neurite
/// segment starting at the sphere surface along local direction (phi,
/// theta), with `sphere` installed as its mother. Does not touch the
/// triangulation; the caller inserts the returned entity's `NodeRecord`.
pub fn add_new_physical_cylinder(
    world: &mut World,
    sphere: Entity,
    length: f64,
    phi: f64,
    theta: f64,
    default_diameter: f64,
    default_tension: f64,
    spring_constant: f64,
) -> SimResult<Entity> {
    let local_dir = ObjectCore::polar_to_local(1.0, phi, theta).normalize();
    let (origin, mother_volume) = {
        let core = world.get::<&ObjectCore>(sphere).map_err(|_| SimError::EntityNotFound)?;
        (core.local_to_global(local_dir * (core.diameter * 0.5)), core.volume)
    };
    let _ = mother_volume;
    let global_dir = {
        let core = world.get::<&ObjectCore>(sphere).map_err(|_| SimError::EntityNotFound)?;
        core.local_axes().mul_vec(local_dir)
    };
    let spring_axis = global_dir * length;
    let resting_length = length / (1.0 + default_tension / spring_constant.max(1e-9));

    let mass_location = origin + spring_axis;
    let mut core = ObjectCore::new(mass_location, default_diameter, 1.0, 0.1);
    core.volume = physical_cylinder::volume_of(default_diameter, length);
    let cyl_state = CylinderState::new(sphere, spring_axis, resting_length, spring_constant);
    let cylinder = world.spawn((core, cyl_state, NodeRecord::default()));

    {
        let mut sphere_state = world.get::<&mut SphereState>(sphere).map_err(|_| SimError::EntityNotFound)?;
        sphere_state.daughters.push(cylinder);
        sphere_state.set_attachment(cylinder, local_dir);
    }
    Ok(cylinder)
}

/// `divide`: split this sphere into two, radii satisfying
/// `r1^3 + r2^3 = r^3`, `r2^3/r1^3 = vr`; centers displaced so the
/// center of mass is unchanged; intracellular substances partitioned by
/// each substance's `partition_ratio`. Returns the new (second) sphere.
pub fn divide(world: &mut World, sphere: Entity, vr: f64, phi: f64, theta: f64) -> SimResult<Entity> {
    let (center, r, adherence, mass) = {
        let core = world.get::<&ObjectCore>(sphere).map_err(|_| SimError::EntityNotFound)?;
        (core.mass_location, core.diameter * 0.5, core.adherence, core.mass)
    };
    let r3 = r.powi(3);
    let r2_3 = vr * r3 / (1.0 + vr);
    let r1_3 = r3 - r2_3;
    let r1 = r1_3.max(0.0).cbrt();
    let r2 = r2_3.max(0.0).cbrt();

    let direction = ObjectCore::polar_to_local(1.0, phi, theta).normalize();
    let global_dir = {
        let core = world.get::<&ObjectCore>(sphere).map_err(|_| SimError::EntityNotFound)?;
        core.local_axes().mul_vec(direction)
    };
    // Displace each center inversely proportional to its volume so the
    // center of mass stays fixed: d1*v1 = d2*v2 (opposite signs).
    let v1 = r1.powi(3);
    let v2 = r2.powi(3);
    let total = (v1 + v2).max(1e-12);
    let offset1 = global_dir * (-v2 / total * r);
    let offset2 = global_dir * (v1 / total * r);

    let new_diameter2 = 2.0 * r2;
    let mut new_core = ObjectCore::new(center + offset2, new_diameter2, mass * v2 / (v1 + v2).max(1e-12), adherence);
    new_core.volume = volume_of_diameter(new_diameter2);
    let daughter = world.spawn((new_core, SphereState::default(), NodeRecord::default()));

    {
        let mut core = world.get::<&mut ObjectCore>(sphere).map_err(|_| SimError::EntityNotFound)?;
        core.mass_location = center + offset1;
        core.diameter = 2.0 * r1;
        core.volume = volume_of_diameter(core.diameter);
    }

    partition_intracellular(world, sphere, daughter)?;
    Ok(daughter)
}

fn partition_intracellular(world: &mut World, original: Entity, daughter: Entity) -> SimResult<()> {
    let (new_vol_a, new_vol_b) = {
        let a = world.get::<&ObjectCore>(original).map_err(|_| SimError::EntityNotFound)?;
        let b = world.get::<&ObjectCore>(daughter).map_err(|_| SimError::EntityNotFound)?;
        (a.volume, b.volume)
    };
    let entries: Vec<(String, f64, f64)> = {
        let mut core = world.get::<&mut ObjectCore>(original).map_err(|_| SimError::EntityNotFound)?;
        core.intracellular
            .iter()
            .map(|(id, s)| (id.clone(), s.substance.quantity, s.partition_ratio))
            .collect()
    };
    for (id, total_q, ratio) in entries {
        let q_a = total_q * ratio;
        let q_b = total_q * (1.0 - ratio);
        if let Ok(mut core) = world.get::<&mut ObjectCore>(original) {
            if let Some(s) = core.intracellular.get_mut(&id) {
                s.substance.quantity = q_a;
                s.substance.sync_concentration_from_quantity(new_vol_a.max(1e-9));
            }
        }
        let template = world
            .get::<&ObjectCore>(original)
            .ok()
            .and_then(|c| c.intracellular.get(&id).cloned());
        if let Some(mut new_s) = template {
            new_s.substance.quantity = q_b;
            new_s.substance.sync_concentration_from_quantity(new_vol_b.max(1e-9));
            if let Ok(mut core) = world.get::<&mut ObjectCore>(daughter) {
                core.intracellular.insert(id, new_s);
            }
        }
    }
    Ok(())
}

/// `run_physics`: sums tractor force, spring pull-back from
/// daughter cylinders, avoidance from triangulation neighbors (supplied
/// pre-resolved by the caller, since this module has no triangulation
/// access), wall force, and bond forces; applies the clamped displacement
/// only if it exceeds adherence.
pub fn run_physics(
    world: &mut World,
    sphere: Entity,
    tractor_force: Vec3,
    neighbor_spheres: &[(Vec3, f64)],
    wall_force: Vec3,
    bond_forces: Vec3,
    dt: f64,
    max_displacement: f64,
) -> SimResult<Vec3> {
    let (center, radius, mass, adherence, daughters) = {
        let core = world.get::<&ObjectCore>(sphere).map_err(|_| SimError::EntityNotFound)?;
        let state = world.get::<&SphereState>(sphere).map_err(|_| SimError::EntityNotFound)?;
        (core.mass_location, core.diameter * 0.5, core.mass.max(1e-9), core.adherence, state.daughters.clone())
    };

    let force_policy = DefaultForce::default();
    let mut total = tractor_force + wall_force + bond_forces;

    for &(npos, nradius) in neighbor_spheres {
        let ForceResult { force, .. } = force_policy.sphere_sphere(
            SphereGeometry { center, radius },
            SphereGeometry { center: npos, radius: nradius },
        );
        total += force;
    }

    for daughter in &daughters {
        if world.get::<&CylinderState>(*daughter).is_ok() {
            total += physical_cylinder::force_to_mother(world, *daughter)?;
        }
    }

    if total.norm() <= adherence {
        if let Ok(mut core) = world.get::<&mut ObjectCore>(sphere) {
            core.on_scheduler = false;
        }
        return Ok(Vec3::ZERO);
    }

    let mut displacement = total * (dt / mass);
    if displacement.norm() > max_displacement {
        displacement = displacement.normalize() * max_displacement;
    }

    let mut core = world.get::<&mut ObjectCore>(sphere).map_err(|_| SimError::EntityNotFound)?;
    core.mass_location += displacement;
    core.last_force = total;
    core.on_scheduler = true;
    Ok(displacement)
}

/// `run_intracellular_diffusion`: visit daughter cylinders in
/// randomized order so that, over many steps, every substance eventually
/// diffuses in both directions. `min_concentration`/`min_dc_over_c` are the
/// configured early-exit thresholds, forwarded to `diffuse_with`.
pub fn run_intracellular_diffusion(
    world: &mut World,
    sphere: Entity,
    dt: f64,
    min_concentration: f64,
    min_dc_over_c: f64,
    rng: &mut impl Rng,
) -> SimResult<()> {
    let mut daughters = world.get::<&SphereState>(sphere).map_err(|_| SimError::EntityNotFound)?.daughters.clone();
    {
        use rand::seq::SliceRandom;
        daughters.shuffle(rng);
    }
    let sphere_volume = world.get::<&ObjectCore>(sphere).map(|c| c.volume).unwrap_or(1.0);
    for daughter in daughters {
        let (daughter_volume, daughter_length, distance) = {
            let core = world.get::<&ObjectCore>(daughter).map_err(|_| SimError::EntityNotFound)?;
            let state = world.get::<&CylinderState>(daughter).map_err(|_| SimError::EntityNotFound)?;
            let sphere_center = world.get::<&ObjectCore>(sphere).map_err(|_| SimError::EntityNotFound)?.mass_location;
            (core.volume, state.actual_length, sphere_center.distance(core.mass_location))
        };
        crate::physical_object::diffuse_with(world, sphere, daughter, distance, dt, min_concentration, min_dc_over_c, move |_, e, vol_dep| {
            if e == daughter {
                if vol_dep {
                    daughter_volume
                } else {
                    daughter_length
                }
            } else {
                sphere_volume
            }
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn volume_diameter_round_trip() {
        let d = 12.3;
        let v = volume_of_diameter(d);
        assert!((diameter_of_volume(v) - d).abs() < 1e-9);
    }

    #[test]
    fn divide_conserves_cubic_volume() {
        let mut world = World::new();
        let e = spawn(&mut world, Vec3::ZERO, 10.0, 1.0, 0.1);
        let r = 5.0_f64;
        let daughter = divide(&mut world, e, 1.0, 0.0, std::f64::consts::FRAC_PI_2).unwrap();
        let r1 = world.get::<&ObjectCore>(e).unwrap().diameter / 2.0;
        let r2 = world.get::<&ObjectCore>(daughter).unwrap().diameter / 2.0;
        assert!((r1.powi(3) + r2.powi(3) - r.powi(3)).abs() < 1e-6);
    }

    #[test]
    fn physics_below_adherence_does_not_move() {
        let mut world = World::new();
        let e = spawn(&mut world, Vec3::ZERO, 10.0, 1.0, 100.0);
        let disp = run_physics(&mut world, e, Vec3::new(0.01, 0.0, 0.0), &[], Vec3::ZERO, Vec3::ZERO, 0.1, 5.0).unwrap();
        assert_eq!(disp, Vec3::ZERO);
    }
}
