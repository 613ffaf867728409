//! Shared `PhysicalObject` behavior: cross-object
//! intracellular diffusion and physical-bond bookkeeping, operating on
//! whichever entity carries `ObjectCore` (sphere or cylinder).

use hecs::{Entity, World};

use crate::components::{Excrescence, ExcrescenceKind, ObjectCore, PhysicalBond};
use crate::error::{SimError, SimResult};
use crate::geometry::Vec3;
use crate::substance::diffuse_two_reservoirs;

/// Volume (or, for a cylinder, a length-scaled proxy) used as `V` in the
/// two-reservoir diffusion solve. Callers pass the cylinder's
/// `actual_length` for `volume_dependent == false` substances and the true
/// volume otherwise. `min_concentration`/`min_dc_over_c` are the configured
/// early-exit thresholds: diffusion is skipped for a substance whose
/// `|C_A - C_B|` is below `min_concentration`, or whose ratio to the larger
/// of the two concentrations is below `min_dc_over_c`.
pub fn diffuse_with(
    world: &mut World,
    a: Entity,
    b: Entity,
    distance: f64,
    dt: f64,
    min_concentration: f64,
    min_dc_over_c: f64,
    volume_of: impl Fn(&World, Entity, bool) -> f64,
) -> SimResult<()> {
    if distance < 1e-12 {
        return Ok(());
    }
    let ids: Vec<String> = {
        let core_a = world.get::<&ObjectCore>(a).map_err(|_| SimError::EntityNotFound)?;
        core_a.intracellular.keys().cloned().collect()
    };

    for id in ids {
        let Some((d, deg, volume_dependent, q_a, v_a)) = (|| -> Option<(f64, f64, bool, f64, f64)> {
            let core_a = world.get::<&ObjectCore>(a).ok()?;
            let s = core_a.intracellular.get(&id)?;
            Some((
                s.substance.diffusion_constant,
                s.substance.degradation_constant,
                s.volume_dependent,
                s.substance.quantity,
                0.0,
            ))
        })() else {
            continue;
        };
        let _ = deg;
        if d < 1e-14 {
            continue;
        }
        let v_a = if v_a == 0.0 { volume_of(world, a, volume_dependent) } else { v_a };
        let v_b = volume_of(world, b, volume_dependent);

        let q_b = {
            let core_b = world.get::<&ObjectCore>(b).map_err(|_| SimError::EntityNotFound)?;
            core_b.intracellular.get(&id).map(|s| s.substance.quantity).unwrap_or(0.0)
        };

        let c_a = q_a / v_a.max(1e-9);
        let c_b = q_b / v_b.max(1e-9);
        let dc = (c_a - c_b).abs();
        if dc < min_concentration {
            continue;
        }
        let c_max = c_a.max(c_b);
        if c_max > 1e-12 && dc / c_max < min_dc_over_c {
            continue;
        }

        let (new_q_a, new_q_b) = diffuse_two_reservoirs(d, distance, v_a.max(1e-9), v_b.max(1e-9), q_a, q_b, dt);

        if let Ok(mut core_a) = world.get::<&mut ObjectCore>(a) {
            if let Some(s) = core_a.intracellular.get_mut(&id) {
                s.substance.quantity = new_q_a.max(0.0);
                s.substance.sync_concentration_from_quantity(v_a.max(1e-9));
            }
        }
        if let Ok(mut core_b) = world.get::<&mut ObjectCore>(b) {
            let entry = core_b.intracellular.entry(id.clone()).or_insert_with(|| {
                crate::substance::IntracellularSubstance::new(&id)
            });
            entry.substance.quantity = new_q_b.max(0.0);
            entry.substance.sync_concentration_from_quantity(v_b.max(1e-9));
        }
    }
    Ok(())
}

/// Attach a new `PhysicalBond` entity linking `a` and `b`, recording it on
/// both endpoints' `ObjectCore.bonds`.
pub fn attach_bond(world: &mut World, a: Entity, b: Entity, resting_length: f64, k: f64, damping: f64) -> SimResult<Entity> {
    let origin_on_a = world.get::<&ObjectCore>(a).map(|c| c.mass_location).unwrap_or(Vec3::ZERO);
    let origin_on_b = world.get::<&ObjectCore>(b).map(|c| c.mass_location).unwrap_or(Vec3::ZERO);
    let bond = world.spawn((PhysicalBond {
        a,
        b,
        origin_on_a,
        origin_on_b,
        resting_length,
        spring_constant: k,
        damping,
        one_sided: false,
        sliding: None,
    },));
    if let Ok(mut core) = world.get::<&mut ObjectCore>(a) {
        core.bonds.push(bond);
    }
    if let Ok(mut core) = world.get::<&mut ObjectCore>(b) {
        core.bonds.push(bond);
    }
    Ok(bond)
}

/// Remove a bond symmetrically from both its endpoints and despawn it.
pub fn remove_bond(world: &mut World, bond: Entity) -> SimResult<()> {
    let (a, b) = {
        let b_ref = world.get::<&PhysicalBond>(bond).map_err(|_| SimError::EntityNotFound)?;
        (b_ref.a, b_ref.b)
    };
    if let Ok(mut core) = world.get::<&mut ObjectCore>(a) {
        core.bonds.retain(|&e| e != bond);
    }
    if let Ok(mut core) = world.get::<&mut ObjectCore>(b) {
        core.bonds.retain(|&e| e != bond);
    }
    world.despawn(bond).map_err(|_| SimError::EntityNotFound)?;
    Ok(())
}

/// Attach a bond whose contact point on `cylinder_side` is free to slide
/// along that cylinder's axis (§4.F "sliding" bonds), starting at
/// `coordinate` in `[0, 1]` of its `actual_length`.
pub fn attach_sliding_bond(
    world: &mut World,
    cylinder_side: Entity,
    other: Entity,
    coordinate: f64,
    resting_length: f64,
    k: f64,
    damping: f64,
) -> SimResult<Entity> {
    let bond = attach_bond(world, cylinder_side, other, resting_length, k, damping)?;
    let mut b = world.get::<&mut PhysicalBond>(bond).map_err(|_| SimError::EntityNotFound)?;
    b.sliding = Some(crate::components::SlidingState { cylinder: cylinder_side, coordinate: coordinate.clamp(0.0, 1.0) });
    Ok(bond)
}

/// Recompute a sliding bond's contact point after its cylinder has moved:
/// project the other endpoint onto the cylinder's axis and store the
/// fraction as the new sliding coordinate. If that fraction falls outside
/// `[0, 1]`, the bond migrates atomically to the neighboring cylinder
/// (the mother if it slid below 0, `daughter_left` if above 1) so the bond
/// stays alive rather than snapping at the cylinder's ends.
pub fn update_sliding_bond(world: &mut World, bond: Entity) -> SimResult<()> {
    let Some((cylinder, other)) = (|| {
        let b = world.get::<&PhysicalBond>(bond).ok()?;
        let s = b.sliding?;
        Some((s.cylinder, b.other(s.cylinder)?))
    })() else {
        return Ok(());
    };

    let Ok(state) = world.get::<&crate::components::CylinderState>(cylinder) else { return Ok(()) };
    let axis = state.spring_axis;
    let length = state.actual_length.max(1e-9);
    let mother = state.mother;
    let daughter_left = state.daughter_left;
    drop(state);

    let proximal = crate::physical_cylinder::proximal_end(world, cylinder)?;
    let other_pos = world.get::<&ObjectCore>(other).map_err(|_| SimError::EntityNotFound)?.mass_location;
    let fraction = (other_pos - proximal).dot(axis) / (length * length);

    if (0.0..=1.0).contains(&fraction) {
        let contact = proximal + axis * fraction;
        let mut b = world.get::<&mut PhysicalBond>(bond).map_err(|_| SimError::EntityNotFound)?;
        b.sliding = Some(crate::components::SlidingState { cylinder, coordinate: fraction });
        if b.a == cylinder {
            b.origin_on_a = contact;
        } else {
            b.origin_on_b = contact;
        }
        return Ok(());
    }

    let target = if fraction < 0.0 { Some(mother) } else { daughter_left };
    let Some(target) = target.filter(|&t| world.contains(t)) else {
        // No neighbor to migrate to: clamp in place rather than drop the bond.
        let mut b = world.get::<&mut PhysicalBond>(bond).map_err(|_| SimError::EntityNotFound)?;
        b.sliding = Some(crate::components::SlidingState { cylinder, coordinate: fraction.clamp(0.0, 1.0) });
        return Ok(());
    };

    let new_coordinate = if fraction < 0.0 { 1.0 + fraction } else { fraction - 1.0 };
    let mut b = world.get::<&mut PhysicalBond>(bond).map_err(|_| SimError::EntityNotFound)?;
    if b.a == cylinder {
        b.a = target;
    } else {
        b.b = target;
    }
    b.sliding = Some(crate::components::SlidingState { cylinder: target, coordinate: new_coordinate.clamp(0.0, 1.0) });
    drop(b);

    if let Ok(mut core) = world.get::<&mut ObjectCore>(cylinder) {
        core.bonds.retain(|&e| e != bond);
    }
    if let Ok(mut core) = world.get::<&mut ObjectCore>(target) {
        core.bonds.push(bond);
    }
    Ok(())
}

/// Spawn a new unpaired `Excrescence` on `owner` at `local_coord` along its
/// axis. `owner` must already carry
/// `ObjectCore`.
pub fn add_excrescence(world: &mut World, owner: Entity, kind: ExcrescenceKind, local_coord: f64) -> SimResult<Entity> {
    let ex = world.spawn((Excrescence::new(owner, kind, local_coord),));
    let mut core = world.get::<&mut ObjectCore>(owner).map_err(|_| SimError::EntityNotFound)?;
    core.excrescences.push(ex);
    Ok(ex)
}

/// Pair a bouton with a spine into a synapse: records each as the other's `peer`, and, when `bond`
/// is set, additionally attaches a `PhysicalBond` between their owners so
/// mechanics keeps the pair together. Errors if either is already paired
/// or if they are not opposite kinds.
pub fn synapse_with(world: &mut World, bouton: Entity, spine: Entity, bond: bool) -> SimResult<Option<Entity>> {
    let (bouton_owner, spine_owner) = {
        let b = world.get::<&Excrescence>(bouton).map_err(|_| SimError::EntityNotFound)?;
        let s = world.get::<&Excrescence>(spine).map_err(|_| SimError::EntityNotFound)?;
        if b.is_paired() || s.is_paired() {
            return Err(SimError::InvariantViolation("excrescence is already paired".into()));
        }
        if b.kind != ExcrescenceKind::Bouton || s.kind != ExcrescenceKind::Spine {
            return Err(SimError::InvariantViolation("synapse requires one bouton and one spine".into()));
        }
        (b.owner, s.owner)
    };

    {
        let mut b = world.get::<&mut Excrescence>(bouton).map_err(|_| SimError::EntityNotFound)?;
        b.peer = Some(spine);
    }
    {
        let mut s = world.get::<&mut Excrescence>(spine).map_err(|_| SimError::EntityNotFound)?;
        s.peer = Some(bouton);
    }

    if !bond {
        return Ok(None);
    }
    let resting_length = world
        .get::<&ObjectCore>(bouton_owner)
        .ok()
        .zip(world.get::<&ObjectCore>(spine_owner).ok())
        .map(|(a, b)| a.mass_location.distance(b.mass_location))
        .unwrap_or(0.0);
    Ok(Some(attach_bond(world, bouton_owner, spine_owner, resting_length, 1.0, 0.1)?))
}

/// Sum of every `PhysicalBond` force currently acting on `entity`.
/// `velocity` feeds the damping term; callers without a tracked velocity
/// may pass `Vec3::ZERO` to get the spring term alone.
pub fn total_bond_force(world: &World, entity: Entity, velocity: Vec3) -> Vec3 {
    let Ok(core) = world.get::<&ObjectCore>(entity) else { return Vec3::ZERO };
    let bonds = core.bonds.clone();
    drop(core);
    bonds.iter().filter_map(|&b| bond_force(world, b, entity, velocity).ok()).fold(Vec3::ZERO, |acc, f| acc + f)
}

/// Linear spring-with-damping force a bond exerts on `on`, pulling it
/// toward the other endpoint's current attachment point.
pub fn bond_force(world: &World, bond: Entity, on: Entity, velocity: Vec3) -> SimResult<Vec3> {
    let b = world.get::<&PhysicalBond>(bond).map_err(|_| SimError::EntityNotFound)?;
    let other = b.other(on).ok_or(SimError::InvariantViolation("entity is not an endpoint of this bond".into()))?;
    let pos_on = world.get::<&ObjectCore>(on).map_err(|_| SimError::EntityNotFound)?.mass_location;
    let pos_other = world.get::<&ObjectCore>(other).map_err(|_| SimError::EntityNotFound)?.mass_location;
    let delta = pos_other - pos_on;
    let length = delta.norm();
    if length < 1e-12 {
        return Ok(Vec3::ZERO);
    }
    let direction = delta * (1.0 / length);
    let spring = direction * (b.spring_constant * (length - b.resting_length));
    let damping = direction * (-b.damping * velocity.dot(direction));
    Ok(spring + damping)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::substance::IntracellularSubstance;

    fn spawn_object(world: &mut World, pos: Vec3) -> Entity {
        world.spawn((ObjectCore::new(pos, 10.0, 1.0, 0.1),))
    }

    #[test]
    fn diffusion_moves_quantity_toward_balance() {
        let mut world = World::new();
        let a = spawn_object(&mut world, Vec3::new(0.0, 0.0, 0.0));
        let b = spawn_object(&mut world, Vec3::new(10.0, 0.0, 0.0));

        {
            let mut core = world.get::<&mut ObjectCore>(a).unwrap();
            let mut s = IntracellularSubstance::new("X");
            s.substance.diffusion_constant = 1.0;
            s.substance.quantity = 10.0;
            core.intracellular.insert("X".to_string(), s);
        }

        for _ in 0..50 {
            diffuse_with(&mut world, a, b, 10.0, 0.1, 0.0, 0.0, |_, _, _| 1.0).unwrap();
        }

        let qa = world.get::<&ObjectCore>(a).unwrap().intracellular.get("X").unwrap().substance.quantity;
        let qb = world.get::<&ObjectCore>(b).unwrap().intracellular.get("X").unwrap().substance.quantity;
        assert!((qa - qb).abs() < 1.0);
        assert!((qa + qb - 10.0).abs() < 1e-6);
    }

    #[test]
    fn attach_and_remove_bond_round_trips() {
        let mut world = World::new();
        let a = spawn_object(&mut world, Vec3::ZERO);
        let b = spawn_object(&mut world, Vec3::new(5.0, 0.0, 0.0));
        let bond = attach_bond(&mut world, a, b, 5.0, 1.0, 0.1).unwrap();
        assert_eq!(world.get::<&ObjectCore>(a).unwrap().bonds.len(), 1);
        remove_bond(&mut world, bond).unwrap();
        assert_eq!(world.get::<&ObjectCore>(a).unwrap().bonds.len(), 0);
        assert!(world.get::<&PhysicalBond>(bond).is_err());
    }

    #[test]
    fn synapse_with_pairs_bouton_and_spine_and_bonds_owners() {
        let mut world = World::new();
        let axon = spawn_object(&mut world, Vec3::ZERO);
        let dendrite = spawn_object(&mut world, Vec3::new(3.0, 0.0, 0.0));
        let bouton = add_excrescence(&mut world, axon, ExcrescenceKind::Bouton, 1.0).unwrap();
        let spine = add_excrescence(&mut world, dendrite, ExcrescenceKind::Spine, 1.0).unwrap();

        let bond = synapse_with(&mut world, bouton, spine, true).unwrap();
        assert!(bond.is_some());
        assert_eq!(world.get::<&Excrescence>(bouton).unwrap().peer, Some(spine));
        assert_eq!(world.get::<&Excrescence>(spine).unwrap().peer, Some(bouton));
        assert_eq!(world.get::<&ObjectCore>(axon).unwrap().bonds.len(), 1);
    }

    #[test]
    fn synapse_with_rejects_same_kind_pair() {
        let mut world = World::new();
        let a = spawn_object(&mut world, Vec3::ZERO);
        let b = spawn_object(&mut world, Vec3::new(1.0, 0.0, 0.0));
        let x = add_excrescence(&mut world, a, ExcrescenceKind::Bouton, 0.0).unwrap();
        let y = add_excrescence(&mut world, b, ExcrescenceKind::Bouton, 0.0).unwrap();
        assert!(synapse_with(&mut world, x, y, false).is_err());
    }

    #[test]
    fn sliding_bond_migrates_to_daughter_when_coordinate_exceeds_one() {
        let mut world = World::new();
        let mother = world.spawn((ObjectCore::new(Vec3::ZERO, 10.0, 1.0, 0.1), crate::components::SphereState::default()));
        let c1 = crate::physical_cylinder::spawn(&mut world, mother, Vec3::new(0.0, 0.0, 1.0), 5.0, 1.0, 5.0, 0.0).unwrap();
        let c2 = crate::physical_cylinder::spawn(&mut world, c1, Vec3::new(0.0, 0.0, 1.0), 5.0, 1.0, 5.0, 0.0).unwrap();
        world.get::<&mut crate::components::CylinderState>(c1).unwrap().daughter_left = Some(c2);
        let anchor = spawn_object(&mut world, Vec3::new(0.0, 0.0, 8.0));

        let bond = attach_sliding_bond(&mut world, c1, anchor, 0.8, 5.0, 1.0, 0.1).unwrap();
        update_sliding_bond(&mut world, bond).unwrap();

        let b = world.get::<&PhysicalBond>(bond).unwrap();
        let sliding = b.sliding.unwrap();
        assert_eq!(sliding.cylinder, c2);
        assert!(sliding.coordinate > 0.0 && sliding.coordinate < 1.0);
        assert!(b.a == c2 || b.b == c2);
        drop(b);
        assert!(world.get::<&ObjectCore>(c2).unwrap().bonds.contains(&bond));
        assert!(!world.get::<&ObjectCore>(c1).unwrap().bonds.contains(&bond));
    }

    #[test]
    fn sliding_bond_migrates_to_mother_when_coordinate_below_zero() {
        let mut world = World::new();
        let mother = world.spawn((ObjectCore::new(Vec3::ZERO, 10.0, 1.0, 0.1), crate::components::SphereState::default()));
        let c1 = crate::physical_cylinder::spawn(&mut world, mother, Vec3::new(0.0, 0.0, 1.0), 5.0, 1.0, 5.0, 0.0).unwrap();
        let anchor = spawn_object(&mut world, Vec3::new(0.0, 0.0, -3.0));

        let bond = attach_sliding_bond(&mut world, c1, anchor, 0.1, 5.0, 1.0, 0.1).unwrap();
        update_sliding_bond(&mut world, bond).unwrap();

        let b = world.get::<&PhysicalBond>(bond).unwrap();
        let sliding = b.sliding.unwrap();
        assert_eq!(sliding.cylinder, mother);
        assert!(b.a == mother || b.b == mother);
        drop(b);
        assert!(world.get::<&ObjectCore>(mother).unwrap().bonds.contains(&bond));
    }

    #[test]
    fn sliding_bond_stays_put_when_in_range() {
        let mut world = World::new();
        let mother = world.spawn((ObjectCore::new(Vec3::ZERO, 10.0, 1.0, 0.1), crate::components::SphereState::default()));
        let c1 = crate::physical_cylinder::spawn(&mut world, mother, Vec3::new(0.0, 0.0, 1.0), 5.0, 1.0, 5.0, 0.0).unwrap();
        let anchor = spawn_object(&mut world, Vec3::new(2.0, 0.0, 2.5));

        let bond = attach_sliding_bond(&mut world, c1, anchor, 0.5, 5.0, 1.0, 0.1).unwrap();
        update_sliding_bond(&mut world, bond).unwrap();

        let b = world.get::<&PhysicalBond>(bond).unwrap();
        let sliding = b.sliding.unwrap();
        assert_eq!(sliding.cylinder, c1);
        assert!((sliding.coordinate - 0.5).abs() < 1e-9);
    }
}
