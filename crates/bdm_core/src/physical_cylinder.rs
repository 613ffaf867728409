//! `PhysicalCylinder`: a spring-coupled neurite segment. This is
//! the hardest subsystem — discretization (split/merge), branching,
//! bifurcation, and the per-step force/displacement update all live here,
//! as free functions over a `hecs::Entity` rather than methods on a class
//! (see `physical_sphere.rs` for the analogous, simpler soma counterpart).

use hecs::{Entity, World};
use rand::Rng;

use crate::components::{CylinderState, Excrescence, ObjectCore, SphereState};
use crate::error::{SimError, SimResult};
use crate::force::{DefaultForce, ForceResult, InterObjectForce};
use crate::geometry::Vec3;
use crate::node::NodeRecord;

pub const DEFAULT_LENGTH_MIN: f64 = 2.0;
pub const DEFAULT_LENGTH_MAX: f64 = 15.0;

pub fn volume_of(diameter: f64, length: f64) -> f64 {
    std::f64::consts::FRAC_PI_4 * diameter.powi(2) * length
}

/// Origin of this cylinder on its mother: the mother's mass location if the
/// mother is a sphere, or the mother cylinder's mass (distal end) otherwise.
fn origin_on_mother(world: &World, mother: Entity) -> SimResult<Vec3> {
    world.get::<&ObjectCore>(mother).map(|c| c.mass_location).map_err(|_| SimError::EntityNotFound)
}

/// `mass_location = mother.origin_of(self) + spring_axis`.
pub fn proximal_end(world: &World, cylinder: Entity) -> SimResult<Vec3> {
    let state = world.get::<&CylinderState>(cylinder).map_err(|_| SimError::EntityNotFound)?;
    let core = world.get::<&ObjectCore>(cylinder).map_err(|_| SimError::EntityNotFound)?;
    Ok(core.mass_location - state.spring_axis)
}

/// Spawn a new cylinder entity attached to `mother` at its current distal
/// point, growing in `direction` (not necessarily normalized) for `length`.
pub fn spawn(
    world: &mut World,
    mother: Entity,
    direction: Vec3,
    length: f64,
    diameter: f64,
    spring_constant: f64,
    tension: f64,
) -> SimResult<Entity> {
    let origin = origin_on_mother(world, mother)?;
    let axis = direction.normalize() * length;
    let resting_length = length / (1.0 + tension / spring_constant.max(1e-9));
    let mut core = ObjectCore::new(origin + axis, diameter, 1.0, 0.1);
    core.volume = volume_of(diameter, length);
    let state = CylinderState::new(mother, axis, resting_length, spring_constant);
    Ok(world.spawn((core, state, NodeRecord::default())))
}

/// Correct `spring_axis`'s direction if it has drifted more than 90 degrees
/// from the mother's own axis: project
/// onto the plane perpendicular to the mother's distal axis and rescale to
/// the unchanged `actual_length`.
pub fn correct_direction(world: &mut World, cylinder: Entity) -> SimResult<()> {
    let mother = world.get::<&CylinderState>(cylinder).map_err(|_| SimError::EntityNotFound)?.mother;
    let mother_axis = if let Ok(mother_state) = world.get::<&CylinderState>(mother) {
        mother_state.spring_axis
    } else {
        return Ok(());
    };
    let mut state = world.get::<&mut CylinderState>(cylinder).map_err(|_| SimError::EntityNotFound)?;
    if state.spring_axis.angle(mother_axis) > std::f64::consts::FRAC_PI_2 {
        let corrected = state.spring_axis.project_onto_plane(mother_axis);
        let length = state.actual_length;
        state.spring_axis = if corrected.norm() > 1e-9 {
            corrected.normalize() * length
        } else {
            mother_axis.normalize() * length
        };
    }
    Ok(())
}

/// `move_point_mass`: relocate the distal mass by `displacement`, updating
/// `spring_axis`/`actual_length`/`tension` in lockstep.
pub fn move_point_mass(world: &mut World, cylinder: Entity, displacement: Vec3) -> SimResult<()> {
    let mut core = world.get::<&mut ObjectCore>(cylinder).map_err(|_| SimError::EntityNotFound)?;
    core.mass_location += displacement;
    drop(core);
    update_dependent_variables(world, cylinder)
}

/// Recompute `spring_axis`/`actual_length`/`tension` from the current
/// `mass_location` and the mother's origin.
pub fn update_dependent_variables(world: &mut World, cylinder: Entity) -> SimResult<()> {
    let mother = world.get::<&CylinderState>(cylinder).map_err(|_| SimError::EntityNotFound)?.mother;
    let origin = origin_on_mother(world, mother)?;
    let mass_location = world.get::<&ObjectCore>(cylinder).map_err(|_| SimError::EntityNotFound)?.mass_location;
    let mut state = world.get::<&mut CylinderState>(cylinder).map_err(|_| SimError::EntityNotFound)?;
    state.spring_axis = mass_location - origin;
    state.actual_length = state.spring_axis.norm().max(1e-9);
    state.recompute_tension();
    Ok(())
}

/// `extend_cylinder`: grow the distal end by `speed * dt` along the current
/// axis (straight growth cone elongation).
pub fn extend_cylinder(world: &mut World, cylinder: Entity, speed: f64, dt: f64) -> SimResult<()> {
    let axis = world.get::<&CylinderState>(cylinder).map_err(|_| SimError::EntityNotFound)?.spring_axis;
    let direction = axis.normalize();
    move_point_mass(world, cylinder, direction * (speed * dt))
}

/// `retract_cylinder`: shrink toward the mother by `speed * dt`; if the
/// resulting length would go to zero or below, the cylinder disappears
/// (merges into its mother) and the caller is told via `Ok(true)`.
pub fn retract_cylinder(world: &mut World, cylinder: Entity, speed: f64, dt: f64, length_min: f64) -> SimResult<bool> {
    let (axis, current_length) = {
        let state = world.get::<&CylinderState>(cylinder).map_err(|_| SimError::EntityNotFound)?;
        (state.spring_axis, state.actual_length)
    };
    let shrink = speed * dt;
    if current_length - shrink <= length_min {
        remove_cylinder(world, cylinder)?;
        return Ok(true);
    }
    let direction = axis.normalize();
    move_point_mass(world, cylinder, direction * -shrink)?;
    Ok(false)
}

/// Remove a terminal cylinder, detaching it from its mother's daughter
/// slot(s).
fn remove_cylinder(world: &mut World, cylinder: Entity) -> SimResult<()> {
    let mother = world.get::<&CylinderState>(cylinder).map_err(|_| SimError::EntityNotFound)?.mother;
    if let Ok(mut mother_state) = world.get::<&mut CylinderState>(mother) {
        if mother_state.daughter_left == Some(cylinder) {
            mother_state.daughter_left = mother_state.daughter_right.take();
        } else if mother_state.daughter_right == Some(cylinder) {
            mother_state.daughter_right = None;
        }
    } else if let Ok(mut sphere_state) = world.get::<&mut SphereState>(mother) {
        sphere_state.daughters.retain(|&e| e != cylinder);
    }
    world.despawn(cylinder).map_err(|_| SimError::EntityNotFound)?;
    Ok(())
}

/// `run_discretization`: split if `actual_length > length_max`,
/// merge with the sole daughter if `actual_length < length_min` and the
/// cylinder is non-terminal-with-one-daughter. Returns the newly created
/// entity on a split, for the caller to register with the triangulation.
pub fn run_discretization(
    world: &mut World,
    cylinder: Entity,
    length_min: f64,
    length_max: f64,
) -> SimResult<Option<Entity>> {
    let (actual_length, is_terminal, sole_daughter) = {
        let state = world.get::<&CylinderState>(cylinder).map_err(|_| SimError::EntityNotFound)?;
        let sole = if state.daughter_right.is_none() { state.daughter_left } else { None };
        (state.actual_length, state.is_terminal(), sole)
    };

    if actual_length > length_max {
        return split_cylinder(world, cylinder, 0.5).map(Some);
    }

    if actual_length < length_min && !is_terminal {
        if let Some(daughter) = sole_daughter {
            merge_cylinder_into_mother(world, daughter)?;
        }
    }
    Ok(None)
}

/// Insert a new node at `distal_portion` of the way along `cylinder`,
/// splitting it into a proximal half (new entity, taking over the old
/// entity's mother link) and a distal half (the original entity, now a
/// daughter of the new proximal one), redistributing substances and
/// excrescences across the two halves.
pub fn split_cylinder(world: &mut World, cylinder: Entity, distal_portion: f64) -> SimResult<Entity> {
    let distal_portion = distal_portion.clamp(0.01, 0.99);
    let (mother, spring_axis, resting_length, spring_constant, diameter, branch_order) = {
        let state = world.get::<&CylinderState>(cylinder).map_err(|_| SimError::EntityNotFound)?;
        let core = world.get::<&ObjectCore>(cylinder).map_err(|_| SimError::EntityNotFound)?;
        (state.mother, state.spring_axis, state.resting_length, state.spring_constant, core.diameter, state.branch_order)
    };
    let origin = origin_on_mother(world, mother)?;
    let proximal_axis = spring_axis * (1.0 - distal_portion);
    let distal_axis = spring_axis * distal_portion;
    let proximal_resting = resting_length * (1.0 - distal_portion);
    let distal_resting = resting_length * distal_portion;

    let mut proximal_core = ObjectCore::new(origin + proximal_axis, diameter, 1.0, 0.1);
    proximal_core.volume = volume_of(diameter, proximal_axis.norm());
    let proximal_state = CylinderState::new(mother, proximal_axis, proximal_resting.max(1e-6), spring_constant);
    let new_proximal = world.spawn((proximal_core, proximal_state, NodeRecord::default()));

    // Reattach the mother's daughter slot that pointed at `cylinder` to the
    // new proximal segment.
    if let Ok(mut mother_state) = world.get::<&mut CylinderState>(mother) {
        if mother_state.daughter_left == Some(cylinder) {
            mother_state.daughter_left = Some(new_proximal);
        } else if mother_state.daughter_right == Some(cylinder) {
            mother_state.daughter_right = Some(new_proximal);
        }
    } else if let Ok(mut sphere_state) = world.get::<&mut SphereState>(mother) {
        if let Some(slot) = sphere_state.daughters.iter_mut().find(|d| **d == cylinder) {
            *slot = new_proximal;
        }
    }

    {
        let mut proximal_state = world.get::<&mut CylinderState>(new_proximal).map_err(|_| SimError::EntityNotFound)?;
        proximal_state.daughter_left = Some(cylinder);
        proximal_state.branch_order = branch_order;
    }
    {
        let mut distal_state = world.get::<&mut CylinderState>(cylinder).map_err(|_| SimError::EntityNotFound)?;
        distal_state.mother = new_proximal;
        distal_state.spring_axis = distal_axis;
        distal_state.resting_length = distal_resting.max(1e-6);
        distal_state.recompute_tension();
    }

    redistribute_substances_on_split(world, new_proximal, cylinder, distal_portion);
    redistribute_excrescences_on_split(world, new_proximal, cylinder, distal_portion);

    Ok(new_proximal)
}

/// Substances split by `distal_portion` when the cylinder's quantity scales
/// with length (`volume_dependent == false` and `D` negligible means no
/// redistribution is meaningful, so those remain entirely on the distal
/// half); otherwise both halves get a volume-proportional share.
fn redistribute_substances_on_split(world: &mut World, proximal: Entity, distal: Entity, distal_portion: f64) {
    let entries: Vec<(String, crate::substance::IntracellularSubstance)> = {
        let Ok(core) = world.get::<&ObjectCore>(distal) else { return };
        core.intracellular.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    };
    for (id, substance) in entries {
        if substance.substance.diffusion_constant > 1e-12 {
            let mut prox_copy = substance.clone();
            prox_copy.substance.quantity = substance.substance.quantity * (1.0 - distal_portion);
            if let Ok(mut core) = world.get::<&mut ObjectCore>(proximal) {
                core.intracellular.insert(id.clone(), prox_copy);
            }
            if let Ok(mut core) = world.get::<&mut ObjectCore>(distal) {
                if let Some(s) = core.intracellular.get_mut(&id) {
                    s.substance.quantity *= distal_portion;
                }
            }
        }
        // else: stays entirely on the distal half, untouched.
    }
}

/// Excrescences whose local coordinate falls in the proximal fraction move
/// to the new proximal segment and are rescaled into its local frame.
fn redistribute_excrescences_on_split(world: &mut World, proximal: Entity, distal: Entity, distal_portion: f64) {
    let excrescences: Vec<Entity> = world.get::<&ObjectCore>(distal).map(|c| c.excrescences.clone()).unwrap_or_default();
    let mut moved = Vec::new();
    for ex in excrescences {
        let Ok(mut record) = world.get::<&mut Excrescence>(ex) else { continue };
        if record.local_coord < (1.0 - distal_portion) {
            record.local_coord /= (1.0 - distal_portion).max(1e-9);
            record.owner = proximal;
            moved.push(ex);
        } else {
            record.local_coord = (record.local_coord - (1.0 - distal_portion)) / distal_portion.max(1e-9);
        }
    }
    if !moved.is_empty() {
        if let Ok(mut distal_core) = world.get::<&mut ObjectCore>(distal) {
            distal_core.excrescences.retain(|e| !moved.contains(e));
        }
        if let Ok(mut proximal_core) = world.get::<&mut ObjectCore>(proximal) {
            proximal_core.excrescences.extend(moved);
        }
    }
}

/// Merge a terminal-chain cylinder into its mother when discretization asks
/// for a merge: the mother absorbs `cylinder`'s length/resting-length/
/// substances and takes over its daughter slot(s).
fn merge_cylinder_into_mother(world: &mut World, cylinder: Entity) -> SimResult<()> {
    let mother = world.get::<&CylinderState>(cylinder).map_err(|_| SimError::EntityNotFound)?.mother;
    if world.get::<&CylinderState>(mother).is_err() {
        // Mother is a sphere; nothing to merge into, leave as-is.
        return Ok(());
    }

    let (child_left, child_right, child_axis, child_resting) = {
        let state = world.get::<&CylinderState>(cylinder).map_err(|_| SimError::EntityNotFound)?;
        (state.daughter_left, state.daughter_right, state.spring_axis, state.resting_length)
    };
    let mass_location = world.get::<&ObjectCore>(cylinder).map_err(|_| SimError::EntityNotFound)?.mass_location;

    {
        let mut mother_state = world.get::<&mut CylinderState>(mother).map_err(|_| SimError::EntityNotFound)?;
        mother_state.spring_axis += child_axis;
        mother_state.resting_length += child_resting;
        mother_state.daughter_left = child_left;
        mother_state.daughter_right = child_right;
        mother_state.recompute_tension();
    }
    if let Ok(mut mother_core) = world.get::<&mut ObjectCore>(mother) {
        mother_core.mass_location = mass_location;
    }
    for child in [child_left, child_right].into_iter().flatten() {
        if let Ok(mut child_state) = world.get::<&mut CylinderState>(child) {
            child_state.mother = mother;
        }
    }

    redistribute_substances_on_merge(world, mother, cylinder);
    world.despawn(cylinder).map_err(|_| SimError::EntityNotFound)?;
    update_dependent_variables(world, mother)
}

fn redistribute_substances_on_merge(world: &mut World, mother: Entity, absorbed: Entity) {
    let entries: Vec<(String, f64)> = {
        let Ok(core) = world.get::<&ObjectCore>(absorbed) else { return };
        core.intracellular.iter().map(|(k, v)| (k.clone(), v.substance.quantity)).collect()
    };
    for (id, quantity) in entries {
        if let Ok(mut core) = world.get::<&mut ObjectCore>(mother) {
            let entry = core
                .intracellular
                .entry(id.clone())
                .or_insert_with(|| crate::substance::IntracellularSubstance::new(&id));
            entry.substance.quantity += quantity;
        }
    }
}

/// `branch_cylinder`: attach a new side branch to a currently
/// terminal cylinder at its distal end, at branch angle `phi`/`theta`
/// relative to the parent's own axis.
pub fn branch_cylinder(
    world: &mut World,
    cylinder: Entity,
    length: f64,
    phi: f64,
    theta: f64,
    diameter: f64,
    spring_constant: f64,
) -> SimResult<Entity> {
    let axis = world.get::<&CylinderState>(cylinder).map_err(|_| SimError::EntityNotFound)?.spring_axis;
    let perpendicular = axis.random_perpendicular(&mut rand::thread_rng());
    let direction = axis.normalize().rotate_around_axis(perpendicular, theta).rotate_around_axis(axis.normalize(), phi);

    let new_branch = spawn(world, cylinder, direction, length, diameter, spring_constant, 0.0)?;
    let mut state = world.get::<&mut CylinderState>(cylinder).map_err(|_| SimError::EntityNotFound)?;
    let order = state.branch_order;
    if state.daughter_left.is_none() {
        state.daughter_left = Some(new_branch);
    } else {
        state.daughter_right = Some(new_branch);
    }
    drop(state);
    world.get::<&mut CylinderState>(new_branch).map_err(|_| SimError::EntityNotFound)?.branch_order = order + 1;
    Ok(new_branch)
}

/// `bifurcate_cylinder`: split a terminal tip into two daughter
/// branches symmetric about the parent axis.
pub fn bifurcate_cylinder(
    world: &mut World,
    cylinder: Entity,
    length: f64,
    half_angle: f64,
    diameter: f64,
    spring_constant: f64,
) -> SimResult<(Entity, Entity)> {
    let axis = world.get::<&CylinderState>(cylinder).map_err(|_| SimError::EntityNotFound)?.spring_axis;
    let perpendicular = axis.random_perpendicular(&mut rand::thread_rng());
    let dir_a = axis.normalize().rotate_around_axis(perpendicular, half_angle);
    let dir_b = axis.normalize().rotate_around_axis(perpendicular, -half_angle);

    let a = spawn(world, cylinder, dir_a, length, diameter, spring_constant, 0.0)?;
    let b = spawn(world, cylinder, dir_b, length, diameter, spring_constant, 0.0)?;

    let mut state = world.get::<&mut CylinderState>(cylinder).map_err(|_| SimError::EntityNotFound)?;
    let order = state.branch_order + 1;
    state.daughter_left = Some(a);
    state.daughter_right = Some(b);
    drop(state);
    world.get::<&mut CylinderState>(a).map_err(|_| SimError::EntityNotFound)?.branch_order = order;
    world.get::<&mut CylinderState>(b).map_err(|_| SimError::EntityNotFound)?.branch_order = order;
    Ok((a, b))
}

/// Force this cylinder transmits back to its mother:
/// `max(tension, 0) / actual_length * spring_axis + force_to_transmit_to_proximal_mass`
///.
pub fn force_to_mother(world: &World, cylinder: Entity) -> SimResult<Vec3> {
    let state = world.get::<&CylinderState>(cylinder).map_err(|_| SimError::EntityNotFound)?;
    let pull = state.spring_axis * (state.tension.max(0.0) / state.actual_length.max(1e-9));
    Ok(pull + state.force_to_transmit_to_proximal_mass)
}

/// `run_physics` per step: spring pull from the mother, forces
/// transmitted up from daughters, avoidance (caller-resolved neighbor
/// geometries), wall force, bond forces, then the clamped displacement of
/// the distal mass.
#[allow(clippy::too_many_arguments)]
pub fn run_physics(
    world: &mut World,
    cylinder: Entity,
    neighbor_forces: Vec3,
    wall_force: Vec3,
    bond_forces: Vec3,
    dt: f64,
    max_displacement: f64,
) -> SimResult<Vec3> {
    let (spring_axis, tension, actual_length, daughters, mass, adherence) = {
        let state = world.get::<&CylinderState>(cylinder).map_err(|_| SimError::EntityNotFound)?;
        let core = world.get::<&ObjectCore>(cylinder).map_err(|_| SimError::EntityNotFound)?;
        (state.spring_axis, state.tension, state.actual_length, state.daughters().collect::<Vec<_>>(), core.mass.max(1e-9), core.adherence)
    };

    let spring_force = spring_axis * (-tension / actual_length.max(1e-9));
    let mut total = spring_force + neighbor_forces + wall_force + bond_forces;

    for daughter in daughters {
        if let Ok(f) = force_to_mother(world, daughter) {
            total += f;
        }
    }

    if total.norm() <= adherence {
        if let Ok(mut core) = world.get::<&mut ObjectCore>(cylinder) {
            core.on_scheduler = false;
        }
        return Ok(Vec3::ZERO);
    }

    let mut displacement = total * (dt / mass);
    if displacement.norm() > max_displacement {
        displacement = displacement.normalize() * max_displacement;
    }

    move_point_mass(world, cylinder, displacement)?;
    if let Ok(mut core) = world.get::<&mut ObjectCore>(cylinder) {
        core.last_force = total;
        core.on_scheduler = true;
    }
    correct_direction(world, cylinder)?;
    Ok(displacement)
}

/// Fraction of a proposed `displacement` this cylinder can actually take
/// before crossing a neighboring surface. `obstacles` are pre-resolved closest-point
/// distances and radii from the triangulation's neighbor query.
pub fn how_much_can_we_move(
    current: Vec3,
    radius: f64,
    displacement: Vec3,
    obstacles: &[(Vec3, f64)],
) -> f64 {
    let mut scale = 1.0_f64;
    let step_len = displacement.norm();
    if step_len < 1e-12 {
        return 1.0;
    }
    for &(obstacle_center, obstacle_radius) in obstacles {
        let to_obstacle = obstacle_center - current;
        let along = to_obstacle.dot(displacement) / step_len;
        if along <= 0.0 {
            continue;
        }
        let perp2 = to_obstacle.norm_squared() - along * along;
        let min_dist2 = (radius + obstacle_radius).powi(2);
        if perp2 >= min_dist2 {
            continue;
        }
        let safe = along - (min_dist2 - perp2).max(0.0).sqrt();
        scale = scale.min((safe / step_len).clamp(0.0, 1.0));
    }
    scale
}

/// `add_physical_bond_if_crossing`: if moving by `displacement`
/// would bring this cylinder within `bond_range` of `other`, attach a bond
/// between them instead of letting them interpenetrate.
pub fn add_physical_bond_if_crossing(
    world: &mut World,
    cylinder: Entity,
    other: Entity,
    displacement: Vec3,
    bond_range: f64,
    spring_constant: f64,
    damping: f64,
) -> SimResult<Option<Entity>> {
    let (pos, radius) = {
        let core = world.get::<&ObjectCore>(cylinder).map_err(|_| SimError::EntityNotFound)?;
        (core.mass_location + displacement, core.diameter * 0.5)
    };
    let (other_pos, other_radius) = {
        let core = world.get::<&ObjectCore>(other).map_err(|_| SimError::EntityNotFound)?;
        (core.mass_location, core.diameter * 0.5)
    };
    if pos.distance(other_pos) <= radius + other_radius + bond_range {
        let resting_length = pos.distance(other_pos);
        let bond = crate::physical_object::attach_bond(world, cylinder, other, resting_length, spring_constant, damping)?;
        return Ok(Some(bond));
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_chain(world: &mut World) -> (Entity, Entity) {
        let mut mother_core = ObjectCore::new(Vec3::ZERO, 10.0, 1.0, 0.1);
        mother_core.volume = 500.0;
        let mother = world.spawn((mother_core, SphereState::default(), NodeRecord::default()));
        let cylinder = spawn(world, mother, Vec3::new(0.0, 0.0, 1.0), 10.0, 1.0, 5.0, 0.0).unwrap();
        world.get::<&mut SphereState>(mother).unwrap().daughters.push(cylinder);
        (mother, cylinder)
    }

    #[test]
    fn extend_cylinder_increases_length() {
        let mut world = World::new();
        let (_, cyl) = setup_chain(&mut world);
        let before = world.get::<&CylinderState>(cyl).unwrap().actual_length;
        extend_cylinder(&mut world, cyl, 1.0, 1.0).unwrap();
        let after = world.get::<&CylinderState>(cyl).unwrap().actual_length;
        assert!(after > before);
    }

    #[test]
    fn split_cylinder_preserves_total_resting_length() {
        let mut world = World::new();
        let (_, cyl) = setup_chain(&mut world);
        let total_before = world.get::<&CylinderState>(cyl).unwrap().resting_length;
        let proximal = split_cylinder(&mut world, cyl, 0.5).unwrap();
        let r1 = world.get::<&CylinderState>(proximal).unwrap().resting_length;
        let r2 = world.get::<&CylinderState>(cyl).unwrap().resting_length;
        assert!((r1 + r2 - total_before).abs() < 1e-9);
    }

    #[test]
    fn run_discretization_splits_overlong_cylinder() {
        let mut world = World::new();
        let (_, cyl) = setup_chain(&mut world);
        move_point_mass(&mut world, cyl, Vec3::new(0.0, 0.0, 20.0)).unwrap();
        let created = run_discretization(&mut world, cyl, DEFAULT_LENGTH_MIN, DEFAULT_LENGTH_MAX).unwrap();
        assert!(created.is_some());
    }

    #[test]
    fn branch_cylinder_attaches_a_daughter() {
        let mut world = World::new();
        let (_, cyl) = setup_chain(&mut world);
        let branch = branch_cylinder(&mut world, cyl, 5.0, 0.3, 0.2, 1.0, 5.0).unwrap();
        let state = world.get::<&CylinderState>(cyl).unwrap();
        assert!(state.daughter_left == Some(branch) || state.daughter_right == Some(branch));
    }

    #[test]
    fn how_much_can_we_move_clamps_before_collision() {
        let current = Vec3::new(0.0, 0.0, 0.0);
        let displacement = Vec3::new(10.0, 0.0, 0.0);
        let obstacles = vec![(Vec3::new(5.0, 0.0, 0.0), 1.0)];
        let scale = how_much_can_we_move(current, 1.0, displacement, &obstacles);
        assert!(scale < 1.0);
    }
}
