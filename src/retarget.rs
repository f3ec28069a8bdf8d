//! Keeping name references alive across identity changes.
//!
//! Bones are referenced by name from all over the database: constraint
//! subtargets, animation-curve paths, vertex groups, bone-parent
//! strings, camera focus settings, grease-pencil layers, the view's
//! orbit center. None of those are pointers, so renaming a bone is a
//! database-wide string rewrite. `rename_bone` is the single place that
//! rewrite lives; every operation that changes a bone's identity
//! (rename proper, duplicate-then-rename, symmetrize-created
//! counterparts, join, separate) routes through it exactly once per
//! identity change, rather than re-implementing the sweep ad hoc.
//!
//! The sweep is a bounded, synchronous walk over the in-memory database.
//! Renames are low-frequency interactive edits; correctness beats
//! indexing. The external call contract would let an index be added
//! later without changing any call site.
//!
//! The other two entry points serve duplication and symmetrize:
//! `retarget_duplicated_constraints` repoints copied constraints using
//! the per-operation original->copy mapping, and
//! `mirror_constraint_values` algebraically mirrors the numeric
//! parameters that encode left/right asymmetry.

use anim;
use anim::ActionId;
use cgmath::{Matrix, Matrix3, Vector3};
use constraint::{Constraint, ConstraintKind, Space};
use db::{ArmatureId, Database, ObjectData, ObjectId, ParType};
use edit::{EBone, EditGraph};
use errors::Result;
use name::{flip_side_name, BoneName};
use pose::PoseChannel;
use std::collections::HashMap;
use util::namers::unique_name;

/// Renames a bone and rewrites every reference to it, database-wide.
/// Returns the name actually assigned (uniquified within the armature's
/// namespace). A no-op when `old == new`: no mutation, no traversal.
pub fn rename_bone(
    db: &mut Database,
    arm_id: ArmatureId,
    old: BoneName,
    new: BoneName,
) -> Result<BoneName> {
    if old == new {
        return Ok(new);
    }

    // 1. The bone itself: edit bone if in edit mode, else the
    // persistent bone plus its hash entry (remove-then-reinsert).
    let final_new = {
        let arm = db.armature_mut(arm_id);
        let renamed = match arm.edit {
            Some(ref mut g) => match g.find(&old) {
                Some(b) => Some(g.rename(b, new)),
                None => None,
            },
            None => match arm.bone_by_name(&old) {
                Some(idx) => {
                    let unique = unique_name(
                        |c| arm.bone_by_name(c).map_or(false, |i| i != idx),
                        new,
                    );
                    arm.bones[idx].name = unique;
                    arm.rename_in_hash(&old, unique, idx);
                    Some(unique)
                }
                None => None,
            },
        };
        match renamed {
            Some(n) => n,
            None => bail!("no bone named {} in {}", old, arm.name),
        }
    };
    if final_new == old {
        return Ok(old);
    }
    debug!("renaming bone {} -> {}", old, final_new);

    let owners = db.users_of_armature(arm_id);

    // 2. Pose channels on every object using this armature.
    for &o in &owners {
        if let Some(ref mut pose) = db.object_mut(o).pose {
            pose.rename_channel(&old, final_new);
        }
    }

    // 3. Constraint subtargets on every object in the database, wherever
    // the constraint targets one of the armature's objects; also the
    // F-Curve paths of any action constraint's action.
    let mut fix_actions: Vec<ActionId> = vec![];
    for id in db.object_ids() {
        let is_owner = owners.contains(&id);
        let ob = db.object_mut(id);
        for c in &mut ob.constraints {
            fix_constraint_names(c, &owners, &old, &final_new, None, &mut fix_actions);
        }
        if let Some(ref mut pose) = ob.pose {
            for ch in &mut pose.channels {
                let own_channel = if is_owner { Some(ch.name) } else { None };
                for c in ch.constraints.iter_mut() {
                    fix_constraint_names(c, &owners, &old, &final_new, own_channel, &mut fix_actions);
                }
            }
        }
    }

    // 4. Bone-parenting strings.
    for id in db.object_ids() {
        let ob = db.object_mut(id);
        if ob.par_type == ParType::Bone
            && ob.parent.map_or(false, |p| owners.contains(&p))
            && ob.parsubstr == old
        {
            ob.parsubstr = final_new;
        }
    }

    // 5. Vertex groups on every object deformed by this armature.
    for id in db.object_ids() {
        let ob = db.object_mut(id);
        let deformed = ob
            .modifiers
            .iter()
            .any(|m| m.deform_object().map_or(false, |t| owners.contains(&t)));
        if deformed {
            for vg in &mut ob.vertex_groups {
                if *vg == old {
                    *vg = final_new;
                }
            }
        }
    }

    // 6. Camera depth-of-field focus and grease-pencil layer parents.
    for id in db.object_ids() {
        let ob = db.object_mut(id);
        match ob.data {
            ObjectData::Camera(ref mut cam) => {
                if cam.dof_focus_object.map_or(false, |t| owners.contains(&t))
                    && cam.dof_focus_bone == old
                {
                    cam.dof_focus_bone = final_new;
                }
            }
            ObjectData::GreasePencil(ref mut gp) => {
                for layer in &mut gp.layers {
                    if layer.par_type == ParType::Bone
                        && layer.parent.map_or(false, |p| owners.contains(&p))
                        && layer.parsubstr == old
                    {
                        layer.parsubstr = final_new;
                    }
                }
            }
            _ => {}
        }
    }

    // 7. Animation paths on every ID in the database; drivers may live
    // on datablocks unrelated to the armature's objects.
    for id in db.object_ids() {
        if let Some(ref mut adt) = db.object_mut(id).adt {
            anim::rename_bone_paths(&mut adt.drivers, &old, &final_new);
            if let Some(act) = adt.action {
                fix_actions.push(act);
            }
        }
    }
    for id in db.armature_ids() {
        if let Some(ref mut adt) = db.armature_mut(id).adt {
            anim::rename_bone_paths(&mut adt.drivers, &old, &final_new);
            if let Some(act) = adt.action {
                fix_actions.push(act);
            }
        }
    }
    fix_actions.sort();
    fix_actions.dedup();
    for act in fix_actions {
        let action = db.action_mut(act);
        anim::rename_bone_paths(&mut action.curves, &old, &final_new);
    }

    // 8. The view's "rotate around active bone" reference.
    if let Some((ob, ref mut name)) = db.view_center {
        if owners.contains(&ob) && *name == old {
            *name = final_new;
        }
    }

    Ok(final_new)
}

/// Rewrites one constraint's subtarget strings for a rename. A rewrite
/// that would leave a constraint on the renamed bone's own channel
/// pointing at itself clears the subtarget and disables the constraint
/// instead: self-references are disallowed, and a stale string would be
/// worse.
fn fix_constraint_names(
    c: &mut Constraint,
    owners: &[ObjectId],
    old: &BoneName,
    new: &BoneName,
    own_channel: Option<BoneName>,
    fix_actions: &mut Vec<ActionId>,
) {
    let name = c.name.clone();
    let mut targets_armature = false;
    let mut cleared = false;
    for (target, subtarget) in c.targets_mut() {
        match *target {
            Some(t) if owners.contains(&t) => {}
            _ => continue,
        }
        targets_armature = true;
        if *subtarget == *old {
            if own_channel == Some(*new) {
                warn!(
                    "constraint {} on {} would target its own bone; cleared",
                    name, new
                );
                *subtarget = BoneName::none();
                cleared = true;
            } else {
                *subtarget = *new;
            }
        }
    }
    if cleared {
        c.disable();
    }
    if targets_armature {
        if let Some(act) = c.action() {
            fix_actions.push(act);
        }
    }
}

/// After duplicating a set of bones, repoints the copied constraints on
/// a duplicate's pose channel: a subtarget naming a bone that was also
/// duplicated in the same operation follows the duplication (via the
/// per-operation mapping); otherwise, when `mirror` is requested and a
/// name-flipped bone exists, the subtarget flips; otherwise it keeps
/// pointing at the original.
pub fn retarget_duplicated_constraints(
    channel: &mut PoseChannel,
    graph: &EditGraph,
    dup_map: &HashMap<EBone, EBone>,
    owners: &[ObjectId],
    mirror: bool,
) {
    for c in channel.constraints.iter_mut() {
        for (target, subtarget) in c.targets_mut() {
            match *target {
                Some(t) if owners.contains(&t) => {}
                _ => continue,
            }
            if subtarget.is_empty() {
                continue;
            }
            if let Some(orig) = graph.find(subtarget) {
                if let Some(&dup) = dup_map.get(&orig) {
                    *subtarget = graph.bone(dup).name;
                    continue;
                }
            }
            if mirror {
                let flipped = flip_side_name(subtarget, false);
                if flipped != *subtarget && graph.find(&flipped).is_some() {
                    *subtarget = flipped;
                }
            }
        }
    }
}

/// Algebraically mirrors the numeric constraint parameters that encode
/// left/right asymmetry, so a symmetrized bone behaves as a physical
/// reflection of its source rather than an identical copy. Ranges are
/// sign-flipped with min/max swapped on the channels that change sign
/// under the reflection; parameters expressed in world space are taken
/// through the bone's local frame before and after the flip.
pub fn mirror_constraint_values(c: &mut Constraint, bone_mat: &Matrix3<f32>) {
    let local = c.owner_space == Space::Local;
    match c.kind {
        ConstraintKind::Ik { ref mut pole_angle, .. } => {
            *pole_angle = -*pole_angle;
        }
        ConstraintKind::LimitLocation { ref mut min, ref mut max } => {
            mirror_location_range(min, max, local, bone_mat);
        }
        ConstraintKind::LimitRotation { ref mut min, ref mut max } => {
            mirror_rotation_range(min, max);
        }
        ConstraintKind::TransformMap {
            rotational,
            ref mut from_min,
            ref mut from_max,
            ref mut to_min,
            ref mut to_max,
        } => {
            if rotational {
                mirror_rotation_range(from_min, from_max);
                mirror_rotation_range(to_min, to_max);
            } else {
                mirror_location_range(from_min, from_max, local, bone_mat);
                mirror_location_range(to_min, to_max, local, bone_mat);
            }
        }
        ConstraintKind::ActionCon { ref mut min, ref mut max, .. } => {
            let (a, b) = (-*max, -*min);
            *min = a;
            *max = b;
        }
        _ => {}
    }
}

fn mirror_location_range(
    min: &mut Vector3<f32>,
    max: &mut Vector3<f32>,
    local: bool,
    bone_mat: &Matrix3<f32>,
) {
    if local {
        let (a, b) = (-max.x, -min.x);
        min.x = a;
        max.x = b;
    } else {
        // Express in the bone's local frame, flip there, go back. The
        // rotation breaks axis alignment, so the result is reboxed
        // componentwise.
        let inv = bone_mat.transpose();
        let mut lo = inv * *min;
        let mut hi = inv * *max;
        let (a, b) = (-hi.x, -lo.x);
        lo.x = a;
        hi.x = b;
        let lo = *bone_mat * lo;
        let hi = *bone_mat * hi;
        for i in 0..3 {
            min[i] = lo[i].min(hi[i]);
            max[i] = lo[i].max(hi[i]);
        }
    }
}

/// Euler X and Y change sign under the reflection (the same table the
/// pose channels use), so those limits swap-negate.
fn mirror_rotation_range(min: &mut Vector3<f32>, max: &mut Vector3<f32>) {
    for i in 0..2 {
        let (a, b) = (-max[i], -min[i]);
        min[i] = a;
        max[i] = b;
    }
}
