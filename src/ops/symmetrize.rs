//! Symmetrize: create or synchronize bilateral counterparts.
//!
//! For every selected bone whose name has a side marker, resolve a
//! source->destination pair:
//!
//! * no bone with the flipped name exists -> duplicate under the flipped
//!   name;
//! * a flipped bone exists but is not selected -> it is the pre-existing
//!   mirror target and gets synchronized from the source;
//! * both sides are selected -> the bone lying on the `direction` side of
//!   the mirror axis is the source, the other is deselected and becomes
//!   the destination.
//!
//! Then the destination is rebuilt as a physical reflection of the
//! source: geometry mirrored across the YZ plane, roll and X-asymmetric
//! bendy parameters negated, parents and handle links remapped through
//! mirror-or-self resolution, pose-channel data copied, constraint
//! subtargets flipped where a flipped bone exists, numeric constraint
//! ranges algebraically mirrored, the custom display shape reflected
//! (or swapped for a name-flipped shape object when one exists), and any
//! authored animation curves copied across with the sign-flip table.
//!
//! Center-line bones (no marker in the name) are skipped, and a skipped
//! bone never aborts the rest of the batch.

use anim::ActionId;
use cgmath::Matrix3;
use db::{Database, ObjectId};
use edit::{BBoneHandle, EBone, EditGraph, BONE_SELECT_MASK};
use math;
use name::{flip_side_name, BoneName};
use ops::{edit_armature, take_edit, OpStatus};
use retarget;
use std::collections::{HashMap, HashSet};

/// Which side of the X axis is the source.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum SymDir {
    PosX,
    NegX,
}

fn mirror_or_self(g: &EditGraph, b: EBone) -> EBone {
    g.mirror_of(b).unwrap_or(b)
}

fn mirror_handle(g: &EditGraph, handle: BBoneHandle) -> BBoneHandle {
    if let BBoneHandle::Absolute(name) = handle {
        let flipped = flip_side_name(&name, false);
        if flipped != name && g.find(&flipped).is_some() {
            return BBoneHandle::Absolute(flipped);
        }
    }
    handle
}

/// When both sides are selected, the bone on the `dir` side of the
/// mirror axis wins as the source.
fn pick_source(g: &EditGraph, a: EBone, b: EBone, dir: SymDir) -> (EBone, EBone) {
    let sum = |x: EBone| g.bone(x).head.x + g.bone(x).tail.x;
    let a_on_pos = sum(a) >= sum(b);
    match (dir, a_on_pos) {
        (SymDir::PosX, true) | (SymDir::NegX, false) => (a, b),
        (SymDir::PosX, false) | (SymDir::NegX, true) => (b, a),
    }
}

pub fn symmetrize(db: &mut Database, ob: ObjectId, dir: SymDir) -> OpStatus {
    let arm_id = match edit_armature(db, ob) {
        Some(id) => id,
        None => return OpStatus::Cancelled,
    };
    {
        let arm = db.armature(arm_id);
        if arm.edit.as_ref().map_or(true, |g| g.selected_bones().is_empty()) {
            return OpStatus::Cancelled;
        }
    }

    let mut g = take_edit(db, arm_id);

    // Pass 1: resolve source->destination pairs.
    let selected = g.selected_bones();
    let mut pairs: Vec<(EBone, EBone)> = vec![];
    let mut handled: HashSet<EBone> = HashSet::new();
    for &b in &selected {
        if handled.contains(&b) {
            continue;
        }
        let name = g.bone(b).name;
        let flipped = flip_side_name(&name, false);
        if flipped == name {
            debug!("symmetrize: skipping center bone {}", name);
            continue;
        }
        match g.find(&flipped) {
            Some(other) => {
                if g.bone(other).selected() && g.bone(other).visible() {
                    let (src, dst) = pick_source(&g, b, other, dir);
                    g.bone_mut(dst).deselect();
                    handled.insert(src);
                    handled.insert(dst);
                    pairs.push((src, dst));
                } else {
                    handled.insert(b);
                    pairs.push((b, other));
                }
            }
            None => {
                let d = g.duplicate(b, Some(flipped));
                handled.insert(b);
                pairs.push((b, d));
            }
        }
    }
    if pairs.is_empty() {
        db.armature_mut(arm_id).edit = Some(g);
        return OpStatus::Cancelled;
    }

    // Pass 2: the destination becomes the source's reflection. All
    // fields but selection follow the source.
    for &(src, dst) in &pairs {
        let src_bone = g.bone(src).clone();
        let dst_bone = g.bone_mut(dst);
        dst_bone.head = math::mirror_x(src_bone.head);
        dst_bone.tail = math::mirror_x(src_bone.tail);
        dst_bone.roll = -src_bone.roll;
        dst_bone.rad_head = src_bone.rad_head;
        dst_bone.rad_tail = src_bone.rad_tail;
        dst_bone.layer = src_bone.layer;
        dst_bone.inherit_scale = src_bone.inherit_scale;
        dst_bone.flag =
            (dst_bone.flag & BONE_SELECT_MASK) | (src_bone.flag & !BONE_SELECT_MASK);

        let mut bbone = src_bone.bbone;
        bbone.curve_in[0] = -bbone.curve_in[0];
        bbone.curve_out[0] = -bbone.curve_out[0];
        bbone.roll[0] = -bbone.roll[0];
        bbone.roll[1] = -bbone.roll[1];
        dst_bone.bbone = bbone;
    }

    // Pass 3: parents and handle links, mirror-or-self.
    let map: HashMap<EBone, EBone> = pairs.iter().cloned().collect();
    for &(src, dst) in &pairs {
        let parent = g.parent_of(src).map(|p| mirror_or_self(&g, p));
        let connected = g.bone(src).connected();
        g.set_parent(dst, parent, connected);

        let prev = mirror_handle(&g, g.bone(dst).bbone.prev);
        let next = mirror_handle(&g, g.bone(dst).bbone.next);
        let bone = g.bone_mut(dst);
        bone.bbone.prev = prev;
        bone.bbone.next = next;
    }

    let owners = db.users_of_armature(arm_id);
    let name_pairs: Vec<(BoneName, BoneName, Matrix3<f32>)> = pairs
        .iter()
        .map(|&(s, d)| (g.bone(s).name, g.bone(d).name, g.bone(d).matrix()))
        .collect();

    // Pass 4: pose channels. Copy from the source, retarget subtargets
    // through the pairs (mirror fallback), mirror the numeric ranges.
    for &owner in &owners {
        if let Some(ref mut pose) = db.object_mut(owner).pose {
            for &(src_name, dst_name, _) in &name_pairs {
                let data = match pose.channel_index(&src_name) {
                    Some(i) => pose.channels[i].clone(),
                    None => continue,
                };
                pose.ensure_channel(dst_name).copy_data_from(&data);
            }
            pose.rebuild_hash();
            for &(_, dst_name, ref dst_mat) in &name_pairs {
                if let Some(ch) = pose.channel_by_name_mut(&dst_name) {
                    retarget::retarget_duplicated_constraints(ch, &g, &map, &owners, true);
                    for c in ch.constraints.iter_mut() {
                        retarget::mirror_constraint_values(c, dst_mat);
                    }
                }
            }
        }
    }

    // Custom display shapes: reflect the shape transform; a name-flipped
    // shape object substitutes for mirroring the shape itself.
    for &owner in &owners {
        for &(_, dst_name, _) in &name_pairs {
            let shape = match db.object(owner).pose {
                Some(ref pose) => match pose.channel_by_name(&dst_name) {
                    Some(ch) => ch.custom_shape,
                    None => continue,
                },
                None => continue,
            };
            let swapped = shape.and_then(|sid| {
                let shape_name = db.object(sid).name.clone();
                let flipped = flip_side_name(&BoneName::new(&shape_name), false);
                if flipped.as_str() != shape_name {
                    db.object_by_name(flipped.as_str())
                } else {
                    None
                }
            });
            if let Some(ref mut pose) = db.object_mut(owner).pose {
                if let Some(ch) = pose.channel_by_name_mut(&dst_name) {
                    ch.custom_shape_transform.loc.x = -ch.custom_shape_transform.loc.x;
                    ch.custom_shape_transform.rot_euler.y = -ch.custom_shape_transform.rot_euler.y;
                    ch.custom_shape_transform.rot_euler.z = -ch.custom_shape_transform.rot_euler.z;
                    match swapped {
                        Some(flipped_ob) => ch.custom_shape = Some(flipped_ob),
                        None => {
                            if shape.is_some() {
                                ch.custom_shape_transform.scale.x =
                                    -ch.custom_shape_transform.scale.x;
                            }
                        }
                    }
                }
            }
        }
    }

    // Pass 5: animation curves already authored against the source copy
    // across, sign-flipped per channel.
    let mut action_ids: Vec<ActionId> = vec![];
    for &owner in &owners {
        if let Some(ref adt) = db.object(owner).adt {
            if let Some(act) = adt.action {
                action_ids.push(act);
            }
        }
    }
    action_ids.sort();
    action_ids.dedup();
    for act in action_ids {
        let action = db.action_mut(act);
        for &(src_name, dst_name, _) in &name_pairs {
            ::anim::mirror_bone_curves(action, &src_name, &dst_name);
        }
    }

    db.armature_mut(arm_id).edit = Some(g);
    db.tag_geometry(arm_id);
    OpStatus::Finished
}

#[cfg(test)]
mod tests {
    use super::*;
    use anim::{Action, AnimData, FCurve, Keyframe};
    use armature::Armature;
    use cgmath::vec3;
    use constraint::{Constraint, ConstraintKind, Space};
    use db::{Object, ObjectData};
    use ops::enter_editmode;
    use pose::Pose;

    fn n(s: &str) -> BoneName {
        BoneName::new(s)
    }

    /// Spine (center) with Arm.L hanging off it, selected.
    fn arm_l_db() -> (Database, usize, ObjectId) {
        let mut db = Database::new();
        let mut g = EditGraph::new();
        let spine = g.add(&n("Spine"));
        g.bone_mut(spine).tail = vec3(0.0, 0.0, 1.0);
        let arm_l = g.add(&n("Arm.L"));
        g.bone_mut(arm_l).head = vec3(0.2, 0.0, 1.0);
        g.bone_mut(arm_l).tail = vec3(1.0, 0.3, 1.2);
        g.bone_mut(arm_l).roll = 0.4;
        g.set_parent(arm_l, Some(spine), false);
        let mut arm = Armature::new("Rig");
        arm.from_edit(&g);
        let arm_id = db.add_armature(arm);
        let ob = db.add_object(Object::new("RigOb", ObjectData::Armature(arm_id)));
        enter_editmode(&mut db, ob);
        {
            let g = db.armature_mut(arm_id).edit.as_mut().unwrap();
            let arm_l = g.find(&n("Arm.L")).unwrap();
            g.bone_mut(arm_l).select();
        }
        (db, arm_id, ob)
    }

    #[test]
    fn test_symmetrize_creates_mirrored_bone() {
        let (mut db, arm_id, ob) = arm_l_db();
        assert!(symmetrize(&mut db, ob, SymDir::PosX).finished());

        let g = db.armature(arm_id).edit.as_ref().unwrap();
        assert_eq!(g.bone_count(), 3);
        let l = g.find(&n("Arm.L")).unwrap();
        let r = g.find(&n("Arm.R")).expect("exactly one new bone Arm.R");
        assert_eq!(g.bone(r).head, vec3(-0.2, 0.0, 1.0));
        assert_eq!(g.bone(r).tail, vec3(-1.0, 0.3, 1.2));
        assert_eq!(g.bone(r).roll, -g.bone(l).roll);
        // Center parent resolves to itself.
        let spine = g.find(&n("Spine")).unwrap();
        assert_eq!(g.parent_of(r), Some(spine));
    }

    #[test]
    fn test_symmetrize_center_bone_skipped() {
        let (mut db, arm_id, ob) = arm_l_db();
        {
            let g = db.armature_mut(arm_id).edit.as_mut().unwrap();
            let spine = g.find(&n("Spine")).unwrap();
            g.bone_mut(spine).select();
        }
        assert!(symmetrize(&mut db, ob, SymDir::PosX).finished());
        let g = db.armature(arm_id).edit.as_ref().unwrap();
        // Arm.R created, but no mirror of Spine.
        assert_eq!(g.bone_count(), 3);
    }

    #[test]
    fn test_symmetrize_existing_target_synced() {
        let (mut db, arm_id, ob) = arm_l_db();
        {
            let g = db.armature_mut(arm_id).edit.as_mut().unwrap();
            let r = g.add(&n("Arm.R"));
            g.bone_mut(r).head = vec3(-9.0, 9.0, 9.0);
            g.bone_mut(r).tail = vec3(-9.0, 9.0, 10.0);
        }
        assert!(symmetrize(&mut db, ob, SymDir::PosX).finished());

        let g = db.armature(arm_id).edit.as_ref().unwrap();
        assert_eq!(g.bone_count(), 3);
        let r = g.find(&n("Arm.R")).unwrap();
        // Geometry resynchronized from the source, not kept.
        assert_eq!(g.bone(r).head, vec3(-0.2, 0.0, 1.0));
    }

    #[test]
    fn test_symmetrize_both_selected_picks_direction_side() {
        let (mut db, arm_id, ob) = arm_l_db();
        {
            let g = db.armature_mut(arm_id).edit.as_mut().unwrap();
            let r = g.add(&n("Arm.R"));
            g.bone_mut(r).head = vec3(-0.5, 0.0, 2.0);
            g.bone_mut(r).tail = vec3(-1.5, 0.0, 2.0);
            g.bone_mut(r).select();
        }
        // Copy -X onto +X: Arm.R is the source, Arm.L rebuilt from it.
        assert!(symmetrize(&mut db, ob, SymDir::NegX).finished());
        let g = db.armature(arm_id).edit.as_ref().unwrap();
        let l = g.find(&n("Arm.L")).unwrap();
        assert_eq!(g.bone(l).head, vec3(0.5, 0.0, 2.0));
        // The loser lost its selection.
        assert!(!g.bone(l).selected());
    }

    #[test]
    fn test_symmetrize_mirrors_constraints_and_curves() {
        let (mut db, arm_id, ob) = arm_l_db();

        let act = db.add_action(Action {
            name: "Act".to_string(),
            curves: vec![FCurve {
                path: "pose.bones[\"Arm.L\"].location".to_string(),
                index: 0,
                keys: vec![Keyframe { frame: 1.0, value: 0.6 }],
            }],
        });
        {
            let ob_mut = db.object_mut(ob);
            ob_mut.adt = Some(AnimData { action: Some(act), drivers: vec![] });
            let mut pose = Pose::new();
            {
                let ch = pose.ensure_channel(n("Arm.L"));
                let mut c = Constraint::new(
                    "Limit",
                    ConstraintKind::LimitRotation {
                        min: vec3(-0.25, -0.5, 0.0),
                        max: vec3(1.0, 0.5, 0.0),
                    },
                );
                c.owner_space = Space::Local;
                c.target = Some(ob);
                c.subtarget = n("Spine");
                ch.constraints.push(c);
            }
            ob_mut.pose = Some(pose);
        }

        assert!(symmetrize(&mut db, ob, SymDir::PosX).finished());

        let pose = db.object(ob).pose.as_ref().unwrap();
        let ch = pose.channel_by_name(&n("Arm.R")).expect("synced channel");
        // Spine has no mirror: subtarget falls back to self.
        assert_eq!(ch.constraints[0].subtarget, n("Spine"));
        match ch.constraints[0].kind {
            ConstraintKind::LimitRotation { min, max } => {
                // new.min == -old.max, new.max == -old.min on the
                // flipped axes.
                assert_eq!(min.x, -1.0);
                assert_eq!(max.x, 0.25);
                assert_eq!(min.y, -0.5);
                assert_eq!(max.y, 0.5);
            }
            _ => unreachable!(),
        }

        let action = db.action(act);
        let mirrored = action
            .curves
            .iter()
            .find(|c| c.path == "pose.bones[\"Arm.R\"].location" && c.index == 0)
            .expect("mirrored curve");
        assert_eq!(mirrored.keys[0].value, -0.6);
        // The source curve is untouched.
        assert!(action
            .curves
            .iter()
            .any(|c| c.path == "pose.bones[\"Arm.L\"].location"));
    }

    #[test]
    fn test_symmetrize_mirrors_custom_shape() {
        let (mut db, _, ob) = arm_l_db();
        let shape = db.add_object(Object::new("WGT.L", ObjectData::Mesh));
        let shape_r = db.add_object(Object::new("WGT.R", ObjectData::Mesh));
        {
            let ob_mut = db.object_mut(ob);
            let mut pose = Pose::new();
            pose.ensure_channel(n("Arm.L")).custom_shape = Some(shape);
            ob_mut.pose = Some(pose);
        }

        assert!(symmetrize(&mut db, ob, SymDir::PosX).finished());

        let pose = db.object(ob).pose.as_ref().unwrap();
        let ch = pose.channel_by_name(&n("Arm.R")).unwrap();
        // A name-flipped shape exists, so it is swapped in and the scale
        // stays positive.
        assert_eq!(ch.custom_shape, Some(shape_r));
        assert_eq!(ch.custom_shape_transform.scale.x, 1.0);
    }

    #[test]
    fn test_symmetrize_negates_shape_scale_without_flipped_object() {
        let (mut db, _, ob) = arm_l_db();
        let shape = db.add_object(Object::new("Widget", ObjectData::Mesh));
        {
            let ob_mut = db.object_mut(ob);
            let mut pose = Pose::new();
            {
                let ch = pose.ensure_channel(n("Arm.L"));
                ch.custom_shape = Some(shape);
                ch.custom_shape_transform.loc.x = 0.3;
            }
            ob_mut.pose = Some(pose);
        }

        assert!(symmetrize(&mut db, ob, SymDir::PosX).finished());

        let pose = db.object(ob).pose.as_ref().unwrap();
        let ch = pose.channel_by_name(&n("Arm.R")).unwrap();
        assert_eq!(ch.custom_shape, Some(shape));
        assert_eq!(ch.custom_shape_transform.scale.x, -1.0);
        assert_eq!(ch.custom_shape_transform.loc.x, -0.3);
    }
}
