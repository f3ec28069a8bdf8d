//! Parenting, deletion, and cross-object restructuring (join/separate).
//!
//! Join and separate are the two operations whose effects reach outside
//! a single armature: bones, pose channels, constraints, and animation
//! move between objects, and every name reference in the database has to
//! come along. Both lean on the same two mechanisms as everything else:
//! `retarget::rename_bone` for identity changes, and explicit bounded
//! sweeps for object-pointer retargeting. No reference is left for a
//! later pass to fix.

use armature::Armature;
use cgmath::{Matrix3, Matrix4, SquareMatrix, Vector3};
use constraint::Constraint;
use db::{Database, ObjectData, ObjectId, ParType};
use edit::{EditBone, BONE_CONNECTED};
use errors::Result;
use math;
use name::BoneName;
use ops::{edit_armature, sync_users, take_edit, OpStatus};
use pose::Pose;
use retarget;
use std::collections::HashSet;
use util::namers::{unique_name, UniqueNamer};

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum ParentMode {
    /// Snap the child's head to the parent's tail, carrying the child's
    /// subtree along so its shape is preserved.
    Connected,
    /// Keep absolute positions; only the logical parent changes.
    Offset,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum ClearMode {
    /// Drop the parent reference entirely.
    Clear,
    /// Keep the parent but stop tracking its tail.
    Disconnect,
}

/// Parents every selected bone to the active bone.
pub fn parent_set(db: &mut Database, ob: ObjectId, mode: ParentMode) -> OpStatus {
    let arm_id = match edit_armature(db, ob) {
        Some(id) => id,
        None => return OpStatus::Cancelled,
    };
    let (parent, targets) = {
        let g = match db.armature(arm_id).edit {
            Some(ref g) => g,
            None => return OpStatus::Cancelled,
        };
        let parent = match g.active {
            Some(a) => a,
            None => return OpStatus::Cancelled,
        };
        let targets: Vec<_> = g
            .selected_bones()
            .into_iter()
            .filter(|&b| b != parent)
            .collect();
        if targets.is_empty() {
            return OpStatus::Cancelled;
        }
        (parent, targets)
    };

    let mut g = take_edit(db, arm_id);
    for child in targets {
        match mode {
            ParentMode::Connected => {
                let offset = g.bone(parent).tail - g.bone(child).head;
                g.translate_subtree(child, offset);
                g.set_parent(child, Some(parent), true);
            }
            ParentMode::Offset => {
                g.set_parent(child, Some(parent), false);
            }
        }
    }

    db.armature_mut(arm_id).edit = Some(g);
    db.tag_geometry(arm_id);
    OpStatus::Finished
}

pub fn parent_clear(db: &mut Database, ob: ObjectId, mode: ClearMode) -> OpStatus {
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
    for b in g.selected_bones() {
        match mode {
            ClearMode::Clear => g.set_parent(b, None, false),
            ClearMode::Disconnect => g.bone_mut(b).flag &= !BONE_CONNECTED,
        }
    }

    db.armature_mut(arm_id).edit = Some(g);
    db.tag_geometry(arm_id);
    OpStatus::Finished
}

/// Deletes the selected bones. Children are orphaned (the documented
/// rule, same as `EditGraph::remove`), matching pose channels go away
/// with their constraints, and any constraint elsewhere that named a
/// deleted bone is cleared and disabled rather than left dangling.
pub fn delete_selected(db: &mut Database, ob: ObjectId) -> OpStatus {
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
    let doomed = g.selected_bones();
    let names: HashSet<BoneName> = doomed.iter().map(|&b| g.bone(b).name).collect();
    for b in doomed {
        g.remove(b);
    }
    db.armature_mut(arm_id).edit = Some(g);

    let owners = db.users_of_armature(arm_id);
    for &owner in &owners {
        if let Some(ref mut pose) = db.object_mut(owner).pose {
            for name in &names {
                pose.remove_channel(name);
            }
        }
    }

    clear_name_refs(db, &owners, &names);
    db.tag_geometry(arm_id);
    OpStatus::Finished
}

/// Clears (and disables, for constraints) every reference to one of
/// `names` on an object of `owners`. Used after deletion, where leaving
/// the string in place would be a dangling reference.
fn clear_name_refs(db: &mut Database, owners: &[ObjectId], names: &HashSet<BoneName>) {
    for id in db.object_ids() {
        let ob = db.object_mut(id);
        for c in &mut ob.constraints {
            clear_dangling_subtargets(c, owners, names);
        }
        if let Some(ref mut pose) = ob.pose {
            for ch in &mut pose.channels {
                for c in ch.constraints.iter_mut() {
                    clear_dangling_subtargets(c, owners, names);
                }
            }
        }
        if ob.par_type == ParType::Bone
            && ob.parent.map_or(false, |p| owners.contains(&p))
            && names.contains(&ob.parsubstr)
        {
            warn!("object {} lost its parent bone {}", ob.name, ob.parsubstr);
            ob.parsubstr = BoneName::none();
            ob.par_type = ParType::Object;
        }
        match ob.data {
            ObjectData::Camera(ref mut cam) => {
                if cam.dof_focus_object.map_or(false, |t| owners.contains(&t))
                    && names.contains(&cam.dof_focus_bone)
                {
                    cam.dof_focus_bone = BoneName::none();
                }
            }
            ObjectData::GreasePencil(ref mut gp) => {
                for layer in &mut gp.layers {
                    if layer.par_type == ParType::Bone
                        && layer.parent.map_or(false, |p| owners.contains(&p))
                        && names.contains(&layer.parsubstr)
                    {
                        layer.parsubstr = BoneName::none();
                        layer.par_type = ParType::Object;
                    }
                }
            }
            _ => {}
        }
    }
    let clear_view = match db.view_center {
        Some((vo, ref vn)) => owners.contains(&vo) && names.contains(vn),
        None => false,
    };
    if clear_view {
        db.view_center = None;
    }
}

fn clear_dangling_subtargets(
    c: &mut Constraint,
    owners: &[ObjectId],
    names: &HashSet<BoneName>,
) {
    let name = c.name.clone();
    let mut cleared = false;
    for (target, subtarget) in c.targets_mut() {
        match *target {
            Some(t) if owners.contains(&t) => {}
            _ => continue,
        }
        if names.contains(subtarget) {
            warn!("constraint {} lost subtarget {}; disabled", name, subtarget);
            *subtarget = BoneName::none();
            cleared = true;
        }
    }
    if cleared {
        c.disable();
    }
}

/// Merges the source armature objects into `target`: bones re-expressed
/// in the target's local space (with a per-bone roll correction derived
/// from the relative transform), names uniquified into the merged
/// namespace through `rename_bone` so every cross-reference follows,
/// pose channels and animation moved over, and the emptied source
/// objects freed. Non-armature or edit-mode sources are skipped, never
/// fatal.
pub fn join(db: &mut Database, target: ObjectId, sources: &[ObjectId]) -> Result<OpStatus> {
    if target >= db.objects.len() || db.objects[target].is_none() {
        return Ok(OpStatus::Cancelled);
    }
    check!(db.object(target).armature().is_some())?;
    let tgt_arm = db.object(target).armature().unwrap();
    if db.armature(tgt_arm).edit.is_some() {
        return Ok(OpStatus::Cancelled);
    }

    let mut srcs: Vec<(ObjectId, usize)> = vec![];
    for &sob in sources {
        if sob == target || sob >= db.objects.len() || db.objects[sob].is_none() {
            continue;
        }
        let sarm = match db.object(sob).armature() {
            Some(a) => a,
            None => {
                warn!("join: skipping non-armature object {}", db.object(sob).name);
                continue;
            }
        };
        if sarm == tgt_arm {
            warn!("join: {} shares the target armature; skipped", db.object(sob).name);
            continue;
        }
        if db.armature(sarm).edit.is_some() {
            warn!("join: {} is in edit mode; skipped", db.object(sob).name);
            continue;
        }
        srcs.push((sob, sarm));
    }
    if srcs.is_empty() {
        return Ok(OpStatus::Cancelled);
    }

    // Uniquify every source bone name against the merged namespace.
    // Routing each collision through rename_bone keeps every constraint,
    // driver, and path in the database in step.
    let mut namer = UniqueNamer::new();
    for bone in &db.armature(tgt_arm).bones {
        namer.reserve(bone.name);
    }
    for &(_, sarm) in &srcs {
        let names: Vec<BoneName> =
            db.armature(sarm).bones.iter().map(|b| b.name).collect();
        for old in names {
            let fresh = {
                let arm = db.armature(sarm);
                unique_name(
                    |c| {
                        namer.is_taken(c)
                            || (*c != old && arm.bone_by_name(c).is_some())
                    },
                    old,
                )
            };
            if fresh != old {
                retarget::rename_bone(db, sarm, old, fresh)?;
            }
            namer.reserve(fresh);
        }
    }

    let tgt_inv = match db.object(target).matrix.invert() {
        Some(m) => m,
        None => bail!("target object matrix is singular"),
    };

    let mut g = db.armature(tgt_arm).to_edit();
    for &(sob, sarm) in &srcs {
        let mat = tgt_inv * db.object(sob).matrix;
        let rot = Matrix3::from_cols(mat.x.truncate(), mat.y.truncate(), mat.z.truncate());

        // Append the source bones, re-expressed in the target's space.
        // The bone arena is parents-before-children, so parents are
        // always already mapped.
        let bones = db.armature(sarm).bones.clone();
        let mut new_nodes = Vec::with_capacity(bones.len());
        for bone in &bones {
            let mut eb = EditBone::new(bone.name);
            eb.head = transform_point(&mat, bone.arm_head);
            eb.tail = transform_point(&mat, bone.arm_tail);
            eb.roll = bone.arm_roll;
            if let Some(old_dir) = math::bone_direction(bone.arm_head, bone.arm_tail) {
                if let Some(new_dir) = math::bone_direction(eb.head, eb.tail) {
                    let old_mat = math::vec_roll_to_mat3(old_dir, bone.arm_roll);
                    eb.roll = math::mat3_vec_to_roll(&(rot * old_mat), new_dir);
                }
            }
            eb.rad_head = bone.rad_head;
            eb.rad_tail = bone.rad_tail;
            eb.flag = bone.flag;
            eb.layer = bone.layer;
            eb.inherit_scale = bone.inherit_scale;
            eb.bbone = bone.bbone;
            let node = g.graph.add_node(eb);
            if let Some(p) = bone.parent {
                g.graph.add_edge(new_nodes[p], node, ());
            }
            new_nodes.push(node);
        }

        // Pose channels move onto the target object.
        if let Some(src_pose) = db.object_mut(sob).pose.take() {
            let tgt_ob = db.object_mut(target);
            if tgt_ob.pose.is_none() {
                tgt_ob.pose = Some(Pose::new());
            }
            if let Some(ref mut pose) = tgt_ob.pose {
                for ch in src_pose.channels {
                    let name = ch.name;
                    pose.ensure_channel(name).copy_data_from(&ch);
                }
                pose.rebuild_hash();
            }
        }

        // Everything that pointed at the source object now points at the
        // target: the bones live there.
        for id in db.object_ids() {
            let ob = db.object_mut(id);
            for c in &mut ob.constraints {
                retarget_object_refs(c, sob, target);
            }
            if let Some(ref mut pose) = ob.pose {
                for ch in &mut pose.channels {
                    for c in ch.constraints.iter_mut() {
                        retarget_object_refs(c, sob, target);
                    }
                }
            }
            if ob.parent == Some(sob) {
                ob.parent = Some(target);
            }
            for m in &mut ob.modifiers {
                match *m {
                    ::db::Modifier::Armature { ref mut object }
                    | ::db::Modifier::GpArmature { ref mut object } => {
                        if *object == Some(sob) {
                            *object = Some(target);
                        }
                    }
                }
            }
            match ob.data {
                ObjectData::Camera(ref mut cam) => {
                    if cam.dof_focus_object == Some(sob) {
                        cam.dof_focus_object = Some(target);
                    }
                }
                ObjectData::GreasePencil(ref mut gp) => {
                    for layer in &mut gp.layers {
                        if layer.parent == Some(sob) {
                            layer.parent = Some(target);
                        }
                    }
                }
                _ => {}
            }
        }
        if let Some((vo, name)) = db.view_center {
            if vo == sob {
                db.view_center = Some((target, name));
            }
        }

        // Animation data merges into the target object's.
        if let Some(src_adt) = db.object_mut(sob).adt.take() {
            let merge_action = {
                let tgt_ob = db.object_mut(target);
                match tgt_ob.adt {
                    None => {
                        tgt_ob.adt = Some(src_adt);
                        None
                    }
                    Some(ref mut adt) => {
                        adt.drivers.extend(src_adt.drivers);
                        match (adt.action, src_adt.action) {
                            (None, any) => {
                                adt.action = any;
                                None
                            }
                            (Some(ta), Some(sa)) if ta != sa => Some((ta, sa)),
                            _ => None,
                        }
                    }
                }
            };
            if let Some((ta, sa)) = merge_action {
                let curves = db.action(sa).curves.clone();
                db.action_mut(ta).curves.extend(curves);
            }
        }

        db.free_object(sob);
        db.free_armature(sarm);
    }

    db.armature_mut(tgt_arm).from_edit(&g);
    sync_users(db, tgt_arm);
    db.tag_geometry(tgt_arm);
    db.tag_relations();
    Ok(OpStatus::Finished)
}

/// Splits the selected bones off into a new armature object (a copy of
/// the original). The selected bones are erased from the original, the
/// unselected from the copy, and any constraint, bone parent, or view
/// reference that followed a moved bone is retargeted to the new
/// object. Returns the new object, or None when there is nothing to
/// separate (no selection, or everything selected).
pub fn separate(db: &mut Database, ob: ObjectId) -> Result<Option<ObjectId>> {
    let arm_id = match edit_armature(db, ob) {
        Some(id) => id,
        None => return Ok(None),
    };

    let (moved, kept): (Vec<BoneName>, Vec<BoneName>) = {
        let g = match db.armature(arm_id).edit {
            Some(ref g) => g,
            None => return Ok(None),
        };
        let mut moved = vec![];
        let mut kept = vec![];
        for b in g.bones() {
            let bone = g.bone(b);
            if bone.selected() && bone.visible() {
                moved.push(bone.name);
            } else {
                kept.push(bone.name);
            }
        }
        (moved, kept)
    };
    if moved.is_empty() || kept.is_empty() {
        return Ok(None);
    }

    // Flush the in-progress edit so both copies see current geometry.
    {
        let g = take_edit(db, arm_id);
        db.armature_mut(arm_id).from_edit(&g);
        db.armature_mut(arm_id).edit = Some(g);
    }

    // Duplicate the whole object, armature included.
    let new_arm_id = {
        let mut arm = db.armature(arm_id).clone();
        arm.edit = None;
        arm.name = format!("{}.001", arm.name);
        db.add_armature(arm)
    };
    let new_ob_id = {
        let src = db.object(ob).clone();
        let name = unique_object_name(db, &src.name);
        let mut new_ob = src;
        new_ob.name = name;
        new_ob.data = ObjectData::Armature(new_arm_id);
        db.add_object(new_ob)
    };

    let moved_set: HashSet<BoneName> = moved.iter().cloned().collect();
    let kept_set: HashSet<BoneName> = kept.iter().cloned().collect();

    // Original loses the moved bones...
    {
        let mut g = take_edit(db, arm_id);
        for name in &moved {
            if let Some(b) = g.find(name) {
                g.remove(b);
            }
        }
        db.armature_mut(arm_id).from_edit(&g);
        db.armature_mut(arm_id).edit = Some(g);
    }
    let owners = db.users_of_armature(arm_id);
    for &owner in &owners {
        if let Some(ref mut pose) = db.object_mut(owner).pose {
            for name in &moved {
                pose.remove_channel(name);
            }
        }
    }

    // ...and the copy loses everything else.
    remove_bones_persistent(db.armature_mut(new_arm_id), &kept_set);
    if let Some(ref mut pose) = db.object_mut(new_ob_id).pose {
        for name in &kept {
            pose.remove_channel(name);
        }
    }

    // Re-link every reference to a moved bone onto the new object.
    for id in db.object_ids() {
        let ob_mut = db.object_mut(id);
        for c in &mut ob_mut.constraints {
            relink_moved_subtargets(c, &owners, &moved_set, new_ob_id);
        }
        if let Some(ref mut pose) = ob_mut.pose {
            for ch in &mut pose.channels {
                for c in ch.constraints.iter_mut() {
                    relink_moved_subtargets(c, &owners, &moved_set, new_ob_id);
                }
            }
        }
        if ob_mut.par_type == ParType::Bone
            && ob_mut.parent.map_or(false, |p| owners.contains(&p))
            && moved_set.contains(&ob_mut.parsubstr)
        {
            ob_mut.parent = Some(new_ob_id);
        }
        match ob_mut.data {
            ObjectData::Camera(ref mut cam) => {
                if cam.dof_focus_object.map_or(false, |t| owners.contains(&t))
                    && moved_set.contains(&cam.dof_focus_bone)
                {
                    cam.dof_focus_object = Some(new_ob_id);
                }
            }
            ObjectData::GreasePencil(ref mut gp) => {
                for layer in &mut gp.layers {
                    if layer.par_type == ParType::Bone
                        && layer.parent.map_or(false, |p| owners.contains(&p))
                        && moved_set.contains(&layer.parsubstr)
                    {
                        layer.parent = Some(new_ob_id);
                    }
                }
            }
            _ => {}
        }
    }
    let retarget_view = match db.view_center {
        Some((vo, ref vn)) => owners.contains(&vo) && moved_set.contains(vn),
        None => false,
    };
    if retarget_view {
        if let Some((_, name)) = db.view_center {
            db.view_center = Some((new_ob_id, name));
        }
    }

    db.tag_geometry(arm_id);
    db.tag_geometry(new_arm_id);
    db.tag_relations();
    Ok(Some(new_ob_id))
}

fn relink_moved_subtargets(
    c: &mut Constraint,
    owners: &[ObjectId],
    moved: &HashSet<BoneName>,
    new_ob: ObjectId,
) {
    for (target, subtarget) in c.targets_mut() {
        match *target {
            Some(t) if owners.contains(&t) => {}
            _ => continue,
        }
        if moved.contains(subtarget) {
            *target = Some(new_ob);
        }
    }
}

/// Removes bones by name from the persistent arena, remapping parent
/// indices. Children of a removed bone are orphaned and disconnected,
/// the same rule as edit-mode removal.
fn remove_bones_persistent(arm: &mut Armature, names: &HashSet<BoneName>) {
    let mut remap: Vec<Option<usize>> = Vec::with_capacity(arm.bones.len());
    let mut kept = 0;
    for bone in &arm.bones {
        if names.contains(&bone.name) {
            remap.push(None);
        } else {
            remap.push(Some(kept));
            kept += 1;
        }
    }

    let old_active = arm.active;
    let mut bones = Vec::with_capacity(kept);
    for (i, bone) in arm.bones.drain(..).enumerate() {
        if remap[i].is_none() {
            continue;
        }
        let mut bone = bone;
        bone.parent = match bone.parent {
            Some(p) => match remap[p] {
                Some(np) => Some(np),
                None => {
                    bone.flag &= !BONE_CONNECTED;
                    None
                }
            },
            None => None,
        };
        bones.push(bone);
    }
    arm.bones = bones;
    arm.active = old_active.and_then(|a| remap[a]);
    arm.rebuild_by_name();
}

fn unique_object_name(db: &Database, base: &str) -> String {
    if !db.object_name_in_use(base) {
        return base.to_string();
    }
    let mut n = 1;
    loop {
        let candidate = format!("{}.{:03}", base, n);
        if !db.object_name_in_use(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

fn transform_point(m: &Matrix4<f32>, p: Vector3<f32>) -> Vector3<f32> {
    (m * p.extend(1.0)).truncate()
}

fn retarget_object_refs(c: &mut Constraint, from: ObjectId, to: ObjectId) {
    for (target, _) in c.targets_mut() {
        if *target == Some(from) {
            *target = Some(to);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::vec3;
    use constraint::ConstraintKind;
    use db::Object;
    use edit::EditGraph;
    use ops::{enter_editmode, exit_editmode};

    fn n(s: &str) -> BoneName {
        BoneName::new(s)
    }

    fn armature_object(db: &mut Database, name: &str, bones: &[(&str, [f32; 3], [f32; 3], Option<&str>)]) -> (usize, ObjectId) {
        let mut g = EditGraph::new();
        for &(bname, head, tail, parent) in bones {
            let b = g.add(&n(bname));
            g.bone_mut(b).head = vec3(head[0], head[1], head[2]);
            g.bone_mut(b).tail = vec3(tail[0], tail[1], tail[2]);
            if let Some(p) = parent {
                let p = g.find(&n(p)).unwrap();
                g.set_parent(b, Some(p), false);
            }
        }
        let mut arm = Armature::new(name);
        arm.from_edit(&g);
        let arm_id = db.add_armature(arm);
        let mut ob = Object::new(name, ObjectData::Armature(arm_id));
        ob.pose = Some(Pose::new());
        let ob_id = db.add_object(ob);
        (arm_id, ob_id)
    }

    #[test]
    fn test_parent_set_connected_translates_subtree() {
        let mut db = Database::new();
        let (arm_id, ob) = armature_object(
            &mut db,
            "Rig",
            &[
                ("Root", [0.0, 0.0, 0.0], [0.0, 1.0, 0.0], None),
                ("Limb", [5.0, 0.0, 0.0], [5.0, 1.0, 0.0], None),
                ("Tip", [5.0, 1.0, 0.0], [5.0, 2.0, 0.0], Some("Limb")),
            ],
        );
        enter_editmode(&mut db, ob);
        {
            let g = db.armature_mut(arm_id).edit.as_mut().unwrap();
            let root = g.find(&n("Root")).unwrap();
            let limb = g.find(&n("Limb")).unwrap();
            g.bone_mut(limb).select();
            g.active = Some(root);
        }

        assert!(parent_set(&mut db, ob, ParentMode::Connected).finished());

        let g = db.armature(arm_id).edit.as_ref().unwrap();
        let root = g.find(&n("Root")).unwrap();
        let limb = g.find(&n("Limb")).unwrap();
        let tip = g.find(&n("Tip")).unwrap();
        assert_eq!(g.parent_of(limb), Some(root));
        assert!(g.bone(limb).connected());
        assert_eq!(g.bone(limb).head, vec3(0.0, 1.0, 0.0));
        // Shape preserved: the whole subtree moved by the same offset.
        assert_eq!(g.bone(limb).tail, vec3(0.0, 2.0, 0.0));
        assert_eq!(g.bone(tip).head, vec3(0.0, 2.0, 0.0));
        assert_eq!(g.bone(tip).tail, vec3(0.0, 3.0, 0.0));
    }

    #[test]
    fn test_parent_clear_modes() {
        let mut db = Database::new();
        let (arm_id, ob) = armature_object(
            &mut db,
            "Rig",
            &[
                ("A", [0.0, 0.0, 0.0], [0.0, 1.0, 0.0], None),
                ("B", [0.0, 1.0, 0.0], [0.0, 2.0, 0.0], Some("A")),
            ],
        );
        enter_editmode(&mut db, ob);
        {
            let g = db.armature_mut(arm_id).edit.as_mut().unwrap();
            let b = g.find(&n("B")).unwrap();
            g.bone_mut(b).flag |= BONE_CONNECTED;
            g.bone_mut(b).select();
        }

        assert!(parent_clear(&mut db, ob, ClearMode::Disconnect).finished());
        {
            let g = db.armature(arm_id).edit.as_ref().unwrap();
            let a = g.find(&n("A")).unwrap();
            let b = g.find(&n("B")).unwrap();
            assert_eq!(g.parent_of(b), Some(a));
            assert!(!g.bone(b).connected());
        }

        assert!(parent_clear(&mut db, ob, ClearMode::Clear).finished());
        let g = db.armature(arm_id).edit.as_ref().unwrap();
        let b = g.find(&n("B")).unwrap();
        assert_eq!(g.parent_of(b), None);
    }

    #[test]
    fn test_delete_selected_cleans_references() {
        let mut db = Database::new();
        let (arm_id, ob) = armature_object(
            &mut db,
            "Rig",
            &[
                ("Keep", [0.0, 0.0, 0.0], [0.0, 1.0, 0.0], None),
                ("Doomed", [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], None),
                ("Child", [1.0, 1.0, 0.0], [1.0, 2.0, 0.0], Some("Doomed")),
            ],
        );
        {
            let pose = db.object_mut(ob).pose.as_mut().unwrap();
            pose.ensure_channel(n("Doomed"));
            let ch = pose.ensure_channel(n("Keep"));
            let mut c = Constraint::new("Track", ConstraintKind::DampedTrack);
            c.target = Some(ob);
            c.subtarget = n("Doomed");
            ch.constraints.push(c);
        }
        enter_editmode(&mut db, ob);
        {
            let g = db.armature_mut(arm_id).edit.as_mut().unwrap();
            let d = g.find(&n("Doomed")).unwrap();
            g.bone_mut(d).select();
        }

        assert!(delete_selected(&mut db, ob).finished());

        let g = db.armature(arm_id).edit.as_ref().unwrap();
        assert!(g.find(&n("Doomed")).is_none());
        let child = g.find(&n("Child")).unwrap();
        assert_eq!(g.parent_of(child), None);

        let pose = db.object(ob).pose.as_ref().unwrap();
        assert!(pose.channel_by_name(&n("Doomed")).is_none());
        let ch = pose.channel_by_name(&n("Keep")).unwrap();
        assert!(ch.constraints[0].subtarget.is_empty());
        assert!(ch.constraints[0].disabled());
    }

    #[test]
    fn test_join_merges_and_remaps() {
        let mut db = Database::new();
        let (_, tgt_ob) = armature_object(
            &mut db,
            "RigA",
            &[("Root", [0.0, 0.0, 0.0], [0.0, 1.0, 0.0], None)],
        );
        let (_, src_ob) = armature_object(
            &mut db,
            "RigB",
            &[
                ("Root", [0.0, 0.0, 0.0], [0.0, 1.0, 0.0], None),
                ("Limb", [0.0, 1.0, 0.0], [0.0, 2.0, 0.0], Some("Root")),
            ],
        );
        // Source object sits 3 units along X.
        db.object_mut(src_ob).matrix = Matrix4::from_translation(vec3(3.0, 0.0, 0.0));
        // An external constraint tracks the source's Limb.
        let tracker = {
            let mut t = Object::new("Tracker", ObjectData::Empty);
            let mut c = Constraint::new("Track", ConstraintKind::DampedTrack);
            c.target = Some(src_ob);
            c.subtarget = n("Limb");
            t.constraints.push(c);
            db.add_object(t)
        };

        let status = join(&mut db, tgt_ob, &[src_ob]).unwrap();
        assert!(status.finished());

        let tgt_arm = db.object(tgt_ob).armature().unwrap();
        let arm = db.armature(tgt_arm);
        // The colliding root was uniquified; the limb kept its name.
        assert!(arm.bone_by_name(&n("Root")).is_some());
        assert!(arm.bone_by_name(&n("Root.001")).is_some());
        let limb = arm.bone_by_name(&n("Limb")).unwrap();
        // Geometry carried the source object's transform along.
        assert_eq!(arm.bones[limb].arm_head, vec3(3.0, 1.0, 0.0));
        // Parent link survived the move.
        let root_b = arm.bone_by_name(&n("Root.001")).unwrap();
        assert_eq!(arm.bones[limb].parent, Some(root_b));

        // The external constraint follows the bones to the target object.
        let c = &db.object(tracker).constraints[0];
        assert_eq!(c.target, Some(tgt_ob));
        assert_eq!(c.subtarget, n("Limb"));

        // The source object and armature are gone.
        assert!(db.objects[src_ob].is_none());
        assert!(db.tags.relations);
    }

    #[test]
    fn test_join_skips_non_armatures() {
        let mut db = Database::new();
        let (_, tgt_ob) = armature_object(
            &mut db,
            "RigA",
            &[("Root", [0.0, 0.0, 0.0], [0.0, 1.0, 0.0], None)],
        );
        let mesh = db.add_object(Object::new("Mesh", ObjectData::Mesh));
        let status = join(&mut db, tgt_ob, &[mesh]).unwrap();
        assert!(!status.finished());
        // Nothing happened to the mesh.
        assert!(db.objects[mesh].is_some());
    }

    #[test]
    fn test_separate_then_join_restores_names() {
        let mut db = Database::new();
        let (arm_id, ob) = armature_object(
            &mut db,
            "Rig",
            &[
                ("Torso", [0.0, 0.0, 0.0], [0.0, 1.0, 0.0], None),
                ("Arm.L", [0.0, 1.0, 0.0], [1.0, 1.0, 0.0], Some("Torso")),
                ("Hand.L", [1.0, 1.0, 0.0], [2.0, 1.0, 0.0], Some("Arm.L")),
            ],
        );
        // A constraint on Torso's channel referencing Hand.L.
        {
            let pose = db.object_mut(ob).pose.as_mut().unwrap();
            let ch = pose.ensure_channel(n("Torso"));
            let mut c = Constraint::new("Track", ConstraintKind::DampedTrack);
            c.target = Some(ob);
            c.subtarget = n("Hand.L");
            ch.constraints.push(c);
        }

        enter_editmode(&mut db, ob);
        {
            let g = db.armature_mut(arm_id).edit.as_mut().unwrap();
            for name in &["Arm.L", "Hand.L"] {
                let b = g.find(&n(name)).unwrap();
                g.bone_mut(b).select();
            }
        }

        let new_ob = separate(&mut db, ob).unwrap().expect("separated");
        exit_editmode(&mut db, ob);

        // Bones are split between the two objects.
        let arm_a = db.armature(db.object(ob).armature().unwrap());
        assert!(arm_a.bone_by_name(&n("Torso")).is_some());
        assert!(arm_a.bone_by_name(&n("Arm.L")).is_none());
        let arm_b = db.armature(db.object(new_ob).armature().unwrap());
        assert!(arm_b.bone_by_name(&n("Arm.L")).is_some());
        assert!(arm_b.bone_by_name(&n("Hand.L")).is_some());
        assert!(arm_b.bone_by_name(&n("Torso")).is_none());
        // The constraint followed the moved bone to the new object.
        let pose = db.object(ob).pose.as_ref().unwrap();
        let c = &pose.channel_by_name(&n("Torso")).unwrap().constraints[0];
        assert_eq!(c.target, Some(new_ob));
        assert_eq!(c.subtarget, n("Hand.L"));

        // Joining back restores the original name set, and the
        // constraint's subtarget still resolves.
        let status = join(&mut db, ob, &[new_ob]).unwrap();
        assert!(status.finished());
        let arm = db.armature(db.object(ob).armature().unwrap());
        for name in &["Torso", "Arm.L", "Hand.L"] {
            assert!(arm.bone_by_name(&n(name)).is_some(), "missing {}", name);
        }
        let pose = db.object(ob).pose.as_ref().unwrap();
        let c = &pose.channel_by_name(&n("Torso")).unwrap().constraints[0];
        assert_eq!(c.target, Some(ob));
        assert!(db
            .armature(db.object(ob).armature().unwrap())
            .bone_by_name(&c.subtarget)
            .is_some());
    }

    #[test]
    fn test_separate_cancels_on_full_selection() {
        let mut db = Database::new();
        let (arm_id, ob) = armature_object(
            &mut db,
            "Rig",
            &[("Only", [0.0, 0.0, 0.0], [0.0, 1.0, 0.0], None)],
        );
        enter_editmode(&mut db, ob);
        {
            let g = db.armature_mut(arm_id).edit.as_mut().unwrap();
            let b = g.find(&n("Only")).unwrap();
            g.bone_mut(b).select();
        }
        assert!(separate(&mut db, ob).unwrap().is_none());
    }
}
