//! Duplicate the selected bones.
//!
//! Runs in fixed passes: extend the selection to mirror counterparts
//! (when mirror editing), copy every selected bone while building the
//! per-operation original->copy mapping, then remap parents and
//! bendy-bone handles through that mapping, copy and retarget pose
//! channels, and finally move selection and the active bone onto the
//! copies. The mapping is built and dropped inside this one operation;
//! nothing persists it.

use db::{Database, ObjectId};
use edit::{BBoneHandle, EBone, EditGraph};
use name::BoneName;
use ops::{edit_armature, take_edit, OpStatus};
use retarget;
use std::collections::HashMap;

fn remap_handle(
    g: &EditGraph,
    map: &HashMap<EBone, EBone>,
    handle: BBoneHandle,
) -> BBoneHandle {
    if let BBoneHandle::Absolute(name) = handle {
        if let Some(node) = g.find(&name) {
            if let Some(&dup) = map.get(&node) {
                return BBoneHandle::Absolute(g.bone(dup).name);
            }
        }
    }
    handle
}

pub fn duplicate_selected(db: &mut Database, ob: ObjectId) -> OpStatus {
    let arm_id = match edit_armature(db, ob) {
        Some(id) => id,
        None => return OpStatus::Cancelled,
    };
    let mirror_edit = db.armature(arm_id).mirror_edit;
    {
        let arm = db.armature(arm_id);
        let g = arm.edit.as_ref();
        if g.map_or(true, |g| g.selected_bones().is_empty()) {
            return OpStatus::Cancelled;
        }
    }

    let mut g = take_edit(db, arm_id);

    // Mirror editing duplicates both sides even if only one is selected.
    if mirror_edit {
        for b in g.selected_bones() {
            if let Some(m) = g.mirror_of(b) {
                g.bone_mut(m).select();
            }
        }
    }

    let selected = g.selected_bones();
    let mut map: HashMap<EBone, EBone> = HashMap::new();
    for &b in &selected {
        let d = g.duplicate(b, None);
        map.insert(b, d);
    }

    // Parents: follow the duplication where the parent was duplicated
    // too; otherwise keep the original parent, dropping the connected
    // flag since the geometry no longer touches it.
    for (&orig, &dup) in &map {
        if let Some(p) = g.parent_of(orig) {
            match map.get(&p) {
                Some(&dp) => {
                    let connected = g.bone(orig).connected();
                    g.set_parent(dup, Some(dp), connected);
                }
                None => {
                    g.set_parent(dup, Some(p), false);
                }
            }
        }
    }

    // Bendy-bone handles remap the same way.
    for &dup in map.values() {
        let prev = remap_handle(&g, &map, g.bone(dup).bbone.prev);
        let next = remap_handle(&g, &map, g.bone(dup).bbone.next);
        let bone = g.bone_mut(dup);
        bone.bbone.prev = prev;
        bone.bbone.next = next;
    }

    // Pose channels come along with their constraints, retargeted
    // through the mapping.
    let owners = db.users_of_armature(arm_id);
    let name_pairs: Vec<(BoneName, BoneName)> = map
        .iter()
        .map(|(&o, &d)| (g.bone(o).name, g.bone(d).name))
        .collect();
    for &owner in &owners {
        if let Some(ref mut pose) = db.object_mut(owner).pose {
            for &(on, dn) in &name_pairs {
                let src = match pose.channel_index(&on) {
                    Some(i) => pose.channels[i].clone(),
                    None => continue,
                };
                pose.ensure_channel(dn).copy_data_from(&src);
            }
            pose.rebuild_hash();
            for &(_, dn) in &name_pairs {
                if let Some(ch) = pose.channel_by_name_mut(&dn) {
                    retarget::retarget_duplicated_constraints(ch, &g, &map, &owners, false);
                }
            }
        }
    }

    // Selection and the active bone move to the copies.
    for &b in &selected {
        g.bone_mut(b).deselect();
    }
    for &d in map.values() {
        g.bone_mut(d).select();
    }
    if let Some(a) = g.active {
        if let Some(&da) = map.get(&a) {
            g.active = Some(da);
        }
    }

    db.armature_mut(arm_id).edit = Some(g);
    db.tag_geometry(arm_id);
    OpStatus::Finished
}

#[cfg(test)]
mod tests {
    use super::*;
    use armature::Armature;
    use cgmath::vec3;
    use constraint::{Constraint, ConstraintKind};
    use db::{Object, ObjectData};
    use ops::enter_editmode;
    use pose::Pose;

    fn n(s: &str) -> BoneName {
        BoneName::new(s)
    }

    /// Chain A -> B -> C (connected), plus a loose root Other.
    fn chain_db() -> (Database, usize, ObjectId) {
        let mut db = Database::new();
        let mut g = EditGraph::new();
        let a = g.add(&n("A"));
        g.bone_mut(a).tail = vec3(0.0, 1.0, 0.0);
        let b = g.add(&n("B"));
        g.bone_mut(b).head = vec3(0.0, 1.0, 0.0);
        g.bone_mut(b).tail = vec3(0.0, 2.0, 0.0);
        g.set_parent(b, Some(a), true);
        let c = g.add(&n("C"));
        g.bone_mut(c).head = vec3(0.0, 2.0, 0.0);
        g.bone_mut(c).tail = vec3(0.0, 3.0, 0.0);
        g.set_parent(c, Some(b), true);
        let other = g.add(&n("Other"));
        g.bone_mut(other).tail = vec3(1.0, 0.0, 0.0);

        let mut arm = Armature::new("Rig");
        arm.from_edit(&g);
        let arm_id = db.add_armature(arm);
        let ob = db.add_object(Object::new("RigOb", ObjectData::Armature(arm_id)));
        enter_editmode(&mut db, ob);
        (db, arm_id, ob)
    }

    #[test]
    fn test_duplicate_preserves_subtree_shape() {
        let (mut db, arm_id, ob) = chain_db();
        {
            let g = db.armature_mut(arm_id).edit.as_mut().unwrap();
            for name in &["A", "B", "C"] {
                let b = g.find(&n(name)).unwrap();
                g.bone_mut(b).select();
            }
            let a = g.find(&n("A")).unwrap();
            g.active = Some(a);
        }

        assert!(duplicate_selected(&mut db, ob).finished());

        let g = db.armature(arm_id).edit.as_ref().unwrap();
        let a1 = g.find(&n("A.001")).unwrap();
        let b1 = g.find(&n("B.001")).unwrap();
        let c1 = g.find(&n("C.001")).unwrap();
        // Same edges among the duplicated set, same connectivity.
        assert_eq!(g.parent_of(b1), Some(a1));
        assert_eq!(g.parent_of(c1), Some(b1));
        assert!(g.bone(b1).connected());
        assert!(g.bone(c1).connected());
        assert_eq!(g.parent_of(a1), None);
        // Originals deselected, copies selected, active moved.
        assert!(!g.bone(g.find(&n("A")).unwrap()).selected());
        assert!(g.bone(a1).selected());
        assert_eq!(g.active, Some(a1));
    }

    #[test]
    fn test_duplicate_edge_to_nonduplicated_keeps_original_parent() {
        let (mut db, arm_id, ob) = chain_db();
        {
            let g = db.armature_mut(arm_id).edit.as_mut().unwrap();
            let b = g.find(&n("B")).unwrap();
            g.bone_mut(b).select();
        }

        assert!(duplicate_selected(&mut db, ob).finished());

        let g = db.armature(arm_id).edit.as_ref().unwrap();
        let a = g.find(&n("A")).unwrap();
        let b1 = g.find(&n("B.001")).unwrap();
        assert_eq!(g.parent_of(b1), Some(a));
        // Geometry no longer touches: connected dropped.
        assert!(!g.bone(b1).connected());
    }

    #[test]
    fn test_duplicate_retargets_copied_constraints() {
        let (mut db, arm_id, ob) = chain_db();
        {
            let mut pose = Pose::new();
            {
                let ch = pose.ensure_channel(n("B"));
                let mut c = Constraint::new("Track", ConstraintKind::DampedTrack);
                c.target = Some(ob);
                c.subtarget = n("C");
                ch.constraints.push(c);
                let mut c2 = Constraint::new("TrackOut", ConstraintKind::DampedTrack);
                c2.target = Some(ob);
                c2.subtarget = n("Other");
                ch.constraints.push(c2);
            }
            db.object_mut(ob).pose = Some(pose);
        }
        {
            let g = db.armature_mut(arm_id).edit.as_mut().unwrap();
            for name in &["B", "C"] {
                let b = g.find(&n(name)).unwrap();
                g.bone_mut(b).select();
            }
        }

        assert!(duplicate_selected(&mut db, ob).finished());

        let pose = db.object(ob).pose.as_ref().unwrap();
        let ch = pose.channel_by_name(&n("B.001")).unwrap();
        // C was duplicated along: the copy follows it. Other was not:
        // the copy keeps pointing at the original.
        assert_eq!(ch.constraints[0].subtarget, n("C.001"));
        assert_eq!(ch.constraints[1].subtarget, n("Other"));
        // The original channel is untouched.
        let orig = pose.channel_by_name(&n("B")).unwrap();
        assert_eq!(orig.constraints[0].subtarget, n("C"));
    }

    #[test]
    fn test_duplicate_extends_to_mirror() {
        let mut db = Database::new();
        let mut g = EditGraph::new();
        let l = g.add(&n("Hand.L"));
        g.bone_mut(l).head = vec3(1.0, 0.0, 0.0);
        g.bone_mut(l).tail = vec3(2.0, 0.0, 0.0);
        let r = g.add(&n("Hand.R"));
        g.bone_mut(r).head = vec3(-1.0, 0.0, 0.0);
        g.bone_mut(r).tail = vec3(-2.0, 0.0, 0.0);
        let mut arm = Armature::new("Rig");
        arm.mirror_edit = true;
        arm.from_edit(&g);
        let arm_id = db.add_armature(arm);
        let ob = db.add_object(Object::new("RigOb", ObjectData::Armature(arm_id)));
        enter_editmode(&mut db, ob);
        {
            let g = db.armature_mut(arm_id).edit.as_mut().unwrap();
            let l = g.find(&n("Hand.L")).unwrap();
            g.bone_mut(l).select();
        }

        assert!(duplicate_selected(&mut db, ob).finished());

        let g = db.armature(arm_id).edit.as_ref().unwrap();
        assert!(g.find(&n("Hand.L.001")).is_some());
        assert!(g.find(&n("Hand.R.001")).is_some());
    }

    #[test]
    fn test_duplicate_nothing_selected_cancels() {
        let (mut db, arm_id, ob) = chain_db();
        assert!(!duplicate_selected(&mut db, ob).finished());
        assert_eq!(db.armature(arm_id).edit.as_ref().unwrap().bone_count(), 4);
    }
}
