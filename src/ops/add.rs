//! Adding bones: primitives, extrusion, subdivision.

use cgmath::{vec3, Vector3};
use db::{Database, ObjectId};
use edit::{EBone, BONE_ROOTSEL, BONE_SELECT_MASK, BONE_TIPSEL};
use math;
use name::BoneName;
use ops::{edit_armature, take_edit, OpStatus};

/// Creates one bone at `at`, pointing up a unit length, selected and
/// active. The name is uniquified within the armature.
pub fn add_bone(db: &mut Database, ob: ObjectId, name: &str, at: Vector3<f32>) -> OpStatus {
    let arm_id = match edit_armature(db, ob) {
        Some(id) => id,
        None => return OpStatus::Cancelled,
    };

    let mut g = take_edit(db, arm_id);
    for b in g.bones() {
        g.bone_mut(b).deselect();
    }
    let b = g.add(&BoneName::new(name));
    {
        let bone = g.bone_mut(b);
        bone.head = at;
        bone.tail = at + vec3(0.0, 0.0, 1.0);
        bone.select();
    }
    g.active = Some(b);
    db.armature_mut(arm_id).edit = Some(g);
    db.tag_geometry(arm_id);
    OpStatus::Finished
}

pub fn add_primitive(db: &mut Database, ob: ObjectId, at: Vector3<f32>) -> OpStatus {
    add_bone(db, ob, "Bone", at)
}

/// Extrudes new bones from the current selection: one child per selected
/// tip, or a sibling from the head when only the root is selected (and
/// extruding there wouldn't just double a tip extrusion). New
/// bones start zero-length (the interactive transform that follows drags
/// the tip) with only their tip selected.
///
/// With `forked` set while mirror editing is active, each extrusion
/// produces two bones with `_L`/`_R` names, the second mirrored across
/// the X plane.
pub fn extrude(db: &mut Database, ob: ObjectId, forked: bool) -> OpStatus {
    let arm_id = match edit_armature(db, ob) {
        Some(id) => id,
        None => return OpStatus::Cancelled,
    };
    let forked = forked && db.armature(arm_id).mirror_edit;

    let mut g = take_edit(db, arm_id);
    let sources = g.bones();
    let mut made: Vec<EBone> = vec![];

    for b in sources.iter().cloned() {
        // Decide what to extrude from.
        let (tip_sel, root_sel, connected, head, tail, name, roll, rad, layer) = {
            let bone = g.bone(b);
            if !bone.visible() {
                continue;
            }
            (
                bone.flag & BONE_TIPSEL != 0,
                bone.flag & BONE_ROOTSEL != 0,
                bone.connected(),
                bone.head,
                bone.tail,
                bone.name,
                bone.roll,
                bone.rad_tail,
                bone.layer,
            )
        };

        let from_tail = tip_sel;
        // Extruding the root of a connected bone whose parent's tip is
        // selected would double the parent's extrusion; skip that case.
        let from_root = !tip_sel && root_sel && match g.parent_of(b) {
            Some(p) => !(connected && g.bone(p).flag & BONE_TIPSEL != 0),
            None => true,
        };
        if !from_tail && !from_root {
            continue;
        }

        let at = if from_tail { tail } else { head };
        let parent = if from_tail { Some(b) } else { g.parent_of(b) };
        let connect_new = from_tail;

        let count = if forked { 2 } else { 1 };
        for i in 0..count {
            let desired = if forked {
                BoneName::new(&format!("{}{}", name, if i == 0 { "_L" } else { "_R" }))
            } else {
                name
            };
            let nb = g.add(&desired);
            {
                let bone = g.bone_mut(nb);
                bone.head = if i == 1 { math::mirror_x(at) } else { at };
                bone.tail = bone.head;
                bone.roll = if i == 1 { -roll } else { roll };
                bone.rad_head = rad;
                bone.rad_tail = rad;
                bone.layer = layer;
                bone.flag |= BONE_TIPSEL;
            }
            g.set_parent(nb, parent, connect_new);
            made.push(nb);
        }
    }

    if made.is_empty() {
        db.armature_mut(arm_id).edit = Some(g);
        return OpStatus::Cancelled;
    }

    // Only the fresh tips stay selected, ready for the transform.
    for b in sources {
        if !made.contains(&b) {
            g.bone_mut(b).flag &= !BONE_SELECT_MASK;
        }
    }
    g.active = made.last().cloned();

    db.armature_mut(arm_id).edit = Some(g);
    db.tag_geometry(arm_id);
    OpStatus::Finished
}

/// Replaces each selected bone with `cuts + 1` bones chained head to
/// tail at even spacing along the original, radii redistributed
/// linearly. Bones that were parented to the original move onto the
/// final segment; connectivity between the new segments is always set.
pub fn subdivide(db: &mut Database, ob: ObjectId, cuts: u32) -> OpStatus {
    if cuts == 0 {
        return OpStatus::Cancelled;
    }
    let arm_id = match edit_armature(db, ob) {
        Some(id) => id,
        None => return OpStatus::Cancelled,
    };

    let mut g = take_edit(db, arm_id);
    let selected = g.selected_bones();
    if selected.is_empty() {
        db.armature_mut(arm_id).edit = Some(g);
        return OpStatus::Cancelled;
    }

    for b in selected {
        let (head, tail, rad_head, rad_tail) = {
            let bone = g.bone(b);
            (bone.head, bone.tail, bone.rad_head, bone.rad_tail)
        };
        let children = g.children_of(b);
        let segments = cuts as usize + 1;
        let lerp = |t: f32| head + (tail - head) * t;
        let lerp_rad = |t: f32| rad_head + (rad_tail - rad_head) * t;

        // The original becomes the first segment.
        {
            let t = 1.0 / segments as f32;
            let bone = g.bone_mut(b);
            bone.tail = lerp(t);
            bone.rad_tail = lerp_rad(t);
        }

        let mut prev = b;
        for k in 1..segments {
            let t0 = k as f32 / segments as f32;
            let t1 = (k + 1) as f32 / segments as f32;
            let nb = g.duplicate(b, None);
            {
                let bone = g.bone_mut(nb);
                bone.head = lerp(t0);
                bone.tail = lerp(t1);
                bone.rad_head = lerp_rad(t0);
                bone.rad_tail = lerp_rad(t1);
            }
            g.set_parent(nb, Some(prev), true);
            prev = nb;
        }

        // Children follow the tail they were attached to.
        for c in children {
            let connected = g.bone(c).connected();
            g.set_parent(c, Some(prev), connected);
        }
    }

    db.armature_mut(arm_id).edit = Some(g);
    db.tag_geometry(arm_id);
    OpStatus::Finished
}
