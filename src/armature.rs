//! Persistent armature data.
//!
//! The read-mostly form the rest of the application consumes: a flat
//! arena of `Bone`s (parents stored before children) plus a derived
//! name->index hash. The armature-space head/tail/roll are authoritative;
//! the parent-relative fields are recomputed on every flush from edit
//! mode and exist for consumers that want a bone's local matrix.
//!
//! The name hash is cache data with an explicit contract: rebuild it
//! after any batch of insertions/removals, and rename entries only with
//! the remove-then-reinsert sequence in `rename_in_hash`. A hash keyed
//! by name must never be left holding a stale key.

use anim::AnimData;
use cgmath::{Matrix, Matrix3, Matrix4, SquareMatrix, Vector3};
use edit::{BendyBone, EditBone, EditGraph, InheritScale};
use math;
use name::BoneName;
use std::collections::hash_map::Entry;
use std::collections::HashMap;

pub type BoneIdx = usize;

#[derive(Clone, Debug)]
pub struct Bone {
    pub name: BoneName,
    pub parent: Option<BoneIdx>,

    /// Armature-space endpoints and roll.
    pub arm_head: Vector3<f32>,
    pub arm_tail: Vector3<f32>,
    pub arm_roll: f32,

    /// Parent-relative endpoints and roll, derived at flush time. The
    /// local frame is the parent's bone matrix with its origin at the
    /// parent's tail; for root bones these equal the armature-space
    /// fields.
    pub head: Vector3<f32>,
    pub tail: Vector3<f32>,
    pub roll: f32,

    pub rad_head: f32,
    pub rad_tail: f32,
    pub flag: u32,
    pub layer: u32,
    pub inherit_scale: InheritScale,
    pub bbone: BendyBone,
}

impl Bone {
    /// Bone-space -> armature-space matrix; used by the skinning and
    /// deform consumers.
    pub fn arm_matrix(&self) -> Matrix4<f32> {
        let rot = match math::bone_direction(self.arm_head, self.arm_tail) {
            Some(dir) => math::vec_roll_to_mat3(dir, self.arm_roll),
            None => Matrix3::identity(),
        };
        let mut mat = Matrix4::from(rot);
        mat.w.x = self.arm_head.x;
        mat.w.y = self.arm_head.y;
        mat.w.z = self.arm_head.z;
        mat
    }
}

#[derive(Clone)]
pub struct Armature {
    pub name: String,
    pub bones: Vec<Bone>,
    by_name: HashMap<BoneName, BoneIdx>,
    pub active: Option<BoneIdx>,
    /// X-axis mirror editing: operations extend to name-flipped
    /// counterparts.
    pub mirror_edit: bool,
    /// Present while the armature is in edit mode.
    pub edit: Option<EditGraph>,
    pub adt: Option<AnimData>,
}

impl Armature {
    pub fn new(name: &str) -> Armature {
        Armature {
            name: name.to_string(),
            bones: vec![],
            by_name: HashMap::new(),
            active: None,
            mirror_edit: false,
            edit: None,
            adt: None,
        }
    }

    pub fn bone_by_name(&self, name: &BoneName) -> Option<BoneIdx> {
        self.by_name.get(name).cloned()
    }

    pub fn bone(&self, idx: BoneIdx) -> &Bone {
        &self.bones[idx]
    }

    pub fn active_bone(&self) -> Option<&Bone> {
        self.active.map(|idx| &self.bones[idx])
    }

    pub fn children_of(&self, idx: BoneIdx) -> Vec<BoneIdx> {
        (0..self.bones.len())
            .filter(|&c| self.bones[c].parent == Some(idx))
            .collect()
    }

    /// Fill out `by_name` from scratch.
    pub fn rebuild_by_name(&mut self) {
        self.by_name.clear();
        for (idx, bone) in self.bones.iter().enumerate() {
            match self.by_name.entry(bone.name) {
                Entry::Vacant(ve) => {
                    ve.insert(idx);
                }
                Entry::Occupied(_) => {
                    warn!("multiple bones have the name {}", bone.name);
                }
            }
        }
    }

    /// The documented remove-then-reinsert sequence for renaming a hash
    /// entry in place.
    pub fn rename_in_hash(&mut self, old: &BoneName, new: BoneName, idx: BoneIdx) {
        self.by_name.remove(old);
        self.by_name.insert(new, idx);
    }

    /// Bone-space -> parent-bone-space matrix (for roots, this is the
    /// armature-space matrix).
    pub fn local_matrix(&self, idx: BoneIdx) -> Matrix4<f32> {
        let bone = &self.bones[idx];
        match bone.parent {
            None => bone.arm_matrix(),
            Some(p) => {
                let parent = self.bones[p].arm_matrix();
                // Rigid transform: invert by transposing the rotation.
                let rot = Matrix3::from_cols(
                    parent.x.truncate(),
                    parent.y.truncate(),
                    parent.z.truncate(),
                )
                .transpose();
                let mut inv = Matrix4::from(rot);
                let t = rot * -self.bones[p].arm_tail;
                inv.w.x = t.x;
                inv.w.y = t.y;
                inv.w.z = t.z;
                inv * bone.arm_matrix()
            }
        }
    }

    /// Builds the edit-mode graph from the persistent bones.
    pub fn to_edit(&self) -> EditGraph {
        let mut g = EditGraph::new();
        let mut nodes = Vec::with_capacity(self.bones.len());
        for bone in &self.bones {
            let mut eb = EditBone::new(bone.name);
            eb.head = bone.arm_head;
            eb.tail = bone.arm_tail;
            eb.roll = bone.arm_roll;
            eb.rad_head = bone.rad_head;
            eb.rad_tail = bone.rad_tail;
            eb.flag = bone.flag;
            eb.layer = bone.layer;
            eb.inherit_scale = bone.inherit_scale;
            eb.bbone = bone.bbone;
            let node = g.graph.add_node(eb);
            nodes.push(node);
        }
        for (idx, bone) in self.bones.iter().enumerate() {
            if let Some(p) = bone.parent {
                g.graph.add_edge(nodes[p], nodes[idx], ());
            }
        }
        g.active = self.active.map(|idx| nodes[idx]);
        g
    }

    /// Flushes the edit graph back into the persistent bones, replacing
    /// them. Tree shape and bendy fields survive exactly, with one
    /// exception: zero-length bones are dropped (they have no
    /// orientation), their children re-linked to the dropped bone's
    /// parent. Panics if the graph has a parent cycle; see
    /// `EditGraph::topo_order`.
    pub fn from_edit(&mut self, g: &EditGraph) {
        let order = g.topo_order();

        let mut indices: HashMap<::edit::EBone, Option<BoneIdx>> = HashMap::new();
        let mut bones: Vec<Bone> = Vec::with_capacity(order.len());

        for &node in &order {
            let eb = g.bone(node);

            if eb.length() <= math::MIN_BONE_LENGTH {
                warn!("zero length bone {} deleted on flush", eb.name);
                // Children fall through to this bone's parent.
                let up = g.parent_of(node).and_then(|p| indices[&p]);
                indices.insert(node, up);
                continue;
            }

            let parent = g.parent_of(node).and_then(|p| indices[&p]);
            let idx = bones.len();
            let mut bone = Bone {
                name: eb.name,
                parent,
                arm_head: eb.head,
                arm_tail: eb.tail,
                arm_roll: eb.roll,
                head: eb.head,
                tail: eb.tail,
                roll: eb.roll,
                rad_head: eb.rad_head,
                rad_tail: eb.rad_tail,
                flag: eb.flag,
                layer: eb.layer,
                inherit_scale: eb.inherit_scale,
                bbone: eb.bbone,
            };
            if let Some(p) = parent {
                let parent_bone = &bones[p];
                let rot = parent_bone.arm_matrix();
                let rot = Matrix3::from_cols(
                    rot.x.truncate(),
                    rot.y.truncate(),
                    rot.z.truncate(),
                )
                .transpose();
                bone.head = rot * (eb.head - parent_bone.arm_tail);
                bone.tail = rot * (eb.tail - parent_bone.arm_tail);
                if let Some(dir) = math::bone_direction(bone.head, bone.tail) {
                    let rel = rot * eb.matrix();
                    bone.roll = math::mat3_vec_to_roll(&rel, dir);
                }
            }
            bones.push(bone);
            indices.insert(node, Some(idx));
        }

        self.bones = bones;
        self.active = g.active.and_then(|node| indices.get(&node).cloned().unwrap_or(None));
        self.rebuild_by_name();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::vec3;
    use edit::{BBoneHandle, EditGraph, BONE_CONNECTED};

    fn sample_graph() -> EditGraph {
        let mut g = EditGraph::new();
        let spine = g.add(&BoneName::new("Spine"));
        g.bone_mut(spine).tail = vec3(0.0, 0.0, 1.0);
        let arm = g.add(&BoneName::new("Arm.L"));
        {
            let b = g.bone_mut(arm);
            b.head = vec3(0.0, 0.0, 1.0);
            b.tail = vec3(1.0, 0.0, 1.0);
            b.roll = 0.25;
            b.bbone.segments = 4;
            b.bbone.next = BBoneHandle::Absolute(BoneName::new("Spine"));
        }
        g.set_parent(arm, Some(spine), true);
        g.active = Some(arm);
        g
    }

    #[test]
    fn test_round_trip_preserves_shape() {
        let g = sample_graph();
        let mut arm = Armature::new("Armature");
        arm.from_edit(&g);

        assert_eq!(arm.bones.len(), 2);
        let spine = arm.bone_by_name(&BoneName::new("Spine")).unwrap();
        let arm_l = arm.bone_by_name(&BoneName::new("Arm.L")).unwrap();
        assert_eq!(arm.bones[arm_l].parent, Some(spine));
        assert!(arm.bones[arm_l].flag & BONE_CONNECTED != 0);
        assert_eq!(arm.active, Some(arm_l));

        let g2 = arm.to_edit();
        let mut arm2 = Armature::new("Armature");
        arm2.from_edit(&g2);
        let b1 = &arm.bones[arm_l];
        let b2 = &arm2.bones[arm2.bone_by_name(&BoneName::new("Arm.L")).unwrap()];
        assert_eq!(b1.arm_head, b2.arm_head);
        assert_eq!(b1.arm_tail, b2.arm_tail);
        assert_eq!(b1.arm_roll, b2.arm_roll);
        assert_eq!(b1.bbone, b2.bbone);
    }

    #[test]
    fn test_flush_drops_zero_length_bones() {
        let mut g = sample_graph();
        let stub = g.add(&BoneName::new("Stub"));
        let spine = g.find(&BoneName::new("Spine")).unwrap();
        g.set_parent(stub, Some(spine), false);
        let leaf = g.add(&BoneName::new("Leaf"));
        g.bone_mut(leaf).head = vec3(0.0, 1.0, 0.0);
        g.bone_mut(leaf).tail = vec3(0.0, 2.0, 0.0);
        g.set_parent(leaf, Some(stub), false);

        let mut arm = Armature::new("Armature");
        arm.from_edit(&g);
        assert!(arm.bone_by_name(&BoneName::new("Stub")).is_none());
        // Leaf is re-linked past the dropped bone.
        let leaf = arm.bone_by_name(&BoneName::new("Leaf")).unwrap();
        let spine = arm.bone_by_name(&BoneName::new("Spine")).unwrap();
        assert_eq!(arm.bones[leaf].parent, Some(spine));
    }

    #[test]
    fn test_local_matrix_root_is_arm_matrix() {
        let g = sample_graph();
        let mut arm = Armature::new("Armature");
        arm.from_edit(&g);
        let spine = arm.bone_by_name(&BoneName::new("Spine")).unwrap();
        let a = arm.local_matrix(spine);
        let b = arm.bones[spine].arm_matrix();
        assert_eq!(a, b);
    }
}
