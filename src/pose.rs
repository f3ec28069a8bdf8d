//! Per-object pose channels.
//!
//! A pose channel is runtime bone state (transform, constraints, the
//! display shape) and lives on the Object using the armature, not on
//! the armature datablock itself, so two objects sharing one armature
//! can pose it differently.
//!
//! The channel list must stay in 1:1 correspondence with the armature's
//! bone set; `sync_pose` reconciles the two after a structural edit.
//! Lookups go through a name hash that is derived data: rebuild it
//! after any batch of insertions/removals/renames before the next
//! name-based lookup. Channels may be created for names that have no
//! persistent bone yet (edits still in progress request channels ahead
//! of the flush); such channels survive until the next reconcile.

use armature::Armature;
use cgmath::{vec3, Quaternion, Vector3};
use constraint::Constraint;
use db::ObjectId;
use edit::BBoneHandle;
use name::BoneName;
use smallvec::SmallVec;
use std::collections::hash_map::Entry;
use std::collections::HashMap;

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum RotMode {
    Quaternion,
    EulerXyz,
    AxisAngle,
}

/// Transform applied to a channel's custom display shape.
#[derive(Clone, Debug, PartialEq)]
pub struct ShapeTransform {
    pub loc: Vector3<f32>,
    pub rot_euler: Vector3<f32>,
    pub scale: Vector3<f32>,
}

impl Default for ShapeTransform {
    fn default() -> ShapeTransform {
        ShapeTransform {
            loc: vec3(0.0, 0.0, 0.0),
            rot_euler: vec3(0.0, 0.0, 0.0),
            scale: vec3(1.0, 1.0, 1.0),
        }
    }
}

#[derive(Clone, Debug)]
pub struct PoseChannel {
    pub name: BoneName,
    pub rot_mode: RotMode,
    pub loc: Vector3<f32>,
    pub quat: Quaternion<f32>,
    pub euler: Vector3<f32>,
    /// (angle, x, y, z)
    pub axis_angle: [f32; 4],
    pub scale: Vector3<f32>,
    pub constraints: SmallVec<[Constraint; 2]>,
    /// Display shape; shared with the object database, not owned.
    pub custom_shape: Option<ObjectId>,
    pub custom_shape_transform: ShapeTransform,
    /// Bendy-bone handle channels, resolved by name on reconcile.
    pub bbone_prev: Option<BoneName>,
    pub bbone_next: Option<BoneName>,
}

impl PoseChannel {
    pub fn new(name: BoneName) -> PoseChannel {
        PoseChannel {
            name,
            rot_mode: RotMode::Quaternion,
            loc: vec3(0.0, 0.0, 0.0),
            quat: Quaternion::new(1.0, 0.0, 0.0, 0.0),
            euler: vec3(0.0, 0.0, 0.0),
            axis_angle: [0.0, 0.0, 1.0, 0.0],
            scale: vec3(1.0, 1.0, 1.0),
            constraints: SmallVec::new(),
            custom_shape: None,
            custom_shape_transform: ShapeTransform::default(),
            bbone_prev: None,
            bbone_next: None,
        }
    }

    /// Copies everything but the name.
    pub fn copy_data_from(&mut self, other: &PoseChannel) {
        let name = self.name;
        *self = other.clone();
        self.name = name;
    }
}

#[derive(Clone, Debug)]
pub struct Pose {
    pub channels: Vec<PoseChannel>,
    by_name: HashMap<BoneName, usize>,
}

impl Pose {
    pub fn new() -> Pose {
        Pose { channels: vec![], by_name: HashMap::new() }
    }

    pub fn channel_index(&self, name: &BoneName) -> Option<usize> {
        self.debug_validate_hash();
        self.by_name.get(name).cloned()
    }

    pub fn channel_by_name(&self, name: &BoneName) -> Option<&PoseChannel> {
        self.channel_index(name).map(|i| &self.channels[i])
    }

    pub fn channel_by_name_mut(&mut self, name: &BoneName) -> Option<&mut PoseChannel> {
        match self.channel_index(name) {
            Some(i) => Some(&mut self.channels[i]),
            None => None,
        }
    }

    /// Looks a channel up by name, creating it with default transform if
    /// absent. Valid to call for bones that only exist as edit bones so
    /// far.
    pub fn ensure_channel(&mut self, name: BoneName) -> &mut PoseChannel {
        let idx = match self.by_name.get(&name).cloned() {
            Some(i) => i,
            None => {
                self.channels.push(PoseChannel::new(name));
                let i = self.channels.len() - 1;
                self.by_name.insert(name, i);
                i
            }
        };
        &mut self.channels[idx]
    }

    /// O(n) reconstruction of the name hash. Call after any batch of
    /// channel insertions/removals/renames, before the next lookup.
    pub fn rebuild_hash(&mut self) {
        self.by_name.clear();
        for (i, ch) in self.channels.iter().enumerate() {
            match self.by_name.entry(ch.name) {
                Entry::Vacant(ve) => {
                    ve.insert(i);
                }
                Entry::Occupied(_) => {
                    warn!("multiple pose channels have the name {}", ch.name);
                }
            }
        }
        self.debug_validate_hash();
    }

    pub fn remove_channel(&mut self, name: &BoneName) -> bool {
        let before = self.channels.len();
        self.channels.retain(|ch| ch.name != *name);
        let removed = self.channels.len() != before;
        if removed {
            self.rebuild_hash();
        }
        removed
    }

    /// Renames a channel, re-keying its hash entry with the documented
    /// remove-then-reinsert sequence.
    pub fn rename_channel(&mut self, old: &BoneName, new: BoneName) -> bool {
        match self.by_name.remove(old) {
            Some(i) => {
                self.channels[i].name = new;
                self.by_name.insert(new, i);
                true
            }
            None => false,
        }
    }

    /// Debug-build invariant: every channel name is in the hash exactly
    /// once and the hash holds nothing else.
    fn debug_validate_hash(&self) {
        if cfg!(debug_assertions) {
            debug_assert_eq!(self.by_name.len(), self.channels.len());
            for (i, ch) in self.channels.iter().enumerate() {
                debug_assert_eq!(self.by_name.get(&ch.name).cloned(), Some(i));
            }
        }
    }
}

/// Reconciles a pose's channel set with its armature's bone set:
/// channels for deleted bones go away (their constraints with them),
/// missing channels are created, and bendy-bone handle links are
/// re-resolved by name.
pub fn sync_pose(pose: &mut Pose, arm: &Armature) {
    pose.channels
        .retain(|ch| arm.bone_by_name(&ch.name).is_some());
    pose.rebuild_hash();

    for bone in &arm.bones {
        let prev = resolve_handle(&bone.bbone.prev, arm);
        let next = resolve_handle(&bone.bbone.next, arm);
        let ch = pose.ensure_channel(bone.name);
        ch.bbone_prev = prev;
        ch.bbone_next = next;
    }
}

fn resolve_handle(handle: &BBoneHandle, arm: &Armature) -> Option<BoneName> {
    match *handle {
        BBoneHandle::Auto => None,
        BBoneHandle::Absolute(name) => {
            if arm.bone_by_name(&name).is_some() {
                Some(name)
            } else {
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_channel() {
        let mut pose = Pose::new();
        pose.ensure_channel(BoneName::new("A")).loc.x = 5.0;
        assert_eq!(pose.channels.len(), 1);
        // Idempotent: same channel comes back.
        assert_eq!(pose.ensure_channel(BoneName::new("A")).loc.x, 5.0);
        assert_eq!(pose.channels.len(), 1);
    }

    #[test]
    fn test_rename_rekeys_hash() {
        let mut pose = Pose::new();
        pose.ensure_channel(BoneName::new("A"));
        pose.ensure_channel(BoneName::new("B"));
        assert!(pose.rename_channel(&BoneName::new("A"), BoneName::new("C")));
        assert!(pose.channel_by_name(&BoneName::new("A")).is_none());
        assert!(pose.channel_by_name(&BoneName::new("C")).is_some());
    }

    #[test]
    fn test_sync_pose_reconciles() {
        use armature::Armature;
        use cgmath::vec3;
        use edit::EditGraph;

        let mut g = EditGraph::new();
        let a = g.add(&BoneName::new("Keep"));
        g.bone_mut(a).tail = vec3(0.0, 1.0, 0.0);
        let mut arm = Armature::new("Armature");
        arm.from_edit(&g);

        let mut pose = Pose::new();
        pose.ensure_channel(BoneName::new("Gone"));
        sync_pose(&mut pose, &arm);

        assert!(pose.channel_by_name(&BoneName::new("Gone")).is_none());
        assert!(pose.channel_by_name(&BoneName::new("Keep")).is_some());
        assert_eq!(pose.channels.len(), 1);
    }
}
