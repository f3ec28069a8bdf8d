//! Constraints on objects and pose channels.
//!
//! A constraint's subtarget is a bone *name*, not a pointer; it is
//! re-resolved against the target object's pose on every evaluation.
//! That choice is why `retarget::rename_bone` exists: renaming a bone
//! means rewriting these strings wherever they occur.

use anim::ActionId;
use cgmath::Vector3;
use db::ObjectId;
use name::BoneName;

pub const CONSTRAINT_DISABLE: u32 = 1 << 0;

/// Space a constraint's numeric parameters are expressed in.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Space {
    World,
    Local,
}

#[derive(Clone, Debug)]
pub struct Constraint {
    pub name: String,
    pub target: Option<ObjectId>,
    /// Bone within the target object; empty = the object itself.
    pub subtarget: BoneName,
    pub flag: u32,
    pub influence: f32,
    pub owner_space: Space,
    pub target_space: Space,
    pub kind: ConstraintKind,
}

#[derive(Clone, Debug)]
pub enum ConstraintKind {
    Ik {
        pole_target: Option<ObjectId>,
        pole_subtarget: BoneName,
        pole_angle: f32,
        chain_len: u32,
    },
    LimitLocation {
        min: Vector3<f32>,
        max: Vector3<f32>,
    },
    LimitRotation {
        min: Vector3<f32>,
        max: Vector3<f32>,
    },
    /// Maps a source range on the target to a destination range on the
    /// owner.
    TransformMap {
        rotational: bool,
        from_min: Vector3<f32>,
        from_max: Vector3<f32>,
        to_min: Vector3<f32>,
        to_max: Vector3<f32>,
    },
    ActionCon {
        action: Option<ActionId>,
        frame_start: f32,
        frame_end: f32,
        min: f32,
        max: f32,
    },
    CopyLocation,
    CopyRotation,
    StretchTo,
    DampedTrack,
}

impl Constraint {
    pub fn new(name: &str, kind: ConstraintKind) -> Constraint {
        Constraint {
            name: name.to_string(),
            target: None,
            subtarget: BoneName::none(),
            flag: 0,
            influence: 1.0,
            owner_space: Space::World,
            target_space: Space::World,
            kind,
        }
    }

    pub fn disabled(&self) -> bool {
        self.flag & CONSTRAINT_DISABLE != 0
    }

    pub fn disable(&mut self) {
        self.flag |= CONSTRAINT_DISABLE;
    }

    /// Every (target object, subtarget name) pair on this constraint:
    /// the common pair, plus the IK pole pair.
    pub fn targets_mut(&mut self) -> Vec<(&mut Option<ObjectId>, &mut BoneName)> {
        let mut pairs = vec![(&mut self.target, &mut self.subtarget)];
        if let ConstraintKind::Ik {
            ref mut pole_target,
            ref mut pole_subtarget,
            ..
        } = self.kind
        {
            pairs.push((pole_target, pole_subtarget));
        }
        pairs
    }

    pub fn action(&self) -> Option<ActionId> {
        match self.kind {
            ConstraintKind::ActionCon { action, .. } => action,
            _ => None,
        }
    }
}
