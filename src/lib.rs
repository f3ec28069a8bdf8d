//! Armature bone editing and bilateral mirroring.
//!
//! This crate is the edit-mode bone subsystem of a 3D content-creation
//! application: a mutable forest of edit bones (`edit`), the persistent
//! bone tree it is flushed to and loaded from (`armature`), per-object
//! pose channels and constraints (`pose`, `constraint`), animation curves
//! addressed by string paths (`anim`), and the structural operations over
//! all of this (`ops`): add, extrude, subdivide, duplicate, symmetrize,
//! parent, join, separate.
//!
//! Bones are cross-referenced by *name*, not by pointer: constraint
//! subtargets, vertex groups, bone-parent strings, and animation-curve
//! paths all store the bone's name and re-resolve it lazily. Renaming a
//! bone is therefore a database-wide string rewrite, centralized in
//! `retarget::rename_bone`; every operation that changes a bone's
//! identity routes through it exactly once per identity change.

#![recursion_limit = "1024"] // for error_chain

#[macro_use]
extern crate log;
#[macro_use]
extern crate error_chain;
extern crate cgmath;
extern crate petgraph;
extern crate smallvec;

#[macro_use]
mod errors;
pub mod util;
pub mod anim;
pub mod armature;
pub mod constraint;
pub mod db;
pub mod edit;
pub mod math;
pub mod name;
pub mod ops;
pub mod pose;
pub mod retarget;

pub use anim::{Action, FCurve};
pub use armature::{Armature, Bone, BoneIdx};
pub use constraint::Constraint;
pub use db::{Database, Object, ObjectId, ArmatureId};
pub use edit::{EditBone, EditGraph, EBone};
pub use errors::{Error, Result};
pub use name::BoneName;
pub use ops::OpStatus;
pub use pose::{Pose, PoseChannel};
