//! Structural operations over the edit-bone graph.
//!
//! Every operation follows the same shape: validate context (wrong mode,
//! nothing selected, no active bone -> `Cancelled`, with no mutation),
//! transform the graph, eagerly fix up names/constraints/pose data so no
//! reference dangles when control returns, and tag the dependency system.
//! Per-bone failures inside a batch are logged and skipped; they never
//! abort the rest of the batch.
//!
//! All of this is synchronous and single-threaded: an operation runs to
//! completion before control returns, and the name hashes it touches are
//! rebuilt before the next lookup.

pub mod add;
pub mod duplicate;
pub mod relations;
pub mod symmetrize;

pub use self::add::{add_bone, add_primitive, extrude, subdivide};
pub use self::duplicate::duplicate_selected;
pub use self::relations::{
    delete_selected, join, parent_clear, parent_set, separate, ClearMode, ParentMode,
};
pub use self::symmetrize::{symmetrize, SymDir};

use db::{ArmatureId, Database, ObjectId};
use edit::EditGraph;
use pose;

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum OpStatus {
    Finished,
    Cancelled,
}

impl OpStatus {
    pub fn finished(&self) -> bool {
        *self == OpStatus::Finished
    }
}

/// The armature behind `ob`, if `ob` is a live armature object currently
/// in edit mode. Operations call this before touching anything.
fn edit_armature(db: &Database, ob: ObjectId) -> Option<ArmatureId> {
    if ob >= db.objects.len() || db.objects[ob].is_none() {
        return None;
    }
    let arm_id = match db.object(ob).armature() {
        Some(id) => id,
        None => return None,
    };
    if db.armature(arm_id).edit.is_some() {
        Some(arm_id)
    } else {
        None
    }
}

/// Detaches the edit graph for an operation that needs to mutate it and
/// the rest of the database at the same time. Callers put it back before
/// returning.
fn take_edit(db: &mut Database, arm_id: ArmatureId) -> EditGraph {
    match db.armature_mut(arm_id).edit.take() {
        Some(g) => g,
        None => panic!("armature {} not in edit mode", arm_id),
    }
}

/// Builds the edit graph from the persistent bones and enters edit mode.
pub fn enter_editmode(db: &mut Database, ob: ObjectId) -> OpStatus {
    if ob >= db.objects.len() || db.objects[ob].is_none() {
        return OpStatus::Cancelled;
    }
    let arm_id = match db.object(ob).armature() {
        Some(id) => id,
        None => return OpStatus::Cancelled,
    };
    if db.armature(arm_id).edit.is_some() {
        return OpStatus::Cancelled;
    }
    let g = db.armature(arm_id).to_edit();
    db.armature_mut(arm_id).edit = Some(g);
    OpStatus::Finished
}

/// Flushes the edit graph back to the persistent bones, reconciles every
/// user object's pose channels, and leaves edit mode.
pub fn exit_editmode(db: &mut Database, ob: ObjectId) -> OpStatus {
    let arm_id = match edit_armature(db, ob) {
        Some(id) => id,
        None => return OpStatus::Cancelled,
    };
    let g = take_edit(db, arm_id);
    db.armature_mut(arm_id).from_edit(&g);

    sync_users(db, arm_id);
    db.tag_geometry(arm_id);
    OpStatus::Finished
}

/// Reconciles pose channels on every object using `arm_id`.
fn sync_users(db: &mut Database, arm_id: ArmatureId) {
    let users = db.users_of_armature(arm_id);
    let db = &mut *db;
    let arm = match db.armatures[arm_id] {
        Some(ref arm) => arm,
        None => return,
    };
    for id in users {
        if let Some(ref mut ob) = db.objects[id] {
            if let Some(ref mut p) = ob.pose {
                pose::sync_pose(p, arm);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use armature::Armature;
    use db::{Object, ObjectData};

    #[test]
    fn test_editmode_round_trip() {
        let mut db = Database::new();
        let arm_id = db.add_armature(Armature::new("Rig"));
        let ob = db.add_object(Object::new("RigOb", ObjectData::Armature(arm_id)));

        assert!(enter_editmode(&mut db, ob).finished());
        assert!(db.armature(arm_id).edit.is_some());
        // Re-entering is a no-op cancel.
        assert!(!enter_editmode(&mut db, ob).finished());

        assert!(exit_editmode(&mut db, ob).finished());
        assert!(db.armature(arm_id).edit.is_none());
        assert!(db.tags.geometry.contains(&arm_id));
    }

    #[test]
    fn test_ops_cancel_without_context() {
        let mut db = Database::new();
        let mesh = db.add_object(Object::new("Mesh", ObjectData::Mesh));
        // Not an armature object.
        assert!(!exit_editmode(&mut db, mesh).finished());
        assert!(!enter_editmode(&mut db, mesh).finished());
    }
}
