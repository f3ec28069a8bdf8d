//! The in-memory ID database.
//!
//! Everything the rename sweep has to visit lives here: objects (with
//! their poses, constraints, modifiers, vertex groups, and bone-parent
//! strings), armatures, actions, and the odd scene-level reference.
//! It is a plain set of slotted vectors; freed slots stay None so ids
//! keep their meaning. Whole-database sweeps are bounded, synchronous
//! loops. Renames are low-frequency interactive edits, so correctness
//! beats indexing here.
//!
//! The recalc tags are the fire-and-forget notifications the scene
//! graph consumes: operations set them, the host clears them.

use anim::{Action, AnimData};
use armature::Armature;
use cgmath::{Matrix4, SquareMatrix};
use constraint::Constraint;
use name::BoneName;
use pose::Pose;
use std::collections::HashSet;

pub type ObjectId = usize;
pub type ArmatureId = usize;

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum ParType {
    Object,
    Bone,
}

#[derive(Clone, Debug)]
pub enum Modifier {
    /// Mesh armature deform.
    Armature { object: Option<ObjectId> },
    /// Grease-pencil armature deform.
    GpArmature { object: Option<ObjectId> },
}

impl Modifier {
    pub fn deform_object(&self) -> Option<ObjectId> {
        match *self {
            Modifier::Armature { object } => object,
            Modifier::GpArmature { object } => object,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Camera {
    pub dof_focus_object: Option<ObjectId>,
    pub dof_focus_bone: BoneName,
}

#[derive(Clone, Debug)]
pub struct GpLayer {
    pub name: String,
    pub parent: Option<ObjectId>,
    pub par_type: ParType,
    pub parsubstr: BoneName,
}

#[derive(Clone, Debug)]
pub struct GreasePencil {
    pub layers: Vec<GpLayer>,
}

#[derive(Clone, Debug)]
pub enum ObjectData {
    Empty,
    Armature(ArmatureId),
    Mesh,
    Camera(Camera),
    GreasePencil(GreasePencil),
}

#[derive(Clone)]
pub struct Object {
    pub name: String,
    pub data: ObjectData,
    pub matrix: Matrix4<f32>,
    pub parent: Option<ObjectId>,
    pub par_type: ParType,
    /// Bone within the parent, when `par_type` is `Bone`.
    pub parsubstr: BoneName,
    pub pose: Option<Pose>,
    pub constraints: Vec<Constraint>,
    pub modifiers: Vec<Modifier>,
    /// Deform-group names; kept aligned with bone names by renames.
    pub vertex_groups: Vec<BoneName>,
    pub adt: Option<AnimData>,
}

impl Object {
    pub fn new(name: &str, data: ObjectData) -> Object {
        Object {
            name: name.to_string(),
            data,
            matrix: Matrix4::identity(),
            parent: None,
            par_type: ParType::Object,
            parsubstr: BoneName::none(),
            pose: None,
            constraints: vec![],
            modifiers: vec![],
            vertex_groups: vec![],
            adt: None,
        }
    }

    pub fn armature(&self) -> Option<ArmatureId> {
        match self.data {
            ObjectData::Armature(id) => Some(id),
            _ => None,
        }
    }
}

/// Recalc notifications for the dependency system. No return values are
/// consumed; the host reads and clears these when it schedules updates.
#[derive(Default)]
pub struct RecalcTags {
    pub geometry: HashSet<ArmatureId>,
    pub relations: bool,
}

#[derive(Default)]
pub struct Database {
    pub objects: Vec<Option<Object>>,
    pub armatures: Vec<Option<Armature>>,
    pub actions: Vec<Option<Action>>,
    /// "Orbit around active bone" view reference.
    pub view_center: Option<(ObjectId, BoneName)>,
    pub tags: RecalcTags,
}

impl Database {
    pub fn new() -> Database {
        Default::default()
    }

    pub fn add_object(&mut self, ob: Object) -> ObjectId {
        self.objects.push(Some(ob));
        self.objects.len() - 1
    }

    pub fn add_armature(&mut self, arm: Armature) -> ArmatureId {
        self.armatures.push(Some(arm));
        self.armatures.len() - 1
    }

    pub fn add_action(&mut self, act: Action) -> usize {
        self.actions.push(Some(act));
        self.actions.len() - 1
    }

    pub fn object(&self, id: ObjectId) -> &Object {
        match self.objects[id] {
            Some(ref ob) => ob,
            None => panic!("object {} was freed", id),
        }
    }

    pub fn object_mut(&mut self, id: ObjectId) -> &mut Object {
        match self.objects[id] {
            Some(ref mut ob) => ob,
            None => panic!("object {} was freed", id),
        }
    }

    pub fn armature(&self, id: ArmatureId) -> &Armature {
        match self.armatures[id] {
            Some(ref arm) => arm,
            None => panic!("armature {} was freed", id),
        }
    }

    pub fn armature_mut(&mut self, id: ArmatureId) -> &mut Armature {
        match self.armatures[id] {
            Some(ref mut arm) => arm,
            None => panic!("armature {} was freed", id),
        }
    }

    pub fn action(&self, id: usize) -> &Action {
        match self.actions[id] {
            Some(ref act) => act,
            None => panic!("action {} was freed", id),
        }
    }

    pub fn action_mut(&mut self, id: usize) -> &mut Action {
        match self.actions[id] {
            Some(ref mut act) => act,
            None => panic!("action {} was freed", id),
        }
    }

    pub fn free_object(&mut self, id: ObjectId) {
        self.objects[id] = None;
    }

    pub fn free_armature(&mut self, id: ArmatureId) {
        self.armatures[id] = None;
    }

    /// Live object ids, for sweeps that also need mutable access.
    pub fn object_ids(&self) -> Vec<ObjectId> {
        (0..self.objects.len())
            .filter(|&id| self.objects[id].is_some())
            .collect()
    }

    pub fn armature_ids(&self) -> Vec<ArmatureId> {
        (0..self.armatures.len())
            .filter(|&id| self.armatures[id].is_some())
            .collect()
    }

    pub fn armature_of(&self, ob: ObjectId) -> Option<ArmatureId> {
        self.object(ob).armature()
    }

    /// Every object using `arm` as its data.
    pub fn users_of_armature(&self, arm: ArmatureId) -> Vec<ObjectId> {
        self.object_ids()
            .into_iter()
            .filter(|&id| self.object(id).armature() == Some(arm))
            .collect()
    }

    pub fn object_by_name(&self, name: &str) -> Option<ObjectId> {
        self.object_ids()
            .into_iter()
            .find(|&id| self.object(id).name == name)
    }

    pub fn object_name_in_use(&self, name: &str) -> bool {
        self.object_by_name(name).is_some()
    }

    pub fn tag_geometry(&mut self, arm: ArmatureId) {
        self.tags.geometry.insert(arm);
    }

    pub fn tag_relations(&mut self) {
        self.tags.relations = true;
    }
}
