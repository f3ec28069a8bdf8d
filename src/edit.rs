//! Edit-mode bone graph.
//!
//! While an armature is being edited, its bones live in a mutable forest
//! of `EditBone` nodes rather than in the persistent `Bone` tree. The
//! structural operations (`ops`) all work on this graph and the result
//! is flushed back when edit mode ends.
//!
//! The graph is a `StableGraph` whose edges run _from_ the parent _to_
//! the child; a bone's parent is its (at most one) incoming neighbor.
//! `StableGraph` rather than `Graph` because bones are removed mid-edit
//! and every other bone's index must stay valid.
//!
//! Removing a bone clears its children's parent links (and their
//! connected flag); it does NOT re-parent them to the grandparent. This
//! is intentional, long-standing behavior, not an oversight.

use cgmath::{vec3, InnerSpace, Matrix3, SquareMatrix, Vector3};
use math;
use name::{flip_side_name, BoneName};
use petgraph::graph::NodeIndex;
use petgraph::stable_graph::StableGraph;
use petgraph::Direction;
use util::namers::unique_name;

pub type EBone = NodeIndex;

pub const BONE_SELECTED: u32 = 1 << 0;
pub const BONE_ROOTSEL: u32 = 1 << 1;
pub const BONE_TIPSEL: u32 = 1 << 2;
/// Head is glued to the parent's tail.
pub const BONE_CONNECTED: u32 = 1 << 3;
pub const BONE_HIDDEN: u32 = 1 << 4;

pub const BONE_SELECT_MASK: u32 = BONE_SELECTED | BONE_ROOTSEL | BONE_TIPSEL;

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum InheritScale {
    Full,
    Average,
    None,
}

/// How a bendy-bone handle is chosen: automatically from the
/// parent/child, or an explicit bone referenced by name.
#[derive(Copy, Clone, PartialEq, Debug)]
pub enum BBoneHandle {
    Auto,
    Absolute(BoneName),
}

/// Bendy-bone segment parameters. Carried through every structural
/// operation unchanged except for symmetrize, which negates the
/// X-curvature and rolls.
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct BendyBone {
    pub segments: u32,
    pub ease: [f32; 2],
    pub curve_in: [f32; 2],
    pub curve_out: [f32; 2],
    pub scale_in: [f32; 3],
    pub scale_out: [f32; 3],
    pub roll: [f32; 2],
    pub prev: BBoneHandle,
    pub next: BBoneHandle,
}

impl Default for BendyBone {
    fn default() -> BendyBone {
        BendyBone {
            segments: 1,
            ease: [0.0; 2],
            curve_in: [0.0; 2],
            curve_out: [0.0; 2],
            scale_in: [1.0; 3],
            scale_out: [1.0; 3],
            roll: [0.0; 2],
            prev: BBoneHandle::Auto,
            next: BBoneHandle::Auto,
        }
    }
}

#[derive(Clone, Debug)]
pub struct EditBone {
    pub name: BoneName,
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

impl EditBone {
    pub fn new(name: BoneName) -> EditBone {
        EditBone {
            name,
            head: vec3(0.0, 0.0, 0.0),
            tail: vec3(0.0, 0.0, 0.0),
            roll: 0.0,
            rad_head: 0.10,
            rad_tail: 0.05,
            flag: 0,
            layer: 1,
            inherit_scale: InheritScale::Full,
            bbone: BendyBone::default(),
        }
    }

    pub fn selected(&self) -> bool {
        self.flag & BONE_SELECTED != 0
    }

    pub fn visible(&self) -> bool {
        self.flag & BONE_HIDDEN == 0
    }

    pub fn connected(&self) -> bool {
        self.flag & BONE_CONNECTED != 0
    }

    pub fn select(&mut self) {
        self.flag |= BONE_SELECT_MASK;
    }

    pub fn deselect(&mut self) {
        self.flag &= !BONE_SELECT_MASK;
    }

    pub fn length(&self) -> f32 {
        (self.tail - self.head).magnitude()
    }

    /// Bone axes in armature space; identity for a degenerate bone.
    pub fn matrix(&self) -> Matrix3<f32> {
        match math::bone_direction(self.head, self.tail) {
            Some(dir) => math::vec_roll_to_mat3(dir, self.roll),
            None => Matrix3::identity(),
        }
    }
}

#[derive(Clone)]
pub struct EditGraph {
    pub graph: StableGraph<EditBone, ()>,
    pub active: Option<EBone>,
}

impl EditGraph {
    pub fn new() -> EditGraph {
        EditGraph {
            graph: StableGraph::new(),
            active: None,
        }
    }

    pub fn bone(&self, b: EBone) -> &EditBone {
        &self.graph[b]
    }

    pub fn bone_mut(&mut self, b: EBone) -> &mut EditBone {
        &mut self.graph[b]
    }

    /// All bones, in insertion order.
    pub fn bones(&self) -> Vec<EBone> {
        self.graph.node_indices().collect()
    }

    pub fn bone_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn find(&self, name: &BoneName) -> Option<EBone> {
        self.graph
            .node_indices()
            .find(|&b| self.graph[b].name == *name)
    }

    pub fn name_in_use(&self, name: &BoneName, not_counting: Option<EBone>) -> bool {
        self.graph
            .node_indices()
            .any(|b| Some(b) != not_counting && self.graph[b].name == *name)
    }

    /// Adds a fresh bone with default fields and a namespace-unique name
    /// derived from `name`. No parent.
    pub fn add(&mut self, name: &BoneName) -> EBone {
        let name = unique_name(|c| self.name_in_use(c, None), *name);
        self.graph.add_node(EditBone::new(name))
    }

    /// Renames a bone, uniquifying against every other bone. Returns the
    /// name actually assigned.
    pub fn rename(&mut self, b: EBone, new_name: BoneName) -> BoneName {
        let unique = unique_name(|c| self.name_in_use(c, Some(b)), new_name);
        self.graph[b].name = unique;
        unique
    }

    pub fn parent_of(&self, b: EBone) -> Option<EBone> {
        self.graph.neighbors_directed(b, Direction::Incoming).next()
    }

    pub fn children_of(&self, b: EBone) -> Vec<EBone> {
        self.graph
            .neighbors_directed(b, Direction::Outgoing)
            .collect()
    }

    /// All bones below `b`, depth-first. Does not include `b` itself.
    pub fn descendants(&self, b: EBone) -> Vec<EBone> {
        let mut out = vec![];
        let mut stack = self.children_of(b);
        while let Some(c) = stack.pop() {
            out.push(c);
            stack.extend(self.children_of(c));
        }
        out
    }

    /// Sets (or clears) a bone's parent. Creating a parent cycle is
    /// prevented by construction: if the new parent's ancestor chain
    /// runs back through `child`, the offending ancestor's parent link
    /// is cleared first.
    pub fn set_parent(&mut self, child: EBone, parent: Option<EBone>, connected: bool) {
        if let Some(p) = self.parent_of(child) {
            if let Some(e) = self.graph.find_edge(p, child) {
                self.graph.remove_edge(e);
            }
        }
        self.graph[child].flag &= !BONE_CONNECTED;

        let parent = match parent {
            Some(p) if p == child => None,
            p => p,
        };

        if let Some(p) = parent {
            let mut walk = p;
            while let Some(ancestor) = self.parent_of(walk) {
                if ancestor == child {
                    debug!(
                        "cleared parent of {} to avoid a cycle",
                        self.graph[walk].name
                    );
                    if let Some(e) = self.graph.find_edge(child, walk) {
                        self.graph.remove_edge(e);
                    }
                    self.graph[walk].flag &= !BONE_CONNECTED;
                    break;
                }
                walk = ancestor;
            }

            self.graph.add_edge(p, child, ());
            if connected {
                self.graph[child].flag |= BONE_CONNECTED;
            }
        }
    }

    /// Removes a bone. Its children's parent links are cleared, not
    /// re-parented (see the module docs), and their connected flag is
    /// dropped. Absolute bendy-bone handles naming the removed bone are
    /// reset.
    pub fn remove(&mut self, b: EBone) {
        let name = self.graph[b].name;
        for c in self.children_of(b) {
            self.graph[c].flag &= !BONE_CONNECTED;
        }
        for other in self.bones() {
            if other == b {
                continue;
            }
            let bbone = &mut self.graph[other].bbone;
            if bbone.prev == BBoneHandle::Absolute(name) {
                bbone.prev = BBoneHandle::Auto;
            }
            if bbone.next == BBoneHandle::Absolute(name) {
                bbone.next = BBoneHandle::Auto;
            }
        }
        if self.active == Some(b) {
            self.active = None;
        }
        self.graph.remove_node(b);
    }

    /// Shallow-copies a bone's fields into a fresh node with a unique
    /// name (`new_name`, or the source's name numbered). Parent/child
    /// links are NOT copied: callers remap them in a second pass using
    /// the original->copy mapping they build from these calls.
    pub fn duplicate(&mut self, b: EBone, new_name: Option<BoneName>) -> EBone {
        let mut copy = self.graph[b].clone();
        copy.name = unique_name(
            |c| self.name_in_use(c, None),
            new_name.unwrap_or(copy.name),
        );
        self.graph.add_node(copy)
    }

    /// The bone whose name is the bilateral flip of `b`'s, if the name
    /// flips at all and such a bone exists.
    pub fn mirror_of(&self, b: EBone) -> Option<EBone> {
        let name = self.graph[b].name;
        let flipped = flip_side_name(&name, false);
        if flipped == name {
            return None;
        }
        self.find(&flipped)
    }

    /// Moves a bone and everything below it.
    pub fn translate_subtree(&mut self, b: EBone, offset: Vector3<f32>) {
        let mut all = self.descendants(b);
        all.push(b);
        for n in all {
            self.graph[n].head += offset;
            self.graph[n].tail += offset;
        }
    }

    /// Every bone, parents before children. Panics if the graph has a
    /// parent cycle: earlier edits are required to prevent cycles by
    /// construction, so hitting one here means a bug upstream, not a
    /// recoverable condition.
    pub fn topo_order(&self) -> Vec<EBone> {
        let mut order: Vec<EBone> = self
            .graph
            .node_indices()
            .filter(|&b| self.parent_of(b).is_none())
            .collect();
        let mut at = 0;
        while at < order.len() {
            let b = order[at];
            at += 1;
            order.extend(self.children_of(b));
        }
        if order.len() != self.graph.node_count() {
            panic!("parent cycle in edit-bone graph");
        }
        order
    }

    pub fn selected_bones(&self) -> Vec<EBone> {
        self.graph
            .node_indices()
            .filter(|&b| self.graph[b].selected() && self.graph[b].visible())
            .collect()
    }
}

#[test]
fn test_add_uniquifies() {
    let mut g = EditGraph::new();
    let a = g.add(&BoneName::new("Bone"));
    let b = g.add(&BoneName::new("Bone"));
    assert_eq!(g.bone(a).name.as_str(), "Bone");
    assert_eq!(g.bone(b).name.as_str(), "Bone.001");
}

#[test]
fn test_remove_clears_children() {
    let mut g = EditGraph::new();
    let a = g.add(&BoneName::new("A"));
    let b = g.add(&BoneName::new("B"));
    let c = g.add(&BoneName::new("C"));
    g.set_parent(b, Some(a), true);
    g.set_parent(c, Some(b), true);

    g.remove(b);
    // C is orphaned, not re-parented to A.
    assert_eq!(g.parent_of(c), None);
    assert!(!g.bone(c).connected());
    assert_eq!(g.bone_count(), 2);
}

#[test]
fn test_set_parent_breaks_cycle() {
    let mut g = EditGraph::new();
    let a = g.add(&BoneName::new("A"));
    let b = g.add(&BoneName::new("B"));
    let c = g.add(&BoneName::new("C"));
    g.set_parent(b, Some(a), false);
    g.set_parent(c, Some(b), false);

    // Parenting A under C would loop; B's link back to A is cleared.
    g.set_parent(a, Some(c), false);
    assert_eq!(g.parent_of(a), Some(c));
    assert_eq!(g.parent_of(b), None);
    assert_eq!(g.parent_of(c), Some(b));
    // No cycle: topo_order terminates and covers everything.
    assert_eq!(g.topo_order().len(), 3);
}

#[test]
fn test_topo_order_parents_first() {
    let mut g = EditGraph::new();
    let a = g.add(&BoneName::new("A"));
    let b = g.add(&BoneName::new("B"));
    let c = g.add(&BoneName::new("C"));
    g.set_parent(c, Some(b), false);
    g.set_parent(b, Some(a), false);
    let order = g.topo_order();
    let pos = |x| order.iter().position(|&y| y == x).unwrap();
    assert!(pos(a) < pos(b));
    assert!(pos(b) < pos(c));
}

#[test]
fn test_remove_resets_absolute_handles() {
    let mut g = EditGraph::new();
    let a = g.add(&BoneName::new("A"));
    let b = g.add(&BoneName::new("B"));
    g.bone_mut(a).bbone.next = BBoneHandle::Absolute(BoneName::new("B"));
    g.remove(b);
    assert_eq!(g.bone(a).bbone.next, BBoneHandle::Auto);
}
