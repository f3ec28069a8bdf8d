//! Animation curves and the path strings that bind them to bones.
//!
//! Curves do not point at bones; they carry an RNA-ish path string like
//!
//! ```text
//! pose.bones["Arm.L"].rotation_quaternion
//! ```
//!
//! and are re-resolved by name when evaluated (evaluation itself is not
//! this crate's business). What IS this crate's business is keeping
//! those strings in step with the bone namespace: renaming a bone
//! rewrites every matching path, and symmetrize copies curves across to
//! the mirrored bone, negating the channels that flip under a
//! reflection.

use name::BoneName;

pub type ActionId = usize;

#[derive(Clone, Debug, PartialEq)]
pub struct Keyframe {
    pub frame: f32,
    pub value: f32,
}

/// One animation channel: a path into the owning datablock plus an
/// index into the addressed array property.
#[derive(Clone, Debug, PartialEq)]
pub struct FCurve {
    pub path: String,
    pub index: usize,
    pub keys: Vec<Keyframe>,
}

#[derive(Clone, Debug)]
pub struct Action {
    pub name: String,
    pub curves: Vec<FCurve>,
}

impl Action {
    pub fn new(name: &str) -> Action {
        Action { name: name.to_string(), curves: vec![] }
    }
}

/// Animation data attached to a datablock: a linked action plus any
/// driver curves living directly on the datablock.
#[derive(Clone, Debug, Default)]
pub struct AnimData {
    pub action: Option<ActionId>,
    pub drivers: Vec<FCurve>,
}

/// `pose.bones["<name>"]`: the path prefix addressing one bone's
/// channels.
pub fn bone_path_prefix(name: &BoneName) -> String {
    format!("pose.bones[\"{}\"]", name)
}

/// Rewrites every curve path addressing `old` to address `new` instead.
/// Returns how many paths changed.
pub fn rename_bone_paths(curves: &mut [FCurve], old: &BoneName, new: &BoneName) -> usize {
    let old_prefix = bone_path_prefix(old);
    let new_prefix = bone_path_prefix(new);
    let mut count = 0;
    for curve in curves {
        if curve.path.starts_with(&old_prefix) {
            curve.path = format!("{}{}", new_prefix, &curve.path[old_prefix.len()..]);
            count += 1;
        }
    }
    count
}

/// Which transform channels change sign when a pose is reflected across
/// the X mirror plane.
pub fn channel_flips_sign(path_tail: &str, index: usize) -> bool {
    match path_tail {
        ".location" => index == 0,
        ".rotation_quaternion" => index == 2 || index == 3,
        ".rotation_euler" => index == 0 || index == 1,
        ".rotation_axis_angle" => index == 2 || index == 3,
        _ => false,
    }
}

/// Copies every curve authored against `src` over to `dst`, negating the
/// channels in the flip table. Existing `dst` curves for the same
/// channel are replaced, not duplicated.
pub fn mirror_bone_curves(action: &mut Action, src: &BoneName, dst: &BoneName) {
    let src_prefix = bone_path_prefix(src);
    let dst_prefix = bone_path_prefix(dst);

    let mirrored: Vec<FCurve> = action
        .curves
        .iter()
        .filter(|c| c.path.starts_with(&src_prefix))
        .map(|c| {
            let tail = &c.path[src_prefix.len()..];
            let negate = channel_flips_sign(tail, c.index);
            FCurve {
                path: format!("{}{}", dst_prefix, tail),
                index: c.index,
                keys: c
                    .keys
                    .iter()
                    .map(|k| Keyframe {
                        frame: k.frame,
                        value: if negate { -k.value } else { k.value },
                    })
                    .collect(),
            }
        })
        .collect();

    action.curves.retain(|c| {
        !mirrored
            .iter()
            .any(|m| m.path == c.path && m.index == c.index)
    });
    action.curves.extend(mirrored);
}

#[test]
fn test_rename_bone_paths() {
    let mut curves = vec![
        FCurve { path: "pose.bones[\"Arm.L\"].location".to_string(), index: 1, keys: vec![] },
        FCurve { path: "pose.bones[\"Arm.L.other\"].location".to_string(), index: 0, keys: vec![] },
        FCurve { path: "location".to_string(), index: 0, keys: vec![] },
    ];
    let n = rename_bone_paths(&mut curves, &BoneName::new("Arm.L"), &BoneName::new("Arm.Left"));
    assert_eq!(n, 1);
    assert_eq!(curves[0].path, "pose.bones[\"Arm.Left\"].location");
    // A different bone whose name merely shares a prefix is untouched.
    assert_eq!(curves[1].path, "pose.bones[\"Arm.L.other\"].location");
}

#[test]
fn test_mirror_curves_negates_flip_channels() {
    let key = |v: f32| vec![Keyframe { frame: 1.0, value: v }];
    let mut action = Action::new("Act");
    action.curves = vec![
        FCurve { path: "pose.bones[\"Arm.L\"].location".to_string(), index: 0, keys: key(2.0) },
        FCurve { path: "pose.bones[\"Arm.L\"].location".to_string(), index: 1, keys: key(3.0) },
        FCurve {
            path: "pose.bones[\"Arm.L\"].rotation_quaternion".to_string(),
            index: 2,
            keys: key(0.5),
        },
    ];
    mirror_bone_curves(&mut action, &BoneName::new("Arm.L"), &BoneName::new("Arm.R"));

    let find = |path: &str, index: usize| {
        action
            .curves
            .iter()
            .find(|c| c.path == path && c.index == index)
            .unwrap()
            .keys[0]
            .value
    };
    assert_eq!(find("pose.bones[\"Arm.R\"].location", 0), -2.0);
    assert_eq!(find("pose.bones[\"Arm.R\"].location", 1), 3.0);
    assert_eq!(find("pose.bones[\"Arm.R\"].rotation_quaternion", 2), -0.5);
    // Originals still present.
    assert_eq!(find("pose.bones[\"Arm.L\"].location", 0), 2.0);
}
