//! Bone-space rotation math.
//!
//! A bone's orientation is not a full matrix: it is the head->tail
//! direction plus a roll angle about that axis. The rest of the matrix
//! is derived by rotating the +Y axis onto the direction with the
//! minimal ("damped track") rotation and then applying the roll. The
//! two functions below convert in both directions and must stay exact
//! inverses of each other; join uses the reverse direction to recover a
//! roll after transforming a bone between two armatures' local spaces.

use cgmath::{vec3, InnerSpace, Matrix, Matrix3, Rad, Vector3};
use std::f32::consts::PI;

/// Bones shorter than this are degenerate: they have no direction, so no
/// orientation, and are pruned when flushing edit mode.
pub const MIN_BONE_LENGTH: f32 = 1.0e-6;

/// Unit head->tail direction, or None for a degenerate bone.
pub fn bone_direction(head: Vector3<f32>, tail: Vector3<f32>) -> Option<Vector3<f32>> {
    let vec = tail - head;
    if vec.magnitude() < MIN_BONE_LENGTH {
        None
    } else {
        Some(vec.normalize())
    }
}

/// Builds the bone matrix for a direction and roll. Columns are the
/// bone-space axes in armature space; the Y column equals `dir`.
pub fn vec_roll_to_mat3(dir: Vector3<f32>, roll: f32) -> Matrix3<f32> {
    let nor = dir.normalize();
    let (x, y, z) = (nor.x, nor.y, nor.z);

    // Minimal rotation R taking +Y to nor:
    //     R = I + [v]x + [v]x^2 / (1 + y),    v = (0,1,0) x nor
    let theta = 1.0 + y;
    let b_matrix = if theta > 1.0e-5 {
        Matrix3::from_cols(
            vec3(1.0 - x * x / theta, -x, -x * z / theta),
            vec3(x, y, z),
            vec3(-x * z / theta, -z, 1.0 - z * z / theta),
        )
    } else {
        // nor is (almost) exactly -Y; any half turn that maps +Y onto
        // -Y will do, as long as both conversion directions agree on it.
        Matrix3::from_angle_x(Rad(PI))
    };

    Matrix3::from_axis_angle(nor, Rad(roll)) * b_matrix
}

/// Recovers the roll of `mat` about the explicitly given direction.
pub fn mat3_vec_to_roll(mat: &Matrix3<f32>, vec: Vector3<f32>) -> f32 {
    let vec_mat = vec_roll_to_mat3(vec, 0.0);
    // vec_mat is a rotation, so its transpose is its inverse. The
    // product is then a pure rotation about bone-space +Y.
    let roll_mat = vec_mat.transpose() * *mat;
    roll_mat.z.x.atan2(roll_mat.z.z)
}

/// Splits a bone matrix into its Y axis and roll.
pub fn mat3_to_vec_roll(mat: &Matrix3<f32>) -> (Vector3<f32>, f32) {
    (mat.y, mat3_vec_to_roll(mat, mat.y))
}

/// Reflection across the YZ plane, the mirror plane for bilateral
/// symmetry.
pub fn mirror_x(v: Vector3<f32>) -> Vector3<f32> {
    vec3(-v.x, v.y, v.z)
}

#[cfg(test)]
fn mat_approx_eq(a: &Matrix3<f32>, b: &Matrix3<f32>) -> bool {
    (0..3).all(|col| (0..3).all(|row| (a[col][row] - b[col][row]).abs() < 1.0e-5))
}

#[test]
fn test_vec_roll_identity() {
    use cgmath::SquareMatrix;
    let m = vec_roll_to_mat3(vec3(0.0, 1.0, 0.0), 0.0);
    assert!(mat_approx_eq(&m, &Matrix3::identity()));
}

#[test]
fn test_vec_roll_y_column_is_direction() {
    let dir = vec3(1.0, 2.0, -0.5).normalize();
    let m = vec_roll_to_mat3(dir, 0.7);
    assert!((m.y - dir).magnitude() < 1.0e-5);
}

#[test]
fn test_roll_round_trip() {
    for &roll in &[0.0f32, 0.5, -1.2, 3.0] {
        for &dir in &[
            vec3(0.0, 1.0, 0.0),
            vec3(1.0, 0.0, 0.0),
            vec3(0.3, -0.2, 0.9),
        ] {
            let dir = dir.normalize();
            let m = vec_roll_to_mat3(dir, roll);
            let (vec, r) = mat3_to_vec_roll(&m);
            assert!((vec - dir).magnitude() < 1.0e-4);
            let err = (r - roll).abs() % (2.0 * PI);
            assert!(err < 1.0e-4 || (err - 2.0 * PI).abs() < 1.0e-4);
        }
    }
}

#[test]
fn test_minus_y_direction() {
    let m = vec_roll_to_mat3(vec3(0.0, -1.0, 0.0), 0.0);
    assert!((m.y - vec3(0.0, -1.0, 0.0)).magnitude() < 1.0e-5);
    let (_, r) = mat3_to_vec_roll(&m);
    assert!(r.abs() < 1.0e-4);
}
