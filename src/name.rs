//! Bone names and bilateral name flipping.
//!
//! A bone name is a fixed-size, NUL-padded, UTF-8 string, unique within
//! its armature. Names are the only cross-reference mechanism in this
//! crate: constraints, vertex groups, bone-parent strings, and animation
//! curve paths all refer to bones by name and re-resolve lazily, which is
//! what makes `flip_side_name` and `util::namers::unique_name` the two
//! load-bearing operations here.
//!
//! `flip_side_name` recognizes the usual left/right markers:
//!
//! ```text
//! Arm.L     <->  Arm.R        (suffix letter, any of . - _ space)
//! L_arm     <->  R_arm        (prefix letter)
//! LeftArm   <->  RightArm     (word at either end, case preserved)
//! ```
//!
//! and is idempotent under double application. Names without a marker
//! (center-line bones) come back unchanged.

use std::fmt::{self, Write};
use std::str;

/// Fixed buffer size for a bone name, in bytes. Longer names are
/// truncated at a char boundary.
pub const MAX_NAME: usize = 64;

#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct BoneName([u8; MAX_NAME]);

impl BoneName {
    pub fn new(s: &str) -> BoneName {
        let mut arr = [0; MAX_NAME];
        let end = floor_char_boundary(s, MAX_NAME);
        arr[..end].copy_from_slice(&s.as_bytes()[..end]);
        BoneName(arr)
    }

    pub fn none() -> BoneName {
        BoneName([0; MAX_NAME])
    }

    pub fn is_empty(&self) -> bool {
        self.0[0] == 0
    }

    pub fn as_str(&self) -> &str {
        let bytes = trim_trailing_nuls(&self.0[..]);
        // Only `new` writes the buffer, so this never actually fails.
        str::from_utf8(bytes).unwrap_or("")
    }
}

impl<'a> From<&'a str> for BoneName {
    fn from(s: &str) -> BoneName {
        BoneName::new(s)
    }
}

impl fmt::Display for BoneName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for BoneName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_char('"')?;
        for c in self.as_str().chars() {
            for e in c.escape_default() {
                f.write_char(e)?;
            }
        }
        f.write_char('"')
    }
}

/// Largest byte index `<= max` that lies on a char boundary of `s`.
fn floor_char_boundary(s: &str, max: usize) -> usize {
    if s.len() <= max {
        return s.len();
    }
    let mut end = max;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    end
}

fn trim_trailing_nuls(mut buf: &[u8]) -> &[u8] {
    while let Some((&0, rest)) = buf.split_last() {
        buf = rest;
    }
    buf
}

/// Splits a trailing ".NNN" duplicate-disambiguation suffix off a name.
/// Returns the base and the suffix (including the dot), or the whole name
/// and "" when there is no such suffix.
pub fn split_number_suffix(s: &str) -> (&str, &str) {
    let bytes = s.as_bytes();
    if bytes.last().map_or(true, |b| !b.is_ascii_digit()) {
        return (s, "");
    }
    match s.rfind('.') {
        Some(dot) if dot + 1 < s.len()
            && bytes[dot + 1..].iter().all(|b| b.is_ascii_digit()) =>
        {
            (&s[..dot], &s[dot..])
        }
        _ => (s, ""),
    }
}

fn is_sep(b: u8) -> bool {
    b == b'.' || b == b' ' || b == b'-' || b == b'_'
}

fn flip_letter(b: u8) -> Option<u8> {
    match b {
        b'l' => Some(b'r'),
        b'r' => Some(b'l'),
        b'L' => Some(b'R'),
        b'R' => Some(b'L'),
        _ => None,
    }
}

/// Computes the bilateral-mirror counterpart of a bone name by flipping
/// its left/right marker. If `strip_number` is set, a trailing ".NNN"
/// suffix is removed first; otherwise it is carried over unchanged.
/// Returns the name unchanged if no marker is recognized.
pub fn flip_side_name(name: &BoneName, strip_number: bool) -> BoneName {
    let s = name.as_str();

    // Names like ".L" are too short to mean anything.
    if s.len() < 3 {
        return *name;
    }

    let (base, number) = split_number_suffix(s);
    let number = if strip_number { "" } else { number };
    if base.is_empty() {
        return *name;
    }

    let b = base.as_bytes();
    let n = b.len();

    // "...<sep><letter>"
    if n >= 2 && is_sep(b[n - 2]) {
        if let Some(opp) = flip_letter(b[n - 1]) {
            return BoneName::new(&format!("{}{}{}", &base[..n - 1], opp as char, number));
        }
    }

    // "<letter><sep>..."
    if n >= 2 && is_sep(b[1]) {
        if let Some(opp) = flip_letter(b[0]) {
            return BoneName::new(&format!("{}{}{}", opp as char, &base[1..], number));
        }
    }

    // The words "left"/"right" at either end of the name, any casing.
    if n > 5 {
        let lower = base.to_ascii_lowercase();
        let word = if lower.starts_with("right") || lower.ends_with("right") {
            let at = if lower.starts_with("right") { 0 } else { n - 5 };
            Some((at, 5, match (b[at], b[at + 1]) {
                (b'r', _) => "left",
                (_, b'I') => "LEFT",
                _ => "Left",
            }))
        } else if lower.starts_with("left") || lower.ends_with("left") {
            let at = if lower.starts_with("left") { 0 } else { n - 4 };
            Some((at, 4, match (b[at], b[at + 1]) {
                (b'l', _) => "right",
                (_, b'E') => "RIGHT",
                _ => "Right",
            }))
        } else {
            None
        };
        if let Some((at, len, repl)) = word {
            return BoneName::new(&format!(
                "{}{}{}{}",
                &base[..at],
                repl,
                &base[at + len..],
                number
            ));
        }
    }

    BoneName::new(&format!("{}{}", base, number))
}

#[test]
fn test_flip_suffix_letter() {
    let flip = |s: &str| flip_side_name(&BoneName::new(s), false);
    assert_eq!(flip("Arm.L").as_str(), "Arm.R");
    assert_eq!(flip("Arm.R").as_str(), "Arm.L");
    assert_eq!(flip("Arm_l").as_str(), "Arm_r");
    assert_eq!(flip("Arm r").as_str(), "Arm l");
    assert_eq!(flip("Arm-L").as_str(), "Arm-R");
}

#[test]
fn test_flip_prefix_letter() {
    let flip = |s: &str| flip_side_name(&BoneName::new(s), false);
    assert_eq!(flip("L.arm").as_str(), "R.arm");
    assert_eq!(flip("r_hand").as_str(), "l_hand");
}

#[test]
fn test_flip_word() {
    let flip = |s: &str| flip_side_name(&BoneName::new(s), false);
    assert_eq!(flip("LeftArm").as_str(), "RightArm");
    assert_eq!(flip("RightArm").as_str(), "LeftArm");
    assert_eq!(flip("LEFTleg").as_str(), "RIGHTleg");
    assert_eq!(flip("armleft").as_str(), "armright");
    assert_eq!(flip("ArmRight").as_str(), "ArmLeft");
}

#[test]
fn test_flip_center_unchanged() {
    let flip = |s: &str| flip_side_name(&BoneName::new(s), false);
    assert_eq!(flip("Spine").as_str(), "Spine");
    assert_eq!(flip("Head").as_str(), "Head");
    // Too short for marker recognition.
    assert_eq!(flip(".L").as_str(), ".L");
}

#[test]
fn test_flip_number_suffix() {
    let name = BoneName::new("hand.L.001");
    assert_eq!(flip_side_name(&name, false).as_str(), "hand.R.001");
    assert_eq!(flip_side_name(&name, true).as_str(), "hand.R");
}

#[test]
fn test_flip_idempotent() {
    for s in &[
        "Arm.L", "Arm.R", "L_leg", "R-toe", "LeftArm", "rightfoot",
        "Spine", "hand.L.023", "x.L",
    ] {
        let name = BoneName::new(s);
        let once = flip_side_name(&name, false);
        let twice = flip_side_name(&once, false);
        assert_eq!(twice.as_str(), name.as_str(), "double flip of {}", s);
    }
}

#[test]
fn test_split_number_suffix() {
    assert_eq!(split_number_suffix("Bone.001"), ("Bone", ".001"));
    assert_eq!(split_number_suffix("Bone.1"), ("Bone", ".1"));
    assert_eq!(split_number_suffix("Bone"), ("Bone", ""));
    assert_eq!(split_number_suffix("Bone.x1"), ("Bone.x1", ""));
    assert_eq!(split_number_suffix("Bone."), ("Bone.", ""));
}

#[test]
fn test_name_truncation() {
    let long: String = ::std::iter::repeat('x').take(100).collect();
    let name = BoneName::new(&long);
    assert_eq!(name.as_str().len(), MAX_NAME);
}
