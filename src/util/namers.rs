use name::{split_number_suffix, BoneName, MAX_NAME};
use std::collections::HashSet;

/// Makes `name` unique with respect to the `in_use` predicate by
/// appending or incrementing a ".NNN" numeric suffix. Callers exclude
/// "self" through the predicate, so renaming an entity to a name it
/// already holds is a no-op. Deterministic: the same namespace and
/// candidate always produce the same result, and a name that is already
/// unique comes back unchanged.
pub fn unique_name<F>(in_use: F, name: BoneName) -> BoneName
where
    F: Fn(&BoneName) -> bool,
{
    if !in_use(&name) {
        return name;
    }

    let s = name.as_str();
    let (base, number) = split_number_suffix(s);
    let start: u32 = number.get(1..).and_then(|d| d.parse().ok()).unwrap_or(0);

    let mut n = start + 1;
    loop {
        let suffix = format!(".{:03}", n);
        // Truncate the base so the suffix always fits.
        let mut base = base;
        while base.len() + suffix.len() > MAX_NAME {
            let mut end = base.len() - 1;
            while end > 0 && !base.is_char_boundary(end) {
                end -= 1;
            }
            base = &base[..end];
        }
        let candidate = BoneName::new(&format!("{}{}", base, suffix));
        if !in_use(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

/// Hands out names that no prior call on the same receiver has handed
/// out. Used by join/separate to uniquify a whole batch of bone names
/// against a merged namespace.
pub struct UniqueNamer {
    taken_names: HashSet<BoneName>,
}

impl UniqueNamer {
    pub fn new() -> UniqueNamer {
        UniqueNamer { taken_names: HashSet::new() }
    }

    /// Marks a name as taken without handing it out.
    pub fn reserve(&mut self, name: BoneName) {
        self.taken_names.insert(name);
    }

    pub fn is_taken(&self, name: &BoneName) -> bool {
        self.taken_names.contains(name)
    }

    /// Returns `desired_name` or something "close" to it (a ".NNN"
    /// variant) which has never been returned by a prior call on the
    /// same receiver.
    pub fn get_fresh_name(&mut self, desired_name: BoneName) -> BoneName {
        let chosen = unique_name(|c| self.taken_names.contains(c), desired_name);
        self.taken_names.insert(chosen);
        chosen
    }
}

#[test]
fn test_unique_name() {
    let ns: HashSet<BoneName> =
        ["Bone", "Bone.001", "Arm.L"].iter().map(|s| BoneName::new(s)).collect();
    let uniq = |s: &str| unique_name(|c| ns.contains(c), BoneName::new(s));
    assert_eq!(uniq("Spine").as_str(), "Spine");
    assert_eq!(uniq("Bone").as_str(), "Bone.002");
    assert_eq!(uniq("Bone.001").as_str(), "Bone.002");
    assert_eq!(uniq("Arm.L").as_str(), "Arm.L.001");
}

#[test]
fn test_unique_namer() {
    let mut un = UniqueNamer::new();
    let fresh = |un: &mut UniqueNamer, s: &str| {
        un.get_fresh_name(BoneName::new(s)).as_str().to_string()
    };
    assert_eq!(fresh(&mut un, "A"), "A");
    assert_eq!(fresh(&mut un, "A"), "A.001");
    assert_eq!(fresh(&mut un, "A"), "A.002");
    assert_eq!(fresh(&mut un, "B"), "B");
    assert_eq!(fresh(&mut un, "A"), "A.003");
}

#[test]
fn test_unique_name_truncates() {
    let long: String = ::std::iter::repeat('x').take(MAX_NAME).collect();
    let taken: HashSet<BoneName> = Some(BoneName::new(&long)).into_iter().collect();
    let fresh = unique_name(|c| taken.contains(c), BoneName::new(&long));
    assert_eq!(fresh.as_str().len(), MAX_NAME);
    assert!(fresh.as_str().ends_with(".001"));
}
