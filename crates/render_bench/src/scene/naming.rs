//! Identifier allocation for emitted declarations
//!
//! Every declaration is named `<entity>_<kind>` with anything but ASCII
//! letters and digits replaced by `_`. On collision `__<n>` is appended with
//! the smallest free `n` starting at 2. Names a backend derives from an
//! allocated one (the `_diffuse`/`_glass` halves of a mix, the `_sun`/`_sky`
//! halves of a sun and sky) are reserved together with it.

use std::collections::HashSet;

use crate::material::MaterialKind;

/// Replace every character that is not an ASCII letter or digit by `_`
pub fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// Suffixes a backend may append to the name of a material of `kind`
pub const fn material_children(kind: MaterialKind) -> &'static [&'static str] {
    match kind {
        MaterialKind::Mixed => &["_diffuse", "_glass"],
        _ => &[],
    }
}

/// Suffixes a backend may append to the name of a sun and sky
pub const SUNSKY_CHILDREN: &[&str] = &["_sun", "_sky"];

/// Hands out unique identifiers for one scene
#[derive(Debug, Default, Clone)]
pub struct NameAllocator {
    used: HashSet<String>,
}

impl NameAllocator {
    /// Allocator with no name taken
    pub fn new() -> Self {
        Self::default()
    }

    /// Unique name for the `kind` declaration of `entity`
    pub fn allocate(&mut self, entity: &str, kind: &str) -> String {
        self.allocate_with_children(entity, kind, &[])
    }

    /// Unique name for the `kind` declaration of `entity`, also reserving the
    /// name followed by each of `children`
    pub fn allocate_with_children(&mut self, entity: &str, kind: &str, children: &[&str]) -> String {
        let base = sanitize(&format!("{entity}_{kind}"));
        let found = std::iter::once(base.clone())
            .chain((2u32..).map(|n| format!("{base}__{n}")))
            .find(|candidate| self.is_free(candidate, children));
        let name = found.unwrap_or(base);
        for child in children {
            self.used.insert(format!("{name}{child}"));
        }
        self.used.insert(name.clone());
        name
    }

    /// Whether `name` has been handed out or reserved
    pub fn is_taken(&self, name: &str) -> bool {
        self.used.contains(name)
    }

    fn is_free(&self, candidate: &str, children: &[&str]) -> bool {
        !self.used.contains(candidate)
            && children
                .iter()
                .all(|child| !self.used.contains(&format!("{candidate}{child}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("Body.001 (copy)"), "Body_001__copy_");
        assert_eq!(sanitize("Réglette"), "R_glette");
    }

    #[test]
    fn test_collisions_get_smallest_free_suffix() {
        let mut names = NameAllocator::new();
        assert_eq!(names.allocate("Cube", "glass"), "Cube_glass");
        assert_eq!(names.allocate("Cube", "glass"), "Cube_glass__2");
        assert_eq!(names.allocate("Cube.", "glass"), "Cube__glass");
        assert_eq!(names.allocate("Cube", "glass"), "Cube_glass__3");
    }

    #[test]
    fn test_children_are_reserved() {
        let mut names = NameAllocator::new();
        let mixed = names.allocate_with_children("Vase", "mixed", material_children(MaterialKind::Mixed));
        assert_eq!(mixed, "Vase_mixed");
        assert!(names.is_taken("Vase_mixed_glass"));
        // An entity whose plain name clashes with a reserved child moves aside
        assert_eq!(names.allocate("Vase_mixed", "glass"), "Vase_mixed_glass__2");
    }

    #[test]
    fn test_candidate_rejected_when_child_taken() {
        let mut names = NameAllocator::new();
        names.allocate("Sky", "sunsky_sun");
        let sunsky = names.allocate_with_children("Sky", "sunsky", SUNSKY_CHILDREN);
        assert_eq!(sunsky, "Sky_sunsky__2");
        assert!(names.is_taken("Sky_sunsky__2_sky"));
    }
}
