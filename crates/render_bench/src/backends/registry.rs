//! Backend lookup by identifier

use std::fmt;
use std::sync::OnceLock;

use super::{Appleseed, Backend, Cycles, LuxCore, Ospray, Pbrt, PovRay};

static GLOBAL: OnceLock<BackendRegistry> = OnceLock::new();

/// Ordered set of backends, looked up case-insensitively by [`Backend::id`]
pub struct BackendRegistry {
    backends: Vec<Box<dyn Backend>>,
}

impl BackendRegistry {
    /// Registry without any backend
    pub fn empty() -> Self {
        Self {
            backends: Vec::new(),
        }
    }

    /// Registry holding the built-in backends
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(LuxCore));
        registry.register(Box::new(Appleseed));
        registry.register(Box::new(Pbrt));
        registry.register(Box::new(PovRay));
        registry.register(Box::new(Cycles));
        registry.register(Box::new(Ospray));
        registry
    }

    /// Process-wide registry of the built-in backends
    pub fn global() -> &'static Self {
        GLOBAL.get_or_init(Self::with_builtins)
    }

    /// Add a backend, replacing any with the same identifier
    pub fn register(&mut self, backend: Box<dyn Backend>) {
        let id = backend.id();
        match self.backends.iter().position(|b| b.id().eq_ignore_ascii_case(id)) {
            Some(index) => {
                log::debug!("Replacing backend {id}");
                self.backends[index] = backend;
            }
            None => self.backends.push(backend),
        }
    }

    /// Backend with identifier `id`, ignoring case
    pub fn get(&self, id: &str) -> Option<&dyn Backend> {
        self.backends
            .iter()
            .find(|b| b.id().eq_ignore_ascii_case(id.trim()))
            .map(|b| &**b)
    }

    /// Identifiers in registration order
    pub fn ids(&self) -> Vec<&'static str> {
        self.backends.iter().map(|b| b.id()).collect()
    }

    /// Registered backends
    pub fn iter(&self) -> impl Iterator<Item = &dyn Backend> {
        self.backends.iter().map(|b| &**b)
    }

    /// Number of backends
    pub fn len(&self) -> usize {
        self.backends.len()
    }

    /// Whether no backend is registered
    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("backends", &self.ids())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::{fixtures, Capabilities, TextureNames};
    use crate::material::MaterialKind;

    #[test]
    fn test_lookup_ignores_case() {
        let registry = BackendRegistry::global();
        assert_eq!(registry.get("luxcore").map(|b| b.id()), Some("LuxCore"));
        assert_eq!(registry.get("POVRAY").map(|b| b.id()), Some("PovRay"));
        assert_eq!(registry.get(" cycles ").map(|b| b.id()), Some("Cycles"));
        assert!(registry.get("mitsuba").is_none());
        assert_eq!(registry.ids(), vec!["LuxCore", "Appleseed", "Pbrt", "PovRay", "Cycles", "Ospray"]);
    }

    #[test]
    fn test_declared_capabilities() {
        let registry = BackendRegistry::with_builtins();
        let caps = |id: &str| registry.get(id).map(Backend::capabilities);
        assert_eq!(caps("LuxCore"), Some(Capabilities::all()));
        let appleseed = caps("Appleseed").unwrap();
        assert!(appleseed.supports(MaterialKind::Disney));
        assert!(!appleseed.supports(MaterialKind::Carpaint));
        let pbrt = caps("Pbrt").unwrap();
        assert!(pbrt.supports(MaterialKind::Carpaint));
        assert!(!pbrt.supports(MaterialKind::Emission));
        let povray = caps("PovRay").unwrap();
        assert!(povray.supports(MaterialKind::Substrate));
        assert!(!povray.supports(MaterialKind::Mixed));
        let cycles = caps("Cycles").unwrap();
        assert!(cycles.supports(MaterialKind::Mixed));
        assert!(!cycles.supports(MaterialKind::Carpaint));
        let ospray = caps("Ospray").unwrap();
        assert!(ospray.supports(MaterialKind::Carpaint));
        assert!(!ospray.supports(MaterialKind::Substrate));
    }

    #[test]
    fn test_every_backend_handles_every_kind() {
        for backend in BackendRegistry::global().iter() {
            for material in fixtures::all_materials(backend.id()) {
                let text = backend.emit_material("Obj_x", &material, &TextureNames::new());
                assert!(!text.is_empty(), "{} {:?}", backend.id(), material.kind());
                assert!(text.ends_with('\n'), "{} {:?}", backend.id(), material.kind());
            }
        }
    }

    #[test]
    fn test_every_backend_handles_every_textured_kind() {
        let texture = crate::material::TextureRef::new("t.png", 0, 1.0);
        let mut names = TextureNames::new();
        names.insert(texture.clone(), "t_texture".into());
        for backend in BackendRegistry::global().iter() {
            for mut material in fixtures::all_textured(backend.id(), &texture) {
                let kind = material.kind();
                material.flatten_textures(&|field| backend.accepts_texture(kind, field));
                let text = backend.emit_material("Obj_x", &material, &names);
                assert!(text.ends_with('\n'), "{} {kind:?}", backend.id());
                if !backend.supports(kind) {
                    assert!(!text.contains("t_texture"), "{} {kind:?}", backend.id());
                }
            }
        }
    }

    #[test]
    fn test_register_replaces_same_id() {
        let mut registry = BackendRegistry::empty();
        registry.register(Box::new(LuxCore));
        registry.register(Box::new(LuxCore));
        assert_eq!(registry.len(), 1);
    }
}
