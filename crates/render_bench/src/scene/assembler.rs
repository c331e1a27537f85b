//! # Scene Assembler
//!
//! Runs every entity of a [`Scene`] through one backend and joins the
//! fragments into a scene file.
//!
//! ## Pipeline
//!
//! 1. The last camera (earlier ones are dropped with a warning)
//! 2. Lights, in host order
//! 3. Meshes, sorted by name: the material is resolved, missing textures are
//!    degraded, kinds the backend lacks become diffuse, then every distinct
//!    texture and every structurally distinct material is declared once
//! 4. [`Backend::write_scene`] wraps the sections
//!
//! [`Assembler::assemble`] does no I/O apart from texture existence checks,
//! so the same scene always yields the same text. [`render`] writes the text
//! and its sidecars next to each other and builds the command line.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::assets::{CardError, CardStore};
use crate::backends::sdl::{self, SCENE_STEM_TOKEN};
use crate::backends::{
    Backend, BackendRegistry, LaunchSettings, SceneGlobals, SceneParts, Section, Sidecar,
    TextureNames,
};
use crate::core::config::{BenchConfig, RendererConfig};
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::launcher::LaunchError;
use crate::material::{Material, Normalizer, Passthrough, RawParams};

use super::entity::{Camera, Entity, MaterialRef, MeshObject, Scene};
use super::naming::{self, NameAllocator};

/// File name prefix of every scene file written by [`render`]
pub const SCENE_FILE_PREFIX: &str = "render_bench_";

/// Rendering errors
#[derive(Error, Debug)]
pub enum RenderError {
    /// No backend registered under that identifier
    #[error("Unknown backend: {0}")]
    UnknownBackend(String),

    /// The scene file or a sidecar could not be written
    #[error("Failed to write {}: {source}", .path.display())]
    WriteFailed {
        /// File being written
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// The renderer could not be started
    #[error(transparent)]
    Launch(#[from] LaunchError),

    /// The caller cancelled before the renderer was started
    #[error("Render cancelled")]
    Cancelled,
}

/// Scene text before it is written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledScene {
    /// Scene file contents, sidecar references still holding the stem token
    pub text: String,
    /// Files written next to the scene file
    pub sidecars: Vec<Sidecar>,
    /// Conditions met while assembling
    pub diagnostics: Diagnostics,
}

/// Drives one backend over a scene
pub struct Assembler<'a> {
    backend: &'a dyn Backend,
    cards: &'a CardStore,
    texture_exists: fn(&Path) -> bool,
}

impl<'a> Assembler<'a> {
    /// Assembler using the process-wide card store
    pub fn new(backend: &'a dyn Backend) -> Self {
        Self {
            backend,
            cards: CardStore::global(),
            texture_exists: Path::exists,
        }
    }

    /// Resolve card references against `cards`
    pub fn with_cards(mut self, cards: &'a CardStore) -> Self {
        self.cards = cards;
        self
    }

    /// Replace the file system check used for texture images
    pub fn with_texture_check(mut self, exists: fn(&Path) -> bool) -> Self {
        self.texture_exists = exists;
        self
    }

    /// Build the scene text
    ///
    /// # Arguments
    /// * `scene` - Entities in host order
    /// * `globals` - Resolution, sampling and output written into the scene
    ///
    /// # Returns
    /// The scene text, its sidecars and every non-fatal condition met
    pub fn assemble(&self, scene: &Scene, globals: &SceneGlobals) -> AssembledScene {
        let mut state = AssemblyState::default();

        if let Some(camera) = self.pick_camera(scene) {
            self.add_camera(camera, &mut state);
        }

        for entity in &scene.entities {
            self.add_light(entity, &mut state);
        }

        let mut meshes: Vec<&MeshObject> = scene
            .entities
            .iter()
            .filter_map(|e| match e {
                Entity::Mesh(mesh) => Some(mesh),
                _ => None,
            })
            .collect();
        meshes.sort_by(|a, b| a.name.cmp(&b.name));
        for mesh in meshes {
            self.add_mesh(mesh, &mut state);
        }

        let written = self.backend.write_scene(&state.parts, globals);
        state.sidecars.extend(written.sidecars);

        log::debug!(
            "Assembled {} scene: {} bytes, {} sidecars, {} diagnostics",
            self.backend.id(),
            written.text.len(),
            state.sidecars.len(),
            state.diagnostics.len()
        );

        AssembledScene {
            text: written.text,
            sidecars: state.sidecars,
            diagnostics: state.diagnostics,
        }
    }

    fn pick_camera<'s>(&self, scene: &'s Scene) -> Option<&'s Camera> {
        let cameras: Vec<&Camera> = scene
            .entities
            .iter()
            .filter_map(|e| match e {
                Entity::Camera(camera) => Some(camera),
                _ => None,
            })
            .collect();
        if cameras.len() > 1 {
            log::warn!(
                "{} cameras in scene, only '{}' is used",
                cameras.len(),
                cameras[cameras.len() - 1].name
            );
        }
        cameras.last().copied()
    }

    fn add_camera(&self, camera: &Camera, state: &mut AssemblyState) {
        if let Err(err) = camera.validate() {
            state.diagnostics.push(DiagnosticKind::EmitError, &camera.name, err.to_string());
            return;
        }
        let name = state.names.allocate(&camera.name, "camera");
        state.parts.push(Section::Camera, self.backend.emit_camera(&name, camera));
    }

    fn add_light(&self, entity: &Entity, state: &mut AssemblyState) {
        let validated = match entity {
            Entity::PointLight(light) => light.validate(),
            Entity::AreaLight(light) => light.validate(),
            Entity::Sunsky(light) => light.validate(),
            Entity::ImageLight(light) => light.validate(),
            Entity::Mesh(_) | Entity::Camera(_) => return,
        };
        if let Err(err) = validated {
            state.diagnostics.push(DiagnosticKind::EmitError, entity.name(), err.to_string());
            return;
        }

        let text = match entity {
            Entity::PointLight(light) => {
                let name = state.names.allocate(&light.name, "pointlight");
                self.backend.emit_pointlight(&name, light)
            }
            Entity::AreaLight(light) => {
                let name = state.names.allocate(&light.name, "arealight");
                self.backend.emit_arealight(&name, light)
            }
            Entity::Sunsky(light) => {
                let name = state
                    .names
                    .allocate_with_children(&light.name, "sunsky", naming::SUNSKY_CHILDREN);
                self.backend.emit_sunsky(&name, light)
            }
            Entity::ImageLight(light) => {
                if !(self.texture_exists)(&light.hdri_path) {
                    state.diagnostics.push(
                        DiagnosticKind::MissingTexture,
                        &light.name,
                        format!("environment image '{}' not found, light skipped", light.hdri_path.display()),
                    );
                    return;
                }
                let name = state.names.allocate(&light.name, "imagelight");
                self.backend.emit_imagelight(&name, light)
            }
            Entity::Mesh(_) | Entity::Camera(_) => return,
        };
        state.parts.push(Section::Lights, text);
    }

    fn add_mesh(&self, mesh: &MeshObject, state: &mut AssemblyState) {
        if let Err(err) = mesh.validate() {
            state.diagnostics.push(DiagnosticKind::EmitError, &mesh.name, err.to_string());
            return;
        }

        let material = self.resolve_material(mesh, &mut state.diagnostics);
        let material_name = self.declare_material(mesh, material, state);

        let name = state.names.allocate(&mesh.name, "mesh");
        let fragment = self.backend.emit_mesh(&name, mesh, &material_name);
        state.parts.push(Section::Meshes, fragment.text);
        state.sidecars.extend(fragment.sidecars);
    }

    /// Material the backend will be asked to declare for `mesh`
    fn resolve_material(&self, mesh: &MeshObject, diagnostics: &mut Diagnostics) -> Material {
        let mut material = match &mesh.material {
            MaterialRef::None => Material::diffuse(mesh.color),
            MaterialRef::Card(card) => match self.cards.load_card(card) {
                Ok(raw) => self.params_material(&raw, mesh, diagnostics),
                Err(err) => {
                    let kind = match err {
                        CardError::NotFound(_) => DiagnosticKind::CardNotFound,
                        CardError::Malformed { .. } | CardError::Io { .. } => DiagnosticKind::CardMalformed,
                    };
                    diagnostics.push(kind, &mesh.name, format!("{err}, using object color"));
                    Material::diffuse(mesh.color)
                }
            },
            MaterialRef::Params(raw) => self.params_material(raw, mesh, diagnostics),
        };

        material.degrade_textures(&mesh.name, &self.texture_exists, diagnostics);

        let backend = self.backend;
        let foreign = match &material {
            Material::Passthrough(p) if !p.backend.eq_ignore_ascii_case(backend.id()) => Some(p.backend.clone()),
            _ => None,
        };
        if let Some(tag) = foreign {
            diagnostics.push(
                DiagnosticKind::ForeignPassthrough,
                &mesh.name,
                format!("passthrough text is for {tag}, not {}; using object color", backend.id()),
            );
            return Material::diffuse(mesh.color);
        }
        if !backend.supports(material.kind()) {
            diagnostics.push(
                DiagnosticKind::BackendMissingCapability,
                &mesh.name,
                format!("{} cannot render {} materials, using diffuse", backend.id(), material.kind()),
            );
            return Material::diffuse(material.principal_color().unwrap_or(mesh.color));
        }

        let kind = material.kind();
        for field in material.flatten_textures(&|field| backend.accepts_texture(kind, field)) {
            diagnostics.push(
                DiagnosticKind::BackendMissingCapability,
                &mesh.name,
                format!("{} cannot texture {kind} {field}, using constant", backend.id()),
            );
        }
        material
    }

    fn params_material(&self, raw: &RawParams, mesh: &MeshObject, diagnostics: &mut Diagnostics) -> Material {
        if let Some(text) = raw.passthrough_text(self.backend.id()) {
            return Material::Passthrough(Passthrough {
                backend: self.backend.id().to_string(),
                text: sdl::fill_color(&text, mesh.color),
            });
        }

        let (mut material, found) = Normalizer::with_cards(self.cards)
            .with_backend(self.backend.id())
            .normalize(raw, mesh.color);
        diagnostics.extend(found);
        if let Material::Passthrough(p) = &mut material {
            p.text = sdl::fill_color(&p.text, mesh.color);
        }
        material
    }

    /// Declare the textures and the material of `mesh` unless an identical
    /// declaration exists, returning the material name
    fn declare_material(&self, mesh: &MeshObject, material: Material, state: &mut AssemblyState) -> String {
        if let Some((_, name)) = state.materials.iter().find(|(m, _)| *m == material) {
            log::debug!("Mesh '{}' shares material {name}", mesh.name);
            return name.clone();
        }

        for (texture, role) in material.texture_uses() {
            if state.textures.get(texture).is_some() {
                continue;
            }
            let stem = texture
                .path
                .file_stem()
                .map_or_else(|| "image".to_string(), |s| s.to_string_lossy().into_owned());
            let name = state.names.allocate(&stem, "texture");
            state
                .parts
                .push(Section::Textures, self.backend.emit_texture(&name, texture, role));
            state.textures.insert(texture.clone(), name);
        }

        let kind = material.kind();
        let name = state.names.allocate_with_children(
            &mesh.name,
            &kind.name().to_lowercase(),
            naming::material_children(kind),
        );
        let text = self.backend.emit_material(&name, &material, &state.textures);
        state.parts.push(Section::Materials, text);
        state.materials.push((material, name.clone()));
        name
    }
}

#[derive(Default)]
struct AssemblyState {
    names: NameAllocator,
    parts: SceneParts,
    textures: TextureNames,
    materials: Vec<(Material, String)>,
    sidecars: Vec<Sidecar>,
    diagnostics: Diagnostics,
}

/// Render size, sampling and launch options for one backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderSettings {
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
    /// Samples per pixel
    pub spp: u32,
    /// Directory for the scene file; the system temp directory when unset
    pub output_dir: Option<PathBuf>,
    /// Renderer options
    pub renderer: RendererConfig,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self::from_config(&BenchConfig::new(), "")
    }
}

impl RenderSettings {
    /// Settings for `backend_id` taken from the configuration
    pub fn from_config(config: &BenchConfig, backend_id: &str) -> Self {
        Self {
            width: config.defaults.width,
            height: config.defaults.height,
            spp: config.defaults.spp,
            output_dir: config.output_dir.clone(),
            renderer: config.renderer(backend_id).cloned().unwrap_or_default(),
        }
    }

    /// Set the resolution
    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Set samples per pixel
    pub fn with_spp(mut self, spp: u32) -> Self {
        self.spp = spp;
        self
    }

    /// Set the directory scene files are written to
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    /// Globals written into the scene, configured names overriding the
    /// backend's
    pub fn globals(&self, backend: &dyn Backend) -> SceneGlobals {
        let mut globals = SceneGlobals::for_backend(backend, self.width, self.height, self.spp);
        if let Some(sampler) = &self.renderer.sampler {
            globals.sampler.clone_from(sampler);
        }
        if let Some(integrator) = &self.renderer.integrator {
            globals.integrator.clone_from(integrator);
        }
        globals
    }

    /// Command line options
    pub fn launch(&self) -> LaunchSettings {
        LaunchSettings {
            executable: self.renderer.executable.clone(),
            args: self.renderer.args.clone(),
            prefix: self.renderer.prefix.clone(),
            width: self.width,
            height: self.height,
            spp: self.spp,
            output: None,
        }
    }

    fn directory(&self) -> PathBuf {
        self.output_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

/// Files written for one scene
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenScene {
    /// Scene file
    pub scene_path: PathBuf,
    /// Sidecar files, in emission order
    pub sidecar_paths: Vec<PathBuf>,
}

impl WrittenScene {
    /// Delete the scene file and its sidecars
    pub fn remove(&self) {
        for path in std::iter::once(&self.scene_path).chain(&self.sidecar_paths) {
            if let Err(err) = std::fs::remove_file(path) {
                log::warn!("Could not remove {}: {err}", path.display());
            }
        }
    }
}

/// Result of [`render`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOutput {
    /// Scene file, owned by the caller
    pub scene_path: PathBuf,
    /// Sidecar files, owned by the caller
    pub sidecar_paths: Vec<PathBuf>,
    /// Command line that renders the scene
    pub argv: Vec<String>,
    /// Conditions met while assembling
    pub diagnostics: Diagnostics,
}

impl RenderOutput {
    /// Files written for this render
    pub fn files(&self) -> WrittenScene {
        WrittenScene {
            scene_path: self.scene_path.clone(),
            sidecar_paths: self.sidecar_paths.clone(),
        }
    }
}

/// Write an assembled scene to a fresh file in `dir`
///
/// The file is named `render_bench_<random>.<extension>`; the stem token in
/// the text and the sidecars is replaced by its stem and each sidecar goes to
/// `<dir>/<stem><suffix>`. Nothing is left behind on failure.
pub fn write_scene_files(assembled: &AssembledScene, extension: &str, dir: &Path) -> Result<WrittenScene, RenderError> {
    let write_failed = |path: &Path| {
        let path = path.to_path_buf();
        move |source: io::Error| RenderError::WriteFailed { path, source }
    };

    std::fs::create_dir_all(dir).map_err(write_failed(dir))?;
    let mut file = tempfile::Builder::new()
        .prefix(SCENE_FILE_PREFIX)
        .suffix(&format!(".{extension}"))
        .tempfile_in(dir)
        .map_err(write_failed(dir))?;

    let stem = file
        .path()
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut sidecar_paths = Vec::with_capacity(assembled.sidecars.len());
    for sidecar in &assembled.sidecars {
        let path = dir.join(format!("{stem}{}", sidecar.suffix));
        let contents = sidecar.contents.replace(SCENE_STEM_TOKEN, &stem);
        if let Err(source) = std::fs::write(&path, contents) {
            for written in &sidecar_paths {
                let _ = std::fs::remove_file(written);
            }
            return Err(RenderError::WriteFailed { path, source });
        }
        sidecar_paths.push(path);
    }

    let text = assembled.text.replace(SCENE_STEM_TOKEN, &stem);
    let written = file
        .write_all(text.as_bytes())
        .and_then(|()| file.flush())
        .and_then(|()| file.keep().map_err(|err| err.error));
    match written {
        Ok((_, scene_path)) => {
            log::info!("Wrote scene {}", scene_path.display());
            Ok(WrittenScene {
                scene_path,
                sidecar_paths,
            })
        }
        Err(source) => {
            for path in &sidecar_paths {
                let _ = std::fs::remove_file(path);
            }
            Err(RenderError::WriteFailed {
                path: dir.join(format!("{stem}.{extension}")),
                source,
            })
        }
    }
}

/// Assemble `scene` for `backend_id`, write it and build the command line
///
/// Uses the process-wide backend registry and card store.
pub fn render(scene: &Scene, backend_id: &str, settings: &RenderSettings) -> Result<RenderOutput, RenderError> {
    let backend = BackendRegistry::global()
        .get(backend_id)
        .ok_or_else(|| RenderError::UnknownBackend(backend_id.to_string()))?;
    render_on(backend, CardStore::global(), scene, settings)
}

/// [`render`] with an explicit backend and card store
pub fn render_on(
    backend: &dyn Backend,
    cards: &CardStore,
    scene: &Scene,
    settings: &RenderSettings,
) -> Result<RenderOutput, RenderError> {
    let assembled = Assembler::new(backend)
        .with_cards(cards)
        .assemble(scene, &settings.globals(backend));
    let written = write_scene_files(&assembled, backend.extension(), &settings.directory())?;
    let argv = backend.command_line(&written.scene_path, &settings.launch());
    log::info!("{} command: {}", backend.id(), argv.join(" "));

    Ok(RenderOutput {
        scene_path: written.scene_path,
        sidecar_paths: written.sidecar_paths,
        argv,
        diagnostics: assembled.diagnostics,
    })
}
