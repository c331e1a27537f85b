//! Workbench: configuration, cards and backends behind one handle

use std::sync::atomic::{AtomicBool, Ordering};
use std::process::ExitStatus;
use std::sync::Arc;
use std::time::Duration;

use crate::assets::CardStore;
use crate::backends::{Backend, BackendRegistry};
use crate::core::config::BenchConfig;
use crate::launcher::{self, JobOutput, LaunchError, RenderJob};
use crate::scene::{
    render_on, AssembledScene, Assembler, RenderError, RenderOutput, RenderSettings, Scene,
};

/// How often a running renderer is checked for exit or cancellation
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Shared cancellation flag
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    /// Token that is not cancelled
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// A render that was launched and has finished
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinishedRender {
    /// Files and command line
    pub output: RenderOutput,
    /// Exit code and output tails
    pub job: JobOutput,
    /// Whether the renderer was terminated on request
    pub cancelled: bool,
}

/// # Workbench
///
/// Owns the configuration, a card store over the configured search paths and
/// a backend registry. Every render goes through here.
///
/// ```rust,no_run
/// use render_bench::prelude::*;
///
/// let workbench = Workbench::new(BenchConfig::new().with_spp(64));
/// let scene = Scene::new();
/// let output = workbench.render(&scene, "luxcore")?;
/// println!("{}", output.argv.join(" "));
/// # Ok::<(), RenderError>(())
/// ```
#[derive(Debug)]
pub struct Workbench {
    config: BenchConfig,
    cards: CardStore,
    registry: BackendRegistry,
}

impl Workbench {
    /// Create a workbench with the built-in backends
    pub fn new(config: BenchConfig) -> Self {
        log::debug!("Card search paths: {:?}", config.card_paths);
        Self {
            cards: CardStore::new(config.card_paths.iter().cloned()),
            registry: BackendRegistry::with_builtins(),
            config,
        }
    }

    /// Active configuration
    pub const fn config(&self) -> &BenchConfig {
        &self.config
    }

    /// Card store over the configured search paths
    pub const fn cards(&self) -> &CardStore {
        &self.cards
    }

    /// Registered backends
    pub const fn registry(&self) -> &BackendRegistry {
        &self.registry
    }

    /// Add a backend, replacing any with the same identifier
    pub fn register_backend(&mut self, backend: Box<dyn Backend>) {
        self.registry.register(backend);
    }

    /// Render settings for a backend, from the configuration
    pub fn settings(&self, backend_id: &str) -> RenderSettings {
        RenderSettings::from_config(&self.config, backend_id)
    }

    fn backend(&self, backend_id: &str) -> Result<&dyn Backend, RenderError> {
        self.registry
            .get(backend_id)
            .ok_or_else(|| RenderError::UnknownBackend(backend_id.to_string()))
    }

    /// Scene text for a backend, without writing anything
    pub fn assemble(&self, scene: &Scene, backend_id: &str) -> Result<AssembledScene, RenderError> {
        let backend = self.backend(backend_id)?;
        let globals = self.settings(backend_id).globals(backend);
        Ok(Assembler::new(backend).with_cards(&self.cards).assemble(scene, &globals))
    }

    /// Write the scene for a backend and build its command line
    pub fn render(&self, scene: &Scene, backend_id: &str) -> Result<RenderOutput, RenderError> {
        self.render_with(scene, backend_id, &self.settings(backend_id))
    }

    /// [`render`](Self::render) with explicit settings
    pub fn render_with(
        &self,
        scene: &Scene,
        backend_id: &str,
        settings: &RenderSettings,
    ) -> Result<RenderOutput, RenderError> {
        render_on(self.backend(backend_id)?, &self.cards, scene, settings)
    }

    /// Start the renderer on a written scene, in the scene's directory
    pub fn launch(&self, output: &RenderOutput, backend_id: &str) -> Result<RenderJob, RenderError> {
        let renderer = self.settings(backend_id).renderer;
        let job = launcher::launch(&output.argv, &renderer.env, output.scene_path.parent())?;
        Ok(job)
    }

    /// Render, launch and wait for the renderer
    ///
    /// Cancelling before the renderer starts removes the written files and
    /// returns [`RenderError::Cancelled`]. Cancelling while it runs
    /// terminates it; the files are kept for inspection.
    pub fn render_and_launch(
        &self,
        scene: &Scene,
        backend_id: &str,
        cancel: &CancelToken,
    ) -> Result<FinishedRender, RenderError> {
        let output = self.render(scene, backend_id)?;
        if cancel.is_cancelled() {
            log::info!("Render cancelled before launch, removing scene files");
            output.files().remove();
            return Err(RenderError::Cancelled);
        }

        let mut job = self.launch(&output, backend_id)?;
        let cancelled = supervise(&mut job, cancel)?;
        let job = job.wait()?;
        Ok(FinishedRender {
            output,
            job,
            cancelled,
        })
    }
}

/// A running process that can be polled and killed
trait Supervised {
    fn try_wait(&mut self) -> Result<Option<ExitStatus>, LaunchError>;
    fn terminate(&mut self) -> Result<(), LaunchError>;
}

impl Supervised for RenderJob {
    fn try_wait(&mut self) -> Result<Option<ExitStatus>, LaunchError> {
        Self::try_wait(self)
    }

    fn terminate(&mut self) -> Result<(), LaunchError> {
        Self::terminate(self)
    }
}

/// Poll `job` until it exits or `cancel` is set, returning whether it was
/// terminated on request
///
/// A job that can no longer be polled is terminated before the error is
/// returned.
fn supervise(job: &mut impl Supervised, cancel: &CancelToken) -> Result<bool, RenderError> {
    loop {
        match job.try_wait() {
            Ok(Some(_)) => return Ok(false),
            Ok(None) => {}
            Err(err) => {
                log::warn!("Lost track of the renderer ({err}), terminating it");
                if let Err(kill) = job.terminate() {
                    log::warn!("Failed to terminate the renderer: {kill}");
                }
                return Err(err.into());
            }
        }
        if cancel.is_cancelled() {
            job.terminate()?;
            return Ok(true);
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

impl Default for Workbench {
    fn default() -> Self {
        Self::new(BenchConfig::new())
    }
}
