//! # Process Launcher
//!
//! Starts the renderer as a child process. Standard output and standard
//! error are drained on reader threads so the child never blocks on a full
//! pipe; only the last [`TAIL_LINES`] lines of each are kept.

use std::collections::{BTreeMap, VecDeque};
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};

use thiserror::Error;

/// Lines kept from each output stream
pub const TAIL_LINES: usize = 50;

/// Process errors
#[derive(Error, Debug)]
pub enum LaunchError {
    /// The command line has no program
    #[error("Empty command line")]
    EmptyCommand,

    /// The program could not be started
    #[error("Failed to start {program}: {source}")]
    SpawnFailed {
        /// Program as given in `argv[0]`
        program: String,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// Waiting on or signalling the child failed
    #[error("Process error: {0}")]
    Io(#[from] io::Error),
}

/// What a finished render left behind
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobOutput {
    /// Exit code; `None` when the child was ended by a signal
    pub exit_code: Option<i32>,
    /// Last lines written to standard output
    pub stdout_tail: Vec<String>,
    /// Last lines written to standard error
    pub stderr_tail: Vec<String>,
}

impl JobOutput {
    /// Whether the renderer exited with code 0
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Handle on a running renderer
#[derive(Debug)]
pub struct RenderJob {
    program: String,
    child: Child,
    stdout: Option<JoinHandle<Vec<String>>>,
    stderr: Option<JoinHandle<Vec<String>>>,
}

/// Start `argv` as a child process
///
/// # Arguments
/// * `argv` - Program followed by its arguments
/// * `env` - Variables added to the inherited environment
/// * `cwd` - Working directory; inherited when `None`
pub fn launch(argv: &[String], env: &BTreeMap<String, String>, cwd: Option<&Path>) -> Result<RenderJob, LaunchError> {
    let (program, args) = argv.split_first().ok_or(LaunchError::EmptyCommand)?;

    let mut command = Command::new(program);
    command
        .args(args)
        .envs(env)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(dir) = cwd {
        command.current_dir(dir);
    }

    let mut child = command.spawn().map_err(|source| LaunchError::SpawnFailed {
        program: program.clone(),
        source,
    })?;
    log::info!("Started {} (pid {})", argv.join(" "), child.id());

    let stdout = child.stdout.take().map(|pipe| spawn_reader(program, "stdout", pipe));
    let stderr = child.stderr.take().map(|pipe| spawn_reader(program, "stderr", pipe));

    Ok(RenderJob {
        program: program.clone(),
        child,
        stdout,
        stderr,
    })
}

impl RenderJob {
    /// Operating system process id
    pub fn id(&self) -> u32 {
        self.child.id()
    }

    /// Exit status if the child has finished, without blocking
    pub fn try_wait(&mut self) -> Result<Option<ExitStatus>, LaunchError> {
        Ok(self.child.try_wait()?)
    }

    /// Block until the child exits and collect its output tails
    pub fn wait(mut self) -> Result<JobOutput, LaunchError> {
        let status = self.child.wait()?;
        let output = JobOutput {
            exit_code: status.code(),
            stdout_tail: join_reader(self.stdout.take()),
            stderr_tail: join_reader(self.stderr.take()),
        };
        match output.exit_code {
            Some(0) => log::info!("{} finished", self.program),
            Some(code) => log::warn!("{} exited with code {code}", self.program),
            None => log::warn!("{} was terminated by a signal", self.program),
        }
        Ok(output)
    }

    /// Kill the child; a child that already exited is left alone
    ///
    /// A child whose status cannot be read is killed anyway.
    pub fn terminate(&mut self) -> Result<(), LaunchError> {
        match self.child.try_wait() {
            Ok(Some(_)) => return Ok(()),
            Ok(None) => {}
            Err(err) => log::debug!("Status of {} unknown ({err}), killing it", self.program),
        }
        log::info!("Terminating {} (pid {})", self.program, self.child.id());
        match self.child.kill() {
            Err(err) if err.kind() != io::ErrorKind::InvalidInput => Err(err.into()),
            _ => Ok(()),
        }
    }
}

fn spawn_reader<R: Read + Send + 'static>(program: &str, stream: &'static str, pipe: R) -> JoinHandle<Vec<String>> {
    let program = program.to_string();
    thread::spawn(move || {
        let mut tail = VecDeque::with_capacity(TAIL_LINES);
        for chunk in BufReader::new(pipe).split(b'\n') {
            let Ok(bytes) = chunk else { break };
            let line = String::from_utf8_lossy(&bytes).trim_end_matches('\r').to_string();
            log::debug!("[{program} {stream}] {line}");
            if tail.len() == TAIL_LINES {
                tail.pop_front();
            }
            tail.push_back(line);
        }
        tail.into()
    })
}

fn join_reader(handle: Option<JoinHandle<Vec<String>>>) -> Vec<String> {
    handle
        .and_then(|h| h.join().map_err(|_| log::warn!("Output reader thread panicked")).ok())
        .unwrap_or_default()
}
