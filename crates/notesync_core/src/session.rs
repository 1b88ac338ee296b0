//! External editor process supervision.
//!
//! # Responsibility
//! - Spawn the configured editor against one file.
//! - Offer a bounded wait used as the sync loop's only suspension point.
//! - Offer a blocking edit for single-file flows (merge, create, view).
//!
//! # Invariants
//! - The editor receives the target path as its last argument.
//! - `poll` never blocks longer than the given timeout.

use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus};
use std::time::Duration;
use wait_timeout::ChildExt;

pub type SessionResult<T> = Result<T, SessionError>;

/// Editor process failure.
#[derive(Debug)]
pub enum SessionError {
    Spawn { program: String, source: io::Error },
    Wait { program: String, source: io::Error },
    EmptyCommand,
}

impl Display for SessionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Spawn { program, source } => {
                write!(f, "failed to launch editor `{program}`: {source}")
            }
            Self::Wait { program, source } => {
                write!(f, "failed waiting for editor `{program}`: {source}")
            }
            Self::EmptyCommand => write!(f, "editor command is empty"),
        }
    }
}

impl Error for SessionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Spawn { source, .. } | Self::Wait { source, .. } => Some(source),
            Self::EmptyCommand => None,
        }
    }
}

/// Result of one bounded wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollStatus {
    Running,
    Finished(ExitStatus),
}

/// Something that can open a file for interactive editing.
pub trait Editor {
    /// Edits `path` and returns once the user is done.
    fn edit_blocking(&self, path: &Path) -> SessionResult<()>;
}

/// Editor backed by an external program such as `vim` or `code --wait`.
#[derive(Debug, Clone)]
pub struct ExternalEditor {
    argv: Vec<String>,
}

impl ExternalEditor {
    pub fn new(argv: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            argv: argv.into_iter().map(Into::into).collect(),
        }
    }

    /// Starts editing `path` without waiting.
    pub fn start(&self, path: &Path) -> SessionResult<EditSession> {
        let (program, args) = self.argv.split_first().ok_or(SessionError::EmptyCommand)?;
        let child = Command::new(program)
            .args(args)
            .arg(path)
            .spawn()
            .map_err(|source| SessionError::Spawn {
                program: program.clone(),
                source,
            })?;

        info!(
            "event=editor_start module=session status=ok program={} pid={} path={}",
            program,
            child.id(),
            path.display()
        );
        Ok(EditSession {
            program: program.clone(),
            path: path.to_path_buf(),
            child,
            exit: None,
        })
    }
}

impl Editor for ExternalEditor {
    fn edit_blocking(&self, path: &Path) -> SessionResult<()> {
        let mut session = self.start(path)?;
        let status = session.wait()?;
        if !status.success() {
            warn!(
                "event=editor_exit module=session status=error path={} code={:?}",
                path.display(),
                status.code()
            );
        }
        Ok(())
    }
}

/// Handle to one running editor process.
#[derive(Debug)]
pub struct EditSession {
    program: String,
    path: PathBuf,
    child: Child,
    exit: Option<ExitStatus>,
}

impl EditSession {
    /// File the editor was opened on.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Waits up to `timeout` for the editor to exit.
    pub fn poll(&mut self, timeout: Duration) -> SessionResult<PollStatus> {
        if let Some(status) = self.exit {
            return Ok(PollStatus::Finished(status));
        }
        let waited = self
            .child
            .wait_timeout(timeout)
            .map_err(|source| self.wait_error(source))?;
        Ok(match waited {
            Some(status) => {
                self.exit = Some(status);
                PollStatus::Finished(status)
            }
            None => PollStatus::Running,
        })
    }

    /// Waits without a bound for the editor to exit.
    pub fn wait(&mut self) -> SessionResult<ExitStatus> {
        if let Some(status) = self.exit {
            return Ok(status);
        }
        let status = self.child.wait().map_err(|source| self.wait_error(source))?;
        self.exit = Some(status);
        Ok(status)
    }

    /// Returns whether a previous wait observed the editor exiting.
    pub fn is_finished(&self) -> bool {
        self.exit.is_some()
    }

    fn wait_error(&self, source: io::Error) -> SessionError {
        SessionError::Wait {
            program: self.program.clone(),
            source,
        }
    }
}
