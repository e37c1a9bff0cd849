//! Error taxonomy for the engine.
//!
//! Most protocol-level faults (malformed sequences, parameter overflow,
//! bad keybinding-file lines) are policy "log and continue" per the design
//! notes and never surface as a `Result` — they are reported through
//! `tracing::warn!` at the point of detection and the caller keeps running.
//! Only faults that a `Session` must react to (storage, PTY, resize) are
//! modeled here.

use std::io;

/// Errors a `Session` and its collaborators can report upward.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The history ring's backing store failed; history is disabled rather
    /// than the session crashing.
    #[error("history storage failure: {0}")]
    StorageFailure(#[source] io::Error),

    /// No pseudoterminal pair could be allocated.
    #[error("failed to open a pseudoterminal: {0}")]
    PtyOpenFailure(#[source] io::Error),

    /// The child process could not be exec'd.
    #[error("failed to spawn child process: {0}")]
    PtySpawnFailure(#[source] io::Error),

    /// A read or write on the PTY master failed.
    #[error("pty i/o failure: {0}")]
    PtyIoFailure(#[source] io::Error),
}

impl EngineError {
    /// Resolve a raw signal number into a human-readable name, following
    /// the mapping Konsole's PTY wrapper uses for its exit report.
    pub fn signal_name(signal: i32) -> &'static str {
        match signal {
            1 => "SIGHUP",
            2 => "SIGINT",
            3 => "SIGQUIT",
            4 => "SIGILL",
            6 => "SIGABRT",
            8 => "SIGFPE",
            9 => "SIGKILL",
            11 => "SIGSEGV",
            13 => "SIGPIPE",
            14 => "SIGALRM",
            15 => "SIGTERM",
            _ => "UNKNOWN",
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
