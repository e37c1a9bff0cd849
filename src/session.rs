//! Wires one `Pty` to one `Emulation` behind a `BulkScheduler`, forming a
//! single terminal session.
//!
//! Grounded in `Session`/`SessionState` (`examples/ivan-brko-panoptes/src/
//! session/mod.rs`) for the overall shape (a profile applied once at
//! construction, a `poll`-driven read loop, an exit state the caller can
//! observe), but rebuilt around this crate's own `Emulation`/`Pty` rather
//! than a `vt100::Parser`/serde-backed `SessionInfo`. `Profile` mirrors
//! `claude-wrapper`'s `WrapperConfig`: a plain struct built up by the
//! caller, never deserialized here.

use std::path::PathBuf;

use tracing::warn;

use crate::emulation::Emulation;
use crate::error::Result;
use crate::pty::{ExitInfo, Pty, SpawnConfig};
use crate::scheduler::{BulkScheduler, Snapshot};

/// The subset of profile data a `Session` consumes at `run()` time. Font
/// and color-scheme selection and on-disk persistence live outside this
/// crate; callers construct a `Profile` programmatically.
#[derive(Debug, Clone)]
pub struct Profile {
    pub term_env: String,
    pub scrollback_lines: usize,
    pub working_dir: Option<PathBuf>,
    pub env: Vec<(String, String)>,
    pub login_shell: bool,
}

impl Default for Profile {
    fn default() -> Self {
        Profile {
            term_env: "xterm-256color".to_string(),
            scrollback_lines: 10_000,
            working_dir: None,
            env: Vec::new(),
            login_shell: true,
        }
    }
}

/// Why a session is no longer running.
#[derive(Debug, Clone)]
pub struct SessionExit {
    pub info: ExitInfo,
}

/// One (Pty, Emulation) pair, coalesced through a `BulkScheduler`.
///
/// Single-threaded cooperative model: `poll()` is the one suspension point
/// a caller loops on, driven by readiness on the Pty's master fd or a
/// periodic timer (the caller owns that event loop; this type just reacts
/// to being polled).
pub struct Session {
    pty: Pty,
    emulation: Emulation,
    scheduler: BulkScheduler,
    connected: bool,
    exit: Option<SessionExit>,
}

impl Session {
    /// Spawn `shell` behind a fresh pty and apply `profile` before the
    /// first `poll()`.
    pub fn spawn(shell: &str, args: &[String], rows: u16, cols: u16, profile: Profile) -> Result<Self> {
        let mut env = profile.env.clone();
        env.push(("TERM".to_string(), profile.term_env.clone()));

        let mut full_args: Vec<String> = Vec::new();
        if profile.login_shell {
            full_args.push("-l".to_string());
        }
        full_args.extend_from_slice(args);
        let working_dir = profile.working_dir.as_deref().and_then(|p| p.to_str());

        let pty = Pty::spawn(SpawnConfig {
            cmd: shell,
            args: &full_args,
            working_dir,
            env: &env,
            rows,
            cols,
        })?;

        let scrollback = if profile.scrollback_lines == 0 {
            Some(0)
        } else {
            Some(profile.scrollback_lines)
        };
        let emulation = Emulation::new(rows as usize, cols as usize, scrollback);

        Ok(Session {
            pty,
            emulation,
            scheduler: BulkScheduler::new(),
            connected: true,
            exit: None,
        })
    }

    /// Stop producing snapshots without stopping the underlying pty/
    /// emulation — bytes still flow and mutate the screens, but `poll`
    /// returns no `Snapshot` until reconnected.
    pub fn set_connect(&mut self, connected: bool) {
        self.connected = connected;
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn exit_reason(&self) -> Option<&SessionExit> {
        self.exit.as_ref()
    }

    /// Translate a key event and forward it to the child.
    pub fn send_key(
        &mut self,
        key: crate::keytrans::KeyCode,
        modifiers: crate::keytrans::Modifiers,
    ) -> Result<()> {
        let bytes = self.emulation.send_key(key, modifiers);
        if !bytes.is_empty() {
            self.pty.write(&bytes)?;
        }
        Ok(())
    }

    /// Forward pasted text, bracketed per the emulation's paste mode.
    pub fn send_paste(&mut self, text: &str) -> Result<()> {
        self.pty.write_paste(text)
    }

    /// Forward literal text unchanged, bypassing the keyboard translator.
    /// This is the path an ordinary typed character takes: the translator's
    /// table only ever carries rules for named keys (arrows, function keys,
    /// ...), never `Char(_)`.
    pub fn send_string(&mut self, s: &str) -> Result<()> {
        let bytes = self.emulation.send_string(s);
        if !bytes.is_empty() {
            self.pty.write(&bytes)?;
        }
        Ok(())
    }

    /// Forward a mouse action if the emulation has mouse reporting enabled.
    pub fn send_mouse(
        &mut self,
        action: crate::emulation::MouseAction,
        x: usize,
        y: usize,
    ) -> Result<()> {
        if let Some(bytes) = self.emulation.send_mouse(action, x, y) {
            self.pty.write(&bytes)?;
        }
        Ok(())
    }

    pub fn resize(&mut self, rows: u16, cols: u16) -> Result<()> {
        self.pty.resize(rows, cols)?;
        self.emulation.on_image_size_change(rows as usize, cols as usize);
        Ok(())
    }

    /// One iteration of the session's read loop: drain whatever the pty has
    /// buffered, feed it to the emulation, and hand back a snapshot if the
    /// scheduler decides one is due. Returns `None` once the session has
    /// exited and every buffered byte has been drained.
    pub fn poll(&mut self) -> Option<Snapshot> {
        if self.exit.is_none() {
            loop {
                match self.pty.try_read() {
                    Ok(Some(block)) if !block.is_empty() => {
                        self.scheduler.record_block(&block);
                        let replies = self.emulation.on_receive_block(&block);
                        if !replies.is_empty() {
                            if let Err(e) = self.pty.write(&replies) {
                                warn!("failed to write terminal reply: {e}");
                            }
                        }
                    }
                    Ok(_) => break,
                    Err(e) => {
                        warn!("pty read failed: {e}");
                        break;
                    }
                }
            }
            if let Some(info) = self.pty.exit_status() {
                self.exit = Some(SessionExit { info });
            }
        }

        if !self.connected {
            return None;
        }
        self.scheduler.poll(&self.emulation)
    }

    pub fn emulation(&self) -> &Emulation {
        &self.emulation
    }

    /// Tear the session down. The intended sequence is SIGHUP, a brief
    /// wait, then SIGKILL on timeout; `portable-pty`'s `Child` trait only
    /// exposes `kill`, not a choice of signal, so the escalation collapses
    /// to a single kill call here.
    pub fn shutdown(&mut self) -> Result<()> {
        if self.pty.is_alive() {
            self.pty.kill()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    #[test]
    fn spawned_shell_produces_a_snapshot() {
        let mut session = Session::spawn(
            "/bin/sh",
            &["-c".to_string(), "echo hi; sleep 5".to_string()],
            24,
            80,
            Profile {
                login_shell: false,
                ..Profile::default()
            },
        )
        .expect("spawn");

        let deadline = Instant::now() + Duration::from_secs(2);
        let mut saw_snapshot = false;
        while Instant::now() < deadline {
            if let Some(snap) = session.poll() {
                saw_snapshot = true;
                assert_eq!(snap.cells.len(), 24 * 80);
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        assert!(saw_snapshot, "expected at least one snapshot");
        session.shutdown().ok();
    }

    #[test]
    fn disconnected_session_still_drains_but_yields_no_snapshot() {
        let mut session = Session::spawn(
            "/bin/echo",
            &["quiet".to_string()],
            24,
            80,
            Profile {
                login_shell: false,
                ..Profile::default()
            },
        )
        .expect("spawn");
        session.set_connect(false);

        let deadline = Instant::now() + Duration::from_secs(2);
        while session.exit_reason().is_none() && Instant::now() < deadline {
            assert!(session.poll().is_none());
            std::thread::sleep(Duration::from_millis(10));
        }
        assert!(session.exit_reason().is_some());
    }

    #[test]
    fn send_string_reaches_cat_unmodified() {
        let mut session = Session::spawn(
            "/bin/cat",
            &[],
            24,
            80,
            Profile {
                login_shell: false,
                ..Profile::default()
            },
        )
        .expect("spawn");
        session.send_string("hi").expect("send_string");

        let deadline = Instant::now() + Duration::from_secs(2);
        let mut saw_it = false;
        while Instant::now() < deadline {
            if let Some(snap) = session.poll() {
                let text: String = snap.cells.iter().map(|c| c.character).collect();
                if text.contains("hi") {
                    saw_it = true;
                    break;
                }
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        assert!(saw_it, "expected cat to echo back the sent string");
        session.shutdown().ok();
    }

    #[test]
    fn zero_scrollback_disables_history() {
        let session = Session::spawn(
            "/bin/true",
            &[],
            10,
            10,
            Profile {
                login_shell: false,
                scrollback_lines: 0,
                ..Profile::default()
            },
        )
        .expect("spawn");
        assert_eq!(session.emulation().rows(), 10);
    }
}
