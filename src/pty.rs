//! Pseudoterminal I/O: spawns the child shell, moves bytes in both
//! directions, and reports how the child exited.
//!
//! Grounded in `PtyHandle` (`examples/ivan-brko-panoptes/src/session/pty.rs`):
//! same `portable-pty` plumbing (non-blocking reader via `O_NONBLOCK`,
//! bounded-retry writer for `WouldBlock`), but the key/mouse-to-bytes
//! conversion that lived on that type now belongs to `keytrans`/`emulation`,
//! since this module only ever sees raw bytes. Exit reporting reuses
//! `EngineError::signal_name` instead of keeping a second signal table.

use std::io::{Read, Write};
use std::time::{Duration, Instant};

use portable_pty::{native_pty_system, Child, CommandBuilder, MasterPty, PtySize};

use crate::error::{EngineError, Result};

/// Bracketed-paste wrapper sequences (DECSET 2004).
const PASTE_START: &[u8] = b"\x1b[200~";
const PASTE_END: &[u8] = b"\x1b[201~";

const WRITE_TIMEOUT: Duration = Duration::from_secs(1);
const WRITE_RETRY_DELAY: Duration = Duration::from_millis(1);

/// How the child process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitInfo {
    pub code: i32,
    pub success: bool,
    pub signal: Option<i32>,
}

impl ExitInfo {
    pub fn format_reason(&self) -> String {
        match self.signal {
            Some(sig) => format!(
                "terminated by signal {} ({})",
                sig,
                EngineError::signal_name(sig)
            ),
            None if self.success => "exited normally".to_string(),
            None => format!("exited with status {}", self.code),
        }
    }
}

/// Parameters for launching the child process behind the pty.
pub struct SpawnConfig<'a> {
    pub cmd: &'a str,
    pub args: &'a [String],
    pub working_dir: Option<&'a str>,
    pub env: &'a [(String, String)],
    pub rows: u16,
    pub cols: u16,
}

/// Owns the master side of a pseudoterminal pair and the spawned child.
pub struct Pty {
    master: Box<dyn MasterPty + Send>,
    child: Box<dyn Child + Send + Sync>,
    writer: Box<dyn Write + Send>,
    reader: Box<dyn Read + Send>,
}

impl Pty {
    /// Allocate a pty and exec `config.cmd` behind it.
    pub fn spawn(config: SpawnConfig) -> Result<Self> {
        let pty_system = native_pty_system();
        let pair = pty_system
            .openpty(PtySize {
                rows: config.rows,
                cols: config.cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| EngineError::PtyOpenFailure(to_io_error(e)))?;

        let mut builder = CommandBuilder::new(config.cmd);
        builder.args(config.args);
        if let Some(dir) = config.working_dir {
            builder.cwd(dir);
        }
        for (key, value) in config.env {
            builder.env(key, value);
        }

        let child = pair
            .slave
            .spawn_command(builder)
            .map_err(|e| EngineError::PtySpawnFailure(to_io_error(e)))?;
        drop(pair.slave);

        let writer = pair
            .master
            .take_writer()
            .map_err(|e| EngineError::PtyOpenFailure(to_io_error(e)))?;
        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| EngineError::PtyOpenFailure(to_io_error(e)))?;

        #[cfg(unix)]
        if let Some(fd) = pair.master.as_raw_fd() {
            unsafe {
                let flags = libc::fcntl(fd, libc::F_GETFL);
                if flags != -1 {
                    libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK);
                }
            }
        }

        Ok(Pty {
            master: pair.master,
            child,
            writer,
            reader,
        })
    }

    fn write_all_with_retry(&mut self, data: &[u8]) -> Result<()> {
        let start = Instant::now();
        let mut written = 0;
        while written < data.len() {
            if start.elapsed() > WRITE_TIMEOUT {
                return Err(EngineError::PtyIoFailure(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    format!(
                        "pty write timed out after {} of {} bytes",
                        written,
                        data.len()
                    ),
                )));
            }

            match self.writer.write(&data[written..]) {
                Ok(0) => {
                    return Err(EngineError::PtyIoFailure(std::io::Error::new(
                        std::io::ErrorKind::WriteZero,
                        "pty write returned 0 bytes",
                    )))
                }
                Ok(n) => written += n,
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    std::thread::sleep(WRITE_RETRY_DELAY);
                }
                Err(e) => return Err(EngineError::PtyIoFailure(e)),
            }
        }
        Ok(())
    }

    /// Write raw bytes (already translated by `KeyTranslator`/`Emulation`).
    pub fn write(&mut self, data: &[u8]) -> Result<()> {
        self.write_all_with_retry(data)?;
        self.writer
            .flush()
            .map_err(EngineError::PtyIoFailure)?;
        Ok(())
    }

    /// Write pasted text wrapped in bracketed-paste markers.
    pub fn write_paste(&mut self, text: &str) -> Result<()> {
        self.write_all_with_retry(PASTE_START)?;
        self.write_all_with_retry(text.as_bytes())?;
        self.write_all_with_retry(PASTE_END)?;
        self.writer
            .flush()
            .map_err(EngineError::PtyIoFailure)?;
        Ok(())
    }

    /// Non-blocking read. `Ok(None)` means no data is available right now
    /// (not EOF — callers use `exit_status` to learn the child has died).
    pub fn try_read(&mut self) -> Result<Option<Vec<u8>>> {
        let mut buf = [0u8; 4096];
        match self.reader.read(&mut buf) {
            Ok(0) => Ok(None),
            Ok(n) => Ok(Some(buf[..n].to_vec())),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(EngineError::PtyIoFailure(e)),
        }
    }

    pub fn resize(&self, rows: u16, cols: u16) -> Result<()> {
        self.master
            .resize(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| EngineError::PtyIoFailure(to_io_error(e)))
    }

    pub fn is_alive(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// `None` while the child is still running.
    pub fn exit_status(&mut self) -> Option<ExitInfo> {
        match self.child.try_wait() {
            Ok(None) => None,
            Ok(Some(status)) => {
                let code = status.exit_code() as i32;
                let success = status.success();

                #[cfg(unix)]
                let signal = if !success && code > 128 && code <= 128 + 64 {
                    Some(code - 128)
                } else {
                    None
                };
                #[cfg(not(unix))]
                let signal = None;

                Some(ExitInfo {
                    code,
                    success,
                    signal,
                })
            }
            Err(_) => Some(ExitInfo {
                code: 255,
                success: false,
                signal: None,
            }),
        }
    }

    pub fn kill(&mut self) -> Result<()> {
        self.child
            .kill()
            .map_err(|e| EngineError::PtyIoFailure(e))
    }
}

fn to_io_error(e: anyhow::Error) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spawn(cmd: &str, args: &[String]) -> Pty {
        Pty::spawn(SpawnConfig {
            cmd,
            args,
            working_dir: None,
            env: &[],
            rows: 24,
            cols: 80,
        })
        .expect("spawn")
    }

    #[test]
    fn echo_produces_output_and_clean_exit() {
        let mut pty = spawn("/bin/echo", &["hello".to_string()]);
        let mut collected = Vec::new();
        let deadline = Instant::now() + Duration::from_secs(2);
        loop {
            if let Some(data) = pty.try_read().unwrap() {
                collected.extend_from_slice(&data);
            }
            if let Some(exit) = pty.exit_status() {
                assert!(exit.success);
                break;
            }
            if Instant::now() > deadline {
                panic!("child never exited");
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        assert!(String::from_utf8_lossy(&collected).contains("hello"));
    }

    #[test]
    fn write_reaches_cat_stdin() {
        let mut pty = spawn("/bin/cat", &[]);
        pty.write(b"ping\n").unwrap();
        let mut collected = Vec::new();
        let deadline = Instant::now() + Duration::from_secs(2);
        while !collected
            .windows(4)
            .any(|w| w == b"ping")
        {
            if let Some(data) = pty.try_read().unwrap() {
                collected.extend_from_slice(&data);
            }
            if Instant::now() > deadline {
                panic!("never saw echoed input");
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        pty.kill().ok();
    }

    #[test]
    fn resize_does_not_error() {
        let pty = spawn("/bin/cat", &[]);
        pty.resize(40, 120).unwrap();
    }

    #[test]
    fn kill_marks_child_dead() {
        let mut pty = spawn("/bin/sleep", &["5".to_string()]);
        assert!(pty.is_alive());
        pty.kill().unwrap();
        let deadline = Instant::now() + Duration::from_secs(2);
        loop {
            if pty.exit_status().is_some() {
                break;
            }
            if Instant::now() > deadline {
                panic!("child never reaped after kill");
            }
            std::thread::sleep(Duration::from_millis(10));
        }
    }
}
