//! vtengine - a VT100/VT102/xterm-compatible terminal emulation engine.
//!
//! Screen buffer, scrollback history, control-sequence parser, keyboard
//! translator, PTY I/O, and a bulk-update scheduler, composed by `Session`
//! into one runnable terminal. Grounded in Konsole's emulation core but
//! rebuilt from scratch against this crate's own data model rather than
//! wrapping the `vt100` crate.

pub mod cell;
pub mod charset;
pub mod emulation;
pub mod error;
pub mod history;
pub mod keytrans;
pub mod parser;
pub mod pty;
pub mod screen;
pub mod scheduler;
pub mod session;

pub use cell::{Cell, Color, Pen, Rendition};
pub use emulation::{Emulation, MouseAction, MouseButton, TitleKind};
pub use error::{EngineError, Result};
pub use keytrans::{Command, KeyCode, KeyTranslator, Modifiers, Output, StateFlags};
pub use parser::Encoding;
pub use pty::{ExitInfo, Pty, SpawnConfig};
pub use scheduler::{BulkScheduler, Snapshot};
pub use screen::Screen;
pub use session::{Profile, Session, SessionExit};
