//! Thin demo binary: runs the caller's login shell through `vtengine` and
//! renders its screen with `ratatui`, standing in for "the renderer
//! (external)" the library itself never talks to directly.
//!
//! Terminal setup/teardown mirrors the `Tui` wrapper
//! (`examples/ivan-brko-panoptes/src/tui/mod.rs`): enable raw mode and the
//! alternate screen on the way in, always restore them on the way out even
//! if the event loop returns early.

use std::io::stdout;
use std::time::Duration;

use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode as CtKeyCode, KeyEventKind, KeyModifiers as CtKeyModifiers},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::prelude::*;
use ratatui::widgets::Paragraph;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vtengine::keytrans::{KeyCode, Modifiers};
use vtengine::scheduler::Snapshot;
use vtengine::session::{Profile, Session};

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vtdemo=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let result = run();
    stdout().execute(LeaveAlternateScreen).ok();
    disable_raw_mode().ok();
    result
}

fn run() -> Result<()> {
    let backend = CrosstermBackend::new(stdout());
    let mut terminal = Terminal::new(backend)?;
    let size = terminal.size()?;
    let (rows, cols) = (size.height, size.width);

    let shell = std::env::var("SHELL").unwrap_or_else(|_| "/bin/sh".to_string());
    let mut session = Session::spawn(&shell, &[], rows, cols, Profile::default())?;

    let mut last_snapshot: Option<Snapshot> = None;
    loop {
        if let Some(snapshot) = session.poll() {
            last_snapshot = Some(snapshot);
        }
        if let Some(exit) = session.exit_reason() {
            tracing::info!("shell exited: {}", exit.info.format_reason());
            break;
        }

        if let Some(snapshot) = &last_snapshot {
            terminal.draw(|frame| draw(frame, snapshot))?;
        }

        if event::poll(Duration::from_millis(16))? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    if key.code == CtKeyCode::Char('c') && key.modifiers.contains(CtKeyModifiers::ALT) {
                        break;
                    }
                    let plain_or_shifted = key.modifiers.is_empty() || key.modifiers == CtKeyModifiers::SHIFT;
                    if let (CtKeyCode::Char(c), true) = (key.code, plain_or_shifted) {
                        // Ordinary typed text never goes through the keyboard
                        // translator: its table only carries rules for named
                        // keys, not individual characters.
                        session.send_string(&c.to_string())?;
                    } else if let Some((code, modifiers)) = translate_key(key.code, key.modifiers) {
                        session.send_key(code, modifiers)?;
                    }
                }
                Event::Resize(new_cols, new_rows) => {
                    session.resize(new_rows, new_cols)?;
                }
                _ => {}
            }
        }
    }

    Ok(())
}

fn draw(frame: &mut Frame, snapshot: &Snapshot) {
    let area = frame.size();
    let mut text = String::with_capacity(snapshot.cells.len() + snapshot.rows);
    for row in 0..snapshot.rows {
        for col in 0..snapshot.cols {
            text.push(snapshot.cells[row * snapshot.cols + col].character);
        }
        text.push('\n');
    }
    frame.render_widget(Paragraph::new(text), area);
}

fn translate_key(code: CtKeyCode, mods: CtKeyModifiers) -> Option<(KeyCode, Modifiers)> {
    let mut modifiers = Modifiers::EMPTY;
    if mods.contains(CtKeyModifiers::SHIFT) {
        modifiers.insert(Modifiers::SHIFT);
    }
    if mods.contains(CtKeyModifiers::ALT) {
        modifiers.insert(Modifiers::ALT);
    }
    if mods.contains(CtKeyModifiers::CONTROL) {
        modifiers.insert(Modifiers::CTRL);
    }

    let key = match code {
        CtKeyCode::Up => KeyCode::Up,
        CtKeyCode::Down => KeyCode::Down,
        CtKeyCode::Left => KeyCode::Left,
        CtKeyCode::Right => KeyCode::Right,
        CtKeyCode::Home => KeyCode::Home,
        CtKeyCode::End => KeyCode::End,
        CtKeyCode::PageUp => KeyCode::PageUp,
        CtKeyCode::PageDown => KeyCode::PageDown,
        CtKeyCode::Insert => KeyCode::Insert,
        CtKeyCode::Delete => KeyCode::Delete,
        CtKeyCode::Backspace => KeyCode::Backspace,
        CtKeyCode::Tab => KeyCode::Tab,
        CtKeyCode::Enter => KeyCode::Enter,
        CtKeyCode::Esc => KeyCode::Escape,
        CtKeyCode::F(n) => KeyCode::Function(n),
        CtKeyCode::Char(c) => KeyCode::Char(c),
        _ => return None,
    };
    Some((key, modifiers))
}
