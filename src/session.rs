//! Terminal session lifetime
//!
//! Raw mode and the alternate screen are acquired together with exclusive
//! ownership of keyboard input and released when the session is dropped, so
//! a panic or early return never leaves the terminal in raw mode.

use anyhow::{bail, Context, Result};
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use log::{debug, warn};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io::{self, Stdout};
use std::sync::atomic::{AtomicBool, Ordering};

static KEYBOARD_OWNED: AtomicBool = AtomicBool::new(false);

/// Exclusive ownership of global keyboard input
#[derive(Debug)]
pub struct KeyboardClaim {
    _private: (),
}

impl KeyboardClaim {
    pub fn acquire() -> Result<Self> {
        if KEYBOARD_OWNED.swap(true, Ordering::SeqCst) {
            bail!("Keyboard input is already owned by another viewer");
        }
        debug!("keyboard claimed");
        Ok(Self { _private: () })
    }
}

impl Drop for KeyboardClaim {
    fn drop(&mut self) {
        KEYBOARD_OWNED.store(false, Ordering::SeqCst);
        debug!("keyboard released");
    }
}

pub struct TerminalSession {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    _claim: KeyboardClaim,
}

impl TerminalSession {
    pub fn start() -> Result<Self> {
        let claim = KeyboardClaim::acquire()?;

        enable_raw_mode().context("Failed to enable raw mode")?;
        let mut stdout = io::stdout();
        if let Err(err) = execute!(stdout, EnterAlternateScreen) {
            let _ = disable_raw_mode();
            return Err(err).context("Failed to enter alternate screen");
        }
        let terminal = Terminal::new(CrosstermBackend::new(stdout))?;

        Ok(Self {
            terminal,
            _claim: claim,
        })
    }

    pub fn terminal(&mut self) -> &mut Terminal<CrosstermBackend<Stdout>> {
        &mut self.terminal
    }
}

impl Drop for TerminalSession {
    fn drop(&mut self) {
        if let Err(err) = disable_raw_mode() {
            warn!("failed to disable raw mode: {}", err);
        }
        if let Err(err) = execute!(self.terminal.backend_mut(), LeaveAlternateScreen) {
            warn!("failed to leave alternate screen: {}", err);
        }
        let _ = self.terminal.show_cursor();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claim_is_exclusive_and_released_on_drop() {
        let claim = KeyboardClaim::acquire().unwrap();
        assert!(KeyboardClaim::acquire().is_err());
        drop(claim);

        let again = KeyboardClaim::acquire();
        assert!(again.is_ok());
    }
}
