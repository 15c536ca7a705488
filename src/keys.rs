//! Keyboard command mapping
//!
//! Keystrokes only become commands when they are aimed at the diff view.
//! Anything typed into a text input belongs to that input.

use anyhow::{bail, Result};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use serde::{Deserialize, Serialize};

/// Keys used by built-in commands; hunk keys may not reuse them
const RESERVED: &[char] = &['q', '?', 'j', 'k', 'g', 'G', 's', 'd', 'l', 'o', 'O'];

/// User-configurable hunk navigation keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct KeyBindings {
    pub next: char,
    pub previous: char,
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self {
            next: 'n',
            previous: 'p',
        }
    }
}

impl KeyBindings {
    pub fn validate(&self) -> Result<()> {
        if self.next == self.previous {
            bail!("next and previous hunk keys are both '{}'", self.next);
        }
        for key in [self.next, self.previous] {
            if RESERVED.contains(&key) {
                bail!("'{}' is reserved and cannot be used for hunk navigation", key);
            }
        }
        Ok(())
    }
}

/// What currently has keyboard focus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTarget {
    DiffView,
    TextInput,
}

impl KeyTarget {
    pub fn is_text_input(&self) -> bool {
        matches!(self, Self::TextInput)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    NextHunk,
    PreviousHunk,
    ScrollDown,
    ScrollUp,
    PageDown,
    PageUp,
    Top,
    Bottom,
    ToggleSplit,
    ToggleDiffOnly,
    ToggleLineNumbers,
    OpenOld,
    OpenNew,
    ToggleHelp,
    Quit,
}

/// Map a key press to a command, or `None` if it is not ours to handle
pub fn resolve(key: &KeyEvent, target: KeyTarget, bindings: &KeyBindings) -> Option<Command> {
    if target.is_text_input() {
        return None;
    }
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return match key.code {
            KeyCode::Char('c') => Some(Command::Quit),
            KeyCode::Char('d') => Some(Command::PageDown),
            KeyCode::Char('u') => Some(Command::PageUp),
            _ => None,
        };
    }
    if key.modifiers.contains(KeyModifiers::ALT) {
        return None;
    }

    match key.code {
        KeyCode::Char(c) if c == bindings.next => Some(Command::NextHunk),
        KeyCode::Char(c) if c == bindings.previous => Some(Command::PreviousHunk),
        KeyCode::Char('j') | KeyCode::Down => Some(Command::ScrollDown),
        KeyCode::Char('k') | KeyCode::Up => Some(Command::ScrollUp),
        KeyCode::PageDown | KeyCode::Char(' ') => Some(Command::PageDown),
        KeyCode::PageUp => Some(Command::PageUp),
        KeyCode::Char('g') | KeyCode::Home => Some(Command::Top),
        KeyCode::Char('G') | KeyCode::End => Some(Command::Bottom),
        KeyCode::Char('s') => Some(Command::ToggleSplit),
        KeyCode::Char('d') => Some(Command::ToggleDiffOnly),
        KeyCode::Char('l') => Some(Command::ToggleLineNumbers),
        KeyCode::Char('O') => Some(Command::OpenOld),
        KeyCode::Char('o') => Some(Command::OpenNew),
        KeyCode::Char('?') => Some(Command::ToggleHelp),
        KeyCode::Char('q') | KeyCode::Esc => Some(Command::Quit),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE)
    }

    #[test]
    fn test_default_hunk_keys() {
        let bindings = KeyBindings::default();
        assert_eq!(resolve(&key('n'), KeyTarget::DiffView, &bindings), Some(Command::NextHunk));
        assert_eq!(resolve(&key('p'), KeyTarget::DiffView, &bindings), Some(Command::PreviousHunk));
    }

    #[test]
    fn test_text_input_swallows_everything() {
        let bindings = KeyBindings::default();
        for c in ['n', 'p', 'q', 'j'] {
            assert_eq!(resolve(&key(c), KeyTarget::TextInput, &bindings), None);
        }
    }

    #[test]
    fn test_rebound_keys() {
        let bindings = KeyBindings {
            next: ']',
            previous: '[',
        };
        assert_eq!(resolve(&key(']'), KeyTarget::DiffView, &bindings), Some(Command::NextHunk));
        assert_eq!(resolve(&key('n'), KeyTarget::DiffView, &bindings), None);
    }

    #[test]
    fn test_modified_keys_are_not_hunk_commands() {
        let bindings = KeyBindings::default();
        let ctrl_n = KeyEvent::new(KeyCode::Char('n'), KeyModifiers::CONTROL);
        let alt_n = KeyEvent::new(KeyCode::Char('n'), KeyModifiers::ALT);
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(resolve(&ctrl_n, KeyTarget::DiffView, &bindings), None);
        assert_eq!(resolve(&alt_n, KeyTarget::DiffView, &bindings), None);
        assert_eq!(resolve(&ctrl_c, KeyTarget::DiffView, &bindings), Some(Command::Quit));
    }

    #[test]
    fn test_validate_rejects_clashes() {
        assert!(KeyBindings::default().validate().is_ok());
        assert!(KeyBindings { next: 'x', previous: 'x' }.validate().is_err());
        assert!(KeyBindings { next: 'j', previous: 'p' }.validate().is_err());
    }
}
