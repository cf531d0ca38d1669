// Input handling: key events to intents, with repeat throttling
//
// Paging and sorting each cost a fetch, so held keys are throttled:
// - State-change keys trigger once per press
// - Paging keys repeat, but no faster than the fetch-friendly interval

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// What the user asked for, independent of key bindings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Quit,
    NextTab,
    PrevTab,
    PrevPage,
    NextPage,
    FirstPage,
    LastPage,
    /// Sort by the n-th sortable column (1-based)
    SortColumn(usize),
    StartSearch,
    SearchChar(char),
    SearchBackspace,
    SubmitSearch,
    CancelSearch,
    /// Clear the filter and go back to page 1
    Refresh,
    /// Reload the current tab as-is
    Reload,
    /// Reload every tab
    ReloadAll,
    CloseTab,
    ToggleLogs,
}

/// Map a key to an intent
///
/// While the search line is open every printable key is text.
pub fn map_key(key: &KeyEvent, searching: bool) -> Option<Intent> {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return Some(Intent::Quit);
    }

    if searching {
        return match key.code {
            KeyCode::Enter | KeyCode::Tab => Some(Intent::SubmitSearch),
            KeyCode::Esc => Some(Intent::CancelSearch),
            KeyCode::Backspace => Some(Intent::SearchBackspace),
            KeyCode::Char(c) => Some(Intent::SearchChar(c)),
            _ => None,
        };
    }

    match key.code {
        KeyCode::Char('q') => Some(Intent::Quit),
        KeyCode::Tab => Some(Intent::NextTab),
        KeyCode::BackTab => Some(Intent::PrevTab),
        KeyCode::Left | KeyCode::Char('h') => Some(Intent::PrevPage),
        KeyCode::Right | KeyCode::Char('l') => Some(Intent::NextPage),
        KeyCode::Home => Some(Intent::FirstPage),
        KeyCode::End => Some(Intent::LastPage),
        KeyCode::Char(c @ '1'..='9') => c.to_digit(10).map(|n| Intent::SortColumn(n as usize)),
        KeyCode::Char('/') => Some(Intent::StartSearch),
        KeyCode::Char('r') => Some(Intent::Refresh),
        KeyCode::Char('R') => Some(Intent::Reload),
        KeyCode::Char('a') => Some(Intent::ReloadAll),
        KeyCode::Char('x') => Some(Intent::CloseTab),
        KeyCode::Char('L') => Some(Intent::ToggleLogs),
        _ => None,
    }
}

/// Defines how a key should behave when pressed/held
#[derive(Debug, Clone, Copy)]
pub enum KeyBehavior {
    /// Trigger once per press; repeats within the debounce window are ignored
    StateChange,
    /// Trigger on press, then at most once per `interval` while held
    Throttled { interval: Duration },
}

/// Debounce window for terminals that never report key release
const STATE_CHANGE_DEBOUNCE: Duration = Duration::from_millis(150);

/// Tracks press timing per key
pub struct InputHandler {
    last_triggered: HashMap<KeyCode, Instant>,
    behaviors: HashMap<KeyCode, KeyBehavior>,
}

impl InputHandler {
    pub fn new() -> Self {
        Self {
            last_triggered: HashMap::new(),
            behaviors: HashMap::new(),
        }
    }

    pub fn configure_keys(&mut self, keys: &[KeyCode], behavior: KeyBehavior) {
        for key in keys {
            self.behaviors.insert(*key, behavior);
        }
    }

    /// Whether this event should trigger its action at `now`
    pub fn accept(&mut self, key: &KeyEvent, now: Instant) -> bool {
        match key.kind {
            KeyEventKind::Release => {
                self.last_triggered.remove(&key.code);
                return false;
            }
            KeyEventKind::Press | KeyEventKind::Repeat => {}
        }

        let min_gap = match self.behaviors.get(&key.code) {
            Some(KeyBehavior::Throttled { interval }) => *interval,
            Some(KeyBehavior::StateChange) => STATE_CHANGE_DEBOUNCE,
            None => return true,
        };

        match self.last_triggered.get(&key.code) {
            Some(last) if now.duration_since(*last) < min_gap => false,
            _ => {
                self.last_triggered.insert(key.code, now);
                true
            }
        }
    }
}

impl Default for InputHandler {
    fn default() -> Self {
        let mut handler = Self::new();

        handler.configure_keys(
            &[
                KeyCode::Left,
                KeyCode::Right,
                KeyCode::Char('h'),
                KeyCode::Char('l'),
            ],
            KeyBehavior::Throttled {
                interval: Duration::from_millis(250),
            },
        );

        handler.configure_keys(
            &[
                KeyCode::Home,
                KeyCode::End,
                KeyCode::Char('r'),
                KeyCode::Char('R'),
                KeyCode::Char('a'),
                KeyCode::Char('x'),
                KeyCode::Char('q'),
            ],
            KeyBehavior::StateChange,
        );

        handler
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_map_key_normal_mode() {
        assert_eq!(map_key(&press(KeyCode::Right), false), Some(Intent::NextPage));
        assert_eq!(map_key(&press(KeyCode::Char('3')), false), Some(Intent::SortColumn(3)));
        assert_eq!(map_key(&press(KeyCode::Char('0')), false), None);
        assert_eq!(map_key(&press(KeyCode::Char('/')), false), Some(Intent::StartSearch));
        assert_eq!(map_key(&press(KeyCode::BackTab), false), Some(Intent::PrevTab));
    }

    #[test]
    fn test_map_key_search_mode_takes_text() {
        assert_eq!(map_key(&press(KeyCode::Char('q')), true), Some(Intent::SearchChar('q')));
        assert_eq!(map_key(&press(KeyCode::Tab), true), Some(Intent::SubmitSearch));
        assert_eq!(map_key(&press(KeyCode::Esc), true), Some(Intent::CancelSearch));

        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(map_key(&ctrl_c, true), Some(Intent::Quit));
    }

    #[test]
    fn test_paging_keys_are_throttled() {
        let mut handler = InputHandler::default();
        let start = Instant::now();
        let right = press(KeyCode::Right);

        assert!(handler.accept(&right, start));
        assert!(!handler.accept(&right, start + Duration::from_millis(100)));
        assert!(handler.accept(&right, start + Duration::from_millis(300)));

        // Unconfigured keys always pass
        let slash = press(KeyCode::Char('/'));
        assert!(handler.accept(&slash, start));
        assert!(handler.accept(&slash, start));
    }
}
