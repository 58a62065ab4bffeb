#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Escape,
    Enter,
    Space,
    Char(char),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    /// Stop the session, optionally counting it as completed.
    StopSession { mark_completed: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyBinding {
    pub key: Key,
    pub action: KeyAction,
}

/// Lets the user leave a session with the escape key.
#[derive(Debug, Clone, Copy)]
pub struct EscapeKeyHandler {
    mark_completed: bool,
}

impl Default for EscapeKeyHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl EscapeKeyHandler {
    /// Escape ends the session and counts it as completed.
    pub fn new() -> Self {
        Self {
            mark_completed: true,
        }
    }

    /// Escape ends the session without counting it as completed.
    pub fn abort_only() -> Self {
        Self {
            mark_completed: false,
        }
    }

    pub fn key_binding(&self) -> Option<KeyBinding> {
        Some(KeyBinding {
            key: Key::Escape,
            action: KeyAction::StopSession {
                mark_completed: self.mark_completed,
            },
        })
    }
}
