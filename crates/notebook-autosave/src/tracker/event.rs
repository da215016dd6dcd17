//! Edit events recorded by the tracker.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of content change reported by the editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditKind {
    /// Characters typed at the cursor.
    Insert,
    /// Characters removed.
    Delete,
    /// Selection replaced by new text.
    Replace,
    /// Clipboard content inserted.
    Paste,
}

impl EditKind {
    /// Get the lowercase name used in logs and scripts.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Insert => "insert",
            Self::Delete => "delete",
            Self::Replace => "replace",
            Self::Paste => "paste",
        }
    }

    /// Whether this edit adds characters that count towards typing speed.
    #[must_use]
    pub const fn adds_text(&self) -> bool {
        matches!(self, Self::Insert | Self::Paste)
    }
}

impl fmt::Display for EditKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded edit. Never mutated after it is appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EditEvent {
    pub kind: EditKind,
    /// Cursor offset of the change.
    pub position: usize,
    /// Characters added (insert/paste) or removed (delete).
    pub length: usize,
    /// Milliseconds on the tracker clock.
    pub timestamp: u64,
    /// Length in characters of the content snapshot taken with the edit.
    pub sample_len: usize,
}
