//! Scribble strip labels
//!
//! Free-text label per logical channel, persisted in `scribblestrip.csv`.
//! Labels are capped at 24 characters and shown on two rows of 14.

use crate::config::{KeyedTable, SCRIBBLE_FILE};
use crate::types::ChannelKey;
use std::path::{Path, PathBuf};

pub const SCRIBBLE_COLUMN: &str = "Value";
pub const DEFAULT_LABEL: &str = "-";
pub const MAX_LABEL_LENGTH: usize = 24;
pub const MAX_CHARS_PER_ROW: usize = 14;

/// Label table backed by a file that every edit is written to
#[derive(Debug, Clone)]
pub struct ScribbleTable {
    table: KeyedTable,
    path: PathBuf,
}

impl ScribbleTable {
    /// Load labels, generating a default table on disk if needed
    pub fn load(path: &Path) -> Self {
        Self {
            table: KeyedTable::load_or_create(path, SCRIBBLE_COLUMN, DEFAULT_LABEL),
            path: path.to_path_buf(),
        }
    }

    pub fn default_path(data_dir: &Path) -> PathBuf {
        data_dir.join(SCRIBBLE_FILE)
    }

    pub fn label(&self, key: &ChannelKey) -> &str {
        self.table.get(key)
    }

    /// Set a label and persist the table
    ///
    /// Line breaks are dropped and the text is truncated to
    /// [`MAX_LABEL_LENGTH`] characters. Returns the stored label. A failed
    /// save is logged; the in-memory label is kept.
    pub fn set_label(&mut self, key: &ChannelKey, text: &str) -> String {
        let label = clean_label(text);
        self.table.set(key.clone(), label.clone());
        self.table.save_logged(&self.path);
        label
    }

    /// Set the same label on several channels with a single save
    pub fn set_labels<'a>(
        &mut self,
        keys: impl IntoIterator<Item = &'a ChannelKey>,
        text: &str,
    ) -> String {
        let label = clean_label(text);
        for key in keys {
            self.table.set(key.clone(), label.clone());
        }
        self.table.save_logged(&self.path);
        label
    }
}

fn clean_label(text: &str) -> String {
    text.chars()
        .filter(|c| *c != '\n' && *c != '\r')
        .take(MAX_LABEL_LENGTH)
        .collect()
}

/// Split a label into its two display rows (second row may be empty)
pub fn display_rows(label: &str) -> (String, String) {
    let first = label.chars().take(MAX_CHARS_PER_ROW).collect();
    let second = label
        .chars()
        .skip(MAX_CHARS_PER_ROW)
        .take(MAX_LABEL_LENGTH - MAX_CHARS_PER_ROW)
        .collect();
    (first, second)
}
