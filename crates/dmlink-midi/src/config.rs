//! Console table IO
//!
//! All console configuration lives in flat CSV tables with a header row:
//!
//! ```text
//! DM4800_CC_Values.csv    Channel_Bus_Aux,Type,MIDI Channel,CC_Number
//! DM4800MonoStereo.csv    Channel_Bus_Aux,Mono_Stereo
//! scribblestrip.csv       Channel_Bus_Aux,Value
//! ```
//!
//! The mapping table is required; the two keyed tables are regenerated with
//! defaults whenever they are missing or unreadable (see [`KeyedTable`]).

use crate::types::{ChannelKey, Section};
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::path::{Path, PathBuf};

/// Default file name of the CC assignment table
pub const MAPPING_FILE: &str = "DM4800_CC_Values.csv";
/// Default file name of the mono/stereo declaration table
pub const MONO_STEREO_FILE: &str = "DM4800MonoStereo.csv";
/// Default file name of the scribble strip label table
pub const SCRIBBLE_FILE: &str = "scribblestrip.csv";

/// Key column shared by every console table
pub const KEY_COLUMN: &str = "Channel_Bus_Aux";

/// Error type for console table loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Required table not found: {path:?}")]
    Missing { path: PathBuf },

    #[error("Failed to open {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed table {path:?}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// One table row, keyed by (trimmed) header name
pub type TableRow = HashMap<String, String>;

/// Read every row of a headed CSV table
///
/// Cells are trimmed and short rows are accepted; a column absent from a row
/// is simply absent from its [`TableRow`]. Invalid UTF-8 is replaced rather
/// than rejected, and an unreadable record is skipped with a warning, so one
/// bad line never loses the rest of the table.
pub fn read_table(path: &Path) -> Result<Vec<TableRow>, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::Missing {
            path: path.to_path_buf(),
        });
    }

    let file = File::open(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(file);

    let csv_error = |source| ConfigError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let headers: Vec<String> = reader
        .byte_headers()
        .map_err(csv_error)?
        .iter()
        .map(decode_cell)
        .collect();

    let mut rows = Vec::new();
    for (index, record) in reader.byte_records().enumerate() {
        // Header is line 1
        let line = index + 2;
        let record = match record {
            Ok(record) => record,
            Err(e) if e.is_io_error() => return Err(csv_error(e)),
            Err(e) => {
                log::warn!("{:?}: line {}: {}, skipping", path, line, e);
                continue;
            }
        };
        if std::str::from_utf8(record.as_slice()).is_err() {
            log::warn!("{:?}: line {}: invalid UTF-8, replacing bad bytes", path, line);
        }

        let row = headers
            .iter()
            .cloned()
            .zip(record.iter().map(decode_cell))
            .collect();
        rows.push(row);
    }
    Ok(rows)
}

fn decode_cell(cell: &[u8]) -> String {
    String::from_utf8_lossy(cell).into_owned()
}

/// A two-column table keyed by logical channel
///
/// Shared shape of the mono/stereo and scribble strip tables. Entries are
/// kept in canonical console order (Channel 1..64, Bus 1..24, Aux 1..12).
#[derive(Debug, Clone, PartialEq)]
pub struct KeyedTable {
    value_column: &'static str,
    default_value: &'static str,
    entries: BTreeMap<ChannelKey, String>,
}

impl KeyedTable {
    /// Table covering every Channel, Bus and Aux with the default value
    pub fn with_defaults(value_column: &'static str, default_value: &'static str) -> Self {
        let entries = default_keys()
            .map(|key| (key, default_value.to_string()))
            .collect();
        Self {
            value_column,
            default_value,
            entries,
        }
    }

    /// Load a keyed table, regenerating it on disk if missing or unreadable
    ///
    /// Keys the file lacks are filled with the default value.
    pub fn load_or_create(
        path: &Path,
        value_column: &'static str,
        default_value: &'static str,
    ) -> Self {
        let rows = match read_table(path) {
            Ok(rows) => rows,
            Err(ConfigError::Missing { .. }) => {
                log::info!("{:?} not found, generating default table", path);
                let table = Self::with_defaults(value_column, default_value);
                table.save_logged(path);
                return table;
            }
            Err(e) => {
                log::warn!("{}; regenerating default table", e);
                let table = Self::with_defaults(value_column, default_value);
                table.save_logged(path);
                return table;
            }
        };

        let mut table = Self::with_defaults(value_column, default_value);
        let mut loaded = 0usize;
        for row in rows {
            let Some(raw_key) = row.get(KEY_COLUMN).filter(|k| !k.is_empty()) else {
                continue;
            };
            let value = row
                .get(value_column)
                .cloned()
                .unwrap_or_else(|| default_value.to_string());
            table.entries.insert(ChannelKey::parse(raw_key), value);
            loaded += 1;
        }

        log::info!("Loaded {} row(s) from {:?}", loaded, path);
        table
    }

    /// Write the table in canonical order
    ///
    /// Only Channel, Bus and Aux rows are written; unrecognized keys read
    /// from the file are dropped on save.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        use anyhow::Context;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create table directory: {:?}", parent))?;
        }

        let mut writer = csv::Writer::from_path(path)
            .with_context(|| format!("Failed to create table file: {:?}", path))?;
        writer.write_record([KEY_COLUMN, self.value_column])?;
        for key in default_keys() {
            writer.write_record([key.to_string().as_str(), self.get(&key)])?;
        }
        writer
            .flush()
            .with_context(|| format!("Failed to write table file: {:?}", path))?;
        Ok(())
    }

    /// Save, logging instead of propagating failures
    pub fn save_logged(&self, path: &Path) {
        if let Err(e) = self.save(path) {
            log::warn!("Failed to save {:?}: {:#}", path, e);
        }
    }

    /// Stored value, or the default for keys the table does not know
    pub fn get(&self, key: &ChannelKey) -> &str {
        self.entries
            .get(key)
            .map(String::as_str)
            .unwrap_or(self.default_value)
    }

    pub fn set(&mut self, key: ChannelKey, value: String) {
        self.entries.insert(key, value);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ChannelKey, &str)> {
        self.entries.iter().map(|(k, v)| (k, v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Every Channel, Bus and Aux key in canonical order
pub fn default_keys() -> impl Iterator<Item = ChannelKey> {
    Section::STEREO_SECTIONS.into_iter().flat_map(|section| {
        let max = section.max_number().unwrap_or(0);
        (1..=max).map(move |n| ChannelKey::new(section.clone(), n))
    })
}
