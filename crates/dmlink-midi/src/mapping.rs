//! CC mapping table
//!
//! Loads the console's CC assignment table and answers lookups in both
//! directions:
//!
//! - outbound: `(channel, control)` → MIDI channel + controller
//! - inbound: MIDI channel + controller → `(channel, control)`
//!
//! The table is immutable once loaded. The reverse index is built from the
//! forward entries at construction time; when two entries share a MIDI
//! address the later one in table order wins.

use crate::config::{read_table, ConfigError, TableRow, KEY_COLUMN};
use crate::types::{ChannelKey, ControlType, LogicalAddress, MidiAddress, Section};
use std::collections::HashMap;
use std::path::Path;

const TYPE_COLUMN: &str = "Type";
const MIDI_CHANNEL_COLUMN: &str = "MIDI Channel";
const CC_COLUMN: &str = "CC_Number";

/// Parse a free-text `Channel_Bus_Aux` cell into section and number
///
/// Matching is case-insensitive on the trimmed text:
/// - `channel…` → Channel, `bus…`/`buss…` → Bus, `aux…` → Aux, each taking
///   the number from the last token
/// - anything containing `master` → Master 1
/// - otherwise the first token becomes an unrecognized section name when
///   the last token is a number, else the whole text does
///
/// Never fails: an unparseable number becomes 1.
pub fn parse_section_and_number(raw: &str) -> (Section, u16) {
    let raw = raw.trim().to_lowercase();

    let section = if raw.starts_with("channel") {
        Section::Channel
    } else if raw.starts_with("bus") {
        Section::Bus
    } else if raw.starts_with("aux") {
        Section::Aux
    } else if raw.contains("master") {
        return (Section::Master, 1);
    } else {
        let name = raw.split_whitespace().next().unwrap_or_default().to_string();
        // Unknown sections need a whole numeric last token
        let number = raw.split_whitespace().last().and_then(|t| t.parse().ok());
        return match number {
            Some(number) => (Section::Other(name), number),
            None => (Section::Other(raw), 1),
        };
    };

    (section, trailing_number(&raw).unwrap_or(1))
}

/// Number at the end of the last whitespace token ("channel 12", "bus3")
fn trailing_number(raw: &str) -> Option<u16> {
    let last = raw.split_whitespace().last()?;
    let digits_start = last
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map(|(i, _)| i)?;
    last[digits_start..].parse().ok()
}

/// One row of the mapping table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MidiMapping {
    pub address: LogicalAddress,
    /// MIDI channel (1-16)
    pub midi_channel: u8,
    /// Controller number (0-127)
    pub cc_number: u8,
}

impl MidiMapping {
    pub fn new(address: LogicalAddress, midi_channel: u8, cc_number: u8) -> Self {
        Self {
            address,
            midi_channel,
            cc_number,
        }
    }

    pub fn midi_address(&self) -> MidiAddress {
        MidiAddress {
            channel: self.midi_channel,
            cc: self.cc_number,
        }
    }
}

/// Indexed CC assignment table
#[derive(Debug, Clone, Default)]
pub struct MappingTable {
    /// Entries in table order (a duplicate key keeps its first position)
    entries: Vec<MidiMapping>,
    /// Forward index into `entries`
    forward: HashMap<LogicalAddress, usize>,
    /// Reverse index, last entry wins on collision
    reverse: HashMap<MidiAddress, LogicalAddress>,
}

impl MappingTable {
    /// Load the mapping table from a CSV file
    ///
    /// A missing file is fatal ([`ConfigError::Missing`]); malformed rows
    /// are logged and skipped.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        log::info!("MappingTable: Loading from {:?}", path);
        let rows = read_table(path)?;
        let table = Self::from_rows(&rows);
        log::info!(
            "MappingTable: {} mapping(s), {} inbound address(es)",
            table.len(),
            table.reverse.len()
        );
        Ok(table)
    }

    /// Build from already-read table rows
    pub fn from_rows(rows: &[TableRow]) -> Self {
        let mappings = rows
            .iter()
            .enumerate()
            // Row 1 is the header
            .filter_map(|(i, row)| parse_row(row, i + 2));
        Self::from_mappings(mappings)
    }

    /// Build from mappings in table order
    ///
    /// A later mapping for an existing key overwrites the earlier one in place.
    pub fn from_mappings(mappings: impl IntoIterator<Item = MidiMapping>) -> Self {
        let mut entries: Vec<MidiMapping> = Vec::new();
        let mut forward = HashMap::new();

        for mapping in mappings {
            match forward.get(&mapping.address) {
                Some(&index) => {
                    log::debug!("MappingTable: duplicate row for {}, overwriting", mapping.address);
                    entries[index] = mapping;
                }
                None => {
                    forward.insert(mapping.address.clone(), entries.len());
                    entries.push(mapping);
                }
            }
        }

        let mut reverse = HashMap::new();
        for mapping in &entries {
            if let Some(previous) = reverse.insert(mapping.midi_address(), mapping.address.clone()) {
                log::warn!(
                    "MappingTable: ch={} cc={} assigned to both {} and {}, inbound uses {}",
                    mapping.midi_channel,
                    mapping.cc_number,
                    previous,
                    mapping.address,
                    mapping.address
                );
            }
        }

        Self {
            entries,
            forward,
            reverse,
        }
    }

    /// MIDI assignment of a control, if it has one
    pub fn lookup_outbound(&self, address: &LogicalAddress) -> Option<&MidiMapping> {
        self.forward.get(address).map(|&index| &self.entries[index])
    }

    /// Control owning a MIDI address, if any
    pub fn lookup_inbound(&self, midi: MidiAddress) -> Option<&LogicalAddress> {
        self.reverse.get(&midi)
    }

    pub fn iter(&self) -> impl Iterator<Item = &MidiMapping> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Parse one table row; `None` (with a warning) for malformed rows
fn parse_row(row: &TableRow, line: usize) -> Option<MidiMapping> {
    let section_raw = row.get(KEY_COLUMN).map(String::as_str).unwrap_or_default();
    let type_raw = row.get(TYPE_COLUMN).map(String::as_str).unwrap_or_default();

    let Some(control) = ControlType::parse(type_raw) else {
        log::warn!("MappingTable: line {}: unknown control type {:?}, skipping", line, type_raw);
        return None;
    };

    let midi_channel = numeric_cell(row, MIDI_CHANNEL_COLUMN, 1, line)?;
    if !(1..=16).contains(&midi_channel) {
        log::warn!(
            "MappingTable: line {}: MIDI channel {} out of range 1-16, skipping",
            line,
            midi_channel
        );
        return None;
    }

    let cc_number = numeric_cell(row, CC_COLUMN, 0, line)?;
    if cc_number > 127 {
        log::warn!("MappingTable: line {}: CC {} out of range 0-127, skipping", line, cc_number);
        return None;
    }

    let channel = ChannelKey::parse(section_raw);
    Some(MidiMapping::new(
        LogicalAddress::new(channel, control),
        midi_channel,
        cc_number,
    ))
}

/// Numeric cell with a default for absent/empty cells
fn numeric_cell(row: &TableRow, column: &str, default: u8, line: usize) -> Option<u8> {
    match row.get(column).map(String::as_str) {
        None | Some("") => Some(default),
        Some(raw) => match raw.parse::<u8>() {
            Ok(value) => Some(value),
            Err(_) => {
                log::warn!("MappingTable: line {}: bad {} {:?}, skipping", line, column, raw);
                None
            }
        },
    }
}
