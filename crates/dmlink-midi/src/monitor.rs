//! MIDI monitor
//!
//! Bounded history of recent Control Change traffic in both directions,
//! with optional append-only logging to a text file.

use crate::types::CcMessage;
use chrono::{DateTime, Local};
use std::collections::VecDeque;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Entries kept in memory
pub const MAX_MONITOR_ENTRIES: usize = 1000;
/// Default log file name
pub const MIDI_LOG_FILE: &str = "DM4800_MIDI_Log.txt";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    In,
    Out,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::In => write!(f, "IN "),
            Self::Out => write!(f, "OUT"),
        }
    }
}

/// One recorded message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorEntry {
    pub timestamp: DateTime<Local>,
    pub direction: Direction,
    pub message: CcMessage,
}

impl fmt::Display for MonitorEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} Ch:{:2} CC:{:3} Val:{:3}",
            self.timestamp.format("%H:%M:%S%.3f"),
            self.direction,
            self.message.channel,
            self.message.cc,
            self.message.value
        )
    }
}

pub struct MidiMonitor {
    entries: VecDeque<MonitorEntry>,
    capacity: usize,
    log: Option<(PathBuf, File)>,
}

impl Default for MidiMonitor {
    fn default() -> Self {
        Self::with_capacity(MAX_MONITOR_ENTRIES)
    }
}

impl MidiMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(MAX_MONITOR_ENTRIES)),
            capacity,
            log: None,
        }
    }

    /// Record a message, evicting the oldest entry when full
    pub fn record(&mut self, direction: Direction, message: CcMessage) {
        let entry = MonitorEntry {
            timestamp: Local::now(),
            direction,
            message,
        };

        if let Some((path, file)) = &mut self.log {
            if let Err(e) = writeln!(file, "{}", entry) {
                log::warn!("MIDI monitor: failed to write {:?}: {}", path, e);
            }
        }

        if self.capacity == 0 {
            return;
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    /// Entries, oldest first
    pub fn entries(&self) -> impl Iterator<Item = &MonitorEntry> {
        self.entries.iter()
    }

    /// The `n` most recent entries, oldest first
    pub fn recent(&self, n: usize) -> impl Iterator<Item = &MonitorEntry> {
        self.entries.iter().skip(self.entries.len().saturating_sub(n))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Start appending every recorded entry to `path`
    ///
    /// Failure to open the file is logged and leaves logging off.
    pub fn start_logging(&mut self, path: &Path) -> bool {
        let opened = OpenOptions::new().create(true).append(true).open(path);
        match opened {
            Ok(mut file) => {
                let banner = format!(
                    "\n=== MIDI Logging Started at {} ===",
                    Local::now().format("%Y-%m-%d %H:%M:%S")
                );
                if let Err(e) = writeln!(file, "{}", banner) {
                    log::warn!("MIDI monitor: failed to write {:?}: {}", path, e);
                }
                log::info!("MIDI monitor: logging to {:?}", path);
                self.log = Some((path.to_path_buf(), file));
                true
            }
            Err(e) => {
                log::warn!("MIDI monitor: cannot open log file {:?}: {}", path, e);
                false
            }
        }
    }

    pub fn stop_logging(&mut self) {
        if let Some((path, _)) = self.log.take() {
            log::info!("MIDI monitor: stopped logging to {:?}", path);
        }
    }

    pub fn is_logging(&self) -> bool {
        self.log.is_some()
    }
}
