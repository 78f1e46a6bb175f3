//! Addressing types shared by the mapping, stereo and routing layers
//!
//! MIDI channels are 1-based (1-16) everywhere in this crate, matching the
//! console tables. The conversion to the 0-based wire nibble happens once,
//! in [`crate::midi`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Console section a logical channel belongs to
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Section {
    Channel,
    Bus,
    Aux,
    Master,
    /// Unrecognized section name from a malformed table row (lowercase)
    Other(String),
}

impl Section {
    /// Sections that carry a mono/stereo declaration, in table order
    pub const STEREO_SECTIONS: [Section; 3] = [Section::Channel, Section::Bus, Section::Aux];

    /// Highest logical number in this section
    ///
    /// Unknown sections have no strips, so they report `None`.
    pub fn max_number(&self) -> Option<u16> {
        match self {
            Self::Channel => Some(64),
            Self::Bus => Some(24),
            Self::Aux => Some(12),
            Self::Master => Some(1),
            Self::Other(_) => None,
        }
    }

    /// Name as written in the console tables ("Channel", "Bus", ...)
    pub fn table_name(&self) -> &str {
        match self {
            Self::Channel => "Channel",
            Self::Bus => "Bus",
            Self::Aux => "Aux",
            Self::Master => "Master",
            Self::Other(name) => name,
        }
    }
}

/// The three controls a strip can expose
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlType {
    Fader,
    Pan,
    Mute,
}

impl ControlType {
    pub const ALL: [ControlType; 3] = [ControlType::Fader, ControlType::Pan, ControlType::Mute];

    /// Parse the `Type` column (case-insensitive, surrounding whitespace ignored)
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "fader" => Some(Self::Fader),
            "pan" => Some(Self::Pan),
            "mute" => Some(Self::Mute),
            _ => None,
        }
    }
}

impl fmt::Display for ControlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fader => write!(f, "fader"),
            Self::Pan => write!(f, "pan"),
            Self::Mute => write!(f, "mute"),
        }
    }
}

/// One logical mixing element: a numbered Channel, Bus, Aux, or the Master
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelKey {
    pub section: Section,
    pub number: u16,
}

impl ChannelKey {
    pub fn new(section: Section, number: u16) -> Self {
        Self { section, number }
    }

    pub fn channel(number: u16) -> Self {
        Self::new(Section::Channel, number)
    }

    pub fn bus(number: u16) -> Self {
        Self::new(Section::Bus, number)
    }

    pub fn aux(number: u16) -> Self {
        Self::new(Section::Aux, number)
    }

    /// The single master strip (always number 1)
    pub fn master() -> Self {
        Self::new(Section::Master, 1)
    }

    /// Parse a free-text `Channel_Bus_Aux` cell, see [`crate::parse_section_and_number`]
    pub fn parse(raw: &str) -> Self {
        let (section, number) = crate::mapping::parse_section_and_number(raw);
        Self { section, number }
    }

    /// Same section, given number
    pub fn with_number(&self, number: u16) -> Self {
        Self::new(self.section.clone(), number)
    }
}

impl fmt::Display for ChannelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.section {
            Section::Master => write!(f, "Master"),
            _ => write!(f, "{} {}", self.section.table_name(), self.number),
        }
    }
}

/// Immutable identity of one control on one logical channel
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LogicalAddress {
    pub channel: ChannelKey,
    pub control: ControlType,
}

impl LogicalAddress {
    pub fn new(channel: ChannelKey, control: ControlType) -> Self {
        Self { channel, control }
    }
}

impl fmt::Display for LogicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.channel, self.control)
    }
}

/// MIDI destination of a control: 1-based channel plus controller number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MidiAddress {
    /// MIDI channel (1-16)
    pub channel: u8,
    /// Controller number (0-127)
    pub cc: u8,
}

/// A Control Change message as seen by the core (1-based channel)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CcMessage {
    pub channel: u8,
    pub cc: u8,
    pub value: u8,
}

impl CcMessage {
    pub fn new(channel: u8, cc: u8, value: u8) -> Self {
        Self { channel, cc, value }
    }

    pub fn address(&self) -> MidiAddress {
        MidiAddress {
            channel: self.channel,
            cc: self.cc,
        }
    }
}

/// How stereo pairs are laid out on the surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayMode {
    /// Two strips per pair, kept value-synchronized
    #[default]
    LinkedPair,
    /// One strip stands for both members of a pair
    WideCombined,
}

impl DisplayMode {
    pub fn toggled(self) -> Self {
        match self {
            Self::LinkedPair => Self::WideCombined,
            Self::WideCombined => Self::LinkedPair,
        }
    }
}

impl fmt::Display for DisplayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LinkedPair => write!(f, "linked pair"),
            Self::WideCombined => write!(f, "wide"),
        }
    }
}
