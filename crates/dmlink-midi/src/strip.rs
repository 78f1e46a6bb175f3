//! Channel strip state
//!
//! Authoritative in-memory fader/pan/mute values, one [`ChannelStripState`]
//! per visible strip. Strips live in a [`StripBank`] which owns them and
//! performs stereo mirroring: a linked strip only records its partner's key,
//! and the bank copies a change across exactly one level deep.

use crate::types::{ChannelKey, ControlType, LogicalAddress, Section};
use std::collections::BTreeMap;
use std::fmt;

/// Highest MIDI CC value
pub const CC_MAX: i32 = 127;
/// Pan centre (displayed as "C")
pub const PAN_CENTER: i32 = 64;
/// Channel/bus/aux fader position for 0 dB
pub const FADER_ZERO_DB: i32 = 102;
/// Master fader position for 0 dB (also the highest value sent to MIDI)
pub const MASTER_ZERO_DB: i32 = 127;
/// Master fader display range extends above 0 dB
pub const MASTER_HEADROOM_MAX: i32 = 140;
/// Inbound mute values at or above this switch the mute on
pub const MUTE_ON_THRESHOLD: u8 = 64;

/// Which controls a strip exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelKind {
    pub has_pan: bool,
    pub has_mute: bool,
    pub has_scribble: bool,
    /// Highest local fader value (may exceed [`CC_MAX`] for display headroom)
    pub fader_max: i32,
    /// Initial fader position
    pub fader_default: i32,
}

impl ChannelKind {
    pub const CHANNEL: ChannelKind = ChannelKind {
        has_pan: true,
        has_mute: true,
        has_scribble: true,
        fader_max: CC_MAX,
        fader_default: FADER_ZERO_DB,
    };

    pub const BUS_OR_AUX: ChannelKind = ChannelKind {
        has_pan: false,
        has_mute: true,
        has_scribble: true,
        fader_max: CC_MAX,
        fader_default: FADER_ZERO_DB,
    };

    pub const MASTER: ChannelKind = ChannelKind {
        has_pan: false,
        has_mute: false,
        has_scribble: false,
        fader_max: MASTER_HEADROOM_MAX,
        fader_default: MASTER_ZERO_DB,
    };

    pub fn for_section(section: &Section) -> Self {
        match section {
            Section::Channel => Self::CHANNEL,
            Section::Bus | Section::Aux => Self::BUS_OR_AUX,
            Section::Master | Section::Other(_) => Self::MASTER,
        }
    }
}

/// Value of a single control
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlValue {
    /// Fader or pan position
    Level(i32),
    /// Mute state
    Switch(bool),
}

impl ControlValue {
    /// Value to transmit as a CC, before any per-strip ceiling
    pub fn as_cc(self) -> u8 {
        match self {
            Self::Level(v) => v.clamp(0, CC_MAX) as u8,
            Self::Switch(true) => CC_MAX as u8,
            Self::Switch(false) => 0,
        }
    }

    /// Decode a received CC for a control
    pub fn from_cc(control: ControlType, value: u8) -> Self {
        match control {
            ControlType::Fader | ControlType::Pan => Self::Level(value as i32),
            ControlType::Mute => Self::Switch(value >= MUTE_ON_THRESHOLD),
        }
    }

    /// Decode a locally entered value (mute: any non-zero value is on)
    pub fn from_local(control: ControlType, value: i32) -> Self {
        match control {
            ControlType::Fader | ControlType::Pan => Self::Level(value),
            ControlType::Mute => Self::Switch(value != 0),
        }
    }
}

impl fmt::Display for ControlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Level(v) => write!(f, "{}", v),
            Self::Switch(true) => write!(f, "on"),
            Self::Switch(false) => write!(f, "off"),
        }
    }
}

/// Snapshot of one strip's controls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelStripValue {
    pub fader: i32,
    pub pan: i32,
    pub mute: bool,
}

impl ChannelStripValue {
    pub fn initial(kind: &ChannelKind) -> Self {
        Self {
            fader: kind.fader_default,
            pan: PAN_CENTER,
            mute: false,
        }
    }

    pub fn get(&self, control: ControlType) -> ControlValue {
        match control {
            ControlType::Fader => ControlValue::Level(self.fader),
            ControlType::Pan => ControlValue::Level(self.pan),
            ControlType::Mute => ControlValue::Switch(self.mute),
        }
    }
}

/// Previous and new value returned by every setter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValueChange<T> {
    pub previous: T,
    pub current: T,
}

impl<T: PartialEq> ValueChange<T> {
    pub fn changed(&self) -> bool {
        self.previous != self.current
    }
}

/// How far a change travels beyond the strip it is applied to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Propagation {
    /// Received from MIDI: mirrored to the partner, never re-transmitted
    NoMidi,
    /// Restore or mirror write: no side effects at all
    Silent,
}

impl Propagation {
    pub fn mirrors(self) -> bool {
        !matches!(self, Self::Silent)
    }
}

/// Pan position as shown on the strip: "C", "L{n}" or "R{n}"
pub fn pan_display(value: i32) -> String {
    if value == PAN_CENTER {
        "C".to_string()
    } else if value < PAN_CENTER {
        format!("L{}", PAN_CENTER - value)
    } else {
        format!("R{}", value - PAN_CENTER)
    }
}

/// State of one visible strip
#[derive(Debug, Clone)]
pub struct ChannelStripState {
    key: ChannelKey,
    kind: ChannelKind,
    value: ChannelStripValue,
    partner: Option<ChannelKey>,
}

impl ChannelStripState {
    pub fn new(key: ChannelKey) -> Self {
        let kind = ChannelKind::for_section(&key.section);
        Self::with_kind(key, kind)
    }

    pub fn with_kind(key: ChannelKey, kind: ChannelKind) -> Self {
        Self {
            key,
            kind,
            value: ChannelStripValue::initial(&kind),
            partner: None,
        }
    }

    pub fn key(&self) -> &ChannelKey {
        &self.key
    }

    pub fn kind(&self) -> &ChannelKind {
        &self.kind
    }

    pub fn value(&self) -> ChannelStripValue {
        self.value
    }

    pub fn get_fader(&self) -> i32 {
        self.value.fader
    }

    pub fn get_pan(&self) -> i32 {
        self.value.pan
    }

    pub fn get_mute(&self) -> bool {
        self.value.mute
    }

    pub fn pan_display(&self) -> String {
        pan_display(self.value.pan)
    }

    /// Stereo partner this strip mirrors to, if linked
    pub fn partner(&self) -> Option<&ChannelKey> {
        self.partner.as_ref()
    }

    pub fn link(&mut self, partner: ChannelKey) {
        self.partner = Some(partner);
    }

    /// Set the fader, clamped to `0..=fader_max`
    pub fn set_fader(&mut self, value: i32) -> ValueChange<i32> {
        let previous = self.value.fader;
        self.value.fader = value.clamp(0, self.kind.fader_max);
        ValueChange {
            previous,
            current: self.value.fader,
        }
    }

    /// Set the pan, clamped to `0..=127`; `None` if the strip has no pan
    pub fn set_pan(&mut self, value: i32) -> Option<ValueChange<i32>> {
        if !self.kind.has_pan {
            return None;
        }
        let previous = self.value.pan;
        self.value.pan = value.clamp(0, CC_MAX);
        Some(ValueChange {
            previous,
            current: self.value.pan,
        })
    }

    /// Set the mute; `None` if the strip has no mute
    pub fn set_mute(&mut self, on: bool) -> Option<ValueChange<bool>> {
        if !self.kind.has_mute {
            return None;
        }
        let previous = self.value.mute;
        self.value.mute = on;
        Some(ValueChange {
            previous,
            current: on,
        })
    }

    /// Apply a value to one control; `None` if the strip lacks the control
    /// or the value kind does not fit it
    pub fn apply(
        &mut self,
        control: ControlType,
        value: ControlValue,
    ) -> Option<ValueChange<ControlValue>> {
        match (control, value) {
            (ControlType::Fader, ControlValue::Level(v)) => {
                let change = self.set_fader(v);
                Some(level_change(change))
            }
            (ControlType::Pan, ControlValue::Level(v)) => self.set_pan(v).map(level_change),
            (ControlType::Mute, ControlValue::Switch(on)) => {
                self.set_mute(on).map(|change| ValueChange {
                    previous: ControlValue::Switch(change.previous),
                    current: ControlValue::Switch(change.current),
                })
            }
            _ => None,
        }
    }

    /// Overwrite every control the strip has, without notification
    pub fn restore(&mut self, value: ChannelStripValue) {
        self.set_fader(value.fader);
        self.set_pan(value.pan);
        self.set_mute(value.mute);
    }
}

fn level_change(change: ValueChange<i32>) -> ValueChange<ControlValue> {
    ValueChange {
        previous: ControlValue::Level(change.previous),
        current: ControlValue::Level(change.current),
    }
}

/// One control change applied to one strip
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StripChange {
    pub address: LogicalAddress,
    pub previous: ControlValue,
    pub current: ControlValue,
    /// Written by partner mirroring rather than directly
    pub mirrored: bool,
}

impl StripChange {
    pub fn changed(&self) -> bool {
        self.previous != self.current
    }

    /// Whether the transmitted CC differs, which is not the case above 127
    pub fn wire_changed(&self) -> bool {
        self.previous.as_cc() != self.current.as_cc()
    }
}

/// Owner of all live strips, keyed by logical channel
#[derive(Debug, Clone, Default)]
pub struct StripBank {
    strips: BTreeMap<ChannelKey, ChannelStripState>,
}

impl StripBank {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, strip: ChannelStripState) {
        self.strips.insert(strip.key.clone(), strip);
    }

    pub fn get(&self, key: &ChannelKey) -> Option<&ChannelStripState> {
        self.strips.get(key)
    }

    pub fn contains(&self, key: &ChannelKey) -> bool {
        self.strips.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChannelStripState> {
        self.strips.values()
    }

    pub fn len(&self) -> usize {
        self.strips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strips.is_empty()
    }

    /// Drop every strip
    pub fn clear(&mut self) {
        self.strips.clear();
    }

    /// Link two existing strips as stereo partners
    ///
    /// Returns false (and links nothing) if either strip is missing.
    pub fn link(&mut self, left: &ChannelKey, right: &ChannelKey) -> bool {
        if !self.contains(left) || !self.contains(right) || left == right {
            return false;
        }
        if let Some(strip) = self.strips.get_mut(left) {
            strip.link(right.clone());
        }
        if let Some(strip) = self.strips.get_mut(right) {
            strip.link(left.clone());
        }
        true
    }

    /// Values of every strip, keyed by logical channel
    pub fn capture(&self) -> BTreeMap<ChannelKey, ChannelStripValue> {
        self.strips
            .iter()
            .map(|(key, strip)| (key.clone(), strip.value))
            .collect()
    }

    /// Restore one strip's values without notification
    pub fn restore(&mut self, key: &ChannelKey, value: ChannelStripValue) -> bool {
        match self.strips.get_mut(key) {
            Some(strip) => {
                strip.restore(value);
                true
            }
            None => false,
        }
    }

    /// Set a control on a strip and mirror it to the linked partner
    ///
    /// The first element is the change to `key` itself. When `propagation`
    /// mirrors, the partner receives the primary's resulting value as a
    /// silent write, so mirroring never chains further. Empty if the strip
    /// does not exist or lacks the control.
    pub fn set(
        &mut self,
        key: &ChannelKey,
        control: ControlType,
        value: ControlValue,
        propagation: Propagation,
    ) -> Vec<StripChange> {
        let Some(strip) = self.strips.get_mut(key) else {
            return Vec::new();
        };
        let Some(change) = strip.apply(control, value) else {
            return Vec::new();
        };

        let mut changes = vec![StripChange {
            address: LogicalAddress::new(key.clone(), control),
            previous: change.previous,
            current: change.current,
            mirrored: false,
        }];

        if propagation.mirrors() {
            changes.extend(self.mirror_partner(key, control));
        }

        changes
    }

    /// Copy one control of `key` onto its linked partner as a silent write
    ///
    /// Reported only if the partner's value actually moved.
    pub fn mirror_partner(&mut self, key: &ChannelKey, control: ControlType) -> Option<StripChange> {
        let source = self.strips.get(key)?;
        let value = source.value.get(control);
        let partner_key = source.partner.clone()?;

        let partner = self.strips.get_mut(&partner_key)?;
        let change = partner.apply(control, value)?;
        change.changed().then(|| StripChange {
            address: LogicalAddress::new(partner_key, control),
            previous: change.previous,
            current: change.current,
            mirrored: true,
        })
    }
}
