//! Control router
//!
//! Single dispatch point for every control event on the control thread:
//!
//! ```text
//! LocalChange(address, value) → strip state → CC out (left mapping for pairs) → partner mirror
//! InboundMidi(ch, cc, value)  → reverse lookup → owning strip → partner mirror (no CC out)
//! ```
//!
//! Inbound values are never re-transmitted, so hardware echo cannot loop.
//! A local change transmits at most one CC, even when it is mirrored onto a
//! stereo partner.

use crate::mapping::{MappingTable, MidiMapping};
use crate::stereo::StereoLinkRegistry;
use crate::strip::{ControlValue, Propagation, StripBank, StripChange};
use crate::types::{CcMessage, ChannelKey, DisplayMode, LogicalAddress, MidiAddress};
use std::fmt;
use std::sync::Arc;

/// Error from the MIDI transport boundary
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("MIDI output not connected")]
    NotConnected,

    #[error("Failed to send MIDI message: {0}")]
    SendFailed(String),
}

/// Outbound side of the MIDI transport
///
/// Channels are 1-based here; implementations convert to the wire.
pub trait CcSender {
    fn send_cc(&mut self, message: CcMessage) -> Result<(), TransportError>;
}

/// Event processed by [`ControlRouter::dispatch`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlEvent {
    /// Value entered locally for a control
    LocalChange(LogicalAddress, i32),
    /// Control Change received from the console (1-based channel)
    InboundMidi { channel: u8, cc: u8, value: u8 },
}

impl From<CcMessage> for ControlEvent {
    fn from(message: CcMessage) -> Self {
        Self::InboundMidi {
            channel: message.channel,
            cc: message.cc,
            value: message.value,
        }
    }
}

/// Why an event produced no outbound CC
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    /// No live strip owns the addressed channel
    NoStrip(ChannelKey),
    /// The strip has no such control (e.g. pan on a bus)
    NoControl(LogicalAddress),
    /// Control has no MIDI assignment
    Unmapped(LogicalAddress),
    /// Received CC matches no mapping
    UnknownInbound(MidiAddress),
    /// Local value did not change
    Unchanged,
    /// Transport refused the message
    SendFailed,
    /// Inbound values are applied but never sent back
    Inbound,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoStrip(key) => write!(f, "no strip for {}", key),
            Self::NoControl(address) => write!(f, "{} does not exist", address),
            Self::Unmapped(address) => write!(f, "{} has no MIDI assignment", address),
            Self::UnknownInbound(address) => {
                write!(f, "no mapping for Ch {} CC {}", address.channel, address.cc)
            }
            Self::Unchanged => write!(f, "value unchanged"),
            Self::SendFailed => write!(f, "MIDI send failed"),
            Self::Inbound => write!(f, "received from console"),
        }
    }
}

/// Outcome of one dispatch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dispatch {
    /// CC accepted by the transport, if any
    pub sent: Option<CcMessage>,
    /// Strip changes in application order (primary first, then mirror)
    pub changes: Vec<StripChange>,
    pub dropped: Option<DropReason>,
}

impl Dispatch {
    fn dropped(reason: DropReason) -> Self {
        Self {
            dropped: Some(reason),
            ..Default::default()
        }
    }
}

/// Bidirectional CC routing over the loaded tables
pub struct ControlRouter {
    mappings: Arc<MappingTable>,
    registry: Arc<StereoLinkRegistry>,
    mode: DisplayMode,
}

impl ControlRouter {
    pub fn new(
        mappings: Arc<MappingTable>,
        registry: Arc<StereoLinkRegistry>,
        mode: DisplayMode,
    ) -> Self {
        Self {
            mappings,
            registry,
            mode,
        }
    }

    pub fn mode(&self) -> DisplayMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: DisplayMode) {
        self.mode = mode;
    }

    pub fn registry(&self) -> &StereoLinkRegistry {
        &self.registry
    }

    /// Process one event against the strip bank
    pub fn dispatch(
        &self,
        event: ControlEvent,
        bank: &mut StripBank,
        sender: &mut dyn CcSender,
    ) -> Dispatch {
        match event {
            ControlEvent::LocalChange(address, value) => {
                self.local_change(&address, value, bank, sender)
            }
            ControlEvent::InboundMidi { channel, cc, value } => {
                self.inbound(MidiAddress { channel, cc }, value, bank)
            }
        }
    }

    /// Strip holding the state of `key`
    ///
    /// A right stereo member without a strip of its own (wide layout)
    /// resolves to its left partner.
    pub fn resolve_owner(&self, key: &ChannelKey, bank: &StripBank) -> Option<ChannelKey> {
        if bank.contains(key) {
            return Some(key.clone());
        }
        if self.registry.is_right(key) {
            let left = self.registry.left_of(key);
            if bank.contains(left) {
                return Some(left.clone());
            }
        }
        None
    }

    /// MIDI assignment used when `owner`'s control changes locally
    ///
    /// Both members of a linked pair transmit on the left member's mapping.
    /// A wide strip is keyed by the left member already.
    pub fn outbound_mapping(&self, owner: &ChannelKey, address: &LogicalAddress) -> Option<&MidiMapping> {
        let channel = match self.mode {
            DisplayMode::LinkedPair if self.registry.is_paired(owner) => self.registry.left_of(owner),
            _ => owner,
        };
        self.mappings
            .lookup_outbound(&LogicalAddress::new(channel.clone(), address.control))
    }

    fn local_change(
        &self,
        address: &LogicalAddress,
        raw: i32,
        bank: &mut StripBank,
        sender: &mut dyn CcSender,
    ) -> Dispatch {
        let Some(owner) = self.resolve_owner(&address.channel, bank) else {
            log::debug!("Local change for {} has no strip", address);
            return Dispatch::dropped(DropReason::NoStrip(address.channel.clone()));
        };

        let value = ControlValue::from_local(address.control, raw);

        // Primary first, silently; the partner is mirrored after the send
        let mut changes = bank.set(&owner, address.control, value, Propagation::Silent);
        let Some(primary) = changes.first().cloned() else {
            return Dispatch::dropped(DropReason::NoControl(LogicalAddress::new(
                owner,
                address.control,
            )));
        };

        let mut dispatch = Dispatch::default();
        match self.outbound_mapping(&owner, address) {
            _ if !primary.wire_changed() => dispatch.dropped = Some(DropReason::Unchanged),
            None => {
                log::trace!("{} is unmapped", primary.address);
                dispatch.dropped = Some(DropReason::Unmapped(primary.address.clone()));
            }
            Some(mapping) => {
                let message = CcMessage::new(
                    mapping.midi_channel,
                    mapping.cc_number,
                    primary.current.as_cc(),
                );
                match sender.send_cc(message) {
                    Ok(()) => {
                        log::debug!(
                            "[MIDI OUT] CC ch={} cc={} val={} ({})",
                            message.channel,
                            message.cc,
                            message.value,
                            primary.address
                        );
                        dispatch.sent = Some(message);
                    }
                    Err(TransportError::NotConnected) => {
                        log::debug!("[MIDI OUT] no output port, {} not sent", primary.address);
                        dispatch.dropped = Some(DropReason::SendFailed);
                    }
                    Err(e) => {
                        log::warn!("MIDI output: {} for {}", e, primary.address);
                        dispatch.dropped = Some(DropReason::SendFailed);
                    }
                }
            }
        }

        changes.extend(bank.mirror_partner(&owner, address.control));
        dispatch.changes = changes;
        dispatch
    }

    fn inbound(&self, midi: MidiAddress, raw: u8, bank: &mut StripBank) -> Dispatch {
        let Some(address) = self.mappings.lookup_inbound(midi) else {
            log::trace!("[MIDI IN] ch={} cc={} -> (no mapping)", midi.channel, midi.cc);
            return Dispatch::dropped(DropReason::UnknownInbound(midi));
        };

        let Some(owner) = self.resolve_owner(&address.channel, bank) else {
            log::debug!("[MIDI IN] {} has no strip", address);
            return Dispatch::dropped(DropReason::NoStrip(address.channel.clone()));
        };

        let value = ControlValue::from_cc(address.control, raw);
        let changes = bank.set(&owner, address.control, value, Propagation::NoMidi);
        if changes.is_empty() {
            return Dispatch::dropped(DropReason::NoControl(LogicalAddress::new(
                owner,
                address.control,
            )));
        }

        log::debug!(
            "[MIDI IN] CC ch={} cc={} val={} -> {}",
            midi.channel,
            midi.cc,
            raw,
            changes[0].address
        );

        Dispatch {
            sent: None,
            changes,
            dropped: Some(DropReason::Inbound),
        }
    }
}

/// Sender that records messages, for tests
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct RecordingSender {
    pub sent: Vec<CcMessage>,
    pub fail: bool,
}

#[cfg(test)]
impl CcSender for RecordingSender {
    fn send_cc(&mut self, message: CcMessage) -> Result<(), TransportError> {
        if self.fail {
            return Err(TransportError::NotConnected);
        }
        self.sent.push(message);
        Ok(())
    }
}
