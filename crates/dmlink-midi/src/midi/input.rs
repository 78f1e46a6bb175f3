//! MIDI input handling
//!
//! Receives raw MIDI bytes from the midir callback, parses them with midly,
//! and hands Control Change messages to the control thread via a flume
//! channel. Nothing else happens on the driver thread.

use super::connection::{MidiConnection, MidiConnectionError, CLIENT_NAME};
use crate::types::CcMessage;
use flume::Sender;
use midir::MidiInputConnection;
use midly::live::LiveEvent;
use midly::MidiMessage;

/// Capacity of the callback → control thread channel
pub const INBOUND_QUEUE: usize = 1024;

/// Parse raw bytes into a Control Change with a 1-based channel
///
/// Any other message type (notes, sysex, clock...) yields `None`.
pub fn parse_cc(data: &[u8]) -> Option<CcMessage> {
    match LiveEvent::parse(data).ok()? {
        LiveEvent::Midi {
            channel,
            message: MidiMessage::Controller { controller, value },
        } => Some(CcMessage::new(
            channel.as_int() + 1,
            controller.as_int(),
            value.as_int(),
        )),
        _ => None,
    }
}

/// Callback data passed to midir
struct CallbackData {
    message_tx: Sender<CcMessage>,
}

/// MIDI input handler
///
/// Owns the midir connection; dropping it closes the port.
pub struct MidiInputHandler {
    /// The midir connection (kept alive for the duration)
    _connection: MidiInputConnection<CallbackData>,
    port_name: String,
}

impl MidiInputHandler {
    /// Open the input port matching `port_name` and forward its CCs to `message_tx`
    pub fn connect(
        port_name: &str,
        message_tx: Sender<CcMessage>,
    ) -> Result<Self, MidiConnectionError> {
        let (midi_in, port, resolved_name) = MidiConnection::find_input_port(port_name)?;

        let connection = midi_in
            .connect(
                &port,
                &format!("{}-input", CLIENT_NAME),
                Self::midi_callback,
                CallbackData { message_tx },
            )
            .map_err(|e| MidiConnectionError::ConnectionError(e.to_string()))?;

        log::info!("MIDI: Input handler connected to {}", resolved_name);

        Ok(Self {
            _connection: connection,
            port_name: resolved_name,
        })
    }

    /// Full name of the connected port
    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    /// The midir callback function
    ///
    /// Called from the MIDI driver thread whenever a message is received.
    /// Must be fast and non-blocking.
    fn midi_callback(_timestamp: u64, data: &[u8], callback_data: &mut CallbackData) {
        let Some(message) = parse_cc(data) else {
            log::trace!("[MIDI IN] ignored {:02x?}", data);
            return;
        };

        if callback_data.message_tx.try_send(message).is_err() {
            log::warn!("MIDI: Inbound channel full, dropping {:?}", message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cc() {
        let data = [0xB2, 0x07, 0x64]; // CC, channel 2 (0-based), controller 7, value 100
        assert_eq!(parse_cc(&data), Some(CcMessage::new(3, 7, 100)));

        let data = [0xB0, 0x00, 0x00];
        assert_eq!(parse_cc(&data), Some(CcMessage::new(1, 0, 0)));

        let data = [0xBF, 0x7F, 0x7F];
        assert_eq!(parse_cc(&data), Some(CcMessage::new(16, 127, 127)));
    }

    #[test]
    fn test_parse_ignores_other_messages() {
        assert_eq!(parse_cc(&[0x90, 0x3C, 0x7F]), None); // Note On
        assert_eq!(parse_cc(&[0xE0, 0x00, 0x40]), None); // Pitch bend
        assert_eq!(parse_cc(&[0xF8]), None); // Clock
        assert_eq!(parse_cc(&[]), None);
        assert_eq!(parse_cc(&[0xB0, 0x07]), None); // Truncated
    }
}
