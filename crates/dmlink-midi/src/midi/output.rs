//! MIDI output
//!
//! Encodes Control Change messages with midly and writes them to the midir
//! output connection. This is the only place the 1-based channel numbers
//! used everywhere else become the 0-based wire nibble.

use super::connection::{MidiConnection, MidiConnectionError, CLIENT_NAME};
use crate::router::{CcSender, TransportError};
use crate::types::CcMessage;
use midir::MidiOutputConnection;
use midly::live::LiveEvent;
use midly::num::{u4, u7};
use midly::MidiMessage;

/// Encode a CC, clamping channel to 1-16 and controller/value to 0-127
pub fn encode_cc(message: CcMessage) -> Vec<u8> {
    let event = LiveEvent::Midi {
        channel: u4::new(message.channel.clamp(1, 16) - 1),
        message: MidiMessage::Controller {
            controller: u7::new(message.cc.min(127)),
            value: u7::new(message.value.min(127)),
        },
    };

    let mut buf = Vec::with_capacity(3);
    // Writing into a Vec cannot fail
    let _ = event.write_std(&mut buf);
    buf
}

/// MIDI output handler
pub struct MidiOutputHandler {
    connection: MidiOutputConnection,
    port_name: String,
}

impl MidiOutputHandler {
    /// Open the output port matching `port_name`
    pub fn connect(port_name: &str) -> Result<Self, MidiConnectionError> {
        let (midi_out, port, resolved_name) = MidiConnection::find_output_port(port_name)?;

        let connection = midi_out
            .connect(&port, &format!("{}-output", CLIENT_NAME))
            .map_err(|e| MidiConnectionError::ConnectionError(e.to_string()))?;

        log::info!("MIDI: Connected to output port {}", resolved_name);

        Ok(Self {
            connection,
            port_name: resolved_name,
        })
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }
}

impl CcSender for MidiOutputHandler {
    fn send_cc(&mut self, message: CcMessage) -> Result<(), TransportError> {
        let bytes = encode_cc(message);
        self.connection
            .send(&bytes)
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }
}

/// Output slot that may or may not hold an open port
///
/// Sending with no port open fails with [`TransportError::NotConnected`].
#[derive(Default)]
pub struct MidiOutputPort {
    handler: Option<MidiOutputHandler>,
}

impl MidiOutputPort {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a port, closing any previously open one first
    pub fn open(&mut self, port_name: &str) -> Result<&str, MidiConnectionError> {
        self.close();
        let handler = self.handler.insert(MidiOutputHandler::connect(port_name)?);
        Ok(handler.port_name())
    }

    pub fn close(&mut self) {
        if let Some(handler) = self.handler.take() {
            log::info!("MIDI: Closed output port {}", handler.port_name());
            handler.connection.close();
        }
    }

    pub fn port_name(&self) -> Option<&str> {
        self.handler.as_ref().map(MidiOutputHandler::port_name)
    }

    pub fn is_open(&self) -> bool {
        self.handler.is_some()
    }
}

impl CcSender for MidiOutputPort {
    fn send_cc(&mut self, message: CcMessage) -> Result<(), TransportError> {
        match &mut self.handler {
            Some(handler) => handler.send_cc(message),
            None => Err(TransportError::NotConnected),
        }
    }
}
