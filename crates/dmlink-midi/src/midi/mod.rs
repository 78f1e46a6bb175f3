//! MIDI transport backend
//!
//! Port discovery, input parsing and CC output via midir and midly. The
//! rest of the crate only sees 1-based [`CcMessage`](crate::CcMessage)s.

pub mod connection;
pub mod input;
pub mod output;

pub use connection::{find_port_index, normalize_port_name, MidiConnection, MidiConnectionError};
pub use input::{parse_cc, MidiInputHandler, INBOUND_QUEUE};
pub use output::{encode_cc, MidiOutputHandler, MidiOutputPort};
