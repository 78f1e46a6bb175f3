//! MIDI port discovery
//!
//! Uses midir for cross-platform MIDI I/O (ALSA on Linux, CoreMIDI on macOS, WinMM on Windows).
//!
//! Ports are looked up by name in three passes: exact name, normalized name
//! (hardware IDs stripped, case-insensitive), then case-insensitive
//! substring. A remembered port therefore still matches after ALSA hands
//! the console a different client number.

use midir::{MidiInput, MidiInputPort, MidiOutput, MidiOutputPort};

/// Error type for MIDI connection operations
#[derive(Debug, thiserror::Error)]
pub enum MidiConnectionError {
    #[error("Failed to initialize MIDI input: {0}")]
    InputInitError(String),

    #[error("Failed to initialize MIDI output: {0}")]
    OutputInitError(String),

    #[error("No MIDI port found matching: {0}")]
    PortNotFound(String),

    #[error("Failed to connect to MIDI port: {0}")]
    ConnectionError(String),
}

/// Client name announced to the MIDI subsystem
pub(crate) const CLIENT_NAME: &str = "dmlink";

/// Port discovery helpers
pub struct MidiConnection;

impl MidiConnection {
    /// Find an input port by name, returning the midir handle ready to connect
    pub fn find_input_port(
        port_name: &str,
    ) -> Result<(MidiInput, MidiInputPort, String), MidiConnectionError> {
        let midi_in = MidiInput::new(&format!("{}-in", CLIENT_NAME))
            .map_err(|e| MidiConnectionError::InputInitError(e.to_string()))?;

        let named: Vec<(MidiInputPort, String)> = midi_in
            .ports()
            .into_iter()
            .filter_map(|port| midi_in.port_name(&port).ok().map(|name| (port, name)))
            .collect();

        let index = find_port_index(named.iter().map(|(_, name)| name.as_str()), port_name)
            .ok_or_else(|| MidiConnectionError::PortNotFound(port_name.to_string()))?;
        let (port, name) = named
            .into_iter()
            .nth(index)
            .ok_or_else(|| MidiConnectionError::PortNotFound(port_name.to_string()))?;

        log::info!("MIDI: Found input port: {}", name);
        Ok((midi_in, port, name))
    }

    /// Find an output port by name, returning the midir handle ready to connect
    pub fn find_output_port(
        port_name: &str,
    ) -> Result<(MidiOutput, MidiOutputPort, String), MidiConnectionError> {
        let midi_out = MidiOutput::new(&format!("{}-out", CLIENT_NAME))
            .map_err(|e| MidiConnectionError::OutputInitError(e.to_string()))?;

        let named: Vec<(MidiOutputPort, String)> = midi_out
            .ports()
            .into_iter()
            .filter_map(|port| midi_out.port_name(&port).ok().map(|name| (port, name)))
            .collect();

        let index = find_port_index(named.iter().map(|(_, name)| name.as_str()), port_name)
            .ok_or_else(|| MidiConnectionError::PortNotFound(port_name.to_string()))?;
        let (port, name) = named
            .into_iter()
            .nth(index)
            .ok_or_else(|| MidiConnectionError::PortNotFound(port_name.to_string()))?;

        log::info!("MIDI: Found output port: {}", name);
        Ok((midi_out, port, name))
    }

    /// List all available MIDI input ports
    pub fn list_input_ports() -> Result<Vec<String>, MidiConnectionError> {
        let midi_in = MidiInput::new(&format!("{}-list", CLIENT_NAME))
            .map_err(|e| MidiConnectionError::InputInitError(e.to_string()))?;

        let ports: Vec<String> = midi_in
            .ports()
            .iter()
            .filter_map(|port| midi_in.port_name(port).ok())
            .collect();

        Ok(ports)
    }

    /// List all available MIDI output ports
    pub fn list_output_ports() -> Result<Vec<String>, MidiConnectionError> {
        let midi_out = MidiOutput::new(&format!("{}-list", CLIENT_NAME))
            .map_err(|e| MidiConnectionError::OutputInitError(e.to_string()))?;

        let ports: Vec<String> = midi_out
            .ports()
            .iter()
            .filter_map(|port| midi_out.port_name(port).ok())
            .collect();

        Ok(ports)
    }
}

/// Index of the best match for `wanted` among `names`
pub fn find_port_index<'a>(
    mut names: impl Iterator<Item = &'a str> + Clone,
    wanted: &str,
) -> Option<usize> {
    if let Some(index) = names.clone().position(|name| name == wanted) {
        return Some(index);
    }

    let normalized_wanted = normalize_port_name(wanted);
    if let Some(index) = names
        .clone()
        .position(|name| normalize_port_name(name).eq_ignore_ascii_case(&normalized_wanted))
    {
        return Some(index);
    }

    let pattern = normalized_wanted.to_lowercase();
    if pattern.is_empty() {
        return None;
    }
    names.position(|name| name.to_lowercase().contains(&pattern))
}

/// Normalize a MIDI port name by removing hardware-specific identifiers
///
/// ALSA port names include dynamic IDs that change between systems/reconnections:
///
/// - `"DM-4800 MIDI 1 [hw:3,0,0]"` → `"DM-4800 MIDI 1"`
/// - `"DM-4800:DM-4800 MIDI 1 28:0"` → `"DM-4800:DM-4800 MIDI 1"`
pub fn normalize_port_name(name: &str) -> String {
    let mut result = name.trim();

    // Remove bracketed hardware ID suffix (e.g., "[hw:3,0,0]")
    if let Some(bracket_pos) = result.rfind('[') {
        result = result[..bracket_pos].trim();
    }

    // Remove trailing ALSA sequencer client:port ID (e.g., "28:0")
    if let Some(last_space) = result.rfind(' ') {
        let suffix = &result[last_space + 1..];
        if let Some((client, port)) = suffix.split_once(':') {
            let is_id = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit());
            if is_id(client) && is_id(port) {
                result = result[..last_space].trim();
            }
        }
    }

    result.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listed_ports_can_be_reopened_by_name() {
        // Hosts without a MIDI backend report an init error
        for listed in [
            MidiConnection::list_input_ports(),
            MidiConnection::list_output_ports(),
        ] {
            let Ok(names) = listed else { continue };
            for name in names.iter().filter(|n| !n.is_empty()) {
                let index = find_port_index(names.iter().map(String::as_str), name);
                assert_eq!(index.map(|i| names[i].as_str()), Some(name.as_str()));
            }
        }
    }

    #[test]
    fn test_normalize_port_name() {
        assert_eq!(normalize_port_name("DM-4800 MIDI 1 [hw:3,0,0]"), "DM-4800 MIDI 1");
        assert_eq!(
            normalize_port_name("DM-4800:DM-4800 MIDI 1 28:0"),
            "DM-4800:DM-4800 MIDI 1"
        );
        assert_eq!(
            normalize_port_name("Midi Through:Midi Through Port-0 14:0"),
            "Midi Through:Midi Through Port-0"
        );
        // Nothing to strip
        assert_eq!(normalize_port_name("  USB MIDI Interface  "), "USB MIDI Interface");
        assert_eq!(normalize_port_name("Port A:B"), "Port A:B");
    }

    #[test]
    fn test_find_port_index() {
        let names = [
            "Midi Through:Midi Through Port-0 14:0",
            "DM-4800:DM-4800 MIDI 1 28:0",
            "DM-4800:DM-4800 MIDI 2 28:1",
        ];
        let find = |wanted: &str| find_port_index(names.iter().copied(), wanted);

        // Exact
        assert_eq!(find("DM-4800:DM-4800 MIDI 2 28:1"), Some(2));
        // Remembered under an older client number
        assert_eq!(find("DM-4800:DM-4800 MIDI 1 20:0"), Some(1));
        // Substring, first hit wins
        assert_eq!(find("dm-4800"), Some(1));
        assert_eq!(find("nanoKONTROL"), None);
        assert_eq!(find(""), None);
    }
}
