//! MIDI CC mapping and stereo-link core for the DM4800 control surface
//!
//! This crate provides:
//! - Console table loading (CC assignments, mono/stereo declarations, scribble labels)
//! - Forward and reverse CC lookup
//! - Odd/even stereo pairing and partner mirroring without feedback loops
//! - Linked-pair / wide display modes with value-preserving rebuilds
//! - MIDI port discovery, input parsing and CC output via midir + midly
//! - A bounded MIDI monitor with optional file logging
//!
//! # Architecture
//!
//! ```text
//! Console → midir callback → flume channel ┐
//!                                          ├→ MixerSurface::handle() → ControlRouter → StripBank
//! Local edits (ControlEvent::LocalChange) ─┘                                   └→ CcSender → Console
//! ```
//!
//! Everything past the flume channel runs on one control thread; the tables
//! are read-only after load.

mod config;
mod display_mode;
mod layout;
mod mapping;
pub mod midi;
mod monitor;
mod router;
mod scribble;
mod stereo;
mod strip;
mod types;

pub use config::{
    default_keys, read_table, ConfigError, KeyedTable, TableRow, MAPPING_FILE, MONO_STEREO_FILE,
    SCRIBBLE_FILE,
};
pub use display_mode::{DisplayModeController, RebuildPhase, RebuildReport, ToggleOutcome};
pub use layout::{StripDescriptor, StripLayout};
pub use mapping::{parse_section_and_number, MappingTable, MidiMapping};
pub use midi::{MidiConnection, MidiConnectionError, MidiInputHandler, MidiOutputPort};
pub use monitor::{Direction, MidiMonitor, MonitorEntry, MAX_MONITOR_ENTRIES, MIDI_LOG_FILE};
pub use router::{CcSender, ControlEvent, ControlRouter, Dispatch, DropReason, TransportError};
pub use scribble::{display_rows, ScribbleTable, DEFAULT_LABEL, MAX_LABEL_LENGTH};
pub use stereo::StereoLinkRegistry;
pub use strip::{
    pan_display, ChannelKind, ChannelStripState, ChannelStripValue, ControlValue, Propagation,
    StripBank, StripChange, ValueChange, CC_MAX, FADER_ZERO_DB, MASTER_HEADROOM_MAX,
    MASTER_ZERO_DB, PAN_CENTER,
};
pub use types::{
    CcMessage, ChannelKey, ControlType, DisplayMode, LogicalAddress, MidiAddress, Section,
};

use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Error type for surface setup
#[derive(Debug, thiserror::Error)]
pub enum SurfaceError {
    #[error("Console configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Locations of the three console tables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TablePaths {
    pub mapping: PathBuf,
    pub mono_stereo: PathBuf,
    pub scribble: PathBuf,
}

impl TablePaths {
    /// Default file names inside `dir`
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            mapping: dir.join(MAPPING_FILE),
            mono_stereo: dir.join(MONO_STEREO_FILE),
            scribble: dir.join(SCRIBBLE_FILE),
        }
    }
}

/// Everything loaded from disk at startup
pub struct SurfaceTables {
    pub mappings: MappingTable,
    pub registry: StereoLinkRegistry,
    pub scribbles: ScribbleTable,
}

impl SurfaceTables {
    /// Load all tables; only a missing or unreadable mapping table is fatal
    pub fn load(paths: &TablePaths) -> Result<Self, SurfaceError> {
        let mappings = MappingTable::load(&paths.mapping)?;
        let registry = StereoLinkRegistry::load(&paths.mono_stereo);
        let scribbles = ScribbleTable::load(&paths.scribble);
        Ok(Self {
            mappings,
            registry,
            scribbles,
        })
    }
}

/// The whole control surface: strips, routing, display mode, labels and monitor
///
/// Owned by the control thread. `S` is the outbound transport.
pub struct MixerSurface<S: CcSender> {
    router: ControlRouter,
    strips: StripBank,
    display: DisplayModeController,
    scribbles: ScribbleTable,
    monitor: MidiMonitor,
    sender: S,
}

impl<S: CcSender> MixerSurface<S> {
    pub fn new(tables: SurfaceTables, mode: DisplayMode, sender: S) -> Self {
        let registry = Arc::new(tables.registry);
        let mut strips = StripBank::new();
        let display = DisplayModeController::new(mode, &registry, &mut strips);
        let router = ControlRouter::new(Arc::new(tables.mappings), registry, mode);

        Self {
            router,
            strips,
            display,
            scribbles: tables.scribbles,
            monitor: MidiMonitor::new(),
            sender,
        }
    }

    /// Dispatch one event, recording MIDI traffic in the monitor
    pub fn handle(&mut self, event: ControlEvent) -> Dispatch {
        if let ControlEvent::InboundMidi { channel, cc, value } = event {
            self.monitor
                .record(Direction::In, CcMessage::new(channel, cc, value));
        }

        let dispatch = self
            .router
            .dispatch(event, &mut self.strips, &mut self.sender);

        if let Some(message) = dispatch.sent {
            self.monitor.record(Direction::Out, message);
        }
        dispatch
    }

    /// Local edit of one control
    pub fn set(&mut self, channel: ChannelKey, control: ControlType, value: i32) -> Dispatch {
        self.handle(ControlEvent::LocalChange(
            LogicalAddress::new(channel, control),
            value,
        ))
    }

    /// Switch between linked-pair and wide layouts
    pub fn toggle_display_mode(&mut self) -> ToggleOutcome {
        let outcome = self.display.toggle(self.router.registry(), &mut self.strips);
        self.router.set_mode(self.display.mode());
        outcome
    }

    /// Rebuild for a specific mode
    pub fn set_display_mode(&mut self, mode: DisplayMode) -> ToggleOutcome {
        let outcome = self
            .display
            .rebuild(mode, self.router.registry(), &mut self.strips);
        self.router.set_mode(self.display.mode());
        outcome
    }

    pub fn display_mode(&self) -> DisplayMode {
        self.display.mode()
    }

    /// Strip holding the state of `key` (the wide strip for an absorbed right)
    pub fn strip(&self, key: &ChannelKey) -> Option<&ChannelStripState> {
        let owner = self.router.resolve_owner(key, &self.strips)?;
        self.strips.get(&owner)
    }

    pub fn strips(&self) -> &StripBank {
        &self.strips
    }

    pub fn layout(&self) -> &StripLayout {
        self.display.layout()
    }

    pub fn registry(&self) -> &StereoLinkRegistry {
        self.router.registry()
    }

    pub fn label(&self, key: &ChannelKey) -> &str {
        self.scribbles.label(key)
    }

    /// Set the label shown on the strip for `key`
    ///
    /// A wide strip's label is stored under both members of the pair.
    /// Returns the stored (possibly truncated) label, or `None` if the strip
    /// has no scribble strip.
    pub fn set_label(&mut self, key: &ChannelKey, text: &str) -> Option<String> {
        let strip = self.display.layout().strip_for(key)?;
        if !strip.kind.has_scribble {
            return None;
        }
        let keys: Vec<ChannelKey> = strip.covers().cloned().collect();
        Some(self.scribbles.set_labels(&keys, text))
    }

    pub fn monitor(&self) -> &MidiMonitor {
        &self.monitor
    }

    pub fn monitor_mut(&mut self) -> &mut MidiMonitor {
        &mut self.monitor
    }

    pub fn sender(&self) -> &S {
        &self.sender
    }

    pub fn sender_mut(&mut self) -> &mut S {
        &mut self.sender
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::RecordingSender;

    fn write(dir: &Path, name: &str, contents: &str) {
        std::fs::write(dir.join(name), contents).unwrap();
    }

    fn surface(dir: &Path, mode: DisplayMode) -> MixerSurface<RecordingSender> {
        let _ = env_logger::builder().is_test(true).try_init();
        let tables = SurfaceTables::load(&TablePaths::in_dir(dir)).unwrap();
        MixerSurface::new(tables, mode, RecordingSender::default())
    }

    #[test]
    fn test_linked_stereo_scenario() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            MAPPING_FILE,
            "Channel_Bus_Aux,Type,MIDI Channel,CC_Number\nChannel 1,fader,1,10\n",
        );
        write(
            dir.path(),
            MONO_STEREO_FILE,
            "Channel_Bus_Aux,Mono_Stereo\nChannel 1,Stereo\n",
        );

        let mut surface = surface(dir.path(), DisplayMode::LinkedPair);
        surface.set(ChannelKey::channel(1), ControlType::Fader, 100);

        assert_eq!(surface.sender().sent, vec![CcMessage::new(1, 10, 100)]);
        assert_eq!(encode(surface.sender().sent[0]), vec![0xB0, 10, 100]);
        assert_eq!(surface.strip(&ChannelKey::channel(2)).unwrap().get_fader(), 100);
        assert_eq!(surface.monitor().len(), 1);
    }

    fn encode(message: CcMessage) -> Vec<u8> {
        midi::encode_cc(message)
    }

    #[test]
    fn test_missing_mapping_table_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let result = SurfaceTables::load(&TablePaths::in_dir(dir.path()));
        assert!(matches!(
            result,
            Err(SurfaceError::Config(ConfigError::Missing { .. }))
        ));
    }

    #[test]
    fn test_optional_tables_are_generated() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), MAPPING_FILE, "Channel_Bus_Aux,Type,MIDI Channel,CC_Number\n");

        let surface = surface(dir.path(), DisplayMode::LinkedPair);
        assert!(dir.path().join(MONO_STEREO_FILE).exists());
        assert!(dir.path().join(SCRIBBLE_FILE).exists());
        assert_eq!(surface.strips().len(), 64 + 24 + 12 + 1);
        assert_eq!(surface.label(&ChannelKey::channel(1)), DEFAULT_LABEL);
    }

    #[test]
    fn test_inbound_recorded_and_not_echoed() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            MAPPING_FILE,
            "Channel_Bus_Aux,Type,MIDI Channel,CC_Number\nMaster,fader,16,7\n",
        );

        let mut surface = surface(dir.path(), DisplayMode::LinkedPair);
        let message = CcMessage::new(16, 7, 90);
        surface.handle(message.into());
        surface.handle(CcMessage::new(5, 5, 5).into());

        assert!(surface.sender().sent.is_empty());
        assert_eq!(surface.strip(&ChannelKey::master()).unwrap().get_fader(), 90);
        let directions: Vec<Direction> = surface.monitor().entries().map(|e| e.direction).collect();
        assert_eq!(directions, vec![Direction::In, Direction::In]);
    }

    #[test]
    fn test_toggle_updates_router_mode() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            MAPPING_FILE,
            "Channel_Bus_Aux,Type,MIDI Channel,CC_Number\nChannel 3,pan,1,30\nChannel 4,pan,1,40\n",
        );
        write(
            dir.path(),
            MONO_STEREO_FILE,
            "Channel_Bus_Aux,Mono_Stereo\nChannel 3,Stereo\n",
        );

        let mut surface = surface(dir.path(), DisplayMode::LinkedPair);
        surface.set(ChannelKey::channel(4), ControlType::Pan, 20);
        assert!(matches!(surface.toggle_display_mode(), ToggleOutcome::Toggled(_)));
        assert_eq!(surface.display_mode(), DisplayMode::WideCombined);
        assert_eq!(surface.layout().get(&ChannelKey::channel(3)).unwrap().title, "CH 3-4");
        assert_eq!(surface.strip(&ChannelKey::channel(4)).unwrap().pan_display(), "L44");

        surface.set(ChannelKey::channel(3), ControlType::Pan, 64);
        assert_eq!(
            surface.sender().sent,
            vec![CcMessage::new(1, 30, 20), CcMessage::new(1, 30, 64)]
        );
    }

    #[test]
    fn test_wide_label_written_to_both_members() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), MAPPING_FILE, "Channel_Bus_Aux,Type,MIDI Channel,CC_Number\n");
        write(
            dir.path(),
            MONO_STEREO_FILE,
            "Channel_Bus_Aux,Mono_Stereo\nAux 1,Stereo\n",
        );

        let mut surface = surface(dir.path(), DisplayMode::WideCombined);
        assert_eq!(
            surface.set_label(&ChannelKey::aux(2), "FX Return"),
            Some("FX Return".to_string())
        );
        assert_eq!(surface.label(&ChannelKey::aux(1)), "FX Return");
        assert_eq!(surface.label(&ChannelKey::aux(2)), "FX Return");
        assert_eq!(surface.set_label(&ChannelKey::master(), "Main"), None);

        let reloaded = ScribbleTable::load(&dir.path().join(SCRIBBLE_FILE));
        assert_eq!(reloaded.label(&ChannelKey::aux(2)), "FX Return");
    }

    #[test]
    fn test_same_mode_rebuild_keeps_wide_changes() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), MAPPING_FILE, "Channel_Bus_Aux,Type,MIDI Channel,CC_Number\n");
        write(
            dir.path(),
            MONO_STEREO_FILE,
            "Channel_Bus_Aux,Mono_Stereo\nChannel 1,Stereo\n",
        );

        let mut surface = surface(dir.path(), DisplayMode::LinkedPair);
        surface.set(ChannelKey::channel(1), ControlType::Fader, 10);
        surface.toggle_display_mode();
        surface.set(ChannelKey::channel(1), ControlType::Fader, 50);

        assert!(matches!(
            surface.set_display_mode(DisplayMode::WideCombined),
            ToggleOutcome::Toggled(_)
        ));
        assert_eq!(surface.display_mode(), DisplayMode::WideCombined);
        assert_eq!(surface.strip(&ChannelKey::channel(2)).unwrap().get_fader(), 50);

        surface.set_display_mode(DisplayMode::LinkedPair);
        assert_eq!(surface.display_mode(), DisplayMode::LinkedPair);
        assert_eq!(surface.strips().get(&ChannelKey::channel(1)).unwrap().get_fader(), 50);
        assert_eq!(surface.strips().get(&ChannelKey::channel(2)).unwrap().get_fader(), 50);
    }
}
