//! Display-mode controller
//!
//! Switches stereo pairs between linked-pair and wide layouts. A rebuild
//! captures every strip value, tears the bank down, lays it out again for
//! the new mode, re-links pairs and restores the captured values.
//!
//! Right members absorbed by a wide strip keep their own values on the
//! side. When the pair is split again each control returns to the right's
//! own value if the wide strip left it untouched, otherwise it takes the
//! wide strip's value.

use crate::layout::StripLayout;
use crate::stereo::StereoLinkRegistry;
use crate::strip::{ChannelStripValue, StripBank};
use crate::types::{ChannelKey, DisplayMode};
use std::collections::BTreeMap;

/// Rebuild guard state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebuildPhase {
    Idle,
    Rebuilding,
}

/// Summary of a completed rebuild
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebuildReport {
    pub mode: DisplayMode,
    pub strips: usize,
    pub linked_pairs: usize,
    /// Strips that received a captured value
    pub restored: usize,
}

/// Result of a toggle request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToggleOutcome {
    Toggled(RebuildReport),
    /// A rebuild was already in progress
    Ignored,
}

/// Values of an absorbed right member at the moment its pair went wide
#[derive(Debug, Clone, Copy)]
struct Absorbed {
    left: ChannelStripValue,
    right: ChannelStripValue,
}

pub struct DisplayModeController {
    mode: DisplayMode,
    phase: RebuildPhase,
    layout: StripLayout,
    absorbed: BTreeMap<ChannelKey, Absorbed>,
}

impl DisplayModeController {
    /// Lay out and link a fresh bank for `mode`
    pub fn new(mode: DisplayMode, registry: &StereoLinkRegistry, bank: &mut StripBank) -> Self {
        let layout = StripLayout::build(mode, registry);
        bank.clear();
        layout.populate(bank);
        let pairs = layout.link(bank);
        log::info!(
            "Display mode {}: {} strip(s), {} linked pair(s)",
            mode,
            bank.len(),
            pairs
        );
        Self {
            mode,
            phase: RebuildPhase::Idle,
            layout,
            absorbed: BTreeMap::new(),
        }
    }

    pub fn mode(&self) -> DisplayMode {
        self.mode
    }

    pub fn phase(&self) -> RebuildPhase {
        self.phase
    }

    pub fn layout(&self) -> &StripLayout {
        &self.layout
    }

    /// Enter the rebuilding phase; false if a rebuild is already running
    pub fn begin_rebuild(&mut self) -> bool {
        match self.phase {
            RebuildPhase::Idle => {
                self.phase = RebuildPhase::Rebuilding;
                true
            }
            RebuildPhase::Rebuilding => false,
        }
    }

    pub fn finish_rebuild(&mut self) {
        self.phase = RebuildPhase::Idle;
    }

    /// Switch to the other display mode, preserving all strip values
    pub fn toggle(&mut self, registry: &StereoLinkRegistry, bank: &mut StripBank) -> ToggleOutcome {
        self.rebuild(self.mode.toggled(), registry, bank)
    }

    /// Rebuild the bank for `mode` (which may equal the current mode)
    pub fn rebuild(
        &mut self,
        mode: DisplayMode,
        registry: &StereoLinkRegistry,
        bank: &mut StripBank,
    ) -> ToggleOutcome {
        if !self.begin_rebuild() {
            log::warn!("Display mode: rebuild already in progress, ignoring request");
            return ToggleOutcome::Ignored;
        }

        let snapshot = bank.capture();
        bank.clear();

        let layout = StripLayout::build(mode, registry);
        layout.populate(bank);
        let linked_pairs = layout.link(bank);

        let mut restored = 0;
        let mut absorbed = BTreeMap::new();
        for strip in layout.strips() {
            let value = match snapshot.get(&strip.key) {
                Some(value) => Some(*value),
                None => self.split_value(&strip.key, registry, &snapshot),
            };
            if let Some(value) = value {
                if bank.restore(&strip.key, value) {
                    restored += 1;
                }
            }

            // Remember what the absorbed right looked like before going wide.
            // A right already absorbed keeps its entry from when it was absorbed.
            if let (Some(right), Some(left)) = (&strip.absorbs, snapshot.get(&strip.key)) {
                let entry = match (snapshot.get(right), self.absorbed.get(right)) {
                    (Some(right_value), _) => Absorbed {
                        left: *left,
                        right: *right_value,
                    },
                    (None, Some(existing)) => *existing,
                    (None, None) => Absorbed {
                        left: *left,
                        right: *left,
                    },
                };
                absorbed.insert(right.clone(), entry);
            }
        }

        self.absorbed = absorbed;
        self.layout = layout;
        self.mode = mode;
        self.finish_rebuild();

        log::info!(
            "Display mode {}: rebuilt {} strip(s), {} linked pair(s), {} restored",
            mode,
            bank.len(),
            linked_pairs,
            restored
        );

        ToggleOutcome::Toggled(RebuildReport {
            mode,
            strips: bank.len(),
            linked_pairs,
            restored,
        })
    }

    /// Value for a right member re-appearing out of a wide strip
    fn split_value(
        &self,
        key: &ChannelKey,
        registry: &StereoLinkRegistry,
        snapshot: &BTreeMap<ChannelKey, ChannelStripValue>,
    ) -> Option<ChannelStripValue> {
        if !registry.is_right(key) {
            return None;
        }
        let wide = *snapshot.get(registry.left_of(key))?;
        let Some(before) = self.absorbed.get(key) else {
            return Some(wide);
        };

        Some(ChannelStripValue {
            fader: if wide.fader == before.left.fader {
                before.right.fader
            } else {
                wide.fader
            },
            pan: if wide.pan == before.left.pan {
                before.right.pan
            } else {
                wide.pan
            },
            mute: if wide.mute == before.left.mute {
                before.right.mute
            } else {
                wide.mute
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strip::{ControlValue, Propagation};
    use crate::types::ControlType;

    fn setup(mode: DisplayMode) -> (StereoLinkRegistry, StripBank, DisplayModeController) {
        let registry = StereoLinkRegistry::with_stereo([ChannelKey::channel(1), ChannelKey::aux(1)]);
        let mut bank = StripBank::new();
        let controller = DisplayModeController::new(mode, &registry, &mut bank);
        (registry, bank, controller)
    }

    fn set(bank: &mut StripBank, key: ChannelKey, control: ControlType, value: ControlValue) {
        bank.set(&key, control, value, Propagation::NoMidi);
    }

    #[test]
    fn test_round_trip_preserves_values() {
        let (registry, mut bank, mut controller) = setup(DisplayMode::LinkedPair);

        let mut n = 0;
        let keys: Vec<ChannelKey> = bank.iter().map(|s| s.key().clone()).collect();
        for key in keys {
            n = (n + 7) % 128;
            set(&mut bank, key.clone(), ControlType::Fader, ControlValue::Level(n));
            set(&mut bank, key.clone(), ControlType::Pan, ControlValue::Level(127 - n));
            set(&mut bank, key, ControlType::Mute, ControlValue::Switch(n % 2 == 0));
        }
        // Pair members diverge without mirroring
        bank.set(
            &ChannelKey::channel(2),
            ControlType::Pan,
            ControlValue::Level(5),
            Propagation::Silent,
        );
        let before = bank.capture();

        let outcome = controller.toggle(&registry, &mut bank);
        assert!(matches!(outcome, ToggleOutcome::Toggled(ref r) if r.mode == DisplayMode::WideCombined));
        assert_eq!(controller.mode(), DisplayMode::WideCombined);
        assert!(!bank.contains(&ChannelKey::channel(2)));

        controller.toggle(&registry, &mut bank);
        assert_eq!(controller.mode(), DisplayMode::LinkedPair);
        assert_eq!(bank.capture(), before);
        assert_eq!(
            bank.get(&ChannelKey::channel(2)).unwrap().partner(),
            Some(&ChannelKey::channel(1))
        );
    }

    #[test]
    fn test_change_in_wide_mode_reaches_right() {
        let (registry, mut bank, mut controller) = setup(DisplayMode::LinkedPair);
        controller.toggle(&registry, &mut bank);

        set(&mut bank, ChannelKey::channel(1), ControlType::Fader, ControlValue::Level(40));
        controller.toggle(&registry, &mut bank);

        assert_eq!(bank.get(&ChannelKey::channel(1)).unwrap().get_fader(), 40);
        assert_eq!(bank.get(&ChannelKey::channel(2)).unwrap().get_fader(), 40);
    }

    #[test]
    fn test_starting_wide_splits_from_left() {
        let (registry, mut bank, mut controller) = setup(DisplayMode::WideCombined);
        set(&mut bank, ChannelKey::aux(1), ControlType::Mute, ControlValue::Switch(true));

        controller.toggle(&registry, &mut bank);
        assert!(bank.get(&ChannelKey::aux(1)).unwrap().get_mute());
        assert!(bank.get(&ChannelKey::aux(2)).unwrap().get_mute());
    }

    #[test]
    fn test_nested_rebuild_is_ignored() {
        let (registry, mut bank, mut controller) = setup(DisplayMode::LinkedPair);
        assert!(controller.begin_rebuild());
        assert_eq!(controller.phase(), RebuildPhase::Rebuilding);

        let outcome = controller.toggle(&registry, &mut bank);
        assert_eq!(outcome, ToggleOutcome::Ignored);
        assert_eq!(controller.mode(), DisplayMode::LinkedPair);
        assert!(bank.contains(&ChannelKey::channel(2)));

        controller.finish_rebuild();
        assert!(matches!(
            controller.toggle(&registry, &mut bank),
            ToggleOutcome::Toggled(_)
        ));
        assert_eq!(controller.phase(), RebuildPhase::Idle);
    }
}
