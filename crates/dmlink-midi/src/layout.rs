//! Strip layout for a display mode
//!
//! Decides which strips exist, how they are titled and which pairs are
//! linked. In linked-pair mode a stereo pair is two strips (`Ch 1 L`,
//! `Ch 2 R`); in wide mode it is one strip keyed by the left member that
//! also stands for the right (`CH 1-2`).

use crate::stereo::StereoLinkRegistry;
use crate::strip::{ChannelKind, ChannelStripState, StripBank};
use crate::types::{ChannelKey, DisplayMode, Section};

/// One strip to be created
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StripDescriptor {
    pub key: ChannelKey,
    pub kind: ChannelKind,
    pub title: String,
    /// Caption above the pan control: "Bal" for stereo, otherwise "Pan"
    pub pan_label: &'static str,
    /// Linked partner (linked-pair mode only)
    pub partner: Option<ChannelKey>,
    /// Right member represented by this strip (wide mode only)
    pub absorbs: Option<ChannelKey>,
}

impl StripDescriptor {
    /// Every logical channel this strip stands for
    pub fn covers(&self) -> impl Iterator<Item = &ChannelKey> {
        std::iter::once(&self.key).chain(self.absorbs.as_ref())
    }

    pub fn is_wide(&self) -> bool {
        self.absorbs.is_some()
    }
}

/// Ordered strip set for one display mode
#[derive(Debug, Clone)]
pub struct StripLayout {
    mode: DisplayMode,
    strips: Vec<StripDescriptor>,
}

impl StripLayout {
    /// Lay out Channels, Buses, Auxes and the Master for `mode`
    pub fn build(mode: DisplayMode, registry: &StereoLinkRegistry) -> Self {
        let mut strips = Vec::new();

        for section in Section::STEREO_SECTIONS {
            let max = section.max_number().unwrap_or(0);
            for number in 1..=max {
                let key = ChannelKey::new(section.clone(), number);
                if let Some(strip) = describe(&key, mode, registry) {
                    strips.push(strip);
                }
            }
        }

        strips.push(StripDescriptor {
            key: ChannelKey::master(),
            kind: ChannelKind::MASTER,
            title: "Main".to_string(),
            pan_label: "Pan",
            partner: None,
            absorbs: None,
        });

        Self { mode, strips }
    }

    pub fn mode(&self) -> DisplayMode {
        self.mode
    }

    pub fn strips(&self) -> &[StripDescriptor] {
        &self.strips
    }

    pub fn get(&self, key: &ChannelKey) -> Option<&StripDescriptor> {
        self.strips.iter().find(|s| &s.key == key)
    }

    /// Strip currently standing for `key` (the wide strip for an absorbed right)
    pub fn strip_for(&self, key: &ChannelKey) -> Option<&StripDescriptor> {
        self.strips.iter().find(|s| s.covers().any(|k| k == key))
    }

    /// Create a fresh strip for every descriptor (initial values, unlinked)
    pub fn populate(&self, bank: &mut StripBank) {
        for strip in &self.strips {
            bank.insert(ChannelStripState::with_kind(strip.key.clone(), strip.kind));
        }
    }

    /// Link every described pair; returns the number of pairs linked
    pub fn link(&self, bank: &mut StripBank) -> usize {
        self.strips
            .iter()
            .filter_map(|s| s.partner.as_ref().map(|p| (&s.key, p)))
            .filter(|(key, partner)| key.number < partner.number)
            .filter(|(key, partner)| bank.link(key, partner))
            .count()
    }
}

fn describe(
    key: &ChannelKey,
    mode: DisplayMode,
    registry: &StereoLinkRegistry,
) -> Option<StripDescriptor> {
    let kind = ChannelKind::for_section(&key.section);
    let paired = registry.is_paired(key);
    let pan_label = if paired { "Bal" } else { "Pan" };
    let partner = registry.partner_of(key).cloned();

    let (title, partner, absorbs) = match mode {
        DisplayMode::WideCombined if registry.is_right(key) => return None,
        DisplayMode::WideCombined if paired => {
            let right = partner?;
            let title = format!("{} {}-{}", short_title(&key.section), key.number, right.number);
            (title, None, Some(right))
        }
        DisplayMode::LinkedPair if paired => {
            let side = if registry.is_left(key) { "L" } else { "R" };
            let title = format!("{} {} {}", pair_title(&key.section), key.number, side);
            (title, partner, None)
        }
        _ => (format!("{} {}", short_title(&key.section), key.number), None, None),
    };

    Some(StripDescriptor {
        key: key.clone(),
        kind,
        title,
        pan_label,
        partner,
        absorbs,
    })
}

fn short_title(section: &Section) -> &str {
    match section {
        Section::Channel => "CH",
        Section::Bus => "BUS",
        Section::Aux => "AUX",
        other => other.table_name(),
    }
}

fn pair_title(section: &Section) -> &str {
    match section {
        Section::Channel => "Ch",
        other => other.table_name(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> StereoLinkRegistry {
        StereoLinkRegistry::with_stereo([ChannelKey::channel(1), ChannelKey::bus(3)])
    }

    #[test]
    fn test_linked_layout_titles() {
        let layout = StripLayout::build(DisplayMode::LinkedPair, &registry());
        assert_eq!(layout.strips().len(), 64 + 24 + 12 + 1);

        let ch1 = layout.get(&ChannelKey::channel(1)).unwrap();
        assert_eq!(ch1.title, "Ch 1 L");
        assert_eq!(ch1.pan_label, "Bal");
        assert_eq!(ch1.partner, Some(ChannelKey::channel(2)));

        assert_eq!(layout.get(&ChannelKey::channel(2)).unwrap().title, "Ch 2 R");
        assert_eq!(layout.get(&ChannelKey::channel(3)).unwrap().title, "CH 3");
        assert_eq!(layout.get(&ChannelKey::channel(3)).unwrap().pan_label, "Pan");
        assert_eq!(layout.get(&ChannelKey::bus(4)).unwrap().title, "Bus 4 R");
        assert_eq!(layout.get(&ChannelKey::aux(1)).unwrap().title, "AUX 1");
        assert_eq!(layout.get(&ChannelKey::master()).unwrap().title, "Main");
    }

    #[test]
    fn test_wide_layout_absorbs_right() {
        let layout = StripLayout::build(DisplayMode::WideCombined, &registry());
        assert_eq!(layout.strips().len(), 64 + 24 + 12 + 1 - 2);
        assert!(layout.get(&ChannelKey::channel(2)).is_none());

        let wide = layout.get(&ChannelKey::channel(1)).unwrap();
        assert_eq!(wide.title, "CH 1-2");
        assert_eq!(wide.pan_label, "Bal");
        assert!(wide.partner.is_none());
        assert!(wide.is_wide());
        assert_eq!(layout.get(&ChannelKey::bus(3)).unwrap().title, "BUS 3-4");

        assert_eq!(
            layout.strip_for(&ChannelKey::channel(2)).map(|s| &s.key),
            Some(&ChannelKey::channel(1))
        );
    }

    #[test]
    fn test_populate_and_link() {
        let reg = registry();
        let mut bank = StripBank::new();

        let linked = StripLayout::build(DisplayMode::LinkedPair, &reg);
        linked.populate(&mut bank);
        assert_eq!(linked.link(&mut bank), 2);
        assert_eq!(
            bank.get(&ChannelKey::channel(2)).unwrap().partner(),
            Some(&ChannelKey::channel(1))
        );

        let mut wide_bank = StripBank::new();
        let wide = StripLayout::build(DisplayMode::WideCombined, &reg);
        wide.populate(&mut wide_bank);
        assert_eq!(wide.link(&mut wide_bank), 0);
        assert!(!wide_bank.contains(&ChannelKey::channel(2)));
    }
}
