//! Stereo link registry
//!
//! Reads the per-channel Mono/Stereo table and derives odd/even pairs. Only
//! the odd (left) member's tag decides whether a pair exists; the even
//! member's own tag is ignored.

use crate::config::{KeyedTable, MONO_STEREO_FILE};
use crate::types::{ChannelKey, Section};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Column holding the Mono/Stereo tag
pub const MONO_STEREO_COLUMN: &str = "Mono_Stereo";
/// Tag written for every channel of a generated table
pub const DEFAULT_TAG: &str = "Mono";
/// Tag (case-insensitive) that makes an odd channel the left of a pair
pub const STEREO_TAG: &str = "Stereo";

/// Pairing derived from the mono/stereo table
#[derive(Debug, Clone)]
pub struct StereoLinkRegistry {
    table: KeyedTable,
    /// Both directions: left → right and right → left
    partners: HashMap<ChannelKey, ChannelKey>,
}

impl StereoLinkRegistry {
    /// All-mono table covering every Channel, Bus and Aux
    pub fn generate_default() -> KeyedTable {
        KeyedTable::with_defaults(MONO_STEREO_COLUMN, DEFAULT_TAG)
    }

    /// Load the mono/stereo table, generating and saving an all-mono table if
    /// the file is missing or unreadable
    pub fn load(path: &Path) -> Self {
        let table = KeyedTable::load_or_create(path, MONO_STEREO_COLUMN, DEFAULT_TAG);
        let registry = Self::from_table(table);
        log::info!(
            "StereoLinkRegistry: {} stereo pair(s) from {:?}",
            registry.pair_count(),
            path
        );
        registry
    }

    /// Default location inside a data directory
    pub fn default_path(data_dir: &Path) -> PathBuf {
        data_dir.join(MONO_STEREO_FILE)
    }

    /// Derive pairs from a tag table
    pub fn from_table(table: KeyedTable) -> Self {
        let mut partners = HashMap::new();

        for section in Section::STEREO_SECTIONS {
            let max = section.max_number().unwrap_or(0);
            for left in (1..=max).step_by(2) {
                let left_key = ChannelKey::new(section.clone(), left);
                let right_key = left_key.with_number(left + 1);
                if table.get(&left_key).eq_ignore_ascii_case(STEREO_TAG) && left < max {
                    partners.insert(left_key.clone(), right_key.clone());
                    partners.insert(right_key, left_key);
                }
            }
        }

        Self { table, partners }
    }

    /// Registry with no stereo pairs
    pub fn all_mono() -> Self {
        Self::from_table(Self::generate_default())
    }

    /// Registry with the given left channels declared stereo
    pub fn with_stereo(lefts: impl IntoIterator<Item = ChannelKey>) -> Self {
        let mut table = Self::generate_default();
        for key in lefts {
            table.set(key, STEREO_TAG.to_string());
        }
        Self::from_table(table)
    }

    /// Persist the current tag table
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        self.table.save(path)
    }

    pub fn is_paired(&self, key: &ChannelKey) -> bool {
        self.partners.contains_key(key)
    }

    pub fn partner_of(&self, key: &ChannelKey) -> Option<&ChannelKey> {
        self.partners.get(key)
    }

    /// True iff `key` is odd-numbered and paired
    pub fn is_left(&self, key: &ChannelKey) -> bool {
        self.is_paired(key) && key.number % 2 == 1
    }

    /// True iff `key` is even-numbered and paired
    pub fn is_right(&self, key: &ChannelKey) -> bool {
        self.is_paired(key) && key.number % 2 == 0
    }

    /// Left member of the pair containing `key`, or `key` itself if unpaired
    pub fn left_of<'a>(&'a self, key: &'a ChannelKey) -> &'a ChannelKey {
        if self.is_right(key) {
            self.partner_of(key).unwrap_or(key)
        } else {
            key
        }
    }

    /// Raw Mono/Stereo tag for a channel
    pub fn tag(&self, key: &ChannelKey) -> &str {
        self.table.get(key)
    }

    pub fn pair_count(&self) -> usize {
        self.partners.len() / 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_all_mono() {
        let registry = StereoLinkRegistry::all_mono();
        assert_eq!(registry.pair_count(), 0);
        assert_eq!(registry.tag(&ChannelKey::channel(1)), "Mono");
        assert!(!registry.is_paired(&ChannelKey::channel(1)));
    }

    #[test]
    fn test_pairing_symmetry() {
        let registry = StereoLinkRegistry::with_stereo([
            ChannelKey::channel(1),
            ChannelKey::channel(63),
            ChannelKey::bus(23),
            ChannelKey::aux(5),
        ]);
        assert_eq!(registry.pair_count(), 4);

        for left in [
            ChannelKey::channel(1),
            ChannelKey::channel(63),
            ChannelKey::bus(23),
            ChannelKey::aux(5),
        ] {
            let right = left.with_number(left.number + 1);
            assert!(registry.is_paired(&left));
            assert!(registry.is_paired(&right));
            assert_eq!(registry.partner_of(&left), Some(&right));
            assert_eq!(registry.partner_of(&right), Some(&left));
            assert!(registry.is_left(&left));
            assert!(!registry.is_right(&left));
            assert!(registry.is_right(&right));
            assert!(!registry.is_left(&right));
            assert_eq!(registry.left_of(&right), &left);
            assert_eq!(registry.left_of(&left), &left);
        }
    }

    #[test]
    fn test_only_odd_tag_controls_pairing() {
        // Even member tagged Stereo on its own does not create a pair
        let registry = StereoLinkRegistry::with_stereo([ChannelKey::channel(2)]);
        assert!(!registry.is_paired(&ChannelKey::channel(1)));
        assert!(!registry.is_paired(&ChannelKey::channel(2)));
        assert!(!registry.is_paired(&ChannelKey::channel(3)));

        // Odd member tagged Stereo pairs regardless of the even member's tag
        let mut table = StereoLinkRegistry::generate_default();
        table.set(ChannelKey::channel(7), "stereo".to_string());
        table.set(ChannelKey::channel(8), "Mono".to_string());
        let registry = StereoLinkRegistry::from_table(table);
        assert_eq!(registry.partner_of(&ChannelKey::channel(8)), Some(&ChannelKey::channel(7)));
    }

    #[test]
    fn test_sections_do_not_cross() {
        let registry = StereoLinkRegistry::with_stereo([ChannelKey::bus(1)]);
        assert!(registry.is_paired(&ChannelKey::bus(2)));
        assert!(!registry.is_paired(&ChannelKey::channel(1)));
        assert!(!registry.is_paired(&ChannelKey::aux(2)));
        assert!(!registry.is_paired(&ChannelKey::master()));
    }

    #[test]
    fn test_load_generates_and_persists_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = StereoLinkRegistry::default_path(dir.path());

        let registry = StereoLinkRegistry::load(&path);
        assert_eq!(registry.pair_count(), 0);
        assert!(path.exists());
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 1 + 64 + 24 + 12);
    }

    #[test]
    fn test_load_reads_stereo_tags() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ms.csv");
        std::fs::write(
            &path,
            "Channel_Bus_Aux,Mono_Stereo\nChannel 3,STEREO\nAux 11,Stereo\nBus 2,Stereo\n",
        )
        .unwrap();

        let registry = StereoLinkRegistry::load(&path);
        assert_eq!(registry.pair_count(), 2);
        assert!(registry.is_left(&ChannelKey::channel(3)));
        assert!(registry.is_right(&ChannelKey::aux(12)));
        assert!(!registry.is_paired(&ChannelKey::bus(2)));
    }

    #[test]
    fn test_save_then_load_keeps_pairs() {
        let dir = tempfile::tempdir().unwrap();
        let path = StereoLinkRegistry::default_path(dir.path());

        let registry = StereoLinkRegistry::with_stereo([ChannelKey::channel(7), ChannelKey::bus(1)]);
        registry.save(&path).unwrap();

        let reloaded = StereoLinkRegistry::load(&path);
        assert_eq!(reloaded.pair_count(), 2);
        assert_eq!(
            reloaded.partner_of(&ChannelKey::channel(8)),
            Some(&ChannelKey::channel(7))
        );
        assert!(reloaded.is_paired(&ChannelKey::bus(2)));
        assert!(!reloaded.is_paired(&ChannelKey::aux(1)));
        assert_eq!(reloaded.tag(&ChannelKey::channel(7)), "Stereo");
    }
}
