// Style presets: the read-only configuration a generation is driven by.
//
// A preset fixes tempo, meter, mode, fades, form family, voice-leading
// strategy, which layers are enabled (and their advisory mix weights), and
// the mood-keyed instrument pools the palette draws from, and the General
// MIDI programs its tracks are rendered with. Presets are
// resolved through the `StyleResolver` trait so callers can supply their own
// source; `StyleCatalog` is the bundled implementation, with built-in
// presets plus optional JSON catalogs loaded from disk.
//
// Unknown preset ids are a configuration error, recovered by falling back to
// the default preset with a warning.

use crate::error::Result;
use crate::mode::Mode;
use crate::score::TrackName;
use crate::structure::FormFamily;
use crate::voice_leading::VoiceLeadingStrategy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

pub const DEFAULT_STYLE_ID: &str = "cyberpunk-ambient";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSignature {
    pub beats_per_bar: u8,
    pub beat_unit: u8,
}

impl Default for TimeSignature {
    fn default() -> Self {
        TimeSignature {
            beats_per_bar: 4,
            beat_unit: 4,
        }
    }
}

/// An enabled layer. The mix weight is advisory and never rescales
/// velocities.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayerConfig {
    pub mix: f64,
}

impl LayerConfig {
    pub const fn mix(mix: f64) -> Option<LayerConfig> {
        Some(LayerConfig { mix })
    }
}

/// Which layers a style plays. `None` disables the layer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerSet {
    pub melody: Option<LayerConfig>,
    pub harmony: Option<LayerConfig>,
    pub bass: Option<LayerConfig>,
    pub pad: Option<LayerConfig>,
    pub rhythm: Option<LayerConfig>,
}

impl Default for LayerSet {
    fn default() -> Self {
        LayerSet {
            melody: LayerConfig::mix(0.8),
            harmony: LayerConfig::mix(0.6),
            bass: LayerConfig::mix(0.7),
            pad: LayerConfig::mix(0.5),
            rhythm: LayerConfig::mix(0.7),
        }
    }
}

/// Instrument keys grouped by mood and role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstrumentPools {
    /// Harmony instruments for the calm vibe.
    pub calm: Vec<String>,
    /// Harmony instruments for the energetic vibe.
    pub energetic: Vec<String>,
    pub bass_soft: Vec<String>,
    pub bass_hard: Vec<String>,
    pub drums_soft: Vec<String>,
    pub drums_hard: Vec<String>,
    /// Themed pools for melodic layers, keyed by theme name.
    pub melodic: BTreeMap<String, Vec<String>>,
}

fn keys(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for InstrumentPools {
    fn default() -> Self {
        let mut melodic = BTreeMap::new();
        melodic.insert("keys".into(), keys(&["piano", "electric_piano", "celesta"]));
        melodic.insert("plucks".into(), keys(&["pluck_synth", "harp", "marimba"]));
        melodic.insert("leads".into(), keys(&["saw_lead", "square_lead"]));
        melodic.insert("textures".into(), keys(&["glass_pad", "choir"]));
        InstrumentPools {
            calm: keys(&["warm_pad", "strings"]),
            energetic: keys(&["synth_stab", "brass_section"]),
            bass_soft: keys(&["sub_bass", "fingered_bass"]),
            bass_hard: keys(&["reese_bass", "saw_bass"]),
            drums_soft: keys(&["brush_kit", "lofi_kit"]),
            drums_hard: keys(&["808_kit", "electro_kit"]),
            melodic,
        }
    }
}

/// General MIDI program numbers (0-based) per layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgramPalette {
    /// One program per melodic layer, lead first.
    pub melody: [u8; 4],
    pub harmony: u8,
    pub bass: u8,
    pub pad: u8,
}

impl ProgramPalette {
    pub const GENERIC: ProgramPalette = ProgramPalette {
        melody: [0, 73, 11, 24],
        harmony: 48,
        bass: 33,
        pad: 89,
    };

    /// Program for a track; `None` for percussion.
    pub fn program_for(&self, track: TrackName) -> Option<u8> {
        match track {
            TrackName::Melody => Some(self.melody[0]),
            TrackName::Melody2 => Some(self.melody[1]),
            TrackName::Melody3 => Some(self.melody[2]),
            TrackName::Melody4 => Some(self.melody[3]),
            TrackName::Harmony => Some(self.harmony),
            TrackName::Bass => Some(self.bass),
            TrackName::Pad => Some(self.pad),
            TrackName::Rhythm => None,
        }
    }
}

impl Default for ProgramPalette {
    fn default() -> Self {
        ProgramPalette::GENERIC
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StylePreset {
    pub id: String,
    pub name: String,
    pub mode: Mode,
    /// Tonic pitch class; drawn from the seed when absent.
    pub key_root: Option<u8>,
    pub tempo_bpm: f64,
    pub time_signature: TimeSignature,
    pub fade_in: f64,
    pub fade_out: f64,
    pub punk_factor: f64,
    pub form_family: FormFamily,
    pub voice_leading: VoiceLeadingStrategy,
    pub layers: LayerSet,
    pub instrument_pools: InstrumentPools,
    pub programs: ProgramPalette,
}

impl Default for StylePreset {
    fn default() -> Self {
        StylePreset {
            id: "generic".into(),
            name: "Generic".into(),
            mode: Mode::Ionian,
            key_root: None,
            tempo_bpm: 110.0,
            time_signature: TimeSignature::default(),
            fade_in: 1.0,
            fade_out: 2.0,
            punk_factor: 0.3,
            form_family: FormFamily::Song,
            voice_leading: VoiceLeadingStrategy::Smooth,
            layers: LayerSet::default(),
            instrument_pools: InstrumentPools::default(),
            programs: ProgramPalette::GENERIC,
        }
    }
}

impl StylePreset {
    pub fn seconds_per_beat(&self) -> f64 {
        60.0 / self.tempo_bpm
    }

    pub fn seconds_per_bar(&self) -> f64 {
        self.seconds_per_beat() * self.time_signature.beats_per_bar as f64
    }

    /// Clamp numeric fields into usable ranges.
    pub fn sanitized(mut self) -> Self {
        if !self.tempo_bpm.is_finite() || self.tempo_bpm <= 0.0 {
            tracing::warn!(style = %self.id, tempo = self.tempo_bpm, "invalid tempo, using 110");
            self.tempo_bpm = 110.0;
        }
        self.tempo_bpm = self.tempo_bpm.clamp(30.0, 300.0);
        let meter = self.time_signature;
        if !(2..=4).contains(&meter.beats_per_bar) || !meter.beat_unit.is_power_of_two() {
            tracing::warn!(
                style = %self.id,
                beats = self.time_signature.beats_per_bar,
                "unsupported meter, using 4/4"
            );
            self.time_signature = TimeSignature::default();
        }
        self.fade_in = finite_or(self.fade_in, 0.0).max(0.0);
        self.fade_out = finite_or(self.fade_out, 0.0).max(0.0);
        self.punk_factor = finite_or(self.punk_factor, 0.0).clamp(0.0, 1.0);
        self.key_root = self.key_root.map(|k| k % 12);
        self
    }
}

fn finite_or(v: f64, fallback: f64) -> f64 {
    if v.is_finite() { v } else { fallback }
}

/// Source of style presets.
pub trait StyleResolver {
    fn resolve(&self, id: &str) -> Option<StylePreset>;
}

/// Resolve `id`, falling back to the default preset (and then the generic
/// preset) with a warning.
pub fn resolve_or_default(resolver: &impl StyleResolver, id: &str) -> StylePreset {
    if let Some(preset) = resolver.resolve(id) {
        return preset.sanitized();
    }
    tracing::warn!(style = id, fallback = DEFAULT_STYLE_ID, "unknown style preset");
    resolver
        .resolve(DEFAULT_STYLE_ID)
        .unwrap_or_default()
        .sanitized()
}

/// Presets keyed by id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StyleCatalog {
    pub presets: BTreeMap<String, StylePreset>,
}

impl StyleResolver for StyleCatalog {
    fn resolve(&self, id: &str) -> Option<StylePreset> {
        self.presets.get(id).cloned()
    }
}

impl StyleCatalog {
    /// The presets shipped with the generator.
    pub fn builtin() -> Self {
        let mut catalog = StyleCatalog::default();
        for preset in builtin_presets() {
            catalog.insert(preset);
        }
        catalog
    }

    pub fn insert(&mut self, preset: StylePreset) {
        self.presets.insert(preset.id.clone(), preset);
    }

    /// Parse a JSON array of presets.
    pub fn from_json(data: &str) -> Result<Self> {
        let presets: Vec<StylePreset> = serde_json::from_str(data)?;
        let mut catalog = StyleCatalog::default();
        for preset in presets {
            catalog.insert(preset);
        }
        Ok(catalog)
    }

    /// Load a JSON catalog from disk and layer it over the built-ins.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let loaded = StyleCatalog::from_json(&data)?;
        let mut catalog = StyleCatalog::builtin();
        for (_, preset) in loaded.presets {
            catalog.insert(preset);
        }
        Ok(catalog)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.presets.keys().map(String::as_str)
    }
}

fn builtin_presets() -> Vec<StylePreset> {
    let mut neon_melodic = BTreeMap::new();
    neon_melodic.insert("keys".into(), keys(&["electric_piano", "fm_bell"]));
    neon_melodic.insert("plucks".into(), keys(&["pluck_synth", "arp_synth"]));
    neon_melodic.insert("leads".into(), keys(&["saw_lead", "sync_lead"]));
    neon_melodic.insert("textures".into(), keys(&["glass_pad", "vocoder_choir"]));

    vec![
        StylePreset {
            id: DEFAULT_STYLE_ID.into(),
            name: "Cyberpunk Ambient".into(),
            mode: Mode::Aeolian,
            key_root: Some(9),
            tempo_bpm: 90.0,
            fade_in: 2.0,
            fade_out: 3.0,
            punk_factor: 0.4,
            form_family: FormFamily::Ambient,
            voice_leading: VoiceLeadingStrategy::Smooth,
            layers: LayerSet {
                melody: LayerConfig::mix(0.7),
                harmony: LayerConfig::mix(0.5),
                bass: LayerConfig::mix(0.6),
                pad: LayerConfig::mix(0.8),
                rhythm: LayerConfig::mix(0.4),
            },
            instrument_pools: InstrumentPools {
                calm: keys(&["warm_pad", "analog_strings"]),
                energetic: keys(&["synth_stab", "detuned_saw"]),
                bass_soft: keys(&["sub_bass"]),
                bass_hard: keys(&["reese_bass"]),
                drums_soft: keys(&["lofi_kit"]),
                drums_hard: keys(&["electro_kit"]),
                melodic: neon_melodic,
            },
            programs: ProgramPalette {
                melody: [81, 99, 88, 11],
                harmony: 89,
                bass: 38,
                pad: 95,
            },
            ..StylePreset::default()
        },
        StylePreset {
            id: "synthwave-drive".into(),
            name: "Synthwave Drive".into(),
            mode: Mode::Dorian,
            key_root: None,
            tempo_bpm: 118.0,
            punk_factor: 0.6,
            form_family: FormFamily::Electronic,
            voice_leading: VoiceLeadingStrategy::Parallel,
            programs: ProgramPalette {
                melody: [81, 87, 5, 98],
                harmony: 50,
                bass: 39,
                pad: 90,
            },
            ..StylePreset::default()
        },
        StylePreset {
            id: "lofi-study".into(),
            name: "Lo-fi Study".into(),
            mode: Mode::Dorian,
            key_root: Some(2),
            tempo_bpm: 78.0,
            punk_factor: 0.1,
            form_family: FormFamily::Song,
            voice_leading: VoiceLeadingStrategy::Oblique,
            layers: LayerSet {
                pad: None,
                ..LayerSet::default()
            },
            programs: ProgramPalette {
                melody: [4, 11, 24, 0],
                harmony: 4,
                bass: 33,
                pad: 89,
            },
            ..StylePreset::default()
        },
        StylePreset {
            id: "punk-pop".into(),
            name: "Punk Pop".into(),
            mode: Mode::Ionian,
            key_root: Some(4),
            tempo_bpm: 168.0,
            fade_in: 0.0,
            fade_out: 1.0,
            punk_factor: 0.9,
            form_family: FormFamily::Song,
            voice_leading: VoiceLeadingStrategy::Contrary,
            layers: LayerSet {
                pad: None,
                ..LayerSet::default()
            },
            programs: ProgramPalette {
                melody: [30, 29, 27, 80],
                harmony: 29,
                bass: 34,
                pad: 48,
            },
            ..StylePreset::default()
        },
        StylePreset {
            id: "drift-waltz".into(),
            name: "Drift Waltz".into(),
            mode: Mode::Lydian,
            key_root: Some(7),
            tempo_bpm: 96.0,
            time_signature: TimeSignature {
                beats_per_bar: 3,
                beat_unit: 4,
            },
            fade_in: 3.0,
            fade_out: 4.0,
            punk_factor: 0.0,
            form_family: FormFamily::Ambient,
            layers: LayerSet {
                rhythm: None,
                ..LayerSet::default()
            },
            programs: ProgramPalette {
                melody: [46, 73, 8, 11],
                harmony: 48,
                bass: 32,
                pad: 91,
            },
            ..StylePreset::default()
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_contains_default() {
        let catalog = StyleCatalog::builtin();
        let preset = catalog.resolve(DEFAULT_STYLE_ID).unwrap();
        assert_eq!(preset.mode, Mode::Aeolian);
        assert!(catalog.ids().count() >= 5);
    }

    #[test]
    fn test_unknown_style_falls_back() {
        let catalog = StyleCatalog::builtin();
        let preset = resolve_or_default(&catalog, "no-such-style");
        assert_eq!(preset.id, DEFAULT_STYLE_ID);

        let empty = StyleCatalog::default();
        assert_eq!(resolve_or_default(&empty, "anything").id, "generic");
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"[{"id": "tiny", "tempo_bpm": 140, "mode": "phrygian",
                        "layers": {"pad": null, "melody": {"mix": 0.9}}}]"#;
        let catalog = StyleCatalog::from_json(json).unwrap();
        let preset = catalog.resolve("tiny").unwrap();
        assert_eq!(preset.tempo_bpm, 140.0);
        assert_eq!(preset.mode, Mode::Phrygian);
        assert_eq!(preset.layers.pad, None);
        assert_eq!(preset.layers.melody, LayerConfig::mix(0.9));
        assert!(preset.layers.bass.is_some());
        assert_eq!(preset.time_signature.beats_per_bar, 4);
    }

    #[test]
    fn test_bad_json_is_an_error() {
        assert!(StyleCatalog::from_json("{not json").is_err());
    }

    #[test]
    fn test_sanitize() {
        let preset = StylePreset {
            tempo_bpm: f64::NAN,
            time_signature: TimeSignature {
                beats_per_bar: 7,
                beat_unit: 8,
            },
            punk_factor: 3.0,
            key_root: Some(14),
            ..StylePreset::default()
        }
        .sanitized();
        assert_eq!(preset.tempo_bpm, 110.0);
        assert_eq!(preset.time_signature, TimeSignature::default());
        assert_eq!(preset.punk_factor, 1.0);
        assert_eq!(preset.key_root, Some(2));
    }

    #[test]
    fn test_load_layers_over_builtins() {
        let dir = std::env::temp_dir().join(format!("pulsegen-style-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("styles.json");
        std::fs::write(&path, r#"[{"id": "custom", "tempo_bpm": 100}]"#).unwrap();
        let catalog = StyleCatalog::load(&path).unwrap();
        assert!(catalog.resolve("custom").is_some());
        assert!(catalog.resolve(DEFAULT_STYLE_ID).is_some());
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_json_preset_sets_its_own_programs() {
        let json = r#"[
            {"id": "organ", "programs": {"melody": [19, 20, 21, 22], "bass": 36}},
            {"id": "plain"}
        ]"#;
        let catalog = StyleCatalog::from_json(json).unwrap();
        let organ = catalog.resolve("organ").unwrap().programs;
        assert_eq!(organ.program_for(TrackName::Melody), Some(19));
        assert_eq!(organ.program_for(TrackName::Melody4), Some(22));
        assert_eq!(organ.program_for(TrackName::Bass), Some(36));
        assert_eq!(organ.harmony, ProgramPalette::GENERIC.harmony);
        assert_eq!(organ.program_for(TrackName::Rhythm), None);

        let plain = catalog.resolve("plain").unwrap();
        assert_eq!(plain.programs, ProgramPalette::GENERIC);
    }

    #[test]
    fn test_builtin_programs_differ_per_style() {
        let catalog = StyleCatalog::builtin();
        let cyber = catalog.resolve(DEFAULT_STYLE_ID).unwrap().programs;
        let punk = catalog.resolve("punk-pop").unwrap().programs;
        assert_ne!(cyber, punk);
        assert_eq!(punk.program_for(TrackName::Melody), Some(30));
    }
}
