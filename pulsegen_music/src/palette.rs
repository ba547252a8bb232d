// Instrument selection: the per-song sonic palette and the melodic layers.
//
// The palette is decided once per song. One seeded coin-flip picks the vibe
// (calm or energetic), which fixes the harmony instrument and the lead
// melody instrument for the whole song. Bass and drum kits are chosen per
// section by intensity from a soft/hard pair, so only those vary.
//
// Melodic layers (2-4 per song) are drawn from the style's themed pools with
// per-vibe theme weights. No instrument is used twice in one song. Empty
// pools fall back to built-in keys with a warning.

use crate::drums::{
    CLAP, CLOSED_HAT, CRASH, HIGH_TOM, KICK, LOW_TOM, MID_TOM, OPEN_HAT, RIDE, RIM, SNARE,
};
use crate::melody::{Contour, OctaveRange};
use crate::score::TrackName;
use crate::style::StylePreset;
use pulsegen_prng::SeededRandom;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Most melodic layers one song may carry.
pub const MAX_MELODIC_LAYERS: usize = 4;

/// Intensity at which bass and drums switch to the hard pool.
const HARD_INTENSITY: f64 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstrumentType {
    Oneshot,
    Multisample,
    Drumkit,
}

impl InstrumentType {
    pub fn for_key(key: &str) -> InstrumentType {
        if key.ends_with("_kit") {
            InstrumentType::Drumkit
        } else if ["stab", "pluck", "bell"].iter().any(|s| key.contains(s)) {
            InstrumentType::Oneshot
        } else {
            InstrumentType::Multisample
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstrumentSelection {
    pub key: String,
    pub instrument_type: InstrumentType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub samples: Option<BTreeMap<u8, String>>,
}

impl InstrumentSelection {
    pub fn new(key: &str) -> Self {
        let instrument_type = InstrumentType::for_key(key);
        let samples = (instrument_type == InstrumentType::Drumkit).then(|| drumkit_samples(key));
        InstrumentSelection {
            key: key.to_string(),
            instrument_type,
            samples,
        }
    }
}

/// Sample file for every percussion note the drum engine emits.
pub fn drumkit_samples(kit: &str) -> BTreeMap<u8, String> {
    [
        (KICK, "kick"),
        (RIM, "rim"),
        (SNARE, "snare"),
        (CLAP, "clap"),
        (CLOSED_HAT, "hat_closed"),
        (LOW_TOM, "tom_low"),
        (OPEN_HAT, "hat_open"),
        (MID_TOM, "tom_mid"),
        (CRASH, "crash"),
        (HIGH_TOM, "tom_high"),
        (RIDE, "ride"),
    ]
    .into_iter()
    .map(|(note, name)| (note, format!("{kit}/{name}.wav")))
    .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Vibe {
    Calm,
    Energetic,
}

impl Vibe {
    /// Relative weight of a melodic theme under this vibe.
    pub fn theme_weight(self, theme: &str) -> f64 {
        match (self, theme) {
            (Vibe::Calm, "keys") => 0.4,
            (Vibe::Calm, "textures") => 0.35,
            (Vibe::Calm, "plucks") => 0.2,
            (Vibe::Calm, "leads") => 0.05,
            (Vibe::Energetic, "leads") => 0.4,
            (Vibe::Energetic, "plucks") => 0.3,
            (Vibe::Energetic, "keys") => 0.2,
            (Vibe::Energetic, "textures") => 0.1,
            _ => 0.1,
        }
    }
}

/// Seeded pick from `pool`, or `fallback` with a warning.
fn pick_or_default(
    pool: &[String],
    rng: &mut SeededRandom,
    role: &str,
    fallback: &str,
) -> InstrumentSelection {
    match rng.choice(pool) {
        Some(key) => InstrumentSelection::new(key),
        None => {
            tracing::warn!(role, fallback, "empty instrument pool");
            InstrumentSelection::new(fallback)
        }
    }
}

/// Song-wide instrument choices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SonicPalette {
    pub vibe: Vibe,
    pub harmony: InstrumentSelection,
    pub pad: InstrumentSelection,
    pub bass_soft: InstrumentSelection,
    pub bass_hard: InstrumentSelection,
    pub drums_soft: InstrumentSelection,
    pub drums_hard: InstrumentSelection,
}

impl SonicPalette {
    /// Decide the palette. `harmony_bias` in [0, 1] leans the vibe toward calm.
    pub fn build(style: &StylePreset, harmony_bias: f64, rng: &mut SeededRandom) -> Self {
        let p_calm = (0.5 + 0.5 * (harmony_bias - 0.5)).clamp(0.1, 0.9);
        let vibe = if rng.random_bool(p_calm) {
            Vibe::Calm
        } else {
            Vibe::Energetic
        };
        let pools = &style.instrument_pools;
        let harmony = match vibe {
            Vibe::Calm => pick_or_default(&pools.calm, rng, "harmony", "warm_pad"),
            Vibe::Energetic => pick_or_default(&pools.energetic, rng, "harmony", "synth_stab"),
        };
        let pad = match pools.calm.first() {
            Some(key) if *key != harmony.key => InstrumentSelection::new(key),
            _ => InstrumentSelection::new("ambient_pad"),
        };
        SonicPalette {
            vibe,
            harmony,
            pad,
            bass_soft: pick_or_default(&pools.bass_soft, rng, "bass", "sub_bass"),
            bass_hard: pick_or_default(&pools.bass_hard, rng, "bass", "saw_bass"),
            drums_soft: pick_or_default(&pools.drums_soft, rng, "rhythm", "lofi_kit"),
            drums_hard: pick_or_default(&pools.drums_hard, rng, "rhythm", "electro_kit"),
        }
    }

    pub fn bass_for(&self, intensity: f64) -> &InstrumentSelection {
        if intensity >= HARD_INTENSITY {
            &self.bass_hard
        } else {
            &self.bass_soft
        }
    }

    pub fn drums_for(&self, intensity: f64) -> &InstrumentSelection {
        if intensity >= HARD_INTENSITY {
            &self.drums_hard
        } else {
            &self.drums_soft
        }
    }
}

/// One melodic voice of the song.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MelodicLayer {
    pub index: usize,
    pub track: TrackName,
    pub theme: String,
    pub instrument: InstrumentSelection,
    pub contour: Contour,
    pub range: OctaveRange,
}

fn layer_range(index: usize) -> OctaveRange {
    match index {
        0 => OctaveRange::new(4, 5),
        1 => OctaveRange::new(5, 6),
        2 => OctaveRange::new(3, 4),
        _ => OctaveRange::new(5, 6),
    }
}

/// How many melodic layers to use, in 2..=4.
pub fn layer_count(complexity: f64, creativity: f64, rng: &mut SeededRandom) -> usize {
    let drive = (0.6 * complexity + 0.4 * creativity).clamp(0.0, 1.0);
    let mut count = 2;
    if rng.random_bool(drive) {
        count += 1;
    }
    if drive > 0.7 && rng.random_bool(drive - 0.4) {
        count += 1;
    }
    count.min(MAX_MELODIC_LAYERS)
}

/// Pick the song's melodic layers. Returns no layers when the style has
/// melody disabled.
pub fn select_melodic_layers(
    style: &StylePreset,
    vibe: Vibe,
    complexity: f64,
    creativity: f64,
    rng: &mut SeededRandom,
) -> Vec<MelodicLayer> {
    if style.layers.melody.is_none() {
        return Vec::new();
    }
    let wanted = layer_count(complexity, creativity, rng);

    let mut candidates: Vec<(String, String)> = style
        .instrument_pools
        .melodic
        .iter()
        .flat_map(|(theme, keys)| keys.iter().map(move |k| (theme.clone(), k.clone())))
        .collect();
    if candidates.is_empty() {
        tracing::warn!(style = %style.id, "no melodic pools, using defaults");
        candidates = vec![
            ("leads".to_string(), "lead_synth".to_string()),
            ("keys".to_string(), "piano".to_string()),
        ];
    }

    let mut layers: Vec<MelodicLayer> = Vec::with_capacity(wanted);
    while layers.len() < wanted && !candidates.is_empty() {
        let weights: Vec<f64> = candidates
            .iter()
            .map(|(theme, _)| vibe.theme_weight(theme))
            .collect();
        let Some(picked) = rng.weighted_choice(&candidates, &weights).cloned() else {
            break;
        };
        candidates.retain(|(_, key)| *key != picked.1);

        let index = layers.len();
        let contour = if index == 0 {
            Contour::Arch
        } else {
            rng.choice(&Contour::ALL).copied().unwrap_or(Contour::Wave)
        };
        layers.push(MelodicLayer {
            index,
            track: TrackName::melodic_layer(index),
            theme: picked.0,
            instrument: InstrumentSelection::new(&picked.1),
            contour,
            range: layer_range(index),
        });
    }
    layers
}
