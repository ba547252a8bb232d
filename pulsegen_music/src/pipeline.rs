// Top-level generation: parameters in, score and SMF bytes out.
//
// `generate` resolves the style and builds an immutable `GenerationContext`
// (key, tempo, risk, palette, melodic layers). It then plans the structure
// and walks the sections in order. Each section gets harmony first, then one
// melody per layer, then the supporting layers from the orchestrator, and is
// finally checked for long silences. Everything lands in a `Tracks`
// accumulator that the MIDI renderer consumes once at the end.
//
// Every random decision draws from a stream seeded from the generation seed
// plus a fixed offset, so streams never share state and a given seed always
// produces the same bytes. Section `i` seeds its harmony with `seed + i` and
// melody layer `l` with `seed + i + 1000 * (l + 1)`.

use crate::drums::{DrumPatternEngine, PatternId};
use crate::error::Result;
use crate::harmony::{HarmonyRequest, generate_chord_sequence};
use crate::melody::{MelodyRequest, generate_melody, recommend_instrument};
use crate::midi::{self, RenderOptions};
use crate::mode::Key;
use crate::orchestrator::{LayerRequest, ensure_minimum_activity, generate_layers};
use crate::palette::{
    InstrumentSelection, InstrumentType, MelodicLayer, SonicPalette, select_melodic_layers,
};
use crate::score::{SectionType, TrackName, Tracks};
use crate::structure::{Structure, StructureRequest, plan_structure};
use crate::style::{StylePreset, StyleResolver, resolve_or_default};
use pulsegen_prng::SeededRandom;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const STRUCTURE_STREAM: u32 = 0x5354_5255;
const PALETTE_STREAM: u32 = 0x5041_4c45;
const DRUM_STREAM: u32 = 0x4452_554d;
const ORCHESTRATION_STREAM: u32 = 0x4f52_4348;
const MELODY_LAYER_STRIDE: u32 = 1000;

/// Listener state that nudges the generator. All values in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Vitals {
    pub stress: f64,
    pub harmony: f64,
    pub creativity: f64,
}

impl Default for Vitals {
    fn default() -> Self {
        Vitals {
            stress: 0.5,
            harmony: 0.5,
            creativity: 0.5,
        }
    }
}

impl Vitals {
    fn clamped(self) -> Self {
        Vitals {
            stress: unit(self.stress, 0.5),
            harmony: unit(self.harmony, 0.5),
            creativity: unit(self.creativity, 0.5),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationParams {
    pub seed: u32,
    pub target_duration_seconds: f64,
    pub style_preset_id: String,
    pub complexity: f64,
    #[serde(default)]
    pub vitals: Option<Vitals>,
    /// Small start-time offsets in the rendered MIDI.
    #[serde(default = "default_humanize")]
    pub humanize: bool,
}

fn default_humanize() -> bool {
    true
}

impl Default for GenerationParams {
    fn default() -> Self {
        GenerationParams {
            seed: 0,
            target_duration_seconds: 60.0,
            style_preset_id: crate::style::DEFAULT_STYLE_ID.to_string(),
            complexity: 0.5,
            vitals: None,
            humanize: true,
        }
    }
}

fn unit(v: f64, fallback: f64) -> f64 {
    if v.is_finite() { v.clamp(0.0, 1.0) } else { fallback }
}

/// Song-wide decisions, made once before the section loop.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationContext {
    pub seed: u32,
    pub style: StylePreset,
    pub key: Key,
    pub tempo_bpm: f64,
    pub seconds_per_beat: f64,
    pub seconds_per_bar: f64,
    pub complexity: f64,
    pub vitals: Vitals,
    /// Punk factor adjusted by stress and creativity.
    pub risk: f64,
    pub palette: SonicPalette,
    pub melodic_layers: Vec<MelodicLayer>,
}

impl GenerationContext {
    pub fn new(params: &GenerationParams, style: StylePreset) -> Self {
        let seed = params.seed;
        let complexity = unit(params.complexity, 0.5);
        let vitals = params.vitals.unwrap_or_default().clamped();
        let risk = (style.punk_factor
            + 0.3 * (vitals.stress - 0.5)
            + 0.2 * (vitals.creativity - 0.5))
            .clamp(0.0, 1.0);
        let key_root = style.key_root.map(|r| r % 12).unwrap_or((seed % 12) as u8);
        let key = Key::new(key_root, style.mode);

        let mut rng = SeededRandom::new(seed.wrapping_add(PALETTE_STREAM));
        let palette = SonicPalette::build(&style, vitals.harmony, &mut rng);
        let melodic_layers =
            select_melodic_layers(&style, palette.vibe, complexity, vitals.creativity, &mut rng);

        GenerationContext {
            seed,
            tempo_bpm: style.tempo_bpm,
            seconds_per_beat: style.seconds_per_beat(),
            seconds_per_bar: style.seconds_per_bar(),
            style,
            key,
            complexity,
            vitals,
            risk,
            palette,
            melodic_layers,
        }
    }

    pub fn structure_request(&self, target_duration: f64) -> StructureRequest {
        StructureRequest {
            target_duration: if target_duration.is_finite() {
                target_duration.max(0.0)
            } else {
                0.0
            },
            tempo_bpm: self.tempo_bpm,
            beats_per_bar: self.style.time_signature.beats_per_bar,
            fade_in: self.style.fade_in,
            fade_out: self.style.fade_out,
            form_family: self.style.form_family,
            punk_factor: self.risk,
        }
    }

    /// Density of simultaneous material a section asks for.
    pub fn section_load(&self, harmonic_complexity: f64, melodic_density: f64) -> f64 {
        harmonic_complexity * self.complexity
            + melodic_density * self.melodic_layers.len() as f64 * 0.4
    }
}

/// One entry per emitted MIDI track, for the sample player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackMetadata {
    /// Position in the SMF; the tempo track is 0.
    pub empirical_index: usize,
    pub track_type: TrackName,
    pub instrument_key: String,
    pub instrument_type: InstrumentType,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub samples: Option<BTreeMap<u8, String>>,
}

impl TrackMetadata {
    fn new(
        empirical_index: usize,
        track_type: TrackName,
        instrument: &InstrumentSelection,
    ) -> Self {
        TrackMetadata {
            empirical_index,
            track_type,
            instrument_key: instrument.key.clone(),
            instrument_type: instrument.instrument_type,
            samples: instrument.samples.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionReport {
    pub id: String,
    pub section_type: SectionType,
    pub start_time: f64,
    pub duration: f64,
    pub bars: u32,
    pub chord_count: usize,
    pub total_load: f64,
    /// Suggested lead sound; advisory only.
    pub lead_instrument: String,
    pub bass_instrument: Option<String>,
    pub rhythm_instrument: Option<String>,
    pub drum_pattern: Option<PatternId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationOutput {
    #[serde(skip)]
    pub midi: Vec<u8>,
    pub track_metadata: Vec<TrackMetadata>,
    pub structure: Structure,
    pub tempo_bpm: f64,
    pub key_name: String,
    pub seed: u32,
    pub duration_seconds: f64,
    pub sections: Vec<SectionReport>,
    #[serde(skip)]
    pub tracks: Tracks,
}

/// Generate a complete song.
pub fn generate(
    params: &GenerationParams,
    styles: &impl StyleResolver,
) -> Result<GenerationOutput> {
    let style = resolve_or_default(styles, &params.style_preset_id);
    let ctx = GenerationContext::new(params, style);
    tracing::info!(
        seed = ctx.seed,
        style = %ctx.style.id,
        key = %ctx.key.name(),
        tempo = ctx.tempo_bpm,
        layers = ctx.melodic_layers.len(),
        vibe = ?ctx.palette.vibe,
        "generating"
    );

    let mut rng = SeededRandom::new(ctx.seed.wrapping_add(STRUCTURE_STREAM));
    let request = ctx.structure_request(params.target_duration_seconds);
    let structure = plan_structure(&request, &mut rng);
    tracing::info!(
        form = ?structure.form,
        sections = structure.sections.len(),
        bars = structure.total_bars,
        duration = structure.total_duration,
        "planned structure"
    );

    let mut drums = DrumPatternEngine::new(
        ctx.tempo_bpm,
        ctx.style.time_signature.beats_per_bar,
        ctx.seed.wrapping_add(DRUM_STREAM),
    );
    let mut tracks = Tracks::new();
    let mut reports = Vec::with_capacity(structure.sections.len());

    for (i, section) in structure.sections.iter().enumerate() {
        let section_seed = ctx.seed.wrapping_add(i as u32);
        let total_load = ctx.section_load(
            section.profile.harmonic_complexity,
            section.profile.melodic_density,
        );

        let chords = generate_chord_sequence(
            &HarmonyRequest {
                section,
                key_root: ctx.key.root,
                mode: ctx.key.mode,
                complexity: ctx.complexity,
                voice_leading: ctx.style.voice_leading,
                total_load,
                seconds_per_bar: ctx.seconds_per_bar,
            },
            section_seed,
        );

        let mut lead_instrument = recommend_instrument(section.section_type, &section.profile);
        let mut lead = Vec::new();
        for layer in &ctx.melodic_layers {
            let layer_seed =
                section_seed.wrapping_add(MELODY_LAYER_STRIDE.wrapping_mul(layer.index as u32 + 1));
            let output = generate_melody(
                &MelodyRequest {
                    section,
                    key_root: ctx.key.root,
                    mode: ctx.key.mode,
                    complexity: ctx.complexity,
                    contour: layer.contour,
                    range: layer.range,
                    seconds_per_beat: ctx.seconds_per_beat,
                    beats_per_bar: ctx.style.time_signature.beats_per_bar,
                },
                layer_seed,
            );
            if layer.index == 0 {
                lead_instrument = output.instrument_key;
                lead = output.notes.clone();
            }
            tracks.extend(layer.track, output.notes);
        }

        let mut layers = generate_layers(
            &LayerRequest {
                section,
                chords: &chords,
                melody: &lead,
                style: &ctx.style,
                total_load,
            },
            &mut drums,
            section_seed.wrapping_add(ORCHESTRATION_STREAM),
        );
        ensure_minimum_activity(section, &mut layers, &chords, &ctx.style, &drums);

        let intensity = section.profile.intensity;
        let has_bass = !layers.bass.is_empty();
        let has_rhythm = !layers.rhythm.is_empty();
        reports.push(SectionReport {
            id: section.id.clone(),
            section_type: section.section_type,
            start_time: section.start_time,
            duration: section.duration,
            bars: section.bars,
            chord_count: chords.len(),
            total_load,
            lead_instrument: lead_instrument.to_string(),
            bass_instrument: has_bass.then(|| ctx.palette.bass_for(intensity).key.clone()),
            rhythm_instrument: has_rhythm.then(|| ctx.palette.drums_for(intensity).key.clone()),
            drum_pattern: if has_rhythm { drums.last_pattern() } else { None },
        });
        tracing::debug!(
            section = %section.id,
            chords = chords.len(),
            load = total_load,
            "section done"
        );

        tracks.extend(TrackName::Harmony, layers.harmony);
        tracks.extend(TrackName::Bass, layers.bass);
        tracks.extend(TrackName::Rhythm, layers.rhythm);
        tracks.extend(TrackName::Pad, layers.pad);
    }

    let midi = midi::render(
        &tracks,
        &structure,
        &ctx.style,
        &RenderOptions {
            humanize: params.humanize,
            seed: ctx.seed,
        },
    )?;
    let track_metadata = track_metadata(&ctx, &structure, &tracks);
    tracing::info!(
        bytes = midi.len(),
        tracks = track_metadata.len(),
        notes = tracks.note_count(),
        "generation complete"
    );

    Ok(GenerationOutput {
        midi,
        track_metadata,
        tempo_bpm: ctx.tempo_bpm,
        key_name: ctx.key.name(),
        seed: ctx.seed,
        duration_seconds: structure.total_duration,
        structure,
        sections: reports,
        tracks,
    })
}

/// Metadata for every emitted track, in SMF order.
///
/// Bass and rhythm report the instrument of the most intense section.
pub fn track_metadata(
    ctx: &GenerationContext,
    structure: &Structure,
    tracks: &Tracks,
) -> Vec<TrackMetadata> {
    let peak = structure
        .sections
        .iter()
        .map(|s| s.profile.intensity)
        .fold(0.0, f64::max);

    midi::track_layout(tracks)
        .into_iter()
        .enumerate()
        .filter_map(|(i, (name, _))| {
            let instrument = match name {
                TrackName::Harmony => &ctx.palette.harmony,
                TrackName::Pad => &ctx.palette.pad,
                TrackName::Bass => ctx.palette.bass_for(peak),
                TrackName::Rhythm => ctx.palette.drums_for(peak),
                melodic => &ctx.melodic_layers.iter().find(|l| l.track == melodic)?.instrument,
            };
            Some(TrackMetadata::new(i + 1, name, instrument))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::StyleCatalog;

    fn params(seed: u32) -> GenerationParams {
        GenerationParams {
            seed,
            target_duration_seconds: 45.0,
            ..GenerationParams::default()
        }
    }

    #[test]
    fn test_risk_follows_vitals() {
        let style = StyleCatalog::builtin().resolve("cyberpunk-ambient").unwrap();
        let calm = GenerationContext::new(
            &GenerationParams {
                vitals: Some(Vitals {
                    stress: 0.0,
                    harmony: 0.5,
                    creativity: 0.0,
                }),
                ..params(1)
            },
            style.clone(),
        );
        let tense = GenerationContext::new(
            &GenerationParams {
                vitals: Some(Vitals {
                    stress: 1.0,
                    harmony: 0.5,
                    creativity: 1.0,
                }),
                ..params(1)
            },
            style,
        );
        assert!((calm.risk - 0.15).abs() < 1e-9);
        assert!((tense.risk - 0.65).abs() < 1e-9);
    }

    #[test]
    fn test_key_root_from_seed_when_style_has_none() {
        let style = StyleCatalog::builtin().resolve("synthwave-drive").unwrap();
        assert_eq!(style.key_root, None);
        let ctx = GenerationContext::new(&params(17), style);
        assert_eq!(ctx.key.root, 5);
    }

    #[test]
    fn test_complexity_is_clamped() {
        let ctx = GenerationContext::new(
            &GenerationParams {
                complexity: 3.0,
                ..params(2)
            },
            StylePreset::default(),
        );
        assert_eq!(ctx.complexity, 1.0);
        let ctx = GenerationContext::new(
            &GenerationParams {
                complexity: f64::NAN,
                ..params(2)
            },
            StylePreset::default(),
        );
        assert_eq!(ctx.complexity, 0.5);
    }

    #[test]
    fn test_metadata_indices_match_layout() {
        let output = generate(&params(9), &StyleCatalog::builtin()).unwrap();
        let layout = midi::track_layout(&output.tracks);
        assert_eq!(output.track_metadata.len(), layout.len());
        for (i, meta) in output.track_metadata.iter().enumerate() {
            assert_eq!(meta.empirical_index, i + 1);
            assert_eq!(meta.track_type, layout[i].0);
        }
        let rhythm = output
            .track_metadata
            .iter()
            .find(|m| m.track_type == TrackName::Rhythm);
        if let Some(rhythm) = rhythm {
            assert_eq!(rhythm.instrument_type, InstrumentType::Drumkit);
            assert!(rhythm.samples.is_some());
        }
    }

    #[test]
    fn test_metadata_json_keys() {
        let meta = TrackMetadata::new(3, TrackName::Bass, &InstrumentSelection::new("sub_bass"));
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["empiricalIndex"], 3);
        assert_eq!(json["trackType"], "bass");
        assert_eq!(json["instrumentKey"], "sub_bass");
        assert!(json.get("samples").is_none());
    }

    #[test]
    fn test_unknown_style_falls_back() {
        let output = generate(
            &GenerationParams {
                style_preset_id: "no-such-style".into(),
                ..params(4)
            },
            &StyleCatalog::builtin(),
        )
        .unwrap();
        assert_eq!(output.tempo_bpm, 90.0);
    }

    #[test]
    fn test_disabled_pad_never_emitted() {
        let output = generate(
            &GenerationParams {
                style_preset_id: "punk-pop".into(),
                ..params(5)
            },
            &StyleCatalog::builtin(),
        )
        .unwrap();
        assert!(output.tracks.get(TrackName::Pad).is_empty());
        assert!(
            output
                .track_metadata
                .iter()
                .all(|m| m.track_type != TrackName::Pad)
        );
    }
}
