// Orchestration: the accompaniment layers for one section.
//
// Given the section's voiced chords, the orchestrator writes four layers:
//
// - harmony: each chord is re-struck in "breaths" whose maximum length
//   grows with intensity. Low and middle tiers leave an audible gap after
//   every breath; the top tier overlaps consecutive breaths slightly
//   instead. No breath is longer than `MAX_BREATH`.
// - bass: the chord root in octave 2. Long chords are split into equal
//   sub-notes so the bass never drones.
// - pad: root and fifth, each note capped at `PAD_MAX` seconds with a short
//   gap before the next.
// - rhythm: delegated to the song's shared `DrumPatternEngine`.
//
// `ensure_minimum_activity` then closes any silence of two seconds or more
// across these layers. Layer mix weights from the style are never applied
// to velocities; mixing is left to playback.

use crate::chord::ResolvedChord;
use crate::drums::DrumPatternEngine;
use crate::mode::pitch_in_octave;
use crate::score::{MIN_NOTE_DURATION, Note, Section, round_time, silent_gaps, velocity_from};
use crate::style::StylePreset;
use pulsegen_prng::SeededRandom;
use serde::{Deserialize, Serialize};

/// Longest harmony breath at any intensity.
pub const MAX_BREATH: f64 = 3.5;

const BASS_OCTAVE: i8 = 2;
const BASS_MAX: f64 = 2.5;

const PAD_OCTAVE: i8 = 3;
const PAD_MAX: f64 = 4.0;
const PAD_GAP: f64 = 0.2;

/// Silences at least this long are filled.
pub const MAX_SILENCE: f64 = 2.0;

const DRONE_VELOCITY: u8 = 36;
const FILL_KICK_VELOCITY: u8 = 45;

/// Load above which harmony voicings are thinned.
const THIN_VOICING_LOAD: f64 = 1.5;

/// Breath shape for one intensity tier.
#[derive(Debug, Clone, Copy, PartialEq)]
struct BreathTier {
    max: f64,
    /// Positive: silence after each breath. Negative: overlap into the next.
    gap: f64,
}

fn breath_tier(intensity: f64) -> BreathTier {
    if intensity < 0.4 {
        BreathTier {
            max: 0.6,
            gap: 0.25,
        }
    } else if intensity < 0.75 {
        BreathTier {
            max: 1.6,
            gap: 0.15,
        }
    } else {
        BreathTier {
            max: 3.4,
            gap: -0.05,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LayerRequest<'a> {
    pub section: &'a Section,
    pub chords: &'a [ResolvedChord],
    /// The section's lead melody.
    pub melody: &'a [Note],
    pub style: &'a StylePreset,
    pub total_load: f64,
}

/// The accompaniment layers of one section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Layers {
    pub harmony: Vec<Note>,
    pub bass: Vec<Note>,
    pub rhythm: Vec<Note>,
    pub pad: Vec<Note>,
}

impl Layers {
    pub fn all(&self) -> impl Iterator<Item = &Note> {
        self.harmony
            .iter()
            .chain(self.bass.iter())
            .chain(self.rhythm.iter())
            .chain(self.pad.iter())
    }
}

/// Write the harmony, bass, rhythm and pad layers for one section.
pub fn generate_layers(
    request: &LayerRequest<'_>,
    drums: &mut DrumPatternEngine,
    seed: u32,
) -> Layers {
    let mut rng = SeededRandom::new(seed);
    let section = request.section;
    let intensity = section.profile.intensity;
    let layers_cfg = &request.style.layers;

    let mut layers = Layers::default();
    if layers_cfg.harmony.is_some() {
        let thin = request.total_load > THIN_VOICING_LOAD;
        layers.harmony = harmony_layer(request.chords, intensity, thin, &mut rng);
    }
    if layers_cfg.bass.is_some() {
        layers.bass = bass_layer(request.chords, intensity);
    }
    if layers_cfg.pad.is_some() {
        layers.pad = pad_layer(request.chords, intensity);
    }
    if layers_cfg.rhythm.is_some() {
        let base_velocity = (70.0 + 40.0 * intensity).min(110.0);
        layers.rhythm = drums.generate_for_section(section, base_velocity);
    }

    section.confine_all(&mut layers.harmony);
    section.confine_all(&mut layers.bass);
    section.confine_all(&mut layers.pad);

    tracing::trace!(
        section = %section.id,
        melody = request.melody.len(),
        harmony = layers.harmony.len(),
        bass = layers.bass.len(),
        rhythm = layers.rhythm.len(),
        pad = layers.pad.len(),
        "layers"
    );
    layers
}

/// Keep the root and the three highest tones.
fn thin_voicing(notes: &[u8]) -> Vec<u8> {
    if notes.len() <= 4 {
        return notes.to_vec();
    }
    let mut thinned = vec![notes[0]];
    thinned.extend_from_slice(&notes[notes.len() - 3..]);
    thinned
}

fn harmony_layer(
    chords: &[ResolvedChord],
    intensity: f64,
    thin: bool,
    rng: &mut SeededRandom,
) -> Vec<Note> {
    let tier = breath_tier(intensity);
    let base_velocity = 50.0 + 30.0 * intensity;
    let mut notes = Vec::new();

    for chord in chords {
        let voicing = if thin {
            thin_voicing(&chord.notes)
        } else {
            chord.notes.clone()
        };
        let chord_end = round_time(chord.end_time());
        let mut t = chord.start_time;
        while t < chord_end - MIN_NOTE_DURATION {
            let segment_end = (t + tier.max).min(chord_end);
            let span = segment_end - t;
            let length = if tier.gap >= 0.0 {
                (span - tier.gap).max(MIN_NOTE_DURATION.max(span * 0.5))
            } else {
                (span - tier.gap).min(MAX_BREATH)
            };
            let velocity = velocity_from(base_velocity + rng.next_int(-4, 4) as f64);
            for &pitch in &voicing {
                notes.push(Note::new(pitch, velocity, t, length, 0));
            }
            t = round_time(segment_end);
        }
    }
    notes
}

fn bass_layer(chords: &[ResolvedChord], intensity: f64) -> Vec<Note> {
    let velocity = velocity_from(70.0 + 25.0 * intensity);
    let mut notes = Vec::new();
    for chord in chords {
        let pitch = pitch_in_octave(chord.root_pc(), BASS_OCTAVE);
        let pieces = (chord.duration / BASS_MAX).ceil().max(1.0) as usize;
        let piece = chord.duration / pieces as f64;
        let mut t = chord.start_time;
        for _ in 0..pieces {
            notes.push(Note::new(pitch, velocity, t, piece * 0.95, 0));
            t = round_time(t + piece);
        }
    }
    notes
}

fn pad_layer(chords: &[ResolvedChord], intensity: f64) -> Vec<Note> {
    let velocity = velocity_from(40.0 + 20.0 * intensity);
    let mut notes = Vec::new();
    for chord in chords {
        let root = pitch_in_octave(chord.root_pc(), PAD_OCTAVE);
        let fifth = root.saturating_add(7).min(127);
        let chord_end = round_time(chord.end_time());
        let mut t = chord.start_time;
        while t < chord_end - MIN_NOTE_DURATION {
            let length = PAD_MAX.min(chord_end - t);
            notes.push(Note::new(root, velocity, t, length, 0));
            notes.push(Note::new(fifth, velocity, t, length, 0));
            t = round_time(t + length + PAD_GAP);
        }
    }
    notes
}

/// Contiguous drone on the chord root over `[from, to)`.
fn drone(root_pc: u8, from: f64, to: f64) -> Vec<Note> {
    let pitch = pitch_in_octave(root_pc, PAD_OCTAVE);
    let mut notes = Vec::new();
    let mut t = round_time(from);
    while t < to - MIN_NOTE_DURATION {
        let length = PAD_MAX.min(to - t);
        notes.push(Note::new(pitch, DRONE_VELOCITY, t, length, 0));
        t = round_time(t + length);
    }
    notes
}

/// Fill every silence of `MAX_SILENCE` or more across the layers.
///
/// A quiet pad drone is preferred. Styles without a pad but with rhythm get
/// sparse kicks instead.
pub fn ensure_minimum_activity(
    section: &Section,
    layers: &mut Layers,
    chords: &[ResolvedChord],
    style: &StylePreset,
    drums: &DrumPatternEngine,
) {
    let gaps = silent_gaps(layers.all(), section.start_time, section.end_time(), MAX_SILENCE);
    if gaps.is_empty() {
        return;
    }
    tracing::debug!(section = %section.id, gaps = gaps.len(), "filling silence");

    let use_kicks = style.layers.pad.is_none() && style.layers.rhythm.is_some();
    for (from, to) in gaps {
        if use_kicks {
            let mut kicks = drums.sparse_kicks(from, to, FILL_KICK_VELOCITY);
            section.confine_all(&mut kicks);
            layers.rhythm.extend(kicks);
        } else {
            let root_pc = chords
                .iter()
                .find(|c| c.start_time <= from && from < c.end_time())
                .or(chords.last())
                .map_or(0, ResolvedChord::root_pc);
            let mut notes = drone(root_pc, from, to);
            section.confine_all(&mut notes);
            layers.pad.extend(notes);
        }
    }
    layers.rhythm.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));
    layers.pad.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));
}
