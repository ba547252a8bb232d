// Chord construction: quality interval tables, extensions and inversions.
//
// `build_chord` expands a (root, quality) pair into a concrete pitch set.
// Extensions are layered by the complexity knob: a 7th past 0.3, a 9th past
// 0.6, and past 0.8 either an 11th or a 13th. The 11th/13th choice is a
// seeded coin-flip so that identical inputs voice identically.
//
// Template extensions (from progression.rs) are always added, regardless of
// complexity; they are part of the progression's identity.

use pulsegen_prng::SeededRandom;
use serde::{Deserialize, Serialize};

/// Chord qualities supported by the interval tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChordQuality {
    Major,
    Minor,
    Diminished,
    Augmented,
    Sus2,
    Sus4,
    Major7,
    Minor7,
    Dominant7,
    HalfDiminished7,
    Diminished7,
    Power,
}

impl ChordQuality {
    /// Semitones above the root for the basic chord.
    pub fn intervals(self) -> &'static [u8] {
        match self {
            ChordQuality::Major => &[0, 4, 7],
            ChordQuality::Minor => &[0, 3, 7],
            ChordQuality::Diminished => &[0, 3, 6],
            ChordQuality::Augmented => &[0, 4, 8],
            ChordQuality::Sus2 => &[0, 2, 7],
            ChordQuality::Sus4 => &[0, 5, 7],
            ChordQuality::Major7 => &[0, 4, 7, 11],
            ChordQuality::Minor7 => &[0, 3, 7, 10],
            ChordQuality::Dominant7 => &[0, 4, 7, 10],
            ChordQuality::HalfDiminished7 => &[0, 3, 6, 10],
            ChordQuality::Diminished7 => &[0, 3, 6, 9],
            ChordQuality::Power => &[0, 7],
        }
    }

    /// The 7th that complexity adds when the quality has none of its own.
    fn implied_seventh(self) -> u8 {
        match self {
            ChordQuality::Major | ChordQuality::Major7 | ChordQuality::Sus2 => 11,
            ChordQuality::Diminished | ChordQuality::Diminished7 => 9,
            _ => 10,
        }
    }

    /// Qualities whose 9th would clash with the chord's own tones.
    fn takes_ninth(self) -> bool {
        !matches!(self, ChordQuality::Sus2 | ChordQuality::Diminished7)
    }
}

/// One chord of a progression template, relative to the key.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChordTemplate {
    /// Semitones above the key's tonic (0–11).
    pub degree: u8,
    pub quality: ChordQuality,
    /// Extra tones, semitones above the root.
    pub extensions: &'static [u8],
    pub duration_in_bars: f64,
    /// Number of lowest tones raised by an octave.
    pub inversion: u8,
}

impl ChordTemplate {
    pub const fn new(degree: u8, quality: ChordQuality, duration_in_bars: f64) -> Self {
        ChordTemplate {
            degree,
            quality,
            extensions: &[],
            duration_in_bars,
            inversion: 0,
        }
    }

    pub const fn with_extensions(mut self, extensions: &'static [u8]) -> Self {
        self.extensions = extensions;
        self
    }

    pub const fn inverted(mut self, inversion: u8) -> Self {
        self.inversion = inversion;
        self
    }
}

/// A chord placed in time with concrete pitches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedChord {
    /// Sounding pitches, ascending.
    pub notes: Vec<u8>,
    /// The root as a MIDI pitch (not necessarily the lowest note).
    pub root: u8,
    pub start_time: f64,
    pub duration: f64,
}

impl ResolvedChord {
    pub fn root_pc(&self) -> u8 {
        self.root % 12
    }

    pub fn end_time(&self) -> f64 {
        self.start_time + self.duration
    }
}

/// Build the pitch set for a chord.
///
/// `root` is a MIDI pitch; results are ascending, deduplicated and clamped
/// to 0..=127. Draws from `rng` only when complexity exceeds 0.8.
pub fn build_chord(
    root: u8,
    quality: ChordQuality,
    extensions: &[u8],
    complexity: f64,
    rng: &mut SeededRandom,
) -> Vec<u8> {
    let mut intervals: Vec<u8> = quality.intervals().to_vec();

    if complexity > 0.3 && intervals.len() < 4 && quality != ChordQuality::Power {
        intervals.push(quality.implied_seventh());
    }
    if complexity > 0.6 && quality.takes_ninth() {
        intervals.push(14);
    }
    if complexity > 0.8 {
        // 13th or 11th, decided by the stream.
        let top = if rng.random_bool(0.5) { 21 } else { 17 };
        intervals.push(top);
    }
    intervals.extend_from_slice(extensions);

    let mut notes: Vec<u8> = intervals
        .iter()
        .map(|&iv| (root as u16 + iv as u16).min(127) as u8)
        .collect();
    notes.sort_unstable();
    notes.dedup();
    notes
}

/// Raise the lowest `inversion` tones by an octave.
pub fn invert(notes: &[u8], inversion: u8) -> Vec<u8> {
    let mut out = notes.to_vec();
    out.sort_unstable();
    for _ in 0..inversion.min(out.len().saturating_sub(1) as u8) {
        let low = out.remove(0);
        out.push(low.saturating_add(12).min(127));
    }
    out.sort_unstable();
    out.dedup();
    out
}
