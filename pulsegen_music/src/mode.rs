// Modal scale support: mode definitions, scale selection and pitch naming.
//
// Style presets name a mode (ionian for bright pop, aeolian/dorian for the
// darker presets); the key root is a pitch class. Together they form a
// `Key`, which the harmony engine uses to pick a genre bucket and the melody
// engine uses to pick its scale.
//
// The melody engine narrows the scale as intensity falls: the full seven-note
// mode at high intensity, a five-note pentatonic subset otherwise. Both are
// exposed here as interval sets so callers never hand-roll scale tables.

use serde::{Deserialize, Serialize};

/// The seven diatonic modes, each defined by their interval pattern from the
/// tonic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Major scale.
    Ionian,
    /// Minor with a raised 6th.
    Dorian,
    /// Minor with a flat 2nd.
    Phrygian,
    /// Major with a raised 4th.
    Lydian,
    /// Major with a lowered 7th.
    Mixolydian,
    /// Natural minor.
    Aeolian,
    /// Diminished 5th over a flat 2nd; rarely used for whole songs.
    Locrian,
}

impl Mode {
    /// Semitone intervals from the tonic to each scale degree.
    pub fn intervals(self) -> [u8; 7] {
        match self {
            Mode::Ionian => [0, 2, 4, 5, 7, 9, 11],
            Mode::Dorian => [0, 2, 3, 5, 7, 9, 10],
            Mode::Phrygian => [0, 1, 3, 5, 7, 8, 10],
            Mode::Lydian => [0, 2, 4, 6, 7, 9, 11],
            Mode::Mixolydian => [0, 2, 4, 5, 7, 9, 10],
            Mode::Aeolian => [0, 2, 3, 5, 7, 8, 10],
            Mode::Locrian => [0, 1, 3, 5, 6, 8, 10],
        }
    }

    /// True when the third degree is a major third.
    pub fn is_major(self) -> bool {
        self.intervals()[2] == 4
    }

    /// Five-note subset: major pentatonic for major-third modes, minor
    /// pentatonic otherwise.
    pub fn pentatonic(self) -> [u8; 5] {
        if self.is_major() {
            [0, 2, 4, 7, 9]
        } else {
            [0, 3, 5, 7, 10]
        }
    }
}

/// A tonic pitch class plus a mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Key {
    /// Pitch class of the tonic (0 = C, 2 = D, ...).
    pub root: u8,
    pub mode: Mode,
}

impl Key {
    pub fn new(root: u8, mode: Mode) -> Self {
        Key {
            root: root % 12,
            mode,
        }
    }

    /// Check if a MIDI pitch belongs to the full mode.
    pub fn contains(&self, pitch: u8) -> bool {
        let pc = (pitch % 12 + 12 - self.root) % 12;
        self.mode.intervals().contains(&pc)
    }

    /// All pitches in `[low, high]` whose pitch class (relative to the tonic)
    /// is in `intervals`.
    pub fn pitches_in_range(&self, intervals: &[u8], low: u8, high: u8) -> Vec<u8> {
        (low..=high)
            .filter(|&p| intervals.contains(&((p % 12 + 12 - self.root) % 12)))
            .collect()
    }

    /// Snap a pitch to the nearest in-mode pitch, preferring downward on ties.
    pub fn snap(&self, pitch: u8) -> u8 {
        if self.contains(pitch) {
            return pitch;
        }
        for offset in 1u8..=6 {
            if pitch >= offset && self.contains(pitch - offset) {
                return pitch - offset;
            }
            if pitch <= 127 - offset && self.contains(pitch + offset) {
                return pitch + offset;
            }
        }
        pitch
    }

    /// Lowercase name such as "a aeolian".
    pub fn name(&self) -> String {
        format!("{} {:?}", pitch_class_name(self.root), self.mode).to_lowercase()
    }
}

/// Sharp-spelled name of a pitch class.
pub fn pitch_class_name(pc: u8) -> &'static str {
    const NAMES: [&str; 12] = [
        "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
    ];
    NAMES[(pc % 12) as usize]
}

/// MIDI octave of a pitch (C4 = 60 is octave 4).
pub fn octave_of(pitch: u8) -> i8 {
    (pitch / 12) as i8 - 1
}

/// Place a pitch class into a MIDI octave, clamped to the valid range.
pub fn pitch_in_octave(pc: u8, octave: i8) -> u8 {
    let raw = (octave as i16 + 1) * 12 + (pc % 12) as i16;
    raw.clamp(0, 127) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_a_aeolian_membership() {
        let key = Key::new(9, Mode::Aeolian);
        // A B C D E F G
        for p in [69, 71, 72, 74, 76, 77, 79] {
            assert!(key.contains(p), "{p} should be in A aeolian");
        }
        assert!(!key.contains(70)); // Bb
        assert!(!key.contains(78)); // F#
    }

    #[test]
    fn test_pentatonic_matches_mode_quality() {
        assert_eq!(Mode::Ionian.pentatonic(), [0, 2, 4, 7, 9]);
        assert_eq!(Mode::Dorian.pentatonic(), [0, 3, 5, 7, 10]);
        assert!(Mode::Mixolydian.is_major());
        assert!(!Mode::Phrygian.is_major());
    }

    #[test]
    fn test_pitches_in_range() {
        let key = Key::new(0, Mode::Ionian);
        let pent = key.pitches_in_range(&Mode::Ionian.pentatonic(), 60, 72);
        assert_eq!(pent, vec![60, 62, 64, 67, 69, 72]);
    }

    #[test]
    fn test_snap() {
        let key = Key::new(2, Mode::Dorian);
        assert_eq!(key.snap(62), 62);
        assert_eq!(key.snap(63), 62); // Eb -> D
        assert_eq!(key.snap(66), 65); // F# -> F
    }

    #[test]
    fn test_octave_helpers() {
        assert_eq!(octave_of(60), 4);
        assert_eq!(pitch_in_octave(9, 4), 69);
        assert_eq!(pitch_in_octave(0, 12), 127);
        assert_eq!(Key::new(9, Mode::Aeolian).name(), "a aeolian");
    }
}
