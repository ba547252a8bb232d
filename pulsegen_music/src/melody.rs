// Melody engine: motif generation, phrase development and contour shaping.
//
// One call produces the notes of one melodic layer for one section:
//
// 1. Motif: 3-4 events drawn from the key's scale (full mode at high
//    intensity, pentatonic otherwise) under a maximum-leap rule. Each step
//    has a 20% chance of being a rest instead of a note. A draw that leaps
//    too far is redrawn up to 10 times, then replaced by a step of two
//    semitones from the previous pitch. Very intense sections end the motif
//    on a dramatic leap.
// 2. Phrase: the motif repeats until the section is full. Roughly 30% of
//    repetitions after the first are transposed by a consonant interval.
//    Notes landing near the middle of a beat are swung late.
// 3. Contour: a final pass maps each note's position in the phrase through
//    a named curve onto the allowed octave range. Only the octave changes.
//
// The lead instrument is a pure function of the section, with no draws.

use crate::mode::{Key, Mode, octave_of, pitch_in_octave};
use crate::score::{
    MIN_NOTE_DURATION, Note, Section, SectionProfile, SectionType, round_time, velocity_from,
};
use pulsegen_prng::SeededRandom;
use serde::{Deserialize, Serialize};

pub const LEAD_AGGRESSIVE: &str = "lead_aggressive";
pub const LEAD_ETHEREAL: &str = "lead_ethereal";
pub const LEAD_NEUTRAL: &str = "lead_neutral";

/// Maximum redraws before the stepwise fallback.
const MAX_REDRAWS: usize = 10;

/// Probability of a rest in place of a motif note.
const REST_PROBABILITY: f64 = 0.2;

/// Probability that a repetition (after the first) is transposed.
const TRANSPOSE_PROBABILITY: f64 = 0.3;

const TRANSPOSITIONS: [i8; 6] = [-5, -3, -2, 2, 3, 5];

/// Swing delay, as a fraction of a beat.
const SWING: f64 = 0.08;

/// Golden-ratio position of the arch contour's peak.
const ARCH_PEAK: f64 = 0.618;

/// Octave-assignment curve applied over a phrase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Contour {
    Ascending,
    Descending,
    Arch,
    Valley,
    Wave,
    Static,
}

impl Contour {
    pub const ALL: [Contour; 6] = [
        Contour::Ascending,
        Contour::Descending,
        Contour::Arch,
        Contour::Valley,
        Contour::Wave,
        Contour::Static,
    ];

    /// Height in [0, 1] at phrase position `pos` in [0, 1].
    pub fn height(self, pos: f64) -> f64 {
        let pos = pos.clamp(0.0, 1.0);
        match self {
            Contour::Ascending => pos,
            Contour::Descending => 1.0 - pos,
            Contour::Arch => arch(pos),
            Contour::Valley => 1.0 - arch(pos),
            // Two full cycles.
            Contour::Wave => 0.5 - 0.5 * (4.0 * std::f64::consts::PI * pos).cos(),
            Contour::Static => 0.5,
        }
    }
}

fn arch(pos: f64) -> f64 {
    if pos <= ARCH_PEAK {
        pos / ARCH_PEAK
    } else {
        (1.0 - pos) / (1.0 - ARCH_PEAK)
    }
}

/// Inclusive MIDI octave span a layer may occupy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OctaveRange {
    pub low: i8,
    pub high: i8,
}

impl OctaveRange {
    pub fn new(low: i8, high: i8) -> Self {
        OctaveRange {
            low: low.min(high),
            high: low.max(high),
        }
    }

    fn middle(&self) -> i8 {
        (self.low + self.high) / 2
    }

    fn lowest_pitch(&self) -> u8 {
        pitch_in_octave(0, self.low)
    }

    fn highest_pitch(&self) -> u8 {
        pitch_in_octave(11, self.high)
    }
}

#[derive(Debug, Clone)]
pub struct MelodyRequest<'a> {
    pub section: &'a Section,
    pub key_root: u8,
    pub mode: Mode,
    pub complexity: f64,
    pub contour: Contour,
    pub range: OctaveRange,
    pub seconds_per_beat: f64,
    pub beats_per_bar: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MelodyOutput {
    pub notes: Vec<Note>,
    pub instrument_key: &'static str,
}

/// Lead instrument for a section. Deterministic; consumes no draws.
pub fn recommend_instrument(section_type: SectionType, profile: &SectionProfile) -> &'static str {
    let climactic_type = matches!(section_type, SectionType::Chorus | SectionType::Drop);
    if profile.characteristics.climactic
        || profile.intensity >= 0.75
        || (climactic_type && profile.intensity >= 0.6)
    {
        LEAD_AGGRESSIVE
    } else if profile.characteristics.atmospheric {
        LEAD_ETHEREAL
    } else {
        LEAD_NEUTRAL
    }
}

/// One motif event: a pitch, or a rest when `pitch` is `None`.
#[derive(Debug, Clone, Copy, PartialEq)]
struct MotifEvent {
    pitch: Option<u8>,
    beats: f64,
    velocity: u8,
}

/// Note lengths in beats for the section's context.
fn duration_pool(section_type: SectionType, profile: &SectionProfile) -> &'static [f64] {
    if matches!(section_type, SectionType::Intro | SectionType::Outro)
        || profile.characteristics.atmospheric
    {
        &[2.0, 3.0, 4.0]
    } else if profile.characteristics.climactic
        || matches!(section_type, SectionType::Chorus | SectionType::Drop)
    {
        &[0.5, 0.75, 1.0]
    } else {
        &[1.0, 1.5, 2.0]
    }
}

/// Largest interval between consecutive motif notes, in semitones.
pub fn max_leap(intensity: f64) -> u8 {
    5 + (7.0 * intensity.clamp(0.0, 1.0)).round() as u8
}

fn generate_motif(
    request: &MelodyRequest<'_>,
    key: &Key,
    rng: &mut SeededRandom,
) -> Vec<MotifEvent> {
    let profile = &request.section.profile;
    let intensity = profile.intensity;
    let scale: Vec<u8> = if intensity >= 0.6 {
        request.mode.intervals().to_vec()
    } else {
        request.mode.pentatonic().to_vec()
    };
    let pool = key.pitches_in_range(
        &scale,
        request.range.lowest_pitch(),
        request.range.highest_pitch(),
    );
    let leap = max_leap(intensity) as i16;
    let durations = duration_pool(request.section.section_type, profile);
    let base_velocity = 60.0 + 40.0 * intensity;
    let jitter = (2.0 + 4.0 * request.complexity.clamp(0.0, 1.0)).round() as i64;

    let len = rng.next_int(3, 4) as usize;
    let mut prev = key.snap(pitch_in_octave(key.root, request.range.middle()));
    let mut events = Vec::with_capacity(len);

    for i in 0..len {
        let beats = rng.choice(durations).copied().unwrap_or(1.0) * rng.range_f64(0.9, 1.1);

        if i > 0 && rng.random_bool(REST_PROBABILITY) {
            events.push(MotifEvent {
                pitch: None,
                beats,
                velocity: 0,
            });
            continue;
        }

        let mut pitch = None;
        for _ in 0..MAX_REDRAWS {
            let Some(&candidate) = rng.choice(&pool) else {
                break;
            };
            if (candidate as i16 - prev as i16).abs() <= leap {
                pitch = Some(candidate);
                break;
            }
        }
        let mut pitch = pitch.unwrap_or_else(|| {
            let step: i16 = if rng.random_bool(0.5) { 2 } else { -2 };
            (prev as i16 + step).clamp(0, 127) as u8
        });

        if i == len - 1 && intensity > 0.85 {
            let dramatic = if rng.random_bool(0.5) { 7 } else { 12 };
            pitch = pitch.saturating_add(dramatic).min(127);
        }

        // Arch: louder toward the motif's midpoint.
        let pos = i as f64 / (len - 1) as f64;
        let shape = 1.0 - (pos - 0.5).abs() * 2.0;
        let velocity = base_velocity * (0.85 + 0.15 * shape) + rng.next_int(-jitter, jitter) as f64;

        events.push(MotifEvent {
            pitch: Some(pitch),
            beats,
            velocity: velocity_from(velocity),
        });
        prev = pitch;
    }
    events
}

/// Generate one melodic layer for one section.
pub fn generate_melody(request: &MelodyRequest<'_>, seed: u32) -> MelodyOutput {
    let mut rng = SeededRandom::new(seed);
    let section = request.section;
    let instrument_key = recommend_instrument(section.section_type, &section.profile);
    let key = Key::new(request.key_root, request.mode);
    let motif = generate_motif(request, &key, &mut rng);

    let spb = request.seconds_per_beat;
    let beats_per_bar = request.beats_per_bar.max(1) as f64;
    let section_end = section.end_time();
    let breath_beats = if section.profile.melodic_density < 0.4 {
        beats_per_bar
    } else if section.profile.melodic_density < 0.7 {
        1.0
    } else {
        0.0
    };

    let mut notes = Vec::new();
    let mut t = section.start_time;
    let mut repetition = 0usize;

    'phrase: while t < section_end - MIN_NOTE_DURATION {
        let transpose = if repetition > 0 && rng.random_bool(TRANSPOSE_PROBABILITY) {
            rng.choice(&TRANSPOSITIONS).copied().unwrap_or(0)
        } else {
            0
        };

        for event in &motif {
            if t >= section_end - MIN_NOTE_DURATION {
                break 'phrase;
            }
            let length = round_time(event.beats * spb);
            if let Some(pitch) = event.pitch {
                let beat_pos = (t - section.start_time) / spb;
                let mut onset = t;
                if (beat_pos.fract() - 0.5).abs() < 0.1 {
                    onset = round_time(onset + SWING * spb);
                }
                let mut velocity = event.velocity;
                if (beat_pos % beats_per_bar) < 0.05 {
                    velocity = velocity.saturating_add(8).min(127);
                }
                let pitch = (pitch as i16 + transpose as i16).clamp(0, 127) as u8;
                notes.push(Note::new(pitch, velocity, onset, length * 0.95, 0));
            }
            t = round_time(t + length);
        }
        t = round_time(t + breath_beats * spb);
        repetition += 1;
    }

    apply_contour(&mut notes, request.contour, request.range);
    section.confine_all(&mut notes);

    MelodyOutput {
        notes,
        instrument_key,
    }
}

/// Reassign octaves along `contour`, keeping every pitch class.
pub fn apply_contour(notes: &mut [Note], contour: Contour, range: OctaveRange) {
    let n = notes.len();
    if n == 0 {
        return;
    }
    let span = (range.high - range.low) as f64;
    for (i, note) in notes.iter_mut().enumerate() {
        let pos = if n == 1 { 0.5 } else { i as f64 / (n - 1) as f64 };
        let octave = range.low + (contour.height(pos) * span).round() as i8;
        let moved = pitch_in_octave(note.pitch % 12, octave);
        // Clamping at the top of the MIDI range may change the pitch class;
        // step down an octave instead.
        note.pitch = if moved % 12 == note.pitch % 12 {
            moved
        } else {
            pitch_in_octave(note.pitch % 12, octave_of(moved) - 1)
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::score::{Characteristics, Transition, TransitionCharacteristics, TransitionType};

    fn section(section_type: SectionType, intensity: f64, bars: u32) -> Section {
        Section {
            id: format!("{}-0", section_type),
            section_type,
            index: 0,
            start_time: 2.0,
            duration: round_time(bars as f64 * 2.0),
            bars,
            profile: SectionProfile {
                intensity,
                melodic_density: 0.6,
                ..SectionProfile::default()
            },
            transition: Transition {
                transition_type: TransitionType::Cut,
                duration: 1.0,
                characteristics: TransitionCharacteristics::default(),
            },
        }
    }

    fn request(section: &Section, contour: Contour) -> MelodyRequest<'_> {
        MelodyRequest {
            section,
            key_root: 2,
            mode: Mode::Dorian,
            complexity: 0.5,
            contour,
            range: OctaveRange::new(4, 5),
            seconds_per_beat: 0.5,
            beats_per_bar: 4,
        }
    }

    #[test]
    fn test_instrument_is_pure() {
        let calm = SectionProfile::default();
        assert_eq!(recommend_instrument(SectionType::Verse, &calm), LEAD_NEUTRAL);

        let hot = SectionProfile {
            intensity: 0.9,
            ..SectionProfile::default()
        };
        assert_eq!(recommend_instrument(SectionType::Verse, &hot), LEAD_AGGRESSIVE);

        let airy = SectionProfile {
            intensity: 0.2,
            characteristics: Characteristics {
                atmospheric: true,
                ..Characteristics::default()
            },
            ..SectionProfile::default()
        };
        assert_eq!(recommend_instrument(SectionType::Interlude, &airy), LEAD_ETHEREAL);
    }

    #[test]
    fn test_max_leap_bounds() {
        assert_eq!(max_leap(0.0), 5);
        assert_eq!(max_leap(1.0), 12);
    }

    #[test]
    fn test_melody_fills_and_stays_in_section() {
        let sec = section(SectionType::Verse, 0.5, 8);
        let out = generate_melody(&request(&sec, Contour::Arch), 17);
        assert!(!out.notes.is_empty());
        for note in &out.notes {
            assert!(note.start_time >= sec.start_time);
            assert!(note.end_time() <= sec.end_time() + 1e-9);
        }
        let last_onset = out.notes.iter().map(|n| n.start_time).fold(0.0, f64::max);
        assert!(last_onset > sec.start_time + sec.duration / 2.0);
    }

    #[test]
    fn test_low_intensity_stays_pentatonic() {
        let sec = section(SectionType::Verse, 0.3, 8);
        let out = generate_melody(&request(&sec, Contour::Static), 5);
        // D dorian pentatonic relative to D: 0 3 5 7 10, transposed by up to
        // a fourth, so check the untransposed first motif only.
        let key = Key::new(2, Mode::Dorian);
        let first = out.notes[0];
        assert!(key.pitches_in_range(&Mode::Dorian.pentatonic(), 0, 127).contains(&first.pitch));
    }

    #[test]
    fn test_contour_keeps_pitch_class() {
        let mut notes: Vec<Note> = (0..12)
            .map(|i| Note::new(60 + i as u8, 80, i as f64 * 0.5, 0.5, 0))
            .collect();
        let before: Vec<u8> = notes.iter().map(|n| n.pitch % 12).collect();
        apply_contour(&mut notes, Contour::Ascending, OctaveRange::new(3, 6));
        let after: Vec<u8> = notes.iter().map(|n| n.pitch % 12).collect();
        assert_eq!(before, after);
        assert_eq!(octave_of(notes[0].pitch), 3);
        assert_eq!(octave_of(notes[11].pitch), 6);
    }

    #[test]
    fn test_arch_peaks_at_golden_ratio() {
        assert!((Contour::Arch.height(ARCH_PEAK) - 1.0).abs() < 1e-12);
        assert!(Contour::Arch.height(0.0) < 1e-12);
        assert!(Contour::Valley.height(ARCH_PEAK) < 1e-12);
        assert_eq!(Contour::Static.height(0.3), 0.5);
    }

    #[test]
    fn test_deterministic_per_seed() {
        let sec = section(SectionType::Chorus, 0.9, 8);
        let a = generate_melody(&request(&sec, Contour::Wave), 1234);
        let b = generate_melody(&request(&sec, Contour::Wave), 1234);
        assert_eq!(a, b);
        let c = generate_melody(&request(&sec, Contour::Wave), 1235);
        assert_ne!(a.notes, c.notes);
    }
}
