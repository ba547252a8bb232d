// The score: notes, named tracks and the sections that own them.
//
// A generated song is a set of named tracks, each an ordered list of `Note`s
// timed in seconds. Notes are the universal unit handed between every stage:
// melody, harmony, bass, pad and drums all produce `Vec<Note>`, and the MIDI
// renderer consumes them. Sections (planned by structure.rs) bound every
// note: `Section::confine` truncates anything that would spill past a
// section's edges instead of dropping it.
//
// Timing arithmetic goes through `round_time` after every addition so that
// thousands of short drum and melody events never accumulate float drift.
// This is what keeps the rendered bytes identical across runs and platforms.
//
// Tracks are keyed by the closed `TrackName` enum in a `BTreeMap`, so track
// iteration order (and therefore MIDI channel/program assignment) is fixed.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Time resolution for all accumulated timestamps (seconds).
pub const TIME_RESOLUTION: f64 = 1e-4;

/// Steps per second at `TIME_RESOLUTION`. Dividing by this exact integer
/// yields the nearest double to the decimal value.
const TIME_STEPS_PER_SECOND: f64 = 10_000.0;

/// Shortest note any stage emits after truncation (seconds).
pub const MIN_NOTE_DURATION: f64 = 0.01;

/// General MIDI percussion channel (zero-based).
pub const PERCUSSION_CHANNEL: u8 = 9;

/// Round a timestamp or duration to `TIME_RESOLUTION`.
pub fn round_time(t: f64) -> f64 {
    (t * TIME_STEPS_PER_SECOND).round() / TIME_STEPS_PER_SECOND
}

/// A single sounding event.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub pitch: u8,
    pub velocity: u8,
    /// Onset in seconds from the start of the song.
    pub start_time: f64,
    /// Length in seconds.
    pub duration: f64,
    pub channel: u8,
}

impl Note {
    pub fn new(pitch: u8, velocity: u8, start_time: f64, duration: f64, channel: u8) -> Self {
        Note {
            pitch: pitch.min(127),
            velocity: velocity.clamp(1, 127),
            start_time: round_time(start_time),
            duration: round_time(duration),
            channel,
        }
    }

    pub fn end_time(&self) -> f64 {
        self.start_time + self.duration
    }
}

/// Clamp a float velocity into the MIDI range.
pub fn velocity_from(v: f64) -> u8 {
    if !v.is_finite() {
        return 1;
    }
    v.round().clamp(1.0, 127.0) as u8
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// Structural role of a section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SectionType {
    Intro,
    Verse,
    PreChorus,
    Chorus,
    Bridge,
    Interlude,
    Buildup,
    Breakdown,
    Drop,
    Outro,
}

impl SectionType {
    pub fn as_str(self) -> &'static str {
        match self {
            SectionType::Intro => "intro",
            SectionType::Verse => "verse",
            SectionType::PreChorus => "pre-chorus",
            SectionType::Chorus => "chorus",
            SectionType::Bridge => "bridge",
            SectionType::Interlude => "interlude",
            SectionType::Buildup => "buildup",
            SectionType::Breakdown => "breakdown",
            SectionType::Drop => "drop",
            SectionType::Outro => "outro",
        }
    }
}

impl fmt::Display for SectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Qualitative flags attached to a section profile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Characteristics {
    pub repetitive: bool,
    pub motivic: bool,
    pub transitional: bool,
    pub climactic: bool,
    pub atmospheric: bool,
}

/// How busy each layer is within one section. All densities are in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SectionProfile {
    pub intensity: f64,
    pub layer_density: f64,
    pub harmonic_complexity: f64,
    pub melodic_density: f64,
    pub rhythmic_density: f64,
    pub tempo_multiplier: f64,
    pub characteristics: Characteristics,
}

impl Default for SectionProfile {
    fn default() -> Self {
        SectionProfile {
            intensity: 0.5,
            layer_density: 0.5,
            harmonic_complexity: 0.5,
            melodic_density: 0.5,
            rhythmic_density: 0.5,
            tempo_multiplier: 1.0,
            characteristics: Characteristics::default(),
        }
    }
}

/// How one section hands off to the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransitionType {
    Cut,
    Fade,
    Buildup,
    Riser,
    Breakdown,
    Sustain,
    /// The final section; nothing follows.
    End,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TransitionCharacteristics {
    /// Signed change in intensity into the next section.
    pub energy_change: f64,
    pub drum_fill: bool,
    pub filter_sweep: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub transition_type: TransitionType,
    /// Seconds at the end of the section the transition occupies.
    pub duration: f64,
    pub characteristics: TransitionCharacteristics,
}

/// One planned section of the song.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    /// Stable identifier, e.g. "chorus-3".
    pub id: String,
    pub section_type: SectionType,
    /// Position in the timeline (0-based).
    pub index: usize,
    pub start_time: f64,
    pub duration: f64,
    pub bars: u32,
    pub profile: SectionProfile,
    pub transition: Transition,
}

impl Section {
    pub fn end_time(&self) -> f64 {
        round_time(self.start_time + self.duration)
    }

    /// Force a note inside this section's bounds.
    ///
    /// A note starting before the section is moved to the section start; a
    /// note starting at or after the end is pulled back so that it still
    /// sounds for `MIN_NOTE_DURATION`. The duration is then shortened to
    /// end no later than the section. Notes are never dropped.
    pub fn confine(&self, note: Note) -> Note {
        let start = self.start_time;
        let end = self.end_time();
        let latest_start = (end - MIN_NOTE_DURATION).max(start);

        let mut onset = note.start_time;
        if !onset.is_finite() || onset < start {
            onset = start;
        }
        if onset > latest_start {
            onset = latest_start;
        }
        onset = round_time(onset);

        let room = (end - onset).max(0.0);
        let mut duration = if note.duration.is_finite() {
            note.duration
        } else {
            MIN_NOTE_DURATION
        };
        duration = duration.max(MIN_NOTE_DURATION).min(room);
        // Rounding may nudge past the boundary; floor to the resolution.
        let mut duration_rounded = round_time(duration);
        if onset + duration_rounded > end {
            duration_rounded =
                ((end - onset) * TIME_STEPS_PER_SECOND).floor() / TIME_STEPS_PER_SECOND;
        }

        Note {
            start_time: onset,
            duration: duration_rounded.max(0.0),
            ..note
        }
    }

    /// Confine every note in place.
    pub fn confine_all(&self, notes: &mut [Note]) {
        for note in notes.iter_mut() {
            *note = self.confine(*note);
        }
    }

    /// Position of `time` within the section in [0, 1].
    pub fn progress(&self, time: f64) -> f64 {
        if self.duration <= 0.0 {
            return 0.0;
        }
        ((time - self.start_time) / self.duration).clamp(0.0, 1.0)
    }
}

// ---------------------------------------------------------------------------
// Tracks
// ---------------------------------------------------------------------------

/// Named output tracks, in the order they are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackName {
    Melody,
    Melody2,
    Melody3,
    Melody4,
    Harmony,
    Bass,
    Rhythm,
    Pad,
}

impl TrackName {
    pub const ALL: [TrackName; 8] = [
        TrackName::Melody,
        TrackName::Melody2,
        TrackName::Melody3,
        TrackName::Melody4,
        TrackName::Harmony,
        TrackName::Bass,
        TrackName::Rhythm,
        TrackName::Pad,
    ];

    /// Track for the n-th melodic layer (0-based). Layers past the fourth
    /// share `melody4`.
    pub fn melodic_layer(layer: usize) -> TrackName {
        match layer {
            0 => TrackName::Melody,
            1 => TrackName::Melody2,
            2 => TrackName::Melody3,
            _ => TrackName::Melody4,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TrackName::Melody => "melody",
            TrackName::Melody2 => "melody2",
            TrackName::Melody3 => "melody3",
            TrackName::Melody4 => "melody4",
            TrackName::Harmony => "harmony",
            TrackName::Bass => "bass",
            TrackName::Rhythm => "rhythm",
            TrackName::Pad => "pad",
        }
    }

    pub fn is_percussion(self) -> bool {
        self == TrackName::Rhythm
    }

    pub fn is_melodic_layer(self) -> bool {
        matches!(
            self,
            TrackName::Melody | TrackName::Melody2 | TrackName::Melody3 | TrackName::Melody4
        )
    }
}

impl fmt::Display for TrackName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accumulator for all tracks of one generation call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tracks {
    tracks: BTreeMap<TrackName, Vec<Note>>,
}

impl Tracks {
    pub fn new() -> Self {
        Tracks::default()
    }

    /// Append notes to a track, creating it if needed.
    pub fn extend(&mut self, name: TrackName, notes: impl IntoIterator<Item = Note>) {
        self.tracks.entry(name).or_default().extend(notes);
    }

    pub fn get(&self, name: TrackName) -> &[Note] {
        self.tracks.get(&name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Non-empty tracks in render order.
    pub fn iter(&self) -> impl Iterator<Item = (TrackName, &[Note])> {
        self.tracks
            .iter()
            .filter(|(_, notes)| !notes.is_empty())
            .map(|(&name, notes)| (name, notes.as_slice()))
    }

    pub fn note_count(&self) -> usize {
        self.tracks.values().map(Vec::len).sum()
    }

    /// One line per non-empty track: name, note count and pitch span.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        for (name, notes) in self.iter() {
            let low = notes.iter().map(|n| n.pitch).min().unwrap_or(0);
            let high = notes.iter().map(|n| n.pitch).max().unwrap_or(0);
            out.push_str(&format!(
                "{:>8}: {:>5} notes, pitch {}..={}\n",
                name.as_str(),
                notes.len(),
                low,
                high
            ));
        }
        out
    }
}

/// Find silent stretches of at least `min_gap` seconds in `[from, to]`.
///
/// `notes` may come from several layers in any order. Returns `(start, end)`
/// pairs of the uncovered intervals, including the edges.
pub fn silent_gaps<'a>(
    notes: impl IntoIterator<Item = &'a Note>,
    from: f64,
    to: f64,
    min_gap: f64,
) -> Vec<(f64, f64)> {
    let mut spans: Vec<(f64, f64)> = notes
        .into_iter()
        .map(|n| (n.start_time, n.end_time()))
        .filter(|&(s, e)| e > from && s < to)
        .collect();
    spans.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));

    let mut gaps = Vec::new();
    let mut covered_until = from;
    for (s, e) in spans {
        if s - covered_until >= min_gap {
            gaps.push((covered_until, s));
        }
        if e > covered_until {
            covered_until = e;
        }
    }
    if to - covered_until >= min_gap {
        gaps.push((covered_until, to));
    }
    gaps
}
