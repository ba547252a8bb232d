// MIDI output: renders the accumulated tracks to a Standard MIDI File.
//
// Output is SMF format 1 at 128 ticks per quarter note. Track 0 carries
// only the tempo and time signature; every non-empty layer follows in
// `TrackName` order. The rhythm track always plays on channel 9. Every
// other track takes the next free channel in ascending order, skipping 9
// and wrapping after 15. Programs come from the style's program palette.
//
// Seconds are converted with `ticks = seconds * tempo / 60 * 128`. Optional
// humanization shifts note starts (never durations) by up to 2% of a
// quarter note. Non-finite or negative times clamp to tick 0 and every note
// lasts at least one tick. At equal ticks, note-offs are written before
// note-ons so a repeated pitch is not cut short. When a pitch is struck
// again while still sounding, the earlier note is released at the new
// strike, so each Note Off ends the note it belongs to.
//
// Uses the `midly` crate for writing and for validating the written bytes.

use crate::error::{GenerationError, Result};
use crate::score::{Note, PERCUSSION_CHANNEL, TrackName, Tracks};
use crate::structure::Structure;
use crate::style::StylePreset;
use midly::{
    Format, Header, MetaMessage, MidiMessage, Smf, Timing, Track, TrackEvent, TrackEventKind,
    num::{u4, u7, u15, u24, u28},
};
use pulsegen_prng::SeededRandom;

/// Ticks per quarter note in MIDI output.
pub const TICKS_PER_QUARTER: u16 = 128;

/// Largest humanization shift, as a fraction of a quarter note.
const HUMANIZE_FRACTION: f64 = 0.02;

/// Stream offset for the humanization draws.
const HUMANIZE_STREAM: u32 = 0x4d49_4449;

/// First four bytes of every Standard MIDI File.
pub const SMF_MAGIC: &[u8; 4] = b"MThd";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    pub humanize: bool,
    pub seed: u32,
}

impl Default for RenderOptions {
    fn default() -> Self {
        RenderOptions {
            humanize: true,
            seed: 0,
        }
    }
}

/// Channel for each named track, in the order given.
pub fn assign_channels(names: &[TrackName]) -> Vec<(TrackName, u8)> {
    let mut next: u8 = 0;
    names
        .iter()
        .map(|&name| {
            if name.is_percussion() {
                return (name, PERCUSSION_CHANNEL);
            }
            if next == PERCUSSION_CHANNEL {
                next += 1;
            }
            let channel = next;
            next = if next >= 15 { 0 } else { next + 1 };
            (name, channel)
        })
        .collect()
}

/// Non-empty tracks with their channels, in SMF order (starting at track 1).
pub fn track_layout(tracks: &Tracks) -> Vec<(TrackName, u8)> {
    let names: Vec<TrackName> = tracks.iter().map(|(name, _)| name).collect();
    assign_channels(&names)
}

/// Convert seconds to ticks, clamping unusable values to 0.
pub fn seconds_to_ticks(seconds: f64, tempo_bpm: f64) -> u32 {
    let ticks = seconds * (tempo_bpm / 60.0) * TICKS_PER_QUARTER as f64;
    if !ticks.is_finite() || ticks <= 0.0 {
        return 0;
    }
    ticks.round().min(0x0fff_ffff as f64) as u32
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum EventOrder {
    Off,
    On,
}

#[derive(Debug, Clone, Copy)]
struct TimedEvent {
    tick: u32,
    order: EventOrder,
    key: u8,
    velocity: u8,
}

#[derive(Debug, Clone, Copy)]
struct NoteSpan {
    start: u32,
    end: u32,
    key: u8,
    velocity: u8,
}

/// Release a sounding pitch when it is struck again. Two strikes on the
/// same tick merge into one note.
fn release_retriggers(mut spans: Vec<NoteSpan>) -> Vec<NoteSpan> {
    spans.sort_by_key(|s| s.start);
    let mut sounding: [Option<usize>; 128] = [None; 128];
    let mut kept: Vec<NoteSpan> = Vec::with_capacity(spans.len());
    for span in spans {
        let key = span.key as usize;
        if let Some(i) = sounding[key] {
            let prev = &mut kept[i];
            if prev.end > span.start {
                if span.start <= prev.start {
                    prev.end = prev.end.max(span.end);
                    prev.velocity = prev.velocity.max(span.velocity);
                    continue;
                }
                prev.end = span.start;
            }
        }
        sounding[key] = Some(kept.len());
        kept.push(span);
    }
    kept
}

fn note_events(
    notes: &[Note],
    tempo_bpm: f64,
    mut humanizer: Option<&mut SeededRandom>,
) -> Vec<TimedEvent> {
    let mut sorted: Vec<&Note> = notes.iter().collect();
    sorted.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));

    let max_shift = HUMANIZE_FRACTION * TICKS_PER_QUARTER as f64;
    let mut spans = Vec::with_capacity(sorted.len());
    for note in sorted {
        let mut start = seconds_to_ticks(note.start_time, tempo_bpm) as i64;
        if let Some(rng) = humanizer.as_deref_mut() {
            start += rng.range_f64(-max_shift, max_shift).round() as i64;
        }
        let start = start.max(0) as u32;
        let length = seconds_to_ticks(note.duration, tempo_bpm).max(1);
        spans.push(NoteSpan {
            start,
            end: start.saturating_add(length),
            key: note.pitch.min(127),
            velocity: note.velocity.clamp(1, 127),
        });
    }

    let spans = release_retriggers(spans);
    let mut events = Vec::with_capacity(spans.len() * 2);
    for span in spans {
        events.push(TimedEvent {
            tick: span.start,
            order: EventOrder::On,
            key: span.key,
            velocity: span.velocity,
        });
        events.push(TimedEvent {
            tick: span.end,
            order: EventOrder::Off,
            key: span.key,
            velocity: 0,
        });
    }
    events.sort_by_key(|e| (e.tick, e.order));
    events
}

fn meta(delta: u32, message: MetaMessage<'static>) -> TrackEvent<'static> {
    TrackEvent {
        delta: u28::new(delta),
        kind: TrackEventKind::Meta(message),
    }
}

fn tempo_track(style: &StylePreset, end_tick: u32) -> Track<'static> {
    let micros = (60_000_000.0 / style.tempo_bpm).round() as u32;
    let signature = style.time_signature;
    let denominator_pow = signature.beat_unit.max(1).trailing_zeros() as u8;
    vec![
        meta(0, MetaMessage::TrackName(b"tempo")),
        meta(0, MetaMessage::Tempo(u24::new(micros.min(0xff_ffff)))),
        meta(
            0,
            MetaMessage::TimeSignature(signature.beats_per_bar, denominator_pow, 24, 8),
        ),
        meta(end_tick, MetaMessage::EndOfTrack),
    ]
}

fn music_track(
    name: TrackName,
    channel: u8,
    program: Option<u8>,
    events: &[TimedEvent],
    end_tick: u32,
) -> Track<'static> {
    let channel = u4::new(channel);
    let mut track: Track<'static> = Vec::with_capacity(events.len() + 4);
    track.push(meta(0, MetaMessage::TrackName(name.as_str().as_bytes())));
    if let Some(program) = program {
        track.push(TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Midi {
                channel,
                message: MidiMessage::ProgramChange {
                    program: u7::new(program.min(127)),
                },
            },
        });
    }

    let mut last_tick = 0;
    for event in events {
        let message = match event.order {
            EventOrder::On => MidiMessage::NoteOn {
                key: u7::new(event.key),
                vel: u7::new(event.velocity),
            },
            EventOrder::Off => MidiMessage::NoteOff {
                key: u7::new(event.key),
                vel: u7::new(0),
            },
        };
        track.push(TrackEvent {
            delta: u28::new(event.tick - last_tick),
            kind: TrackEventKind::Midi { channel, message },
        });
        last_tick = event.tick;
    }
    track.push(meta(end_tick.saturating_sub(last_tick), MetaMessage::EndOfTrack));
    track
}

fn is_end_of_track(event: &TrackEvent<'_>) -> bool {
    matches!(event.kind, TrackEventKind::Meta(MetaMessage::EndOfTrack))
}

/// Drop End-of-Track markers anywhere but the final event.
fn strip_duplicate_end_of_track(track: &mut Track<'_>) {
    let ends = track.iter().filter(|e| is_end_of_track(e)).count();
    if ends <= 1 && track.last().is_some_and(is_end_of_track) {
        return;
    }
    let mut carried = 0u32;
    let mut kept: Track<'_> = Vec::with_capacity(track.len());
    for event in track.drain(..) {
        if is_end_of_track(&event) {
            carried += event.delta.as_int();
            continue;
        }
        let delta = event.delta.as_int() + carried;
        carried = 0;
        kept.push(TrackEvent {
            delta: u28::new(delta),
            ..event
        });
    }
    kept.push(TrackEvent {
        delta: u28::new(carried),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });
    *track = kept;
}

/// Check that `bytes` is a parseable SMF with `expected_tracks` tracks.
pub fn validate(bytes: &[u8], expected_tracks: usize) -> Result<()> {
    if bytes.len() < 4 || &bytes[..4] != SMF_MAGIC {
        return Err(GenerationError::StructuralValidation(
            "missing MThd header chunk".into(),
        ));
    }
    let smf = Smf::parse(bytes)
        .map_err(|e| GenerationError::StructuralValidation(e.to_string()))?;
    if smf.tracks.len() != expected_tracks {
        return Err(GenerationError::StructuralValidation(format!(
            "expected {expected_tracks} tracks, found {}",
            smf.tracks.len()
        )));
    }
    Ok(())
}

/// Render all non-empty tracks to SMF bytes.
pub fn render(
    tracks: &Tracks,
    structure: &Structure,
    style: &StylePreset,
    options: &RenderOptions,
) -> Result<Vec<u8>> {
    let tempo = style.tempo_bpm;
    let mut humanizer = options
        .humanize
        .then(|| SeededRandom::new(options.seed.wrapping_add(HUMANIZE_STREAM)));

    let mut track_events = Vec::new();
    let mut end_tick = seconds_to_ticks(structure.total_duration, tempo);
    for (name, notes) in tracks.iter() {
        let events = note_events(notes, tempo, humanizer.as_mut());
        if let Some(last) = events.last() {
            end_tick = end_tick.max(last.tick);
        }
        track_events.push((name, events));
    }

    let mut smf = Smf::new(Header::new(
        Format::Parallel,
        Timing::Metrical(u15::new(TICKS_PER_QUARTER)),
    ));
    smf.tracks.push(tempo_track(style, end_tick));
    let layout = track_layout(tracks);
    for ((name, channel), (_, events)) in layout.iter().zip(track_events.iter()) {
        smf.tracks.push(music_track(
            *name,
            *channel,
            style.programs.program_for(*name),
            events,
            end_tick,
        ));
    }
    for track in smf.tracks.iter_mut() {
        strip_duplicate_end_of_track(track);
    }

    let mut buf = Vec::new();
    smf.write_std(&mut buf)?;
    validate(&buf, layout.len() + 1)?;

    tracing::debug!(
        bytes = buf.len(),
        tracks = layout.len() + 1,
        end_tick,
        "rendered midi"
    );
    Ok(buf)
}
