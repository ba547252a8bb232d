// Pulsegen Music Generator
//
// Deterministic multi-track song generation with Standard MIDI output. A
// seed, a target duration, a style preset, a complexity value and optional
// listener vitals go in. A multi-track score and a byte-exact SMF come out,
// plus per-track instrument metadata for a sample player.
//
// Architecture:
// - mode.rs: Modes, keys, pitch-class helpers
// - score.rs: Notes, sections, named tracks, time rounding + containment
// - structure.rs: Form selection, bar allocation, section profiles, transitions
// - chord.rs: Chord qualities, extensions by complexity, inversions
// - progression.rs: Genre buckets and the static progression library
// - voice_leading.rs: Smooth / contrary / parallel / oblique voice leading
// - harmony.rs: Per-section chord sequences under a load cap
// - melody.rs: Motif + phrase generation, contours, lead instrument hint
// - drums.rs: Pattern library, fill layout, drum humanization
// - orchestrator.rs: Harmony, bass, pad and rhythm layers + silence fill
// - style.rs: Style presets, the built-in catalog, JSON catalogs
// - palette.rs: Instrument selection and melodic layer planning
// - midi.rs: SMF rendering via midly
// - pipeline.rs: The generation entry point
// - error.rs: GenerationError
//
// The generator is deterministic given a seed: the same parameters always
// produce the same bytes.

pub mod chord;
pub mod drums;
pub mod error;
pub mod harmony;
pub mod melody;
pub mod midi;
pub mod mode;
pub mod orchestrator;
pub mod palette;
pub mod pipeline;
pub mod progression;
pub mod score;
pub mod structure;
pub mod style;
pub mod voice_leading;

pub use error::{GenerationError, Result};
pub use pipeline::{GenerationOutput, GenerationParams, Vitals, generate};
