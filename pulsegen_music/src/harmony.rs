// Harmony engine: per-section chord sequences.
//
// For each section the engine picks a genre bucket from the mode and the
// effective complexity, draws one progression template from that bucket,
// transposes it into the key, and tiles it across the section's bars. The
// final chord is trimmed so the sequence ends exactly at the section end.
// The result is then re-voiced by voice_leading.rs.
//
// Effective complexity is the requested complexity damped by the section's
// combined harmonic+melodic load, so dense melodic sections get plainer
// chords.

use crate::chord::{ResolvedChord, build_chord, invert};
use crate::mode::{Mode, pitch_in_octave};
use crate::progression::{GenreBucket, Progression};
use crate::score::{Section, round_time};
use crate::voice_leading::{VoiceLeadingStrategy, optimize_chord_sequence};
use pulsegen_prng::SeededRandom;

/// Octave chord roots are placed in before voice leading.
const CHORD_ROOT_OCTAVE: i8 = 3;

/// Everything the harmony engine needs for one section.
#[derive(Debug, Clone)]
pub struct HarmonyRequest<'a> {
    pub section: &'a Section,
    /// Tonic pitch class.
    pub key_root: u8,
    pub mode: Mode,
    pub complexity: f64,
    pub voice_leading: VoiceLeadingStrategy,
    /// Combined harmonic+melodic load reported by the caller.
    pub total_load: f64,
    pub seconds_per_bar: f64,
}

/// Complexity after load damping.
pub fn effective_complexity(complexity: f64, total_load: f64) -> f64 {
    let c = complexity.clamp(0.0, 1.0);
    if total_load > 1.5 {
        c.min(0.6)
    } else if total_load > 1.0 {
        c * 0.85
    } else {
        c
    }
}

/// Generate the voiced chord sequence for one section.
pub fn generate_chord_sequence(request: &HarmonyRequest<'_>, seed: u32) -> Vec<ResolvedChord> {
    let mut rng = SeededRandom::new(seed);
    let section = request.section;
    let complexity = effective_complexity(request.complexity, request.total_load);
    let bucket = GenreBucket::select(request.mode, complexity);
    let progression = rng
        .choice(bucket.progressions())
        .copied()
        .unwrap_or(Progression::Axis);

    tracing::debug!(
        section = %section.id,
        ?bucket,
        ?progression,
        complexity,
        "chord progression"
    );

    let total_bars = section.bars as f64;
    let section_end = section.end_time();
    let templates = progression.chords();
    let mut chords = Vec::new();
    let mut bar = 0.0;

    for template in templates.iter().cycle() {
        let remaining = total_bars - bar;
        if remaining <= 1e-9 {
            break;
        }
        let bars = template.duration_in_bars.min(remaining);
        let start_time = round_time(section.start_time + bar * request.seconds_per_bar);
        if start_time >= section_end {
            break;
        }
        let mut duration = round_time(bars * request.seconds_per_bar);
        if start_time + duration > section_end || remaining - bars <= 1e-9 {
            duration = round_time(section_end - start_time);
        }

        let root_pc = (request.key_root + template.degree) % 12;
        let root = pitch_in_octave(root_pc, CHORD_ROOT_OCTAVE);
        let notes = build_chord(
            root,
            template.quality,
            template.extensions,
            complexity,
            &mut rng,
        );
        chords.push(ResolvedChord {
            notes: invert(&notes, template.inversion),
            root,
            start_time,
            duration,
        });
        bar += bars;
    }

    optimize_chord_sequence(&chords, request.voice_leading)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::score::{
        SectionProfile, SectionType, Transition, TransitionCharacteristics, TransitionType,
    };

    fn section(bars: u32, seconds_per_bar: f64) -> Section {
        Section {
            id: "verse-1".into(),
            section_type: SectionType::Verse,
            index: 1,
            start_time: 4.0,
            duration: round_time(bars as f64 * seconds_per_bar),
            bars,
            profile: SectionProfile::default(),
            transition: Transition {
                transition_type: TransitionType::Cut,
                duration: 1.0,
                characteristics: TransitionCharacteristics::default(),
            },
        }
    }

    fn request(section: &Section, complexity: f64, total_load: f64) -> HarmonyRequest<'_> {
        HarmonyRequest {
            section,
            key_root: 9,
            mode: Mode::Aeolian,
            complexity,
            voice_leading: VoiceLeadingStrategy::Smooth,
            total_load,
            seconds_per_bar: 2.4,
        }
    }

    #[test]
    fn test_load_damps_complexity() {
        assert!(effective_complexity(0.9, 1.6) <= 0.6);
        assert!((effective_complexity(0.9, 1.2) - 0.765).abs() < 1e-12);
        assert_eq!(effective_complexity(0.9, 0.5), 0.9);
        assert_eq!(effective_complexity(0.3, 2.0), 0.3);
    }

    #[test]
    fn test_high_load_drops_upper_extensions() {
        let sec = section(8, 2.4);
        let chords = generate_chord_sequence(&request(&sec, 0.9, 1.8), 7);
        for chord in &chords {
            let mut pcs: Vec<u8> = chord.notes.iter().map(|p| p % 12).collect();
            pcs.sort_unstable();
            pcs.dedup();
            // A seventh chord plus at most one template colour tone.
            assert!(pcs.len() <= 5, "too dense: {:?}", chord.notes);
        }
    }

    #[test]
    fn test_sequence_fills_section_exactly() {
        for bars in [4, 7, 8, 12] {
            let sec = section(bars, 2.4);
            let chords = generate_chord_sequence(&request(&sec, 0.5, 0.4), 11);
            assert!(!chords.is_empty());
            assert_eq!(chords[0].start_time, sec.start_time);
            for pair in chords.windows(2) {
                let gap = (pair[1].start_time - pair[0].end_time()).abs();
                assert!(gap < 1e-3, "chords not contiguous: {gap}");
            }
            let last = &chords[chords.len() - 1];
            assert!(last.end_time() <= sec.end_time() + 1e-9);
            assert!((last.end_time() - sec.end_time()).abs() < 1e-3);
        }
    }

    #[test]
    fn test_deterministic() {
        let sec = section(8, 2.0);
        let a = generate_chord_sequence(&request(&sec, 0.7, 0.2), 99);
        let b = generate_chord_sequence(&request(&sec, 0.7, 0.2), 99);
        assert_eq!(a, b);
    }

    #[test]
    fn test_roots_are_in_key() {
        let sec = section(8, 2.0);
        let chords = generate_chord_sequence(&request(&sec, 0.2, 0.0), 3);
        let key = crate::mode::Key::new(9, Mode::Aeolian);
        for chord in &chords {
            assert!(key.contains(chord.root), "root {} outside A aeolian", chord.root);
        }
    }
}
