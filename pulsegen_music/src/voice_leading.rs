// Voice leading: re-voicing consecutive chords to limit voice movement.
//
// Every strategy keeps each chord's pitch classes and only chooses octaves
// (and, for oblique motion, which tones are held). The first chord of a
// sequence is passed through unchanged; every later chord is voiced against
// its immediate, already-optimized predecessor, never against the sequence
// as a whole.
//
// Strategies:
// - Smooth: each voice of the previous chord greedily claims the nearest
//   unused tone of the next chord (any octave).
// - Contrary: the next chord's tones are assigned in reversed pitch order,
//   so the lowest previous voice takes the highest pitch class.
// - Parallel: the next chord is stacked from its root using the average
//   spacing between adjacent voices of the sequence's first chord.
// - Oblique: the lower half of the previous voices is held; the upper half
//   moves smoothly to the next chord's remaining tones.

use crate::chord::ResolvedChord;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoiceLeadingStrategy {
    Smooth,
    Contrary,
    Parallel,
    Oblique,
}

/// Re-voice a chord sequence under `strategy`.
pub fn optimize_chord_sequence(
    chords: &[ResolvedChord],
    strategy: VoiceLeadingStrategy,
) -> Vec<ResolvedChord> {
    let mut out: Vec<ResolvedChord> = Vec::with_capacity(chords.len());
    let Some(first) = chords.first() else {
        return out;
    };
    out.push(first.clone());
    let first_spacing = average_spacing(&first.notes);

    for chord in &chords[1..] {
        let prev = &out[out.len() - 1].notes;
        let notes = if prev.is_empty() || chord.notes.is_empty() {
            chord.notes.clone()
        } else {
            match strategy {
                VoiceLeadingStrategy::Smooth => smooth(prev, &chord.notes),
                VoiceLeadingStrategy::Contrary => contrary(prev, &chord.notes),
                VoiceLeadingStrategy::Parallel => parallel(prev, chord, first_spacing),
                VoiceLeadingStrategy::Oblique => oblique(prev, &chord.notes),
            }
        };
        out.push(ResolvedChord {
            notes,
            ..chord.clone()
        });
    }
    out
}

/// Total absolute semitone movement between two voicings, voice by voice.
pub fn total_movement(from: &[u8], to: &[u8]) -> u32 {
    from.iter()
        .zip(to.iter())
        .map(|(&a, &b)| (a as i16 - b as i16).unsigned_abs() as u32)
        .sum()
}

/// The octave transposition of `pc_source`'s pitch class closest to `target`.
fn nearest_instance(pc_source: u8, target: u8) -> u8 {
    let pc = pc_source % 12;
    let base = target as i16 - (target % 12) as i16 + pc as i16;
    let candidates = [base - 12, base, base + 12];
    let best = candidates
        .iter()
        .copied()
        .filter(|p| (0..=127).contains(p))
        .min_by_key(|&p| ((p - target as i16).abs(), p))
        .unwrap_or(pc as i16);
    best as u8
}

fn finish(mut notes: Vec<u8>) -> Vec<u8> {
    notes.sort_unstable();
    notes.dedup();
    notes
}

/// Greedy nearest-unused assignment, voice by voice from the bottom.
fn smooth(prev: &[u8], next: &[u8]) -> Vec<u8> {
    let mut used = vec![false; next.len()];
    let mut voiced = Vec::with_capacity(prev.len().max(next.len()));

    for &voice in prev {
        let all_used = used.iter().all(|&u| u);
        let pick = next
            .iter()
            .enumerate()
            .filter(|&(i, _)| all_used || !used[i])
            .map(|(i, &tone)| (i, nearest_instance(tone, voice)))
            .min_by_key(|&(_, p)| ((p as i16 - voice as i16).abs(), p));
        if let Some((i, p)) = pick {
            used[i] = true;
            voiced.push(p);
        }
    }

    // Tones the previous chord had no voice for are placed near the middle.
    let center = prev[prev.len() / 2];
    for (i, &tone) in next.iter().enumerate() {
        if !used[i] {
            voiced.push(nearest_instance(tone, center));
        }
    }
    finish(voiced)
}

/// Reverse pitch-order assignment.
fn contrary(prev: &[u8], next: &[u8]) -> Vec<u8> {
    let mut descending = next.to_vec();
    descending.sort_unstable_by(|a, b| b.cmp(a));
    let voiced = descending
        .iter()
        .enumerate()
        .map(|(i, &tone)| nearest_instance(tone, prev[i.min(prev.len() - 1)]))
        .collect();
    finish(voiced)
}

fn average_spacing(notes: &[u8]) -> f64 {
    if notes.len() < 2 {
        return 4.0;
    }
    let span = notes[notes.len() - 1] as f64 - notes[0] as f64;
    span / (notes.len() - 1) as f64
}

/// Stack from the root nearest the previous bass, keeping the first chord's
/// average spacing.
fn parallel(prev: &[u8], chord: &ResolvedChord, spacing: f64) -> Vec<u8> {
    let root_pc = chord.root_pc();
    let bass = nearest_instance(root_pc, prev[0]);
    let mut voiced = vec![bass];
    let mut target = bass as f64;

    let mut others: Vec<u8> = chord
        .notes
        .iter()
        .copied()
        .filter(|&n| n % 12 != root_pc)
        .collect();
    others.sort_by_key(|&n| (n as i16 - chord.root as i16).rem_euclid(12));
    others.dedup_by_key(|n| *n % 12);

    for tone in others {
        target += spacing;
        let aim = target.round().clamp(0.0, 127.0) as u8;
        let mut placed = nearest_instance(tone, aim);
        // Keep the stack ascending.
        while placed <= *voiced.last().unwrap_or(&0) && placed <= 115 {
            placed += 12;
        }
        voiced.push(placed);
        target = placed as f64;
    }
    finish(voiced)
}

/// Hold the lower half, move the upper half.
fn oblique(prev: &[u8], next: &[u8]) -> Vec<u8> {
    let held_count = prev.len() / 2;
    let held: Vec<u8> = prev[..held_count].to_vec();
    let held_pcs: Vec<u8> = held.iter().map(|p| p % 12).collect();

    let moving: Vec<u8> = next
        .iter()
        .copied()
        .filter(|p| !held_pcs.contains(&(p % 12)))
        .collect();
    let upper = &prev[held_count..];
    let mut voiced = held;
    if moving.is_empty() {
        voiced.extend_from_slice(upper);
    } else {
        voiced.extend(smooth(upper, &moving));
    }
    finish(voiced)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chord(notes: &[u8], root: u8, start: f64) -> ResolvedChord {
        ResolvedChord {
            notes: notes.to_vec(),
            root,
            start_time: start,
            duration: 2.0,
        }
    }

    #[test]
    fn test_first_chord_unchanged() {
        let seq = vec![chord(&[48, 55, 64], 48, 0.0), chord(&[50, 53, 57], 50, 2.0)];
        for strategy in [
            VoiceLeadingStrategy::Smooth,
            VoiceLeadingStrategy::Contrary,
            VoiceLeadingStrategy::Parallel,
            VoiceLeadingStrategy::Oblique,
        ] {
            let out = optimize_chord_sequence(&seq, strategy);
            assert_eq!(out[0], seq[0], "{strategy:?} altered the first chord");
            assert_eq!(out.len(), 2);
        }
    }

    #[test]
    fn test_smooth_c_to_d_minor_moves_by_step() {
        // C E G -> D F A
        let c = chord(&[60, 64, 67], 60, 0.0);
        let dm = chord(&[62, 65, 69], 62, 2.0);
        let out = optimize_chord_sequence(&[c.clone(), dm], VoiceLeadingStrategy::Smooth);
        assert_eq!(out[1].notes, vec![62, 65, 69]);

        let optimized = total_movement(&c.notes, &out[1].notes);
        assert_eq!(optimized, 5);
        // Pairing the same tones in their listed-but-unsorted order moves far more.
        let unsorted = total_movement(&c.notes, &[69, 62, 65]);
        assert!(optimized < unsorted);
    }

    #[test]
    fn test_smooth_finds_nearest_octave() {
        let c = chord(&[60, 64, 67], 60, 0.0);
        let f_high = chord(&[77, 81, 84], 77, 2.0);
        let out = optimize_chord_sequence(&[c, f_high], VoiceLeadingStrategy::Smooth);
        // C stays, E->F, G->A
        assert_eq!(out[1].notes, vec![60, 65, 69]);
    }

    #[test]
    fn test_contrary_preserves_pitch_classes() {
        let c = chord(&[60, 64, 67], 60, 0.0);
        let g = chord(&[55, 59, 62], 55, 2.0);
        let out = optimize_chord_sequence(&[c, g], VoiceLeadingStrategy::Contrary);
        let mut pcs: Vec<u8> = out[1].notes.iter().map(|p| p % 12).collect();
        pcs.sort_unstable();
        assert_eq!(pcs, vec![2, 7, 11]);
    }

    #[test]
    fn test_parallel_keeps_spacing() {
        let c = chord(&[48, 52, 55], 48, 0.0);
        let f = chord(&[53, 57, 60], 53, 2.0);
        let out = optimize_chord_sequence(&[c, f], VoiceLeadingStrategy::Parallel);
        let notes = &out[1].notes;
        assert_eq!(notes[0] % 12, 5, "parallel stack starts on the root");
        assert!(notes.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_oblique_holds_lower_half() {
        let c = chord(&[48, 55, 64, 67], 48, 0.0);
        let am = chord(&[57, 60, 64], 57, 2.0);
        let out = optimize_chord_sequence(&[c, am], VoiceLeadingStrategy::Oblique);
        assert!(out[1].notes.contains(&48));
        assert!(out[1].notes.contains(&55));
    }

    #[test]
    fn test_each_chord_relative_to_predecessor() {
        let seq = vec![
            chord(&[60, 64, 67], 60, 0.0),
            chord(&[65, 69, 72], 65, 2.0),
            chord(&[67, 71, 74], 67, 4.0),
        ];
        let out = optimize_chord_sequence(&seq, VoiceLeadingStrategy::Smooth);
        let step1 = total_movement(&out[0].notes, &out[1].notes);
        let step2 = total_movement(&out[1].notes, &out[2].notes);
        assert!(step1 <= 6 && step2 <= 9, "moves {step1} and {step2}");
    }

    #[test]
    fn test_empty_sequence() {
        assert!(optimize_chord_sequence(&[], VoiceLeadingStrategy::Smooth).is_empty());
    }
}
