// Chord-progression template catalog.
//
// Read-only data: every progression is a variant of the closed
// `Progression` enum mapping to a static list of `ChordTemplate`s, and every
// genre bucket maps to the progressions it may use. A missing template is a
// compile error rather than a failed string lookup at generation time.
//
// Degrees are semitones above the key's tonic, so the same template works in
// any key. Buckets are split by mode quality (major-third vs minor-third
// modes) so that a template never fights the scale the melody is drawn from.

use crate::chord::ChordQuality::*;
use crate::chord::ChordTemplate;
use crate::mode::Mode;
use serde::{Deserialize, Serialize};

/// Harmonic family chosen from the mode and effective complexity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GenreBucket {
    Pop,
    Ballad,
    JazzMajor,
    Ambient,
    Synthwave,
    Cinematic,
    JazzMinor,
}

impl GenreBucket {
    /// Pick the bucket for a mode at a given (already load-damped) complexity.
    pub fn select(mode: Mode, complexity: f64) -> GenreBucket {
        match (mode.is_major(), complexity) {
            (true, c) if c >= 0.7 => GenreBucket::JazzMajor,
            (true, c) if c < 0.35 => GenreBucket::Pop,
            (true, _) => GenreBucket::Ballad,
            (false, c) if c >= 0.7 => GenreBucket::JazzMinor,
            (false, c) if c < 0.35 => GenreBucket::Ambient,
            (false, c) if c < 0.55 => GenreBucket::Synthwave,
            (false, _) => GenreBucket::Cinematic,
        }
    }

    pub fn progressions(self) -> &'static [Progression] {
        use Progression::*;
        match self {
            GenreBucket::Pop => &[Axis, Doowop, FourChordTurnaround, PlagalLift],
            GenreBucket::Ballad => &[StepwiseBallad, DescendingBass, SeventhsLoop],
            GenreBucket::JazzMajor => &[TwoFiveOne, RhythmChanges, ColtraneSteps],
            GenreBucket::Ambient => &[DriftTonicSix, DriftTonicFour, SuspendedLoop],
            GenreBucket::Synthwave => &[NightDrive, AeolianCadence, NeonRise],
            GenreBucket::Cinematic => &[EpicMinor, HeroicLament, ShadowThird],
            GenreBucket::JazzMinor => &[MinorTwoFiveOne, MinorTurnaround],
        }
    }
}

/// Every chord progression template known to the generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Progression {
    // Pop
    Axis,
    Doowop,
    FourChordTurnaround,
    PlagalLift,
    // Ballad
    StepwiseBallad,
    DescendingBass,
    SeventhsLoop,
    // Major jazz
    TwoFiveOne,
    RhythmChanges,
    ColtraneSteps,
    // Ambient
    DriftTonicSix,
    DriftTonicFour,
    SuspendedLoop,
    // Synthwave
    NightDrive,
    AeolianCadence,
    NeonRise,
    // Cinematic
    EpicMinor,
    HeroicLament,
    ShadowThird,
    // Minor jazz
    MinorTwoFiveOne,
    MinorTurnaround,
}

const fn ch(degree: u8, quality: crate::chord::ChordQuality, bars: f64) -> ChordTemplate {
    ChordTemplate::new(degree, quality, bars)
}

impl Progression {
    pub fn chords(self) -> &'static [ChordTemplate] {
        match self {
            // I V vi IV
            Progression::Axis => const {
                &[
                    ch(0, Major, 1.0),
                    ch(7, Major, 1.0),
                    ch(9, Minor, 1.0),
                    ch(5, Major, 1.0),
                ]
            },
            // I vi IV V
            Progression::Doowop => const {
                &[
                    ch(0, Major, 1.0),
                    ch(9, Minor, 1.0),
                    ch(5, Major, 1.0),
                    ch(7, Major, 1.0),
                ]
            },
            // vi IV I V
            Progression::FourChordTurnaround => const {
                &[
                    ch(9, Minor, 1.0),
                    ch(5, Major, 1.0),
                    ch(0, Major, 1.0),
                    ch(7, Major, 1.0),
                ]
            },
            // I IV I V
            Progression::PlagalLift => const {
                &[
                    ch(0, Major, 1.0),
                    ch(5, Major, 1.0),
                    ch(0, Major, 1.0),
                    ch(7, Sus4, 0.5),
                    ch(7, Major, 0.5),
                ]
            },
            // I iii IV V
            Progression::StepwiseBallad => const {
                &[
                    ch(0, Major7, 1.0),
                    ch(4, Minor7, 1.0),
                    ch(5, Major7, 1.0),
                    ch(7, Dominant7, 1.0),
                ]
            },
            // I V/7 vi IV/6 in half bars
            Progression::DescendingBass => const {
                &[
                    ch(0, Major, 0.5),
                    ch(7, Major, 0.5).inverted(1),
                    ch(9, Minor, 0.5),
                    ch(4, Minor, 0.5).inverted(1),
                    ch(5, Major, 0.5),
                    ch(0, Major, 0.5).inverted(2),
                    ch(2, Minor7, 0.5),
                    ch(7, Dominant7, 0.5),
                ]
            },
            Progression::SeventhsLoop => const {
                &[
                    ch(0, Major7, 2.0),
                    ch(5, Major7, 2.0).with_extensions(&[14]),
                ]
            },
            // ii V I
            Progression::TwoFiveOne => const {
                &[
                    ch(2, Minor7, 1.0),
                    ch(7, Dominant7, 1.0),
                    ch(0, Major7, 2.0),
                ]
            },
            // I vi ii V
            Progression::RhythmChanges => const {
                &[
                    ch(0, Major7, 0.5),
                    ch(9, Minor7, 0.5),
                    ch(2, Minor7, 0.5),
                    ch(7, Dominant7, 0.5),
                ]
            },
            Progression::ColtraneSteps => const {
                &[
                    ch(0, Major7, 1.0),
                    ch(3, Dominant7, 0.5),
                    ch(8, Major7, 0.5),
                    ch(11, Dominant7, 0.5),
                    ch(4, Major7, 0.5),
                    ch(7, Dominant7, 1.0),
                ]
            },
            // i VI, slow
            Progression::DriftTonicSix => const {
                &[
                    ch(0, Minor, 2.0),
                    ch(8, Major, 2.0).with_extensions(&[14]),
                ]
            },
            // i iv, slow
            Progression::DriftTonicFour => const { &[ch(0, Minor7, 2.0), ch(5, Minor7, 2.0)] },
            Progression::SuspendedLoop => const {
                &[
                    ch(0, Sus2, 2.0),
                    ch(10, Major, 2.0),
                    ch(8, Major, 2.0).with_extensions(&[14]),
                    ch(10, Sus4, 2.0),
                ]
            },
            // i VI III VII
            Progression::NightDrive => const {
                &[
                    ch(0, Minor, 1.0),
                    ch(8, Major, 1.0),
                    ch(3, Major, 1.0),
                    ch(10, Major, 1.0),
                ]
            },
            // i VII VI V
            Progression::AeolianCadence => const {
                &[
                    ch(0, Minor, 1.0),
                    ch(10, Major, 1.0),
                    ch(8, Major, 1.0),
                    ch(7, Major, 1.0),
                ]
            },
            // VI VII i i
            Progression::NeonRise => const {
                &[
                    ch(8, Major7, 1.0),
                    ch(10, Major, 1.0),
                    ch(0, Minor, 2.0),
                ]
            },
            // i VI III VII/3
            Progression::EpicMinor => const {
                &[
                    ch(0, Minor, 1.0),
                    ch(8, Major, 1.0),
                    ch(3, Major, 1.0),
                    ch(10, Major, 1.0).inverted(1),
                ]
            },
            // i iv VI V
            Progression::HeroicLament => const {
                &[
                    ch(0, Minor, 1.0),
                    ch(5, Minor, 1.0),
                    ch(8, Major7, 1.0),
                    ch(7, Dominant7, 1.0),
                ]
            },
            // i III VII iv
            Progression::ShadowThird => const {
                &[
                    ch(0, Minor7, 1.0),
                    ch(3, Major7, 1.0),
                    ch(10, Dominant7, 1.0),
                    ch(5, Minor7, 1.0),
                ]
            },
            // ii° V i
            Progression::MinorTwoFiveOne => const {
                &[
                    ch(2, HalfDiminished7, 1.0),
                    ch(7, Dominant7, 1.0),
                    ch(0, Minor7, 2.0),
                ]
            },
            Progression::MinorTurnaround => const {
                &[
                    ch(0, Minor7, 1.0),
                    ch(8, Major7, 1.0),
                    ch(2, HalfDiminished7, 1.0),
                    ch(7, Dominant7, 1.0),
                ]
            },
        }
    }

    /// Length of one pass through the template, in bars.
    pub fn bars(self) -> f64 {
        self.chords().iter().map(|c| c.duration_in_bars).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_BUCKETS: [GenreBucket; 7] = [
        GenreBucket::Pop,
        GenreBucket::Ballad,
        GenreBucket::JazzMajor,
        GenreBucket::Ambient,
        GenreBucket::Synthwave,
        GenreBucket::Cinematic,
        GenreBucket::JazzMinor,
    ];

    #[test]
    fn test_every_bucket_has_progressions() {
        for bucket in ALL_BUCKETS {
            assert!(!bucket.progressions().is_empty(), "{bucket:?} is empty");
        }
    }

    #[test]
    fn test_templates_are_well_formed() {
        for bucket in ALL_BUCKETS {
            for &prog in bucket.progressions() {
                assert!(prog.bars() > 0.0);
                for chord in prog.chords() {
                    assert!(chord.degree < 12, "{prog:?} has degree {}", chord.degree);
                    assert!(chord.duration_in_bars > 0.0);
                }
            }
        }
    }

    #[test]
    fn test_bucket_selection() {
        assert_eq!(GenreBucket::select(Mode::Ionian, 0.2), GenreBucket::Pop);
        assert_eq!(GenreBucket::select(Mode::Ionian, 0.5), GenreBucket::Ballad);
        assert_eq!(GenreBucket::select(Mode::Lydian, 0.9), GenreBucket::JazzMajor);
        assert_eq!(GenreBucket::select(Mode::Aeolian, 0.1), GenreBucket::Ambient);
        assert_eq!(GenreBucket::select(Mode::Dorian, 0.5), GenreBucket::Synthwave);
        assert_eq!(GenreBucket::select(Mode::Phrygian, 0.6), GenreBucket::Cinematic);
        assert_eq!(GenreBucket::select(Mode::Aeolian, 0.8), GenreBucket::JazzMinor);
    }
}
