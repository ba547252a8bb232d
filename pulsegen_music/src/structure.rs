// Structure planning: song form, bar budget and the section timeline.
//
// Before any notes exist, the song is laid out as a sequence of sections.
// A form (ordered list of section types) is chosen from the target duration
// and the style's form family: short loop forms up to 90 seconds, standard
// forms up to three minutes, extended forms with bridges and interludes
// beyond that.
//
// The usable bar budget is the target minus the fades, divided by the bar
// length and rounded. Sections are walked left to right; each non-last
// section draws a bar count from its allowed set among the values that
// still leave four bars for every following section, otherwise the
// remainder is split evenly. The last section takes whatever is left (at
// least four bars), so the budget is always consumed exactly. When the
// budget is too small for the form, the timeline grows instead: this is the
// only place the total duration may drift from the request.
//
// Each section gets a profile (type defaults nudged by the risk factor) and
// a transition into its successor, chosen by type-pair rules.

use crate::score::{
    Characteristics, Section, SectionProfile, SectionType, Transition,
    TransitionCharacteristics, TransitionType, round_time,
};
use pulsegen_prng::SeededRandom;
use serde::{Deserialize, Serialize};

/// Minimum bars reserved for every section still to be planned.
const MIN_SECTION_BARS: u32 = 4;

/// Targets up to this length use short loop forms.
const SHORT_FORM_SECONDS: f64 = 90.0;

/// Targets up to this length use standard forms.
const STANDARD_FORM_SECONDS: f64 = 180.0;

/// Budgets below this many bars use the two-section loop.
const TWO_SECTION_BUDGET: u32 = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormFamily {
    #[default]
    Song,
    Electronic,
    Ambient,
}

/// Closed set of song forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Form {
    VerseChorus,
    VerseChorusVerse,
    VerseVerseChorus,
    PopStandard,
    PreChorusStandard,
    ClubStandard,
    DriftStandard,
    ExtendedSong,
    ExtendedClub,
    ExtendedDrift,
}

impl Form {
    pub fn sections(self) -> &'static [SectionType] {
        use SectionType::*;
        match self {
            Form::VerseChorus => &[Verse, Chorus],
            Form::VerseChorusVerse => &[Verse, Chorus, Verse],
            Form::VerseVerseChorus => &[Verse, Verse, Chorus],
            Form::PopStandard => &[Intro, Verse, Chorus, Verse, Chorus, Outro],
            Form::PreChorusStandard => &[
                Intro, Verse, PreChorus, Chorus, Verse, PreChorus, Chorus, Outro,
            ],
            Form::ClubStandard => &[Intro, Buildup, Drop, Breakdown, Buildup, Drop, Outro],
            Form::DriftStandard => &[Intro, Verse, Interlude, Chorus, Outro],
            Form::ExtendedSong => &[
                Intro, Verse, PreChorus, Chorus, Verse, Chorus, Bridge, Chorus, Outro,
            ],
            Form::ExtendedClub => &[
                Intro, Verse, Buildup, Drop, Breakdown, Bridge, Buildup, Drop, Outro,
            ],
            Form::ExtendedDrift => &[
                Intro, Verse, Interlude, Chorus, Interlude, Bridge, Chorus, Outro,
            ],
        }
    }

    pub fn is_short_loop(self) -> bool {
        matches!(
            self,
            Form::VerseChorus | Form::VerseChorusVerse | Form::VerseVerseChorus
        )
    }
}

/// Bar counts a section of this type may take when the budget allows.
pub fn allowed_bars(section_type: SectionType) -> &'static [u32] {
    match section_type {
        SectionType::Intro => &[4, 8],
        SectionType::Verse => &[8, 12],
        SectionType::PreChorus => &[4, 8],
        SectionType::Chorus => &[8, 12, 16],
        SectionType::Bridge => &[8],
        SectionType::Interlude => &[4, 8],
        SectionType::Buildup => &[4, 8],
        SectionType::Breakdown => &[8],
        SectionType::Drop => &[8, 16],
        SectionType::Outro => &[4, 8],
    }
}

/// Default profile for a section type, before the risk nudge.
pub fn base_profile(section_type: SectionType) -> SectionProfile {
    let (intensity, layer_density, harmonic_complexity, melodic_density, rhythmic_density) =
        match section_type {
            SectionType::Intro => (0.3, 0.4, 0.3, 0.3, 0.3),
            SectionType::Verse => (0.5, 0.6, 0.5, 0.6, 0.5),
            SectionType::PreChorus => (0.65, 0.7, 0.6, 0.6, 0.65),
            SectionType::Chorus => (0.8, 0.9, 0.6, 0.8, 0.8),
            SectionType::Bridge => (0.55, 0.6, 0.7, 0.5, 0.5),
            SectionType::Interlude => (0.3, 0.4, 0.4, 0.3, 0.25),
            SectionType::Buildup => (0.7, 0.7, 0.5, 0.5, 0.85),
            SectionType::Breakdown => (0.35, 0.4, 0.5, 0.4, 0.3),
            SectionType::Drop => (0.9, 1.0, 0.5, 0.7, 0.95),
            SectionType::Outro => (0.3, 0.4, 0.3, 0.3, 0.3),
        };
    let characteristics = Characteristics {
        repetitive: matches!(section_type, SectionType::Verse | SectionType::Drop),
        motivic: matches!(section_type, SectionType::Verse | SectionType::Chorus),
        transitional: matches!(section_type, SectionType::PreChorus | SectionType::Buildup),
        climactic: matches!(section_type, SectionType::Chorus | SectionType::Drop),
        atmospheric: matches!(
            section_type,
            SectionType::Intro
                | SectionType::Interlude
                | SectionType::Breakdown
                | SectionType::Outro
        ),
    };
    SectionProfile {
        intensity,
        layer_density,
        harmonic_complexity,
        melodic_density,
        rhythmic_density,
        tempo_multiplier: 1.0,
        characteristics,
    }
}

/// Apply the risk factor and the repeat-occurrence lift to a base profile.
fn nudge_profile(mut profile: SectionProfile, risk: f64, occurrence: u32) -> SectionProfile {
    let delta = risk.clamp(0.0, 1.0) - 0.5;
    if profile.characteristics.climactic {
        profile.intensity += 0.2 * delta + 0.05 * occurrence.min(2) as f64;
        profile.rhythmic_density += 0.3 * delta;
    }
    if risk > 0.7 {
        profile.characteristics.repetitive = false;
    }
    profile.intensity = profile.intensity.clamp(0.0, 1.0);
    profile.rhythmic_density = profile.rhythmic_density.clamp(0.0, 1.0);
    profile
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StructureRequest {
    pub target_duration: f64,
    pub tempo_bpm: f64,
    pub beats_per_bar: u8,
    pub fade_in: f64,
    pub fade_out: f64,
    pub form_family: FormFamily,
    /// Risk/punk factor in [0, 1].
    pub punk_factor: f64,
}

impl StructureRequest {
    pub fn seconds_per_bar(&self) -> f64 {
        60.0 / self.tempo_bpm * self.beats_per_bar as f64
    }

    pub fn bar_budget(&self) -> u32 {
        let usable = self.target_duration - self.fade_in - self.fade_out;
        let bars = (usable / self.seconds_per_bar()).round();
        if bars.is_finite() && bars > MIN_SECTION_BARS as f64 {
            bars as u32
        } else {
            MIN_SECTION_BARS
        }
    }
}

/// The planned song layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Structure {
    pub form: Form,
    pub sections: Vec<Section>,
    pub fade_in: f64,
    pub fade_out: f64,
    pub seconds_per_bar: f64,
    pub total_bars: u32,
    pub total_duration: f64,
}

impl Structure {
    /// The section containing `time`, if any.
    pub fn section_at(&self, time: f64) -> Option<&Section> {
        self.sections
            .iter()
            .find(|s| time >= s.start_time && time < s.end_time())
    }

    /// Human-readable timeline, one line per section.
    pub fn summary(&self) -> String {
        let mut out = format!(
            "form {:?}: {} bars, {:.2}s (fade in {:.1}s, out {:.1}s)\n",
            self.form, self.total_bars, self.total_duration, self.fade_in, self.fade_out
        );
        for s in &self.sections {
            out.push_str(&format!(
                "  {:<12} {:>3} bars  {:>7.2}s..{:>7.2}s  intensity {:.2}  -> {:?}\n",
                s.id,
                s.bars,
                s.start_time,
                s.end_time(),
                s.profile.intensity,
                s.transition.transition_type
            ));
        }
        out
    }
}

/// Choose a form for the target duration and bar budget.
pub fn select_form(
    target_duration: f64,
    budget: u32,
    family: FormFamily,
    rng: &mut SeededRandom,
) -> Form {
    if target_duration <= SHORT_FORM_SECONDS {
        if budget < TWO_SECTION_BUDGET {
            return Form::VerseChorus;
        }
        return *rng
            .choice(&[Form::VerseChorusVerse, Form::VerseVerseChorus])
            .unwrap_or(&Form::VerseChorusVerse);
    }
    if target_duration <= STANDARD_FORM_SECONDS {
        return match family {
            FormFamily::Song => *rng
                .choice(&[Form::PopStandard, Form::PreChorusStandard])
                .unwrap_or(&Form::PopStandard),
            FormFamily::Electronic => Form::ClubStandard,
            FormFamily::Ambient => Form::DriftStandard,
        };
    }
    match family {
        FormFamily::Song => Form::ExtendedSong,
        FormFamily::Electronic => Form::ExtendedClub,
        FormFamily::Ambient => Form::ExtendedDrift,
    }
}

/// Distribute `budget` bars over `types`.
pub fn assign_bars(types: &[SectionType], budget: u32, rng: &mut SeededRandom) -> Vec<u32> {
    let mut remaining = budget;
    let mut bars = Vec::with_capacity(types.len());
    for (i, &section_type) in types.iter().enumerate() {
        let following = (types.len() - i - 1) as u32;
        if following == 0 {
            bars.push(remaining.max(MIN_SECTION_BARS));
            break;
        }
        let reserve = following * MIN_SECTION_BARS;
        let affordable: Vec<u32> = allowed_bars(section_type)
            .iter()
            .copied()
            .filter(|&b| remaining >= b + reserve)
            .collect();
        let chosen = match rng.choice(&affordable) {
            Some(&b) => b,
            None => (remaining / (following + 1)).max(1),
        };
        bars.push(chosen);
        remaining = remaining.saturating_sub(chosen);
    }
    bars
}

fn transition_between(
    current: &Section,
    next: Option<&Section>,
    seconds_per_bar: f64,
    rng: &mut SeededRandom,
) -> Transition {
    let Some(next) = next else {
        return Transition {
            transition_type: TransitionType::End,
            duration: 0.0,
            characteristics: TransitionCharacteristics::default(),
        };
    };

    use SectionType::*;
    let transition_type = match (current.section_type, next.section_type) {
        (Verse, Chorus) => {
            if rng.random_bool(0.5) {
                TransitionType::Buildup
            } else {
                TransitionType::Cut
            }
        }
        (PreChorus, Chorus) | (Buildup, Drop) => TransitionType::Riser,
        (_, Breakdown) => TransitionType::Breakdown,
        (_, Bridge) | (_, Interlude) => TransitionType::Fade,
        (Chorus, Verse) => TransitionType::Cut,
        (_, Outro) => TransitionType::Sustain,
        _ => TransitionType::Cut,
    };
    let bars = if transition_type == TransitionType::Cut {
        0.5
    } else {
        1.0
    };
    Transition {
        transition_type,
        duration: round_time((bars * seconds_per_bar).min(current.duration)),
        characteristics: TransitionCharacteristics {
            energy_change: next.profile.intensity - current.profile.intensity,
            drum_fill: matches!(
                transition_type,
                TransitionType::Buildup | TransitionType::Riser
            ),
            filter_sweep: matches!(
                transition_type,
                TransitionType::Riser | TransitionType::Fade | TransitionType::Breakdown
            ),
        },
    }
}

/// Plan the complete section timeline.
pub fn plan_structure(request: &StructureRequest, rng: &mut SeededRandom) -> Structure {
    let seconds_per_bar = request.seconds_per_bar();
    let budget = request.bar_budget();
    let form = select_form(request.target_duration, budget, request.form_family, rng);
    let types = form.sections();
    let bars = assign_bars(types, budget, rng);

    let mut sections: Vec<Section> = Vec::with_capacity(types.len());
    let mut start = round_time(request.fade_in);
    let mut occurrences = [0u32; 10];
    for (index, (&section_type, &section_bars)) in types.iter().zip(bars.iter()).enumerate() {
        let seen = &mut occurrences[section_type as usize];
        let profile = nudge_profile(base_profile(section_type), request.punk_factor, *seen);
        *seen += 1;
        let duration = round_time(section_bars as f64 * seconds_per_bar);
        sections.push(Section {
            id: format!("{}-{}", section_type, index),
            section_type,
            index,
            start_time: start,
            duration,
            bars: section_bars,
            profile,
            // Filled in once every section exists.
            transition: Transition {
                transition_type: TransitionType::End,
                duration: 0.0,
                characteristics: TransitionCharacteristics::default(),
            },
        });
        start = round_time(start + duration);
    }

    for i in 0..sections.len() {
        let transition =
            transition_between(&sections[i], sections.get(i + 1), seconds_per_bar, rng);
        sections[i].transition = transition;
    }

    let total_bars = bars.iter().sum();
    let total_duration = round_time(start + request.fade_out);
    tracing::debug!(?form, total_bars, total_duration, "structure planned");

    Structure {
        form,
        sections,
        fade_in: request.fade_in,
        fade_out: request.fade_out,
        seconds_per_bar,
        total_bars,
        total_duration,
    }
}
