// End-to-end properties of `generate` across the built-in styles.

use midly::{MetaMessage, Smf, TrackEventKind};
use pretty_assertions::assert_eq;
use pulsegen_music::drums::plan_layout;
use pulsegen_music::harmony::effective_complexity;
use pulsegen_music::orchestrator::MAX_SILENCE;
use pulsegen_music::pipeline::{GenerationOutput, GenerationParams, Vitals, generate};
use pulsegen_music::score::{Note, TrackName, silent_gaps};
use pulsegen_music::style::StyleCatalog;

const EPS: f64 = 1e-6;

fn run(seed: u32, duration: f64, style: &str, complexity: f64) -> GenerationOutput {
    let params = GenerationParams {
        seed,
        target_duration_seconds: duration,
        style_preset_id: style.to_string(),
        complexity,
        vitals: None,
        humanize: true,
    };
    generate(&params, &StyleCatalog::builtin()).expect("generation succeeds")
}

fn all_outputs() -> Vec<GenerationOutput> {
    let catalog = StyleCatalog::builtin();
    let mut outputs = Vec::new();
    for (i, id) in catalog.ids().enumerate() {
        outputs.push(run(11 + i as u32, 75.0, id, 0.3 + 0.1 * i as f64));
    }
    outputs
}

#[test]
fn same_seed_gives_identical_bytes() {
    let a = run(1234, 90.0, "synthwave-drive", 0.7);
    let b = run(1234, 90.0, "synthwave-drive", 0.7);
    assert_eq!(a.midi, b.midi);
    assert_eq!(a.track_metadata, b.track_metadata);
    assert_eq!(a.sections, b.sections);

    let c = run(1235, 90.0, "synthwave-drive", 0.7);
    assert_ne!(a.midi, c.midi);
}

#[test]
fn vitals_change_the_output_deterministically() {
    let params = GenerationParams {
        seed: 7,
        target_duration_seconds: 60.0,
        style_preset_id: "lofi-study".into(),
        complexity: 0.5,
        vitals: Some(Vitals {
            stress: 0.9,
            harmony: 0.1,
            creativity: 0.9,
        }),
        humanize: false,
    };
    let catalog = StyleCatalog::builtin();
    let a = generate(&params, &catalog).unwrap();
    let b = generate(&params, &catalog).unwrap();
    assert_eq!(a.midi, b.midi);
}

#[test]
fn timeline_is_contiguous_and_covers_the_song() {
    for output in all_outputs() {
        let structure = &output.structure;
        let first = &structure.sections[0];
        assert!((first.start_time - structure.fade_in).abs() < EPS);
        for pair in structure.sections.windows(2) {
            assert!((pair[0].end_time() - pair[1].start_time).abs() < 1e-3);
        }
        let body: f64 = structure.sections.iter().map(|s| s.duration).sum();
        let total = structure.fade_in + body + structure.fade_out;
        assert!((total - structure.total_duration).abs() < 1e-3);
        assert_eq!(
            structure.total_bars,
            structure.sections.iter().map(|s| s.bars).sum::<u32>()
        );
    }
}

#[test]
fn every_note_stays_inside_its_section() {
    for output in all_outputs() {
        for (name, notes) in output.tracks.iter() {
            for note in notes {
                let section = output
                    .structure
                    .section_at(note.start_time)
                    .unwrap_or_else(|| {
                        panic!("{name}: note at {} outside sections", note.start_time)
                    });
                assert!(
                    note.end_time() <= section.end_time() + EPS,
                    "{name}: note {note:?} overruns {}",
                    section.id
                );
                assert!(note.duration > 0.0);
            }
        }
    }
}

#[test]
fn no_long_silence_in_supporting_layers() {
    for output in all_outputs() {
        let support: Vec<&Note> = [
            TrackName::Harmony,
            TrackName::Bass,
            TrackName::Rhythm,
            TrackName::Pad,
        ]
        .into_iter()
        .flat_map(|name| output.tracks.get(name).iter())
        .collect();
        for section in &output.structure.sections {
            let gaps = silent_gaps(
                support.iter().copied(),
                section.start_time,
                section.end_time(),
                MAX_SILENCE,
            );
            assert!(gaps.is_empty(), "{}: gaps {gaps:?}", section.id);
        }
    }
}

#[test]
fn smf_header_and_percussion_channel() {
    for output in all_outputs() {
        assert_eq!(&output.midi[..4], b"MThd");
        let smf = Smf::parse(&output.midi).unwrap();
        assert_eq!(smf.tracks.len(), output.track_metadata.len() + 1);

        for (meta, track) in output.track_metadata.iter().zip(smf.tracks.iter().skip(1)) {
            let name = track.iter().find_map(|e| match e.kind {
                TrackEventKind::Meta(MetaMessage::TrackName(bytes)) => Some(bytes),
                _ => None,
            });
            assert_eq!(name, Some(meta.track_type.as_str().as_bytes()));

            let channels: Vec<u8> = track
                .iter()
                .filter_map(|e| match e.kind {
                    TrackEventKind::Midi { channel, .. } => Some(channel.as_int()),
                    _ => None,
                })
                .collect();
            if meta.track_type == TrackName::Rhythm {
                assert!(channels.iter().all(|&c| c == 9));
            } else {
                assert!(channels.iter().all(|&c| c != 9));
            }
        }
    }
}

#[test]
fn scenario_short_cyberpunk_loop() {
    let output = run(42, 60.0, "cyberpunk-ambient", 0.5);
    let structure = &output.structure;
    assert!(structure.form.is_short_loop(), "form {:?}", structure.form);

    let seconds_per_bar = 4.0 * 60.0 / 90.0;
    let body = 60.0 - structure.fade_in - structure.fade_out;
    let expected = (body / seconds_per_bar).round() as u32;
    assert_eq!(structure.total_bars, expected);
    assert_eq!(output.key_name, "a aeolian");
    assert_eq!(output.tempo_bpm, 90.0);
}

#[test]
fn scenario_drum_layout_never_truncates() {
    let layout = plan_layout(10, 4, 0.5);
    assert_eq!(layout.repetitions, 2);
    assert_eq!(layout.fills.len(), 1);
    assert_eq!(layout.fills[0].bars(), 2);
    assert_eq!(layout.covered_bars(), 10);
}

#[test]
fn scenario_heavy_load_caps_complexity() {
    assert!(effective_complexity(0.9, 1.6) <= 0.6);
    let output = run(3, 120.0, "synthwave-drive", 0.9);
    assert!(output.sections.iter().all(|s| s.chord_count > 0));
}

#[test]
fn metadata_serializes_with_camel_case_keys() {
    let output = run(5, 40.0, "punk-pop", 0.6);
    let json = serde_json::to_value(&output).unwrap();
    let first = &json["trackMetadata"][0];
    assert_eq!(first["empiricalIndex"], 1);
    assert!(first.get("instrumentKey").is_some());
    assert!(first.get("instrumentType").is_some());
    assert!(json.get("midi").is_none());
}
