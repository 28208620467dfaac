//! Dispatcher Integration Tests
//!
//! End-to-end command processing over a recording sink: commit/rollback
//! discipline, clamping, headroom reduction and downstream forwarding.

use std::collections::BTreeMap;

use approx::assert_relative_eq;
use pretty_assertions::assert_eq as assert_eq_pretty;

use claro::catalog::{Catalog, FilterBank, InputSpec};
use claro::config::Config;
use claro::control::{Ack, Dispatcher, Warning};
use claro::curves::{CurveRepository, CurveTable};
use claro::sink::{MemorySink, SinkCall};
use claro::state::StateRecord;

fn flat_table(freq_count: usize, steps: usize) -> CurveTable {
    CurveTable {
        mag: vec![vec![0.0; steps]; freq_count],
        pha: vec![vec![0.0; steps]; freq_count],
    }
}

/// Curves that are flat except for a single target peak at one frequency.
fn fixture_curves(config: &Config, target_peak: f64) -> CurveRepository {
    let frequencies = vec![31.5, 125.0, 1000.0, 8000.0];
    let count = frequencies.len();
    let mut target = vec![0.0; count];
    target[2] = target_peak;
    CurveRepository::from_parts(
        frequencies,
        target,
        vec![0.0; count],
        flat_table(count, config.loudness_steps()),
        flat_table(count, config.tone_steps()),
        flat_table(count, config.tone_steps()),
        config,
    )
    .unwrap()
}

fn bank(filters: &[&str], sets: &[(&str, &[&str])]) -> FilterBank {
    FilterBank {
        filters: filters.iter().map(|s| s.to_string()).collect(),
        sets: sets
            .iter()
            .map(|(name, coeffs)| {
                (
                    name.to_string(),
                    coeffs.iter().map(|c| c.to_string()).collect(),
                )
            })
            .collect(),
    }
}

fn fixture_catalog() -> Catalog {
    let mut inputs = BTreeMap::new();
    inputs.insert(
        "analog".to_string(),
        InputSpec {
            source_ports: vec!["system:capture_1".into(), "system:capture_2".into()],
            gain: 0.0,
            xo: Some("mp".to_string()),
        },
    );
    inputs.insert(
        "digital".to_string(),
        InputSpec {
            source_ports: vec!["spdif:capture_1".into(), "spdif:capture_2".into()],
            gain: -3.0,
            xo: None,
        },
    );
    let catalog = Catalog {
        ref_level_gain: 0.0,
        inputs,
        xo: bank(
            &["f.lo.L", "f.lo.R"],
            &[
                ("mp", &["xo.mp.lo", "xo.mp.lo"]),
                ("lp", &["xo.lp.lo", "xo.lp.lo"]),
            ],
        ),
        drc: bank(
            &["f.drc.L", "f.drc.R"],
            &[("sofa", &["drc.sofa.L", "drc.sofa.R"])],
        ),
        peq: bank(&["f.peq.L", "f.peq.R"], &[("vocal", &["peq.v.L", "peq.v.R"])]),
    };
    catalog.validate().unwrap();
    catalog
}

fn dispatcher_with(config: Config, target_peak: f64) -> Dispatcher<MemorySink> {
    let curves = fixture_curves(&config, target_peak);
    Dispatcher::new(
        config,
        fixture_catalog(),
        curves,
        StateRecord::default(),
        MemorySink::new(),
    )
}

fn dispatcher() -> Dispatcher<MemorySink> {
    dispatcher_with(Config::default(), 0.0)
}

// === Commit and relative semantics ===

#[test]
fn test_level_absolute_then_relative_restores_exactly() {
    let mut d = dispatcher();
    assert_eq!(d.process("level -30").ack, Ack::Done);
    assert_eq!(d.state().level, -30.0);

    d.process("level 2 add");
    assert_eq!(d.state().level, -28.0);
    d.process("level -2 add");
    assert_eq!(d.state().level, -30.0);
}

#[test]
fn test_unchanged_value_reports_no_change() {
    let mut d = dispatcher();
    let first = d.process("balance 1");
    assert!(first.changed);
    let second = d.process("balance 1");
    assert_eq!(second.ack, Ack::Done);
    assert!(!second.changed);
}

#[test]
fn test_every_audible_change_commits_gain_then_eq() {
    let mut d = dispatcher();
    d.process("treble -2");
    let calls = d.sink().calls();
    assert!(matches!(calls[0], SinkCall::Gain { .. }));
    assert!(matches!(calls[1], SinkCall::Eq { .. }));
}

// === Clamping ===

#[test]
fn test_bass_out_of_range_is_clamped_and_committed() {
    let mut d = dispatcher();
    let response = d.process("bass 10");

    assert_eq!(response.ack, Ack::Done);
    assert_eq!(d.state().bass, 6.0);
    let clamps: Vec<_> = response
        .warnings
        .iter()
        .filter(|w| matches!(w, Warning::OutOfRange { field: "bass", .. }))
        .collect();
    assert_eq!(clamps.len(), 1);
}

#[test]
fn test_clamping_is_idempotent() {
    let mut d = dispatcher();
    let first = d.process("bass 10");
    let second = d.process("bass 10");

    assert_eq!(d.state().bass, 6.0);
    assert_eq!(first.warnings.len(), second.warnings.len());
    assert!(!second.changed);
}

#[test]
fn test_relative_overshoot_clamps_at_boundary() {
    let mut d = dispatcher();
    d.process("balance 5");
    let response = d.process("balance 4 add");
    assert_eq!(d.state().balance, 6.0);
    assert!(response
        .warnings
        .iter()
        .any(|w| matches!(w, Warning::OutOfRange { field: "balance", .. })));
}

// === Headroom ===

#[test]
fn test_positive_eq_peak_pulls_gain_down() {
    let mut d = dispatcher_with(Config::default(), 3.0);
    let response = d.process("level 0");

    assert_eq!(response.ack, Ack::Done);
    // +3 dB composite peak against the 0 dB ceiling: committed at -3
    assert_relative_eq!(d.state().level, -3.0);
    assert!(response.warnings.is_empty());
    let (left, right) = d.sink().last_gain().unwrap();
    assert_relative_eq!(left, 10.0_f64.powf(-3.0 / 20.0), epsilon = 1e-12);
    assert_relative_eq!(right, left);
}

#[test]
fn test_gain_floor_commits_with_headroom_warning() {
    let config = Config {
        gain_min: -10.0,
        ..Config::default()
    };
    let mut d = dispatcher_with(config, 20.0);
    let response = d.process("level -5");

    assert_eq!(response.ack, Ack::Done);
    assert_relative_eq!(d.state().level, -10.0);
    assert!(response
        .warnings
        .iter()
        .any(|w| matches!(w, Warning::HeadroomExceeded { .. })));
    assert!(d.sink().last_gain().is_some());
}

// === Rollback ===

#[test]
fn test_sink_failure_rolls_back_byte_for_byte() {
    let mut d = dispatcher();
    d.process("level -30");
    d.process("balance 2");
    let before = d.state().clone();

    d.sink_mut().refuse_call(0);
    let response = d.process("level -15");

    assert_eq!(response.ack, Ack::RolledBack);
    assert_eq_pretty!(&before, d.state());
    assert_eq!(response.warnings.len(), 1);
    assert!(matches!(
        response.warnings[0],
        Warning::Downstream { command: "level", .. }
    ));
}

#[test]
fn test_input_switch_failure_reverts_input_and_xo() {
    let mut d = dispatcher();
    let before = d.state().clone();

    // routing succeeds, the associated crossover reload is refused
    d.sink_mut().refuse_call(1);
    let response = d.process("input analog");

    assert_eq!(response.ack, Ack::RolledBack);
    assert_eq_pretty!(&before, d.state());
}

#[test]
fn test_unknown_command_leaves_state_untouched() {
    let mut d = dispatcher();
    let before = d.state().clone();
    let response = d.process("frobnicate 3");

    assert_eq!(response.ack, Ack::RolledBack);
    assert_eq!(
        response.warnings,
        vec![Warning::UnknownCommand("frobnicate".to_string())]
    );
    assert_eq_pretty!(&before, d.state());
    assert!(d.sink().calls().is_empty());
}

#[test]
fn test_bad_toggle_word_leaves_state_untouched() {
    let mut d = dispatcher();
    let before = d.state().clone();
    let response = d.process("mute maybe");

    assert_eq!(response.ack, Ack::RolledBack);
    assert!(matches!(
        response.warnings[0],
        Warning::BadOption { field: "mute", .. }
    ));
    assert_eq_pretty!(&before, d.state());
}

// === Toggles and polarity ===

#[test]
fn test_mute_zeroes_multipliers_and_toggles_back() {
    let mut d = dispatcher();
    d.process("mute on");
    assert_eq!(d.sink().last_gain().unwrap(), (0.0, 0.0));
    assert!(d.state().mute);

    d.process("mute toggle");
    assert!(!d.state().mute);
    let (left, right) = d.sink().last_gain().unwrap();
    assert!(left > 0.0 && right > 0.0);
}

#[test]
fn test_inverted_polarity_flips_both_signs() {
    let mut d = dispatcher();
    d.process("polarity -");
    let (left, right) = d.sink().last_gain().unwrap();
    assert!(left < 0.0 && right < 0.0);
}

#[test]
fn test_mono_is_a_direct_mix_commit() {
    let mut d = dispatcher();
    let response = d.process("mono on");
    assert_eq!(response.ack, Ack::Done);
    assert!(d.state().mono);
    assert_eq!(d.sink().calls(), &[SinkCall::Mix { mono: true }]);
}

// === Catalog selections ===

#[test]
fn test_input_switch_routes_and_reapplies_xo() {
    let mut d = dispatcher();
    let response = d.process("input analog");

    assert_eq!(response.ack, Ack::Done);
    assert_eq!(d.state().input, "analog");
    assert_eq!(d.state().xo_set, "mp");
    let calls = d.sink().calls();
    assert_eq!(
        calls[0],
        SinkCall::Route {
            input: "analog".to_string()
        }
    );
    assert!(calls
        .iter()
        .any(|c| matches!(c, SinkCall::Coeff { coeff, .. } if coeff == "xo.mp.lo")));
    assert!(calls.iter().any(|c| matches!(c, SinkCall::Gain { .. })));
}

#[test]
fn test_input_trim_gain_feeds_the_committed_gain() {
    let mut d = dispatcher();
    d.process("input digital");
    d.process("level -20");

    // -3 dB trim on the digital input
    let (left, _) = d.sink().last_gain().unwrap();
    assert_relative_eq!(left, 10.0_f64.powf(-23.0 / 20.0), epsilon = 1e-12);
    // and the reported level stays in user terms
    assert_relative_eq!(d.state().level, -20.0);
}

#[test]
fn test_unknown_input_is_rejected() {
    let mut d = dispatcher();
    let before = d.state().clone();
    let response = d.process("input tape");

    assert_eq!(response.ack, Ack::RolledBack);
    assert!(matches!(
        response.warnings[0],
        Warning::BadOption { field: "input", .. }
    ));
    assert_eq_pretty!(&before, d.state());
}

#[test]
fn test_drc_off_bypasses_every_filter() {
    let mut d = dispatcher();
    d.process("drc sofa");
    assert_eq!(d.state().drc_set.as_deref(), Some("sofa"));

    let response = d.process("drc off");
    assert_eq!(response.ack, Ack::Done);
    assert_eq!(d.state().drc_set, None);
    let bypasses: Vec<_> = d
        .sink()
        .calls()
        .iter()
        .filter(|c| matches!(c, SinkCall::Coeff { coeff, .. } if coeff == "-1"))
        .collect();
    assert_eq!(bypasses.len(), 2);
}

#[test]
fn test_peq_selection_loads_the_named_set() {
    let mut d = dispatcher();
    let response = d.process("peq vocal");
    assert_eq!(response.ack, Ack::Done);
    assert_eq!(d.state().peq_set.as_deref(), Some("vocal"));
    assert!(d
        .sink()
        .calls()
        .iter()
        .any(|c| matches!(c, SinkCall::Coeff { filter, coeff }
            if filter == "f.peq.L" && coeff == "peq.v.L")));
}

#[test]
fn test_unknown_xo_set_is_rejected() {
    let mut d = dispatcher();
    let response = d.process("xo steep");
    assert_eq!(response.ack, Ack::RolledBack);
    assert!(matches!(
        response.warnings[0],
        Warning::BadOption { field: "xo", .. }
    ));
}

// === Queries ===

#[test]
fn test_show_and_status_never_fail_and_never_mutate() {
    let mut d = dispatcher();
    d.process("level -25");
    d.process("input analog");
    let before = d.state().clone();

    let show = d.process("show");
    assert_eq!(show.ack, Ack::Done);
    let report = show.reply.unwrap();
    assert!(report.contains("Level"));
    assert!(report.contains("analog"));

    let status = d.process("status");
    assert_eq!(status.ack, Ack::Done);
    let parsed: StateRecord = serde_json::from_str(&status.reply.unwrap()).unwrap();
    assert_eq_pretty!(&before, &parsed);
    assert_eq_pretty!(&before, d.state());
}

// === Startup replay ===

#[test]
fn test_sync_downstream_replays_the_whole_state() {
    let config = Config::default();
    let curves = fixture_curves(&config, 0.0);
    let state = StateRecord {
        level: -30.0,
        input: "analog".to_string(),
        xo_set: "lp".to_string(),
        drc_set: Some("sofa".to_string()),
        mono: true,
        ..StateRecord::default()
    };
    let mut d = Dispatcher::new(config, fixture_catalog(), curves, state, MemorySink::new());

    let warnings = d.sync_downstream();
    assert!(warnings.is_empty(), "unexpected warnings: {warnings:?}");

    let calls = d.sink().calls();
    assert!(calls.iter().any(|c| matches!(c, SinkCall::Route { input } if input == "analog")));
    // the persisted xo choice wins over the input default
    assert_eq!(d.state().xo_set, "lp");
    assert!(calls
        .iter()
        .any(|c| matches!(c, SinkCall::Coeff { coeff, .. } if coeff == "xo.lp.lo")));
    assert!(calls.iter().any(|c| matches!(c, SinkCall::Mix { mono: true })));
    assert!(d.sink().last_gain().is_some());
    assert_relative_eq!(d.state().level, -30.0);
}
