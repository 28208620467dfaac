//! Gain/headroom engine
//!
//! Pure computation from a candidate state to the committed per-channel
//! multipliers and composed equalization curve. The one invariant that
//! matters lives here: the composed signal level (gain plus the peak of the
//! equalization boost plus the balance deviation) never exceeds the
//! configured ceiling. When a candidate would exceed it, gain is reduced
//! until headroom is non-negative, bottoming out at the gain floor.

use log::{debug, warn};

use crate::catalog::Catalog;
use crate::config::Config;
use crate::control::command::Warning;
use crate::curves::{CurveRepository, Family};
use crate::sink::{DspSink, SinkError};
use crate::state::StateRecord;

/// Read-only context for a recompute pass.
#[derive(Clone, Copy)]
pub struct EngineContext<'a> {
    pub config: &'a Config,
    pub catalog: &'a Catalog,
    pub curves: &'a CurveRepository,
}

/// Compose level with the speaker reference and per-input trim gain.
pub fn calc_gain(level: f64, ref_level_gain: f64, input_gain: f64) -> f64 {
    level + ref_level_gain + input_gain
}

/// Invert [`calc_gain`]: recover the user-facing level from a final gain.
pub fn calc_level(gain: f64, ref_level_gain: f64, input_gain: f64) -> f64 {
    gain - ref_level_gain - input_gain
}

/// dB margin left below the ceiling once gain, the equalization peak and the
/// balance deviation are composed.
pub fn calc_headroom(config: &Config, gain: f64, balance: f64, eq_mag_peak: f64) -> f64 {
    config.gain_max - gain - eq_mag_peak - balance.abs() / 2.0
}

/// Map a tone setting onto a curve column. Column 0 is maximum boost
/// (`+tone_span`), the last column maximum cut.
pub fn tone_index(config: &Config, value: f64, steps: usize) -> usize {
    let raw = (config.tone_span - value).round() as i64;
    raw.clamp(0, steps as i64 - 1) as usize
}

/// Map listening level onto a loudness column.
///
/// Louder listening needs less compensation, so the index decreases with
/// `level` rising and increases with `loudness_ref`. With loudness disabled
/// the flat (all-zero) column is selected.
pub fn loudness_index(config: &Config, state: &StateRecord, steps: usize) -> usize {
    let flat = config.loudness_spl_max - config.loudness_spl_ref;
    let raw = if state.loudness {
        flat - state.level + state.loudness_ref
    } else {
        flat
    };
    (raw.round() as i64).clamp(0, steps as i64 - 1) as usize
}

/// Per-channel linear multipliers from a final gain and the current state.
///
/// Balance deviates the channels symmetrically: positive balance favors the
/// right channel. Mute zeroes both; inverted polarity flips both signs.
pub fn channel_multipliers(state: &StateRecord, gain: f64) -> (f64, f64) {
    let left_db = gain - state.balance / 2.0;
    let right_db = gain + state.balance / 2.0;
    let mute = if state.mute { 0.0 } else { 1.0 };
    let sign = state.polarity.sign();
    let to_linear = |db: f64| 10.0_f64.powf(db / 20.0) * mute * sign;
    (to_linear(left_db), to_linear(right_db))
}

/// Compose target + loudness + treble + bass into one curve pair.
fn compose_eq(ctx: &EngineContext<'_>, state: &StateRecord) -> (Vec<f64>, Vec<f64>) {
    let loudness = ctx.curves.family(Family::Loudness);
    let treble = ctx.curves.family(Family::Treble);
    let bass = ctx.curves.family(Family::Bass);

    let li = loudness_index(ctx.config, state, loudness.steps());
    let ti = tone_index(ctx.config, state.treble, treble.steps());
    let bi = tone_index(ctx.config, state.bass, bass.steps());
    debug!("curve indexes: loudness {li}, treble {ti}, bass {bi}");

    let freq_count = ctx.curves.frequencies().len();
    let mut mag = Vec::with_capacity(freq_count);
    let mut pha = Vec::with_capacity(freq_count);
    for f in 0..freq_count {
        mag.push(
            ctx.curves.target_mag()[f] + loudness.mag[f][li] + treble.mag[f][ti] + bass.mag[f][bi],
        );
        pha.push(
            ctx.curves.target_pha()[f] + loudness.pha[f][li] + treble.pha[f][ti] + bass.pha[f][bi],
        );
    }
    (mag, pha)
}

fn peak(values: &[f64]) -> f64 {
    values.iter().copied().fold(f64::NEG_INFINITY, f64::max)
}

/// Current gain and headroom for a state, without committing anything.
/// Used by the `show` report.
pub fn preview(ctx: &EngineContext<'_>, state: &StateRecord) -> (f64, f64) {
    let gain = calc_gain(
        state.level,
        ctx.catalog.ref_level_gain,
        ctx.catalog.input_gain(&state.input),
    );
    let (mag, _) = compose_eq(ctx, state);
    (gain, calc_headroom(ctx.config, gain, state.balance, peak(&mag)))
}

/// Recompute the full downstream commit for a candidate state.
///
/// Always converges: the headroom reduction subtracts exactly the missing
/// margin, so a second pass only runs when the gain floor interferes. On a
/// sink failure the candidate is left untouched by the caller (the
/// dispatcher discards its working copy); on success `state.level` is
/// rewritten from the finally committed gain.
pub fn recompute<S: DspSink>(
    ctx: &EngineContext<'_>,
    state: &mut StateRecord,
    sink: &mut S,
    warnings: &mut Vec<Warning>,
) -> Result<(), SinkError> {
    let ref_level_gain = ctx.catalog.ref_level_gain;
    let input_gain = ctx.catalog.input_gain(&state.input);
    let mut gain = calc_gain(state.level, ref_level_gain, input_gain);

    // absolute bounds first; this is bookkeeping, not the headroom mechanism
    if gain < ctx.config.gain_min || gain > ctx.config.gain_max {
        warnings.push(Warning::OutOfRange {
            field: "gain",
            min: ctx.config.gain_min,
            max: ctx.config.gain_max,
        });
        gain = gain.clamp(ctx.config.gain_min, ctx.config.gain_max);
    }

    let (eq_mag, eq_pha) = compose_eq(ctx, state);
    let eq_peak = peak(&eq_mag);

    loop {
        let headroom = calc_headroom(ctx.config, gain, state.balance, eq_peak);
        if headroom >= 0.0 {
            break;
        }
        let lowered = gain + headroom;
        if lowered < ctx.config.gain_min {
            gain = ctx.config.gain_min;
            if calc_headroom(ctx.config, gain, state.balance, eq_peak) < 0.0 {
                warn!("headroom exhausted at the gain floor, clipping is possible");
                warnings.push(Warning::HeadroomExceeded {
                    gain_min: ctx.config.gain_min,
                });
            }
            break;
        }
        debug!("headroom {headroom:.1} dB short, lowering gain to {lowered:.1} dB");
        gain = lowered;
    }

    let (left, right) = channel_multipliers(state, gain);
    sink.commit_gain(left, right)?;
    sink.commit_eq(ctx.curves.frequencies(), &eq_mag, &eq_pha)?;
    state.level = calc_level(gain, ref_level_gain, input_gain);
    Ok(())
}
