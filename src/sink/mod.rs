//! Downstream Sink
//!
//! The abstract destination every audible change is committed to. In
//! production this is the real-time convolution engine reached over its
//! command protocol; in tests and dry runs it is an in-memory recorder.
//! Sink calls are fire-and-forget: an error is reported back to the
//! dispatcher, which rolls the state back and records a warning, it never
//! crashes the controller.

mod brutefir;

pub use brutefir::BrutefirSink;

use thiserror::Error;

use crate::catalog::InputSpec;

/// Failure of a downstream commit.
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("cannot reach DSP engine: {0}")]
    Connect(#[source] std::io::Error),

    #[error("DSP engine write failed: {0}")]
    Write(#[source] std::io::Error),

    #[error("DSP engine refused {op}")]
    Refused { op: String },
}

/// Commit interface to the DSP engine.
pub trait DspSink {
    /// Commit per-channel linear gain multipliers.
    fn commit_gain(&mut self, left: f64, right: f64) -> Result<(), SinkError>;

    /// Commit the composed equalization curve, magnitude and phase over the
    /// repository's frequency axis.
    fn commit_eq(&mut self, freqs: &[f64], mag: &[f64], pha: &[f64]) -> Result<(), SinkError>;

    /// Select a coefficient for one filter. The coefficient `"-1"` bypasses
    /// the filter.
    fn load_coeff(&mut self, filter: &str, coeff: &str) -> Result<(), SinkError>;

    /// Attach the capture ports of an input to the head of the chain.
    fn route_input(&mut self, input: &str, spec: &InputSpec) -> Result<(), SinkError>;

    /// Switch the channel mixing matrix between stereo and mono downmix.
    fn set_mix(&mut self, mono: bool) -> Result<(), SinkError>;
}

/// One recorded sink call.
#[derive(Debug, Clone, PartialEq)]
pub enum SinkCall {
    Gain { left: f64, right: f64 },
    Eq { mag: Vec<f64>, pha: Vec<f64> },
    Coeff { filter: String, coeff: String },
    Route { input: String },
    Mix { mono: bool },
}

/// Recording sink for dry runs and tests.
///
/// Records every call in order. Can be armed to refuse the n-th call,
/// which is how the rollback discipline is exercised.
#[derive(Debug, Default)]
pub struct MemorySink {
    calls: Vec<SinkCall>,
    refuse_at: Option<usize>,
    attempted: usize,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse the n-th call from now (0 = the very next one).
    pub fn refuse_call(&mut self, nth: usize) {
        self.refuse_at = Some(self.attempted + nth);
    }

    pub fn calls(&self) -> &[SinkCall] {
        &self.calls
    }

    /// Most recent committed gain pair, if any.
    pub fn last_gain(&self) -> Option<(f64, f64)> {
        self.calls.iter().rev().find_map(|call| match call {
            SinkCall::Gain { left, right } => Some((*left, *right)),
            _ => None,
        })
    }

    /// Most recent committed magnitude curve, if any.
    pub fn last_eq_mag(&self) -> Option<&[f64]> {
        self.calls.iter().rev().find_map(|call| match call {
            SinkCall::Eq { mag, .. } => Some(mag.as_slice()),
            _ => None,
        })
    }

    fn record(&mut self, op: &str, call: SinkCall) -> Result<(), SinkError> {
        let n = self.attempted;
        self.attempted += 1;
        if self.refuse_at == Some(n) {
            self.refuse_at = None;
            return Err(SinkError::Refused { op: op.to_string() });
        }
        self.calls.push(call);
        Ok(())
    }
}

impl DspSink for MemorySink {
    fn commit_gain(&mut self, left: f64, right: f64) -> Result<(), SinkError> {
        self.record("gain commit", SinkCall::Gain { left, right })
    }

    fn commit_eq(&mut self, _freqs: &[f64], mag: &[f64], pha: &[f64]) -> Result<(), SinkError> {
        self.record(
            "eq commit",
            SinkCall::Eq {
                mag: mag.to_vec(),
                pha: pha.to_vec(),
            },
        )
    }

    fn load_coeff(&mut self, filter: &str, coeff: &str) -> Result<(), SinkError> {
        self.record(
            "coefficient load",
            SinkCall::Coeff {
                filter: filter.to_string(),
                coeff: coeff.to_string(),
            },
        )
    }

    fn route_input(&mut self, input: &str, _spec: &InputSpec) -> Result<(), SinkError> {
        self.record(
            "input routing",
            SinkCall::Route {
                input: input.to_string(),
            },
        )
    }

    fn set_mix(&mut self, mono: bool) -> Result<(), SinkError> {
        self.record("mix matrix", SinkCall::Mix { mono })
    }
}
