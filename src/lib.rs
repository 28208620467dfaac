//! Claro - Digital Preamplifier Control Plane
//!
//! Claro is the control brain of a preamp/crossover built around an external
//! real-time convolution engine. It turns textual commands (volume, tone,
//! balance, loudness, input and filter-set selection) into a consistent,
//! headroom-safe set of per-channel gains and equalization curves, and
//! commits them to the DSP engine over its command protocol.
//!
//! # Architecture
//!
//! - `curves`: read-only repository of the equalization curve tables
//! - `catalog`: externally defined input routing and coefficient sets
//! - `state`: the single mutable record of all user-settable parameters
//! - `control`: command dispatcher and the gain/headroom engine
//! - `sink`: the downstream commit interface to the DSP engine
//!
//! The controller never exceeds 0 dBFS: every change that affects audible
//! output is recomputed through the headroom engine before it is committed.

pub mod catalog;
pub mod config;
pub mod control;
pub mod curves;
pub mod error;
pub mod persist;
pub mod sink;
pub mod state;

pub use error::{ClaroError, Result};
