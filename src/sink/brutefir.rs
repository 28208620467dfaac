//! BruteFIR sink
//!
//! Production implementation of [`DspSink`](super::DspSink) speaking the
//! BruteFIR command-line interface over TCP. Each commit opens a short
//! connection, sends one transaction terminated by `; quit`, and closes.
//! The convolution engine itself runs out of process; this module only
//! renders and ships command strings.

use std::io::Write;
use std::net::TcpStream;

use log::debug;

use super::{DspSink, SinkError};
use crate::catalog::InputSpec;

/// Volume filters at the head of the chain, left and right.
const VOL_FILTERS: [&str; 2] = ["f.vol.L", "f.vol.R"];
/// Equalizer filters fed by the volume stage.
const EQ_FILTERS: [&str; 2] = ["f.eq.L", "f.eq.R"];
/// Name of the shared equalizer coefficient.
const EQ_COEFF: &str = "c.eq";

/// TCP client for the BruteFIR command-line interface.
#[derive(Debug, Clone)]
pub struct BrutefirSink {
    address: String,
    port: u16,
}

impl BrutefirSink {
    pub fn new(address: &str, port: u16) -> Self {
        Self {
            address: address.to_string(),
            port,
        }
    }

    fn send(&mut self, command: &str) -> Result<(), SinkError> {
        debug!("brutefir <- {command}");
        let mut stream =
            TcpStream::connect((self.address.as_str(), self.port)).map_err(SinkError::Connect)?;
        stream
            .write_all(format!("{command}; quit\n").as_bytes())
            .map_err(SinkError::Write)?;
        Ok(())
    }
}

impl DspSink for BrutefirSink {
    fn commit_gain(&mut self, left: f64, right: f64) -> Result<(), SinkError> {
        self.send(&render_gain(left, right))
    }

    fn commit_eq(&mut self, freqs: &[f64], mag: &[f64], pha: &[f64]) -> Result<(), SinkError> {
        self.send(&render_eq("mag", freqs, mag))?;
        self.send(&render_eq("phase", freqs, pha))
    }

    fn load_coeff(&mut self, filter: &str, coeff: &str) -> Result<(), SinkError> {
        self.send(&render_coeff(filter, coeff))
    }

    fn route_input(&mut self, _input: &str, spec: &InputSpec) -> Result<(), SinkError> {
        self.send(&render_route(spec))
    }

    fn set_mix(&mut self, mono: bool) -> Result<(), SinkError> {
        self.send(&render_mix(mono))
    }
}

fn render_gain(left: f64, right: f64) -> String {
    format!(
        r#"cfia "{}" "L" m{left} ; cfia "{}" "R" m{right}"#,
        VOL_FILTERS[0], VOL_FILTERS[1]
    )
}

fn render_eq(kind: &str, freqs: &[f64], values: &[f64]) -> String {
    let points: Vec<String> = freqs
        .iter()
        .zip(values)
        .map(|(freq, value)| format!("{freq}/{value}"))
        .collect();
    format!(r#"lmc eq "{EQ_COEFF}" {kind} {}"#, points.join(", "))
}

fn render_coeff(filter: &str, coeff: &str) -> String {
    // -1 selects the dirac passthrough slot and is not a coefficient name
    if coeff == "-1" {
        format!(r#"cfc "{filter}" -1"#)
    } else {
        format!(r#"cfc "{filter}" "{coeff}""#)
    }
}

fn render_route(spec: &InputSpec) -> String {
    let parts: Vec<String> = spec
        .source_ports
        .iter()
        .zip(VOL_FILTERS)
        .map(|(port, filter)| format!(r#"cfia "{filter}" "{port}" m1"#))
        .collect();
    parts.join(" ; ")
}

fn render_mix(mono: bool) -> String {
    let (same, cross) = if mono { (0.5, 0.5) } else { (1.0, 0.0) };
    format!(
        r#"cffa "{eq_l}" "{vol_l}" m{same} ; cffa "{eq_l}" "{vol_r}" m{cross} ; cffa "{eq_r}" "{vol_l}" m{cross} ; cffa "{eq_r}" "{vol_r}" m{same}"#,
        eq_l = EQ_FILTERS[0],
        eq_r = EQ_FILTERS[1],
        vol_l = VOL_FILTERS[0],
        vol_r = VOL_FILTERS[1],
    )
}
