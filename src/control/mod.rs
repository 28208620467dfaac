//! Command dispatcher
//!
//! Maps parsed commands onto state mutations. Every handler works against a
//! clone of the live record; the dispatcher commits the whole clone on
//! success or discards it wholesale on the first failure, so callers observe
//! either the complete effect of a command or none of it.

pub mod command;
pub mod engine;

pub use command::{Command, PolarityArg, Toggle, Warning};
pub use engine::EngineContext;

use log::{debug, warn};

use crate::catalog::Catalog;
use crate::config::Config;
use crate::curves::CurveRepository;
use crate::sink::DspSink;
use crate::state::StateRecord;

/// Outcome of one command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ack {
    /// The command took full effect (or was a read-only query).
    Done,
    /// The state record is exactly as it was before the command.
    RolledBack,
}

/// Response to one command line.
#[derive(Debug, Clone)]
pub struct Response {
    pub ack: Ack,
    /// Query output for `show`/`status`.
    pub reply: Option<String>,
    pub warnings: Vec<Warning>,
    /// Whether the state record changed and should be persisted.
    pub changed: bool,
}

impl Response {
    fn done(changed: bool, warnings: Vec<Warning>) -> Self {
        Self {
            ack: Ack::Done,
            reply: None,
            warnings,
            changed,
        }
    }

    fn rolled_back(warnings: Vec<Warning>) -> Self {
        Self {
            ack: Ack::RolledBack,
            reply: None,
            warnings,
            changed: false,
        }
    }

    fn query(reply: Option<String>, warnings: Vec<Warning>) -> Self {
        Self {
            ack: Ack::Done,
            reply,
            warnings,
            changed: false,
        }
    }
}

/// The command dispatcher and owner of the live state record.
pub struct Dispatcher<S: DspSink> {
    config: Config,
    catalog: Catalog,
    curves: CurveRepository,
    state: StateRecord,
    sink: S,
}

impl<S: DspSink> Dispatcher<S> {
    pub fn new(
        config: Config,
        catalog: Catalog,
        curves: CurveRepository,
        state: StateRecord,
        sink: S,
    ) -> Self {
        Self {
            config,
            catalog,
            curves,
            state,
            sink,
        }
    }

    pub fn state(&self) -> &StateRecord {
        &self.state
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Process one command line.
    pub fn process(&mut self, line: &str) -> Response {
        debug!("command line: {line:?}");
        match command::parse(line) {
            Err(warning) => {
                warn!("{warning}");
                Response::rolled_back(vec![warning])
            }
            Ok(Command::Show) => Response::query(Some(self.render_show()), Vec::new()),
            Ok(Command::Status) => match serde_json::to_string_pretty(&self.state) {
                Ok(json) => Response::query(Some(json), Vec::new()),
                Err(error) => {
                    warn!("status serialization failed: {error}");
                    Response::query(None, Vec::new())
                }
            },
            Ok(cmd) => self.apply(cmd),
        }
    }

    /// Replay the persisted state against the sink, e.g. after a restart.
    ///
    /// Best-effort: each step that fails leaves its field at the previous
    /// value and contributes its warnings, the remaining steps still run.
    pub fn sync_downstream(&mut self) -> Vec<Warning> {
        let state = self.state.clone();
        let mut commands = Vec::new();
        if !state.input.is_empty() {
            commands.push(Command::Input {
                name: state.input.clone(),
            });
        }
        // explicit xo replay last so a per-input default cannot shadow the
        // persisted choice
        if !state.xo_set.is_empty() {
            commands.push(Command::Xo {
                name: state.xo_set.clone(),
            });
        }
        commands.push(Command::Drc {
            set: state.drc_set.clone(),
        });
        commands.push(Command::Peq {
            set: state.peq_set.clone(),
        });
        commands.push(Command::Mono(if state.mono { Toggle::On } else { Toggle::Off }));
        commands.push(Command::Level {
            value: state.level,
            add: false,
        });

        let mut warnings = Vec::new();
        for cmd in commands {
            warnings.extend(self.apply(cmd).warnings);
        }
        warnings
    }

    fn apply(&mut self, cmd: Command) -> Response {
        let mut warnings = Vec::new();
        let mut work = self.state.clone();
        match self.handle(cmd, &mut work, &mut warnings) {
            Ok(()) => {
                let changed = work != self.state;
                self.state = work;
                Response::done(changed, warnings)
            }
            Err(warning) => {
                warn!("command rolled back: {warning}");
                warnings.push(warning);
                Response::rolled_back(warnings)
            }
        }
    }

    fn handle(
        &mut self,
        cmd: Command,
        work: &mut StateRecord,
        warnings: &mut Vec<Warning>,
    ) -> Result<(), Warning> {
        match cmd {
            Command::Show | Command::Status => Ok(()),
            Command::Level { value, add } => {
                work.level = if add { work.level + value } else { value };
                self.recompute("level", work, warnings)
            }
            Command::Gain { value } => {
                work.level = engine::calc_level(
                    value,
                    self.catalog.ref_level_gain,
                    self.catalog.input_gain(&work.input),
                );
                self.recompute("gain", work, warnings)
            }
            Command::Balance { value, add } => {
                let candidate = if add { work.balance + value } else { value };
                work.balance =
                    clamp_span(candidate, self.config.balance_span, "balance", warnings);
                self.recompute("balance", work, warnings)
            }
            Command::Bass { value, add } => {
                let candidate = if add { work.bass + value } else { value };
                work.bass = clamp_span(candidate, self.config.tone_span, "bass", warnings);
                self.recompute("bass", work, warnings)
            }
            Command::Treble { value, add } => {
                let candidate = if add { work.treble + value } else { value };
                work.treble = clamp_span(candidate, self.config.tone_span, "treble", warnings);
                self.recompute("treble", work, warnings)
            }
            Command::LoudnessRef { value, add } => {
                let candidate = if add { work.loudness_ref + value } else { value };
                work.loudness_ref =
                    clamp_span(candidate, self.config.loudness_ref_span, "loudness_ref", warnings);
                self.recompute("loudness_ref", work, warnings)
            }
            Command::Mute(toggle) => {
                work.mute = toggle.apply(work.mute);
                self.recompute("mute", work, warnings)
            }
            Command::Loudness(toggle) => {
                work.loudness = toggle.apply(work.loudness);
                self.recompute("loudness", work, warnings)
            }
            Command::Polarity(arg) => {
                work.polarity = arg.apply(work.polarity);
                self.recompute("polarity", work, warnings)
            }
            Command::Mono(toggle) => {
                work.mono = toggle.apply(work.mono);
                self.sink
                    .set_mix(work.mono)
                    .map_err(|error| Warning::downstream("mono", error))
            }
            Command::Input { name } => self.select_input(name, work, warnings),
            Command::Xo { name } => self.select_xo(name, work),
            Command::Drc { set } => {
                self.select_correction("drc", set, work)
            }
            Command::Peq { set } => {
                self.select_correction("peq", set, work)
            }
        }
    }

    fn recompute(
        &mut self,
        cmd_name: &'static str,
        work: &mut StateRecord,
        warnings: &mut Vec<Warning>,
    ) -> Result<(), Warning> {
        let ctx = EngineContext {
            config: &self.config,
            catalog: &self.catalog,
            curves: &self.curves,
        };
        engine::recompute(&ctx, work, &mut self.sink, warnings)
            .map_err(|error| Warning::downstream(cmd_name, error))
    }

    fn select_input(
        &mut self,
        name: String,
        work: &mut StateRecord,
        warnings: &mut Vec<Warning>,
    ) -> Result<(), Warning> {
        let spec = self.catalog.inputs.get(&name).cloned().ok_or_else(|| {
            Warning::bad_option(
                "input",
                format!("unknown input '{name}', available: {:?}", self.catalog.input_names()),
            )
        })?;
        self.sink
            .route_input(&name, &spec)
            .map_err(|error| Warning::downstream("input", error))?;
        work.input = name;
        if self.config.use_input_xo {
            if let Some(xo) = &spec.xo {
                self.select_xo(xo.clone(), work)?;
            }
        }
        self.recompute("input", work, warnings)
    }

    fn select_xo(&mut self, name: String, work: &mut StateRecord) -> Result<(), Warning> {
        let pairs = self.catalog.xo.pairs(&name).ok_or_else(|| {
            Warning::bad_option(
                "xo",
                format!("unknown xo set '{name}', available: {:?}", self.catalog.xo_names()),
            )
        })?;
        let pairs: Vec<(String, String)> = pairs
            .into_iter()
            .map(|(filter, coeff)| (filter.to_string(), coeff.to_string()))
            .collect();
        for (filter, coeff) in &pairs {
            self.sink
                .load_coeff(filter, coeff)
                .map_err(|error| Warning::downstream("xo", error))?;
        }
        work.xo_set = name;
        Ok(())
    }

    fn select_correction(
        &mut self,
        cmd_name: &'static str,
        set: Option<String>,
        work: &mut StateRecord,
    ) -> Result<(), Warning> {
        let bank = match cmd_name {
            "drc" => &self.catalog.drc,
            _ => &self.catalog.peq,
        };
        let pairs: Vec<(String, String)> = match &set {
            // bypass every filter of the stage
            None => bank
                .filters
                .iter()
                .map(|filter| (filter.clone(), "-1".to_string()))
                .collect(),
            Some(name) => bank
                .pairs(name)
                .ok_or_else(|| {
                    Warning::bad_option(
                        cmd_name,
                        format!("unknown {cmd_name} set '{name}'"),
                    )
                })?
                .into_iter()
                .map(|(filter, coeff)| (filter.to_string(), coeff.to_string()))
                .collect(),
        };
        for (filter, coeff) in &pairs {
            self.sink
                .load_coeff(filter, coeff)
                .map_err(|error| Warning::downstream(cmd_name, error))?;
        }
        match cmd_name {
            "drc" => work.drc_set = set,
            _ => work.peq_set = set,
        }
        Ok(())
    }

    fn render_show(&self) -> String {
        let ctx = EngineContext {
            config: &self.config,
            catalog: &self.catalog,
            curves: &self.curves,
        };
        let (gain, headroom) = engine::preview(&ctx, &self.state);
        self.state.render_show(
            self.catalog.ref_level_gain,
            self.catalog.input_gain(&self.state.input),
            gain,
            headroom,
        )
    }
}

/// Clamp a user setting into its symmetric interval, recording a warning
/// when the boundary is hit.
fn clamp_span(value: f64, span: f64, field: &'static str, warnings: &mut Vec<Warning>) -> f64 {
    if value.abs() > span {
        warnings.push(Warning::OutOfRange {
            field,
            min: -span,
            max: span,
        });
        span.copysign(value)
    } else {
        value
    }
}
