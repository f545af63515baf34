//! The caller-facing compile/run surface.
//!
//! A `Formula` is the read-only compiled program bound to one numeric
//! backend; an `Evaluator` owns the mutable state of one in-flight
//! evaluation. The external scan loop creates one evaluator per render
//! (or one per concurrent worker) and drives it once per pixel and once
//! per iteration.

use std::path::Path;

use frm_core::{Complex, ErrorCode, ErrorRecord, Pos};
use thiserror::Error;
use frm_vm::backend::Compatibility;
use frm_vm::big::BigBackend;
use frm_vm::fixed::FixedBackend;
use frm_vm::float::FloatBackend;
use frm_vm::program::{FormulaFlags, Instr, Inversion, Program, TrigFn};
use frm_vm::vm::{PixelInput, Vm};

use crate::compile::{compile_body, ParserConfig};
use crate::entry::{check_header, find_entry, Symmetry};
use crate::report;

/// The selected numeric representation.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub enum MathType {
    #[default]
    Float,
    Fixed,
    Big,
}

/// Render parameters consumed at compile time.
#[derive(Clone, Debug)]
pub struct CompileEnv {
    pub math: MathType,
    /// Fixed-point fudge shift, also used by the random-number stream.
    pub bitshift: u32,
    /// Working precision of the arbitrary-precision backend, in bits.
    pub precision: usize,
    pub compat: Compatibility,
    /// p1..p5 as five re/im pairs.
    pub params: [f64; 10],
    pub xdots: u32,
    pub ydots: u32,
    pub maxit: u32,
    pub ismand: bool,
    pub center: Complex,
    pub magnification: f64,
    pub mag_x_factor: f64,
    pub rotation: f64,
    pub skew: f64,
    pub inversion: Option<Inversion>,
    /// fn1..fn4 bindings.
    pub trig: [TrigFn; 4],
}

impl Default for CompileEnv {
    fn default() -> Self {
        Self {
            math: MathType::Float,
            bitshift: 29,
            precision: 120,
            compat: Compatibility::CURRENT,
            params: [0.0; 10],
            xdots: 640,
            ydots: 480,
            maxit: 150,
            ismand: true,
            center: Complex::ZERO,
            magnification: 1.0,
            mag_x_factor: 1.0,
            rotation: 0.0,
            skew: 0.0,
            inversion: None,
            trig: TrigFn::DEFAULT_SLOTS,
        }
    }
}

impl CompileEnv {
    /// Initial values for the 19 predefined slots.
    fn predef_init(&self) -> [Complex; 19] {
        let p = &self.params;
        [
            Complex::ZERO,                                     // pixel (per pixel)
            Complex::new(p[0], p[1]),                          // p1
            Complex::new(p[2], p[3]),                          // p2
            Complex::ZERO,                                     // z
            Complex::ZERO,                                     // lastsqr
            Complex::real(std::f64::consts::PI),               // pi
            Complex::real(std::f64::consts::E),                // e
            Complex::ZERO,                                     // rand
            Complex::new(p[4], p[5]),                          // p3
            Complex::ZERO,                                     // whitesq (per pixel)
            Complex::ZERO,                                     // scrnpix (per pixel)
            Complex::new(self.xdots as f64, self.ydots as f64), // scrnmax
            Complex::real(self.maxit as f64),                  // maxit
            Complex::real(self.ismand as i32 as f64),          // ismand
            self.center,                                       // center
            Complex::new(self.magnification, self.mag_x_factor), // magxmag
            Complex::new(self.rotation, self.skew),            // rotskew
            Complex::new(p[6], p[7]),                          // p4
            Complex::new(p[8], p[9]),                          // p5
        ]
    }

    fn parser_config(&self) -> ParserConfig {
        let fixed_math = self.math == MathType::Fixed;
        let mod_instr = if fixed_math && self.compat.old_fixed_modulus() {
            Instr::ModOld
        } else {
            Instr::Mod
        };
        ParserConfig {
            trig: self.trig,
            mod_instr,
            fixed_math,
            predef_init: self.predef_init(),
        }
    }
}

/// A failed compile: the retained error records plus their rendered
/// report.
#[derive(Clone, Debug, Error)]
#[error("{}", .report.trim_end())]
pub struct FormulaError {
    pub records: Vec<ErrorRecord>,
    pub report: String,
}

impl FormulaError {
    fn new(source: &str, records: Vec<ErrorRecord>) -> Self {
        let report = report::render(source, &records);
        Self { records, report }
    }
}

enum FormulaKind {
    Float(Program<FloatBackend>),
    Fixed(Program<FixedBackend>),
    Big(Program<BigBackend>),
    /// Substituted when compilation fails; always bails out.
    Stub,
}

/// A compiled formula, read-only for the lifetime of one render.
pub struct Formula {
    symmetry: Symmetry,
    warnings: Vec<ErrorRecord>,
    kind: FormulaKind,
}

impl Formula {
    /// Compile the named entry from formula-file text.
    pub fn compile(source: &str, name: &str, env: &CompileEnv) -> Result<Formula, FormulaError> {
        let entry = match find_entry(source, name) {
            Some(at) => at,
            None => {
                return Err(FormulaError::new(
                    source,
                    vec![ErrorRecord {
                        statement_start: Pos::new(0),
                        error_pos: Pos::new(0),
                        code: ErrorCode::CouldNotOpenFile,
                    }],
                ));
            }
        };
        let header =
            check_header(source, entry).map_err(|e| FormulaError::new(source, vec![e]))?;
        let cfg = env.parser_config();
        let data = compile_body(source, header.body_start, &cfg, env.inversion)
            .map_err(|records| FormulaError::new(source, records))?;

        let kind = match env.math {
            MathType::Float => FormulaKind::Float(Program::new(
                data,
                FloatBackend::new(env.bitshift, env.compat),
            )),
            MathType::Fixed => FormulaKind::Fixed(Program::new(
                data,
                FixedBackend::new(env.bitshift, env.compat),
            )),
            MathType::Big => FormulaKind::Big(Program::new(
                data,
                BigBackend::new(env.precision, env.bitshift, env.compat),
            )),
        };
        Ok(Formula {
            symmetry: header.symmetry,
            warnings: header.warnings,
            kind,
        })
    }

    /// Compile the named entry from a formula file on disk.
    pub fn compile_file(
        path: impl AsRef<Path>,
        name: &str,
        env: &CompileEnv,
    ) -> Result<Formula, FormulaError> {
        let text = std::fs::read_to_string(path).map_err(|_| {
            FormulaError::new(
                "",
                vec![ErrorRecord {
                    statement_start: Pos::new(0),
                    error_pos: Pos::new(0),
                    code: ErrorCode::CouldNotOpenFile,
                }],
            )
        })?;
        Self::compile(&text, name, env)
    }

    /// The permanently-failing substitute used after a compile error: the
    /// per-iteration step always reports bailout.
    pub fn failing_stub() -> Formula {
        Formula {
            symmetry: Symmetry::None,
            warnings: Vec::new(),
            kind: FormulaKind::Stub,
        }
    }

    pub fn symmetry(&self) -> Symmetry {
        self.symmetry
    }

    /// Non-fatal header findings (an unknown symmetry).
    pub fn warnings(&self) -> &[ErrorRecord] {
        &self.warnings
    }

    /// Which optional inputs the compiled body actually references.
    pub fn flags(&self) -> FormulaFlags {
        match &self.kind {
            FormulaKind::Float(p) => p.data().flags,
            FormulaKind::Fixed(p) => p.data().flags,
            FormulaKind::Big(p) => p.data().flags,
            FormulaKind::Stub => FormulaFlags::default(),
        }
    }

    /// Fresh evaluation state for this formula.
    pub fn evaluator(&self) -> Evaluator {
        let kind = match &self.kind {
            FormulaKind::Float(p) => EvalKind::Float(Vm::new(p)),
            FormulaKind::Fixed(p) => EvalKind::Fixed(Vm::new(p)),
            FormulaKind::Big(p) => EvalKind::Big(Vm::new(p)),
            FormulaKind::Stub => EvalKind::Stub,
        };
        Evaluator { kind }
    }
}

enum EvalKind {
    Float(Vm<FloatBackend>),
    Fixed(Vm<FixedBackend>),
    Big(Vm<BigBackend>),
    Stub,
}

/// Mutable evaluation state for one in-flight evaluation of a `Formula`.
pub struct Evaluator {
    kind: EvalKind,
}

impl Evaluator {
    /// Run the per-pixel initialization section. Returns false when the
    /// pixel overflowed and should be treated as immediately bailed out.
    pub fn per_pixel(&mut self, formula: &Formula, input: PixelInput) -> bool {
        match (&mut self.kind, &formula.kind) {
            (EvalKind::Float(vm), FormulaKind::Float(p)) => vm.per_pixel(p, input),
            (EvalKind::Fixed(vm), FormulaKind::Fixed(p)) => vm.per_pixel(p, input),
            (EvalKind::Big(vm), FormulaKind::Big(p)) => vm.per_pixel(p, input),
            _ => true,
        }
    }

    /// Run one escape-time iteration. Returns true when the orbit bails
    /// out.
    pub fn orbit(&mut self, formula: &Formula) -> bool {
        match (&mut self.kind, &formula.kind) {
            (EvalKind::Float(vm), FormulaKind::Float(p)) => vm.orbit(p),
            (EvalKind::Fixed(vm), FormulaKind::Fixed(p)) => vm.orbit(p),
            (EvalKind::Big(vm), FormulaKind::Big(p)) => vm.orbit(p),
            _ => true,
        }
    }

    /// Current orbit value (the `z` slot).
    pub fn z(&self, formula: &Formula) -> Complex {
        match (&self.kind, &formula.kind) {
            (EvalKind::Float(vm), FormulaKind::Float(p)) => vm.z(p),
            (EvalKind::Fixed(vm), FormulaKind::Fixed(p)) => vm.z(p),
            (EvalKind::Big(vm), FormulaKind::Big(p)) => vm.z(p),
            _ => Complex::ZERO,
        }
    }

    /// Read a symbol slot by normalized name.
    pub fn var(&self, formula: &Formula, name: &str) -> Option<Complex> {
        match (&self.kind, &formula.kind) {
            (EvalKind::Float(vm), FormulaKind::Float(p)) => vm.var(p, name),
            (EvalKind::Fixed(vm), FormulaKind::Fixed(p)) => vm.var(p, name),
            (EvalKind::Big(vm), FormulaKind::Big(p)) => vm.var(p, name),
            _ => None,
        }
    }
}
