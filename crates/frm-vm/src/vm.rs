//! The stack machine.
//!
//! Two cursors over a fixed operand array emulate the legacy two-register
//! stack discipline: binary operators fold the top operand into the one
//! below it and retract, unary operators mutate the top in place, and the
//! load/store/op/jump cursors advance through their tables as opcodes
//! execute. Taking a jump rewinds all four cursors to the snapshot stored
//! in the jump record.
//!
//! A `Vm` owns the mutable evaluation state of exactly one in-flight
//! evaluation; concurrent callers each create their own.

use frm_core::Complex;

use crate::backend::MathBackend;
use crate::program::{Instr, Program};
use crate::rng::LegacyRng;

/// Operand-stack capacity. Depth is bounded by the prescanner's
/// parenthesis limit, well below this.
pub const OPERAND_STACK: usize = 64;

// Well-known symbol slots.
const SLOT_PIXEL: usize = 0;
const SLOT_Z: usize = 3;
const SLOT_LASTSQR: usize = 4;
const SLOT_RAND: usize = 7;
const SLOT_WHITESQ: usize = 9;
const SLOT_SCRNPIX: usize = 10;

/// Per-pixel inputs supplied by the external scan loop.
#[derive(Copy, Clone, Debug)]
pub struct PixelInput {
    pub col: i32,
    pub row: i32,
    /// Complex plane coordinate of the pixel (before inversion).
    pub pixel: Complex,
}

/// Mutable evaluation state for one compiled program.
#[derive(Clone, Debug)]
pub struct Vm<B: MathBackend> {
    vars: Vec<B::Num>,
    stack: Vec<B::Num>,
    arg: usize,
    lod: usize,
    sto: usize,
    op: usize,
    jump: usize,
    init_lod: usize,
    init_sto: usize,
    init_op: usize,
    init_jump: usize,
    overflow: bool,
    rng: LegacyRng,
}

impl<B: MathBackend> Vm<B> {
    pub fn new(prog: &Program<B>) -> Self {
        let zero = prog.backend().encode(Complex::ZERO);
        let mut rng = LegacyRng::new();
        if prog.data().flags.uses_rand {
            rng.seed_from_time();
        }
        Self {
            vars: prog.initial_values().to_vec(),
            stack: vec![zero; OPERAND_STACK],
            arg: 0,
            lod: 0,
            sto: 0,
            op: 0,
            jump: 0,
            init_lod: 0,
            init_sto: 0,
            init_op: 0,
            init_jump: 0,
            overflow: false,
            rng,
        }
    }

    /// Run the once-per-pixel initialization section. Returns false when
    /// the pixel overflowed and should be treated as immediately bailed.
    pub fn per_pixel(&mut self, prog: &Program<B>, input: PixelInput) -> bool {
        let b = prog.backend();
        let data = prog.data();

        self.overflow = false;
        self.arg = 0;
        self.lod = 0;
        self.sto = 0;
        self.op = 0;
        self.jump = 0;
        self.init_jump = 0;

        self.vars[SLOT_SCRNPIX] =
            b.encode(Complex::new(input.col as f64, input.row as f64));
        self.vars[SLOT_WHITESQ] =
            b.encode(Complex::real(((input.row + input.col) & 1) as f64));
        self.vars[SLOT_PIXEL] = match data.inversion {
            Some(inv) => b.encode_inverted(inv.apply(input.pixel)),
            None => b.encode(input.pixel),
        };

        let mut limit = if data.has_init_section {
            data.instrs.len()
        } else {
            0
        };
        while self.op < limit {
            let instr = data.instrs[self.op];
            if instr == Instr::EndInit {
                limit = self.op;
                self.init_jump = self.jump;
            } else {
                self.step(prog, instr);
            }
            self.op += 1;
        }
        self.init_lod = self.lod;
        self.init_sto = self.sto;
        self.init_op = self.op;

        !self.overflow
    }

    /// Run one escape-time iteration. Returns true when the orbit bails
    /// out.
    pub fn orbit(&mut self, prog: &Program<B>) -> bool {
        if self.overflow {
            return true;
        }
        let b = prog.backend();
        let data = prog.data();

        self.lod = self.init_lod;
        self.sto = self.init_sto;
        self.op = self.init_op;
        self.jump = self.init_jump;

        if self.rng.active() {
            let x = self.rng.next_fixed(b.bitshift());
            let y = self.rng.next_fixed(b.bitshift());
            self.vars[SLOT_RAND] = b.from_fixed(x, y);
        }

        self.arg = 0;
        let end = data.instrs.len();
        while self.op < end {
            self.step(prog, data.instrs[self.op]);
            self.op += 1;
        }

        b.bails_out(&self.stack[self.arg], self.overflow)
    }

    /// Current orbit value (the `z` slot).
    pub fn z(&self, prog: &Program<B>) -> Complex {
        prog.backend().decode(&self.vars[SLOT_Z])
    }

    /// Read a symbol slot by normalized name.
    pub fn var(&self, prog: &Program<B>, name: &str) -> Option<Complex> {
        let idx = prog.data().slot_index(name)?;
        Some(prog.backend().decode(&self.vars[idx]))
    }

    pub fn overflowed(&self) -> bool {
        self.overflow
    }

    fn take_jump(&mut self, prog: &Program<B>) {
        let rec = prog.data().jumps[self.jump];
        self.op = rec.dest_op;
        self.lod = rec.dest_lod;
        self.sto = rec.dest_sto;
        self.jump = rec.dest_jump;
    }

    fn step(&mut self, prog: &Program<B>, instr: Instr) {
        let b = prog.backend();
        let data = prog.data();
        let mut ovf = self.overflow;
        match instr {
            Instr::Lod => {
                self.arg += 1;
                debug_assert!(self.arg < self.stack.len());
                let slot = data.loads[self.lod] as usize;
                self.stack[self.arg] = self.vars[slot].clone();
                self.lod += 1;
            }
            Instr::Sto => {
                let slot = data.stores[self.sto] as usize;
                self.vars[slot] = self.stack[self.arg].clone();
                self.sto += 1;
            }
            Instr::Clr => {
                self.stack[0] = self.stack[self.arg].clone();
                self.arg = 0;
            }
            Instr::EndInit => {
                // only meaningful inside per_pixel, handled there
                self.init_jump = self.jump;
            }
            Instr::Jump => self.take_jump(prog),
            Instr::JumpOnFalse => {
                if b.is_true(&self.stack[self.arg]) {
                    self.jump += 1;
                } else {
                    self.take_jump(prog);
                }
            }
            Instr::JumpLabel => self.jump += 1,
            Instr::SRand => {
                let (x, y) = b.to_fixed(&self.stack[self.arg]);
                self.rng.seed((x ^ y) as u32);
                let rx = self.rng.next_fixed(b.bitshift());
                let ry = self.rng.next_fixed(b.bitshift());
                self.vars[SLOT_RAND] = b.from_fixed(rx, ry);
                self.stack[self.arg] = self.vars[SLOT_RAND].clone();
            }
            Instr::Sqr => {
                let last = b.sqr(&mut self.stack[self.arg], &mut ovf);
                self.vars[SLOT_LASTSQR] = last;
            }
            Instr::Mod => b.mod_squared(&mut self.stack[self.arg], &mut ovf),
            Instr::ModOld => {
                if self.arg == 0 {
                    let below = self.stack[0].clone();
                    b.mod_squared_old(&mut self.stack[0], &below, &mut ovf);
                } else {
                    let (left, right) = self.stack.split_at_mut(self.arg);
                    b.mod_squared_old(&mut right[0], &left[self.arg - 1], &mut ovf);
                }
            }
            Instr::Neg => b.neg(&mut self.stack[self.arg]),
            Instr::Conj => b.conj(&mut self.stack[self.arg]),
            Instr::Abs => b.abs(&mut self.stack[self.arg]),
            Instr::Flip => b.flip(&mut self.stack[self.arg]),
            Instr::Real => b.real(&mut self.stack[self.arg]),
            Instr::Imag => b.imag(&mut self.stack[self.arg]),
            Instr::Zero => b.zero(&mut self.stack[self.arg]),
            Instr::One => b.one(&mut self.stack[self.arg]),
            Instr::Ident => b.ident(&mut self.stack[self.arg]),
            Instr::Recip => b.recip(&mut self.stack[self.arg], &mut ovf),
            Instr::Floor => b.floor(&mut self.stack[self.arg]),
            Instr::Ceil => b.ceil(&mut self.stack[self.arg]),
            Instr::Trunc => b.trunc(&mut self.stack[self.arg]),
            Instr::Round => b.round(&mut self.stack[self.arg]),
            Instr::Sin => b.sin(&mut self.stack[self.arg], &mut ovf),
            Instr::Cos => b.cos(&mut self.stack[self.arg], &mut ovf),
            Instr::CosXX => b.cosxx(&mut self.stack[self.arg], &mut ovf),
            Instr::Sinh => b.sinh(&mut self.stack[self.arg], &mut ovf),
            Instr::Cosh => b.cosh(&mut self.stack[self.arg], &mut ovf),
            Instr::Tan => b.tan(&mut self.stack[self.arg], &mut ovf),
            Instr::Tanh => b.tanh(&mut self.stack[self.arg], &mut ovf),
            Instr::CoTan => b.cotan(&mut self.stack[self.arg], &mut ovf),
            Instr::CoTanh => b.cotanh(&mut self.stack[self.arg], &mut ovf),
            Instr::Log => b.log(&mut self.stack[self.arg], &mut ovf),
            Instr::Exp => b.exp(&mut self.stack[self.arg], &mut ovf),
            Instr::Sqrt => b.sqrt(&mut self.stack[self.arg], &mut ovf),
            Instr::ASin => b.asin(&mut self.stack[self.arg], &mut ovf),
            Instr::ACos => b.acos(&mut self.stack[self.arg], &mut ovf),
            Instr::ASinh => b.asinh(&mut self.stack[self.arg], &mut ovf),
            Instr::ACosh => b.acosh(&mut self.stack[self.arg], &mut ovf),
            Instr::ATan => b.atan(&mut self.stack[self.arg], &mut ovf),
            Instr::ATanh => b.atanh(&mut self.stack[self.arg], &mut ovf),
            Instr::CAbs => b.cabs(&mut self.stack[self.arg], &mut ovf),
            Instr::Add
            | Instr::Sub
            | Instr::Mul
            | Instr::Div
            | Instr::Pwr
            | Instr::Lt
            | Instr::Gt
            | Instr::Lte
            | Instr::Gte
            | Instr::Eq
            | Instr::Ne
            | Instr::And
            | Instr::Or => {
                debug_assert!(self.arg >= 1);
                let (left, right) = self.stack.split_at_mut(self.arg);
                let a = &mut left[self.arg - 1];
                let top = &right[0];
                match instr {
                    Instr::Add => b.add(a, top),
                    Instr::Sub => b.sub(a, top),
                    Instr::Mul => b.mul(a, top, &mut ovf),
                    Instr::Div => b.div(a, top, &mut ovf),
                    Instr::Pwr => b.pwr(a, top, &mut ovf),
                    Instr::Lt => b.lt(a, top),
                    Instr::Gt => b.gt(a, top),
                    Instr::Lte => b.lte(a, top),
                    Instr::Gte => b.gte(a, top),
                    Instr::Eq => b.eq(a, top),
                    Instr::Ne => b.ne(a, top),
                    Instr::And => b.and(a, top),
                    Instr::Or => b.or(a, top),
                    _ => unreachable!(),
                }
                self.arg -= 1;
            }
        }
        self.overflow = ovf;
    }
}
