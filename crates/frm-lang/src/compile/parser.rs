//! The expression compiler.
//!
//! Walks the prepared (lowercase, whitespace-free) formula text character
//! by character, emitting one pending-operation record per token. Each
//! record carries a precedence derived from the parenthesis depth and the
//! assignment nesting; opening a paren drops precedence steeply so the
//! enclosed expression binds first, and `=` retroactively converts the
//! preceding load into a store. A final precedence-sort pass flattens the
//! records into the ordered opcode stream directly, with no parse tree.

use frm_core::{Complex, ErrorCode, FuncId, JumpKind};
use frm_vm::program::{FormulaFlags, Instr, SlotDef, TrigFn};
use smallvec::SmallVec;

use crate::lexer::parse_f64_prefix;

/// Sentinel for "no modulus group open at this depth".
const MOD_NONE: i32 = 999;

/// Table capacities for one compile pass.
#[derive(Copy, Clone, Debug)]
pub struct Capacities {
    pub max_ops: usize,
    pub max_args: usize,
    pub max_loads: usize,
    pub max_stores: usize,
}

impl Capacities {
    /// The generous first-pass sizing used purely for measurement.
    pub fn generous() -> Self {
        let max_ops = 2300;
        Self {
            max_ops,
            max_args: max_ops * 2 / 5,
            max_loads: max_ops * 4 / 5,
            max_stores: max_ops / 2,
        }
    }

    /// Exact sizing from measured counts, with a small safety margin.
    pub fn exact(ops: usize, args: usize) -> Self {
        let max_ops = ops + 4;
        Self {
            max_ops,
            max_args: args + 4,
            max_loads: max_ops * 4 / 5,
            max_stores: max_ops / 2,
        }
    }
}

/// Compiler inputs that vary with the render environment.
#[derive(Clone, Debug)]
pub struct ParserConfig {
    /// fn1..fn4 bindings.
    pub trig: [TrigFn; 4],
    /// `Mod` normally, `ModOld` for old-release fixed-point math.
    pub mod_instr: Instr,
    /// Fixed-point math flags formulas that need float-only inputs.
    pub fixed_math: bool,
    /// Initial values for the 19 predefined slots.
    pub predef_init: [Complex; 19],
}

/// Result of one parse pass.
#[derive(Clone, Debug)]
pub struct ParseOutput {
    /// The flattened, ordered opcode stream.
    pub instrs: Vec<Instr>,
    pub loads: Vec<u32>,
    pub stores: Vec<u32>,
    /// Structural jump records in order of occurrence.
    pub jump_kinds: Vec<JumpKind>,
    pub slots: Vec<SlotDef>,
    pub has_init_section: bool,
    pub flags: FormulaFlags,
    /// Pending-record count before sorting (sizing measurement).
    pub pend_count: usize,
    /// Symbol-slot count (sizing measurement).
    pub slot_count: usize,
}

#[derive(Copy, Clone, Debug)]
struct PendOp {
    op: Option<Instr>,
    prec: i32,
}

struct Parser<'a> {
    bytes: &'a [u8],
    text: &'a str,
    cfg: &'a ParserConfig,
    caps: Capacities,
    pend: Vec<PendOp>,
    loads: Vec<u32>,
    stores: Vec<u32>,
    jump_kinds: Vec<JumpKind>,
    slots: Vec<SlotDef>,
    flags: FormulaFlags,
    has_init_section: bool,
    paren: i32,
    equals: i32,
    expecting_arg: bool,
    mod_flag: i32,
    mod_stack: SmallVec<[i32; 32]>,
}

/// Compile prepared formula text into the flat opcode stream. The text
/// must already have passed the prescanner; only capacity problems are
/// reported from here.
pub fn parse(prepared: &str, cfg: &ParserConfig, caps: Capacities) -> Result<ParseOutput, ErrorCode> {
    let mut slots: Vec<SlotDef> = Vec::with_capacity(caps.max_args);
    for (i, var) in frm_core::token::PREDEF_VARS.iter().enumerate() {
        slots.push(SlotDef {
            name: var.name().to_string(),
            init: cfg.predef_init[i],
        });
    }
    let mut parser = Parser {
        bytes: prepared.as_bytes(),
        text: prepared,
        cfg,
        caps,
        pend: Vec::with_capacity(caps.max_ops),
        loads: Vec::with_capacity(caps.max_loads),
        stores: Vec::with_capacity(caps.max_stores),
        jump_kinds: Vec::new(),
        slots,
        flags: FormulaFlags::default(),
        has_init_section: false,
        paren: 0,
        equals: 0,
        expecting_arg: true,
        mod_flag: MOD_NONE,
        mod_stack: SmallVec::new(),
    };
    parser.scan()?;
    parser.finish()
}

impl<'a> Parser<'a> {
    fn weight(&self) -> i32 {
        (self.paren + self.equals) * 15
    }

    fn push(&mut self, op: Instr, prec: i32) -> Result<(), ErrorCode> {
        self.push_pend(Some(op), prec)
    }

    fn push_barrier(&mut self, prec: i32) -> Result<(), ErrorCode> {
        self.push_pend(None, prec)
    }

    fn push_pend(&mut self, op: Option<Instr>, prec: i32) -> Result<(), ErrorCode> {
        if self.pend.len() >= self.caps.max_ops {
            return Err(ErrorCode::TableOverflow);
        }
        self.pend.push(PendOp { op, prec });
        Ok(())
    }

    fn scan(&mut self) -> Result<(), ErrorCode> {
        let mut n = 0usize;
        while n < self.bytes.len() {
            match self.bytes[n] {
                b'(' => self.paren += 1,
                b')' => self.paren -= 1,
                b'|' => {
                    if self.bytes.get(n + 1) == Some(&b'|') {
                        n += 1;
                        self.expecting_arg = true;
                        let p = 7 - self.weight();
                        self.push(Instr::Or, p)?;
                    } else if self.mod_flag == self.paren - 1 {
                        self.paren -= 1;
                        self.mod_flag = self.mod_stack.pop().unwrap_or(MOD_NONE);
                    } else {
                        self.mod_stack.push(self.mod_flag);
                        let p = 2 - self.weight();
                        self.push(self.cfg.mod_instr, p)?;
                        self.mod_flag = self.paren;
                        self.paren += 1;
                    }
                }
                b',' | b';' => {
                    if !self.expecting_arg {
                        self.expecting_arg = true;
                        self.push_barrier(15)?;
                        self.push(Instr::Clr, -30000)?;
                        self.equals = 0;
                        self.paren = 0;
                    }
                }
                b':' => {
                    self.expecting_arg = true;
                    self.push_barrier(15)?;
                    self.push(Instr::EndInit, -30000)?;
                    self.equals = 0;
                    self.paren = 0;
                    self.has_init_section = true;
                }
                b'+' => {
                    self.expecting_arg = true;
                    let p = 4 - self.weight();
                    self.push(Instr::Add, p)?;
                }
                b'-' => {
                    if self.expecting_arg {
                        let p = 2 - self.weight();
                        self.push(Instr::Neg, p)?;
                    } else {
                        let p = 4 - self.weight();
                        self.push(Instr::Sub, p)?;
                        self.expecting_arg = true;
                    }
                }
                b'&' => {
                    self.expecting_arg = true;
                    n += 1;
                    let p = 7 - self.weight();
                    self.push(Instr::And, p)?;
                }
                b'!' => {
                    self.expecting_arg = true;
                    n += 1;
                    let p = 6 - self.weight();
                    self.push(Instr::Ne, p)?;
                }
                b'<' => {
                    self.expecting_arg = true;
                    let op = if self.bytes.get(n + 1) == Some(&b'=') {
                        n += 1;
                        Instr::Lte
                    } else {
                        Instr::Lt
                    };
                    let p = 6 - self.weight();
                    self.push(op, p)?;
                }
                b'>' => {
                    self.expecting_arg = true;
                    let op = if self.bytes.get(n + 1) == Some(&b'=') {
                        n += 1;
                        Instr::Gte
                    } else {
                        Instr::Gt
                    };
                    let p = 6 - self.weight();
                    self.push(op, p)?;
                }
                b'*' => {
                    self.expecting_arg = true;
                    let p = 3 - self.weight();
                    self.push(Instr::Mul, p)?;
                }
                b'/' => {
                    self.expecting_arg = true;
                    let p = 3 - self.weight();
                    self.push(Instr::Div, p)?;
                }
                b'^' => {
                    self.expecting_arg = true;
                    let p = 2 - self.weight();
                    self.push(Instr::Pwr, p)?;
                }
                b'=' => {
                    self.expecting_arg = true;
                    if self.bytes.get(n + 1) == Some(&b'=') {
                        n += 1;
                        let p = 6 - self.weight();
                        self.push(Instr::Eq, p)?;
                    } else {
                        let p = 5 - self.weight();
                        if let Some(last) = self.pend.last_mut() {
                            if last.op == Some(Instr::Lod) && !self.loads.is_empty() {
                                last.op = Some(Instr::Sto);
                                last.prec = p;
                                if self.stores.len() >= self.caps.max_stores {
                                    return Err(ErrorCode::TableOverflow);
                                }
                                let target = self.loads.pop().unwrap();
                                self.stores.push(target);
                                self.equals += 1;
                            }
                        }
                    }
                }
                _ => {
                    n = self.scan_word(n)?;
                }
            }
            n += 1;
        }
        self.push_barrier(16)
    }

    /// Identifier, flow keyword, function call or constant starting at
    /// `n`. Returns the index of its last character.
    fn scan_word(&mut self, init_n: usize) -> Result<usize, ErrorCode> {
        let mut n = init_n;
        while n + 1 < self.bytes.len()
            && (self.bytes[n + 1].is_ascii_alphanumeric()
                || self.bytes[n + 1] == b'.'
                || self.bytes[n + 1] == b'_')
        {
            n += 1;
        }
        let name = &self.text[init_n..n + 1];
        self.expecting_arg = false;

        if let Some(jump) = JumpKind::from_name(name) {
            self.flags.uses_jump = true;
            match jump {
                JumpKind::If => {
                    self.expecting_arg = true;
                    self.jump_kinds.push(JumpKind::If);
                    self.push(Instr::JumpOnFalse, 1)?;
                }
                JumpKind::ElseIf => {
                    self.expecting_arg = true;
                    self.jump_kinds.push(JumpKind::ElseIf);
                    self.jump_kinds.push(JumpKind::ElseIf);
                    self.push(Instr::Jump, 1)?;
                    self.push_barrier(15)?;
                    self.push(Instr::Clr, -30000)?;
                    self.push(Instr::JumpOnFalse, 1)?;
                }
                JumpKind::Else => {
                    self.jump_kinds.push(JumpKind::Else);
                    self.push(Instr::Jump, 1)?;
                }
                JumpKind::EndIf => {
                    self.jump_kinds.push(JumpKind::EndIf);
                    self.push(Instr::JumpLabel, 1)?;
                }
            }
            return Ok(n);
        }

        if self.bytes.get(n + 1) == Some(&b'(') {
            if let Some(instr) = self.function_instr(name) {
                let p = 1 - self.weight();
                self.push(instr, p)?;
                self.expecting_arg = true;
                return Ok(n);
            }
        }

        let (slot, end) = self.intern_const(init_n, n + 1)?;
        if self.loads.len() >= self.caps.max_loads {
            return Err(ErrorCode::TableOverflow);
        }
        self.loads.push(slot as u32);
        let p = 1 - self.weight();
        self.push(Instr::Lod, p)?;
        Ok(end - 1)
    }

    /// Resolve a builtin function name, counting trig-slot use.
    fn function_instr(&mut self, name: &str) -> Option<Instr> {
        if let Some(rest) = name.strip_prefix("fn") {
            if let Ok(idx @ 1..=4) = rest.parse::<u8>() {
                if rest.len() == 1 {
                    if idx > self.flags.max_fn {
                        self.flags.max_fn = idx;
                    }
                    return Some(self.cfg.trig[(idx - 1) as usize].instr());
                }
            }
        }
        FuncId::lookup(name).map(Instr::from_func)
    }

    /// Find or append the symbol slot for a name or literal starting at
    /// `start`. Returns the slot index and the end of the consumed text.
    fn intern_const(&mut self, start: usize, name_end: usize) -> Result<(usize, usize), ErrorCode> {
        let name = &self.text[start..name_end];

        if let Some(i) = self.slots.iter().position(|s| s.name == name) {
            if !self.is_const_pair(start) {
                self.note_slot_use(i);
                return Ok((i, name_end));
            }
        }

        if self.slots.len() >= self.caps.max_args {
            return Err(ErrorCode::TableOverflow);
        }

        let first = self.bytes[start];
        if first.is_ascii_digit() || first == b'.' {
            // fold a pending unary minus back into the literal
            let mut num_start = start;
            if self.pend.last().map(|p| p.op) == Some(Some(Instr::Neg)) {
                self.pend.pop();
                num_start -= 1;
            }
            let digits_from = if self.bytes[num_start] == b'-' {
                num_start + 1
            } else {
                num_start
            };
            let mut end = self.scan_number(digits_from);
            let re = parse_f64_prefix(&self.text[num_start..end]);
            let mut im = 0.0f64;
            if self.bytes.get(end) == Some(&b',') {
                let j = end + 1;
                let is_imag = match self.bytes.get(j) {
                    Some(c) if c.is_ascii_digit() || *c == b'.' => true,
                    Some(&b'-') => matches!(
                        self.bytes.get(j + 1),
                        Some(c) if c.is_ascii_digit() || *c == b'.'
                    ),
                    _ => false,
                };
                if is_imag {
                    let imag_from = if self.bytes[j] == b'-' { j + 1 } else { j };
                    let imag_end = self.scan_number(imag_from);
                    im = parse_f64_prefix(&self.text[j..imag_end]);
                    end = imag_end;
                }
            }
            let text = self.text[num_start..end].to_string();
            self.slots.push(SlotDef {
                name: text,
                init: Complex::new(re, im),
            });
            Ok((self.slots.len() - 1, end))
        } else {
            self.slots.push(SlotDef {
                name: name.to_string(),
                init: Complex::ZERO,
            });
            Ok((self.slots.len() - 1, name_end))
        }
    }

    /// End of the numeric text starting at `i` (digits, one dot, optional
    /// signed exponent — the same grammar the lexer accepts).
    fn scan_number(&self, mut i: usize) -> usize {
        let len = self.bytes.len();
        while i < len && (self.bytes[i].is_ascii_digit() || self.bytes[i] == b'.') {
            i += 1;
        }
        if i < len && self.bytes[i] == b'e' {
            let mut j = i + 1;
            if j < len && matches!(self.bytes[j], b'+' | b'-') {
                j += 1;
            }
            if j < len && self.bytes[j].is_ascii_digit() {
                i = j;
                while i < len && self.bytes[i].is_ascii_digit() {
                    i += 1;
                }
            }
        }
        i
    }

    /// Is the numeric text at `start` the real half of an `a,b` pair?
    fn is_const_pair(&self, start: usize) -> bool {
        let mut n = start;
        while n < self.bytes.len()
            && (self.bytes[n].is_ascii_digit() || self.bytes[n] == b'.')
        {
            n += 1;
        }
        if self.bytes.get(n) != Some(&b',') {
            return false;
        }
        match self.bytes.get(n + 1) {
            Some(c) if c.is_ascii_digit() || *c == b'.' => true,
            Some(&b'-') => matches!(
                self.bytes.get(n + 2),
                Some(c) if c.is_ascii_digit() || *c == b'.'
            ),
            _ => false,
        }
    }

    /// Track which optional inputs a referenced predefined slot implies.
    fn note_slot_use(&mut self, slot: usize) {
        match slot {
            1 => self.flags.uses_p1 = true,
            2 => self.flags.uses_p2 = true,
            7 => self.flags.uses_rand = true,
            8 => self.flags.uses_p3 = true,
            13 => self.flags.uses_ismand = true,
            17 => self.flags.uses_p4 = true,
            18 => self.flags.uses_p5 = true,
            10 | 11 | 12 => {
                if self.cfg.fixed_math {
                    self.flags.needs_float = true;
                }
            }
            _ => {}
        }
    }

    /// Flatten the pending records into the final opcode stream: repeatedly
    /// emit the lowest-precedence contiguous run, worklist-style.
    fn finish(self) -> Result<ParseOutput, ErrorCode> {
        let Parser {
            pend,
            loads,
            stores,
            jump_kinds,
            slots,
            flags,
            has_init_section,
            ..
        } = self;

        let posp = pend.len();
        let mut instrs = Vec::with_capacity(posp);
        let mut work: SmallVec<[usize; 64]> = SmallVec::new();
        let mut next = 0usize;
        while next < posp {
            if pend[next].op.is_none() {
                next += 1;
                continue;
            }
            work.push(next);
            next += 1;
            while let Some(&top) = work.last() {
                if next < posp && pend[top].prec > pend[next].prec {
                    work.push(next);
                    next += 1;
                } else {
                    let idx = work.pop().unwrap();
                    if let Some(op) = pend[idx].op {
                        instrs.push(op);
                    }
                }
            }
        }

        let slot_count = slots.len();
        Ok(ParseOutput {
            instrs,
            loads,
            stores,
            jump_kinds,
            slots,
            has_init_section,
            flags,
            pend_count: posp,
            slot_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ParserConfig {
        ParserConfig {
            trig: TrigFn::DEFAULT_SLOTS,
            mod_instr: Instr::Mod,
            fixed_math: false,
            predef_init: [Complex::ZERO; 19],
        }
    }

    fn compile(prepared: &str) -> ParseOutput {
        parse(prepared, &config(), Capacities::generous()).unwrap()
    }

    #[test]
    fn mandelbrot_step_order() {
        let out = compile("z=z*z+pixel");
        assert_eq!(
            out.instrs,
            vec![Instr::Lod, Instr::Lod, Instr::Mul, Instr::Lod, Instr::Add, Instr::Sto]
        );
        // the store target is z, stolen from the first load
        assert_eq!(out.stores.len(), 1);
        assert_eq!(out.slots[out.stores[0] as usize].name, "z");
        assert_eq!(out.loads.len(), 3);
    }

    #[test]
    fn canonical_escape_test_sequence() {
        let out = compile("sin(z)+pixel,|z|<4");
        assert_eq!(
            out.instrs,
            vec![
                Instr::Lod,
                Instr::Sin,
                Instr::Lod,
                Instr::Add,
                Instr::Clr,
                Instr::Lod,
                Instr::Mod,
                Instr::Lod,
                Instr::Lt,
            ]
        );
    }

    #[test]
    fn stack_depth_never_negative() {
        let out = compile("sin(z)+pixel,|z|<4");
        let mut depth: i32 = 0;
        for instr in out.instrs.iter() {
            if *instr == Instr::Clr {
                depth = 1; // parked value
                continue;
            }
            depth += instr.stack_effect();
            assert!(depth >= 0, "depth went negative at {instr:?}");
        }
    }

    #[test]
    fn compiles_deterministically() {
        let a = compile("z=pixel:z=sin(z)*p1,|z|<=4");
        let b = compile("z=pixel:z=sin(z)*p1,|z|<=4");
        assert_eq!(a.instrs, b.instrs);
        assert_eq!(a.loads, b.loads);
        assert_eq!(a.stores, b.stores);
    }

    #[test]
    fn parens_bind_first() {
        let out = compile("(2+3)*4");
        assert_eq!(
            out.instrs,
            vec![Instr::Lod, Instr::Lod, Instr::Add, Instr::Lod, Instr::Mul]
        );
    }

    #[test]
    fn precedence_without_parens() {
        let out = compile("2+3*4");
        assert_eq!(
            out.instrs,
            vec![Instr::Lod, Instr::Lod, Instr::Lod, Instr::Mul, Instr::Add]
        );
    }

    #[test]
    fn unary_minus_folds_into_literal() {
        let out = compile("z*-3");
        assert_eq!(out.instrs, vec![Instr::Lod, Instr::Lod, Instr::Mul]);
        let slot = out.slots[out.loads[1] as usize].clone();
        assert_eq!(slot.name, "-3");
        assert_eq!(slot.init, Complex::new(-3.0, 0.0));
    }

    #[test]
    fn unary_minus_on_variable_stays_negate() {
        let out = compile("-z");
        assert_eq!(out.instrs, vec![Instr::Lod, Instr::Neg]);
    }

    #[test]
    fn complex_literal_inside_parens() {
        let out = compile("z+(1.5,-2)");
        assert_eq!(out.instrs, vec![Instr::Lod, Instr::Lod, Instr::Add]);
        let slot = out.slots[out.loads[1] as usize].clone();
        assert_eq!(slot.init, Complex::new(1.5, -2.0));
    }

    #[test]
    fn exponent_literals_keep_their_full_extent() {
        let out = compile("z+1.5e-3");
        assert_eq!(out.instrs, vec![Instr::Lod, Instr::Lod, Instr::Add]);
        let slot = out.slots[out.loads[1] as usize].clone();
        assert_eq!(slot.init, Complex::new(1.5e-3, 0.0));
    }

    #[test]
    fn scalar_constants_are_shared() {
        let out = compile("z+4,w+4");
        let four_slots: Vec<_> = out
            .slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.name == "4")
            .collect();
        assert_eq!(four_slots.len(), 1);
    }

    #[test]
    fn predefined_slot_use_sets_flags() {
        let out = compile("z=z+p1*p3+p5");
        assert!(out.flags.uses_p1);
        assert!(!out.flags.uses_p2);
        assert!(out.flags.uses_p3);
        assert!(out.flags.uses_p5);
    }

    #[test]
    fn trig_slots_resolve_and_count() {
        let out = compile("fn1(z)+fn3(z)");
        assert_eq!(out.flags.max_fn, 3);
        assert_eq!(
            out.instrs,
            vec![Instr::Lod, Instr::Sin, Instr::Lod, Instr::Sinh, Instr::Add]
        );
    }

    #[test]
    fn nested_assignment_stores_both_targets() {
        let out = compile("a=b=3");
        assert_eq!(out.instrs, vec![Instr::Lod, Instr::Sto, Instr::Sto]);
        assert_eq!(out.stores.len(), 2);
        assert_eq!(out.slots[out.stores[0] as usize].name, "a");
        assert_eq!(out.slots[out.stores[1] as usize].name, "b");
    }

    #[test]
    fn if_else_endif_opcode_shape() {
        let out = compile("if(real(z)>0),z=z+1,else,z=z-1,endif");
        assert_eq!(
            out.jump_kinds,
            vec![JumpKind::If, JumpKind::Else, JumpKind::EndIf]
        );
        let jof = out
            .instrs
            .iter()
            .filter(|i| **i == Instr::JumpOnFalse)
            .count();
        let jmp = out.instrs.iter().filter(|i| **i == Instr::Jump).count();
        let lbl = out.instrs.iter().filter(|i| **i == Instr::JumpLabel).count();
        assert_eq!((jof, jmp, lbl), (1, 1, 1));
        assert!(out.flags.uses_jump);
    }

    #[test]
    fn elseif_expands_to_two_records() {
        let out = compile("if(1),z=1,elseif(2),z=2,endif");
        assert_eq!(
            out.jump_kinds,
            vec![
                JumpKind::If,
                JumpKind::ElseIf,
                JumpKind::ElseIf,
                JumpKind::EndIf
            ]
        );
    }

    #[test]
    fn init_section_marker() {
        let out = compile("z=pixel:z=z+1");
        assert!(out.has_init_section);
        assert_eq!(out.instrs.iter().filter(|i| **i == Instr::EndInit).count(), 1);
        // EndInit sorts to the end of the init statement
        let pos = out.instrs.iter().position(|i| *i == Instr::EndInit).unwrap();
        assert_eq!(out.instrs[..pos], [Instr::Lod, Instr::Sto]);
    }

    #[test]
    fn capacity_overflow_reports() {
        let caps = Capacities {
            max_ops: 4,
            max_args: 25,
            max_loads: 4,
            max_stores: 2,
        };
        let err = parse("z=z*z+pixel", &config(), caps).unwrap_err();
        assert_eq!(err, ErrorCode::TableOverflow);
    }

    #[test]
    fn allocation_sizes_cover_measured_counts() {
        let first = compile("z=pixel:z=sin(z)+p1,|z|<4");
        let caps = Capacities::exact(first.pend_count, first.slot_count);
        let second = parse(
            "z=pixel:z=sin(z)+p1,|z|<4",
            &config(),
            caps,
        )
        .unwrap();
        assert_eq!(first.instrs, second.instrs);
        assert!(caps.max_ops >= second.pend_count);
        assert!(caps.max_args >= second.slot_count);
        assert!(second.loads.len() <= caps.max_loads);
        assert!(second.stores.len() <= caps.max_stores);
    }
}
