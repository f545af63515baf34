//! Stack-machine tests against hand-assembled programs.

use frm_core::{Complex, JumpKind};
use frm_vm::backend::Compatibility;
use frm_vm::float::FloatBackend;
use frm_vm::program::{FormulaFlags, Instr, JumpRecord, Program, ProgramData, SlotDef};
use frm_vm::vm::{PixelInput, Vm};

/// The 19 predefined slots plus any extras a test needs.
fn slots(extra: &[(&str, Complex)]) -> Vec<SlotDef> {
    let names = [
        "pixel", "p1", "p2", "z", "lastsqr", "pi", "e", "rand", "p3", "whitesq", "scrnpix",
        "scrnmax", "maxit", "ismand", "center", "magxmag", "rotskew", "p4", "p5",
    ];
    let mut out: Vec<SlotDef> = names
        .iter()
        .map(|n| SlotDef {
            name: n.to_string(),
            init: Complex::ZERO,
        })
        .collect();
    for (name, init) in extra {
        out.push(SlotDef {
            name: name.to_string(),
            init: *init,
        });
    }
    out
}

fn program(
    instrs: Vec<Instr>,
    loads: Vec<u32>,
    stores: Vec<u32>,
    jumps: Vec<JumpRecord>,
    extra: &[(&str, Complex)],
) -> Program<FloatBackend> {
    let data = ProgramData {
        instrs: instrs.into_boxed_slice(),
        loads: loads.into_boxed_slice(),
        stores: stores.into_boxed_slice(),
        jumps: jumps.into_boxed_slice(),
        slots: slots(extra).into_boxed_slice(),
        has_init_section: false,
        inversion: None,
        flags: FormulaFlags::default(),
    };
    Program::new(data, FloatBackend::new(29, Compatibility::CURRENT))
}

fn px(re: f64, im: f64) -> PixelInput {
    PixelInput {
        col: 0,
        row: 0,
        pixel: Complex::new(re, im),
    }
}

#[test]
fn accumulates_into_a_variable() {
    // z = z + pixel
    let prog = program(
        vec![Instr::Lod, Instr::Lod, Instr::Add, Instr::Sto],
        vec![3, 0],
        vec![3],
        vec![],
        &[],
    );
    let mut vm = Vm::new(&prog);
    assert!(vm.per_pixel(&prog, px(1.0, 0.5)));
    vm.orbit(&prog);
    assert_eq!(vm.z(&prog), Complex::new(1.0, 0.5));
    vm.orbit(&prog);
    assert_eq!(vm.z(&prog), Complex::new(2.0, 1.0));
}

#[test]
fn taken_jump_rewinds_all_cursors() {
    // if (cond) z = src endif  — assembled by hand
    let cond = 19u32;
    let src = 20u32;
    let instrs = vec![
        Instr::Lod,         // cond
        Instr::JumpOnFalse, // -> label, skipping the store
        Instr::Lod,         // src
        Instr::Sto,         // z =
        Instr::JumpLabel,
    ];
    let records = vec![
        JumpRecord {
            kind: JumpKind::If,
            dest_op: 4,
            dest_lod: 2,
            dest_sto: 1,
            dest_jump: 2,
        },
        JumpRecord {
            kind: JumpKind::EndIf,
            dest_op: 0,
            dest_lod: 0,
            dest_sto: 0,
            dest_jump: 0,
        },
    ];

    // condition false: the store is skipped
    let prog = program(
        instrs.clone(),
        vec![cond, src],
        vec![3],
        records.clone(),
        &[("cond", Complex::ZERO), ("src", Complex::real(9.0))],
    );
    let mut vm = Vm::new(&prog);
    vm.per_pixel(&prog, px(0.0, 0.0));
    vm.orbit(&prog);
    assert_eq!(vm.z(&prog), Complex::ZERO);

    // condition true: the store lands
    let prog = program(
        instrs,
        vec![cond, src],
        vec![3],
        records,
        &[("cond", Complex::ONE), ("src", Complex::real(9.0))],
    );
    let mut vm = Vm::new(&prog);
    vm.per_pixel(&prog, px(0.0, 0.0));
    vm.orbit(&prog);
    assert_eq!(vm.z(&prog), Complex::real(9.0));
}

#[test]
fn clear_parks_the_statement_value() {
    // a, then b + <parked a>
    let a = 19u32;
    let b = 20u32;
    let prog = program(
        vec![Instr::Lod, Instr::Clr, Instr::Lod, Instr::Add, Instr::Sto],
        vec![a, b],
        vec![3],
        vec![],
        &[("a", Complex::real(2.0)), ("b", Complex::real(3.0))],
    );
    let mut vm = Vm::new(&prog);
    vm.per_pixel(&prog, px(0.0, 0.0));
    vm.orbit(&prog);
    assert_eq!(vm.z(&prog), Complex::real(5.0));
}

#[test]
fn numeric_failure_latches_overflow() {
    // 1/0: the reciprocal latches the flag and the pixel bails
    let prog = program(
        vec![Instr::Lod, Instr::Recip],
        vec![19],
        vec![],
        vec![],
        &[("zero", Complex::ZERO)],
    );
    let mut vm = Vm::new(&prog);
    vm.per_pixel(&prog, px(0.0, 0.0));
    assert!(vm.orbit(&prog));
    assert!(vm.overflowed());
}

#[test]
fn bailout_reads_the_top_of_stack() {
    // load a zero-real value: immediate bailout verdict
    let prog = program(
        vec![Instr::Lod],
        vec![19],
        vec![],
        vec![],
        &[("flag", Complex::new(0.0, 7.0))],
    );
    let mut vm = Vm::new(&prog);
    vm.per_pixel(&prog, px(0.0, 0.0));
    assert!(vm.orbit(&prog));

    let prog = program(
        vec![Instr::Lod],
        vec![19],
        vec![],
        vec![],
        &[("flag", Complex::ONE)],
    );
    let mut vm = Vm::new(&prog);
    vm.per_pixel(&prog, px(0.0, 0.0));
    assert!(!vm.orbit(&prog));
}
