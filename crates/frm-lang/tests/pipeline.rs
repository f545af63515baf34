//! End-to-end pipeline tests: formula text in, orbits out.

use frm_core::Complex;
use frm_lang::{CompileEnv, Evaluator, Formula, MathType, PixelInput, Symmetry};
use frm_vm::program::Inversion;

const FILE: &str = "\
; test formulas
Mandel {
  z = pixel :
   z = z*z + pixel,
   |z| <= 4
}

Branch (XAXIS) {
  z = pixel :
   if (real(z) > 0)
     z = z + 1
   elseif (imag(z) > 0)
     z = z + (0,1)
   else
     z = z - 1
   endif
   |z| < 100
}

Seeded {
  z = srand(p1) :
   z = rand,
   |z| < 4
}

Params {
  z = pixel + p1*p3 :
   z = z + ismand, |z| < 4
}

Screen {
  z = maxit + scrnmax, |z| < 1e9
}

LastSq {
  z = sqr(pixel), w = lastsqr, |z| < 100
}

Broken {
  z = bogus(3)
}
";

fn pixel(col: i32, row: i32, re: f64, im: f64) -> PixelInput {
    PixelInput {
        col,
        row,
        pixel: Complex::new(re, im),
    }
}

fn env(math: MathType) -> CompileEnv {
    CompileEnv {
        math,
        ..CompileEnv::default()
    }
}

/// Iterate one pixel to bailout, returning the iteration count.
fn iterate(formula: &Formula, eval: &mut Evaluator, input: PixelInput, max: usize) -> usize {
    assert!(eval.per_pixel(formula, input));
    for n in 0..max {
        if eval.orbit(formula) {
            return n;
        }
    }
    max
}

#[test]
fn mandelbrot_escape_verdicts_agree_across_backends() {
    let probes = [
        (0.0, 0.0),   // inside the set
        (-1.0, 0.0),  // period-2 bulb
        (1.0, 1.0),   // escapes fast
        (0.5, 0.5),   // escapes within a few iterations
        (-2.5, 0.0),  // escapes immediately
    ];
    let maxiter = 50;

    let mut counts: Vec<Vec<usize>> = Vec::new();
    for math in [MathType::Float, MathType::Fixed, MathType::Big] {
        let formula = Formula::compile(FILE, "Mandel", &env(math)).unwrap();
        let mut eval = formula.evaluator();
        let per_backend: Vec<usize> = probes
            .iter()
            .map(|&(re, im)| iterate(&formula, &mut eval, pixel(0, 0, re, im), maxiter))
            .collect();
        counts.push(per_backend);
    }
    assert_eq!(counts[0], counts[1], "float vs fixed");
    assert_eq!(counts[0], counts[2], "float vs big");
    // sanity on the verdicts themselves
    assert_eq!(counts[0][0], maxiter);
    assert_eq!(counts[0][1], maxiter);
    assert!(counts[0][2] < 10);
    assert_eq!(counts[0][4], 0);
}

#[test]
fn orbit_state_tracks_z() {
    let formula = Formula::compile(FILE, "Mandel", &env(MathType::Float)).unwrap();
    let mut eval = formula.evaluator();
    assert!(eval.per_pixel(&formula, pixel(0, 0, 1.0, 0.0)));
    assert_eq!(eval.z(&formula), Complex::new(1.0, 0.0));
    eval.orbit(&formula);
    assert_eq!(eval.z(&formula), Complex::new(2.0, 0.0)); // 1*1 + 1
    eval.orbit(&formula);
    assert_eq!(eval.z(&formula), Complex::new(5.0, 0.0)); // 2*2 + 1
}

#[test]
fn branches_take_the_right_arm() {
    let formula = Formula::compile(FILE, "Branch", &env(MathType::Float)).unwrap();
    assert_eq!(formula.symmetry(), Symmetry::XAxis);
    assert!(formula.flags().uses_jump);

    let mut eval = formula.evaluator();
    assert!(eval.per_pixel(&formula, pixel(0, 0, 2.0, 0.0)));
    eval.orbit(&formula);
    assert_eq!(eval.z(&formula), Complex::new(3.0, 0.0)); // if arm

    assert!(eval.per_pixel(&formula, pixel(0, 0, -1.0, 2.0)));
    eval.orbit(&formula);
    assert_eq!(eval.z(&formula), Complex::new(-1.0, 3.0)); // elseif arm

    assert!(eval.per_pixel(&formula, pixel(0, 0, -1.0, -2.0)));
    eval.orbit(&formula);
    assert_eq!(eval.z(&formula), Complex::new(-2.0, -2.0)); // else arm
}

#[test]
fn branch_verdicts_agree_across_backends() {
    for math in [MathType::Fixed, MathType::Big] {
        let float = Formula::compile(FILE, "Branch", &env(MathType::Float)).unwrap();
        let other = Formula::compile(FILE, "Branch", &env(math)).unwrap();
        for &(re, im) in &[(2.0, 0.0), (-1.0, 2.0), (-1.0, -2.0), (0.5, 0.25)] {
            let mut fe = float.evaluator();
            let mut oe = other.evaluator();
            fe.per_pixel(&float, pixel(0, 0, re, im));
            oe.per_pixel(&other, pixel(0, 0, re, im));
            fe.orbit(&float);
            oe.orbit(&other);
            let a = fe.z(&float);
            let b = oe.z(&other);
            assert!(
                (a.re - b.re).abs() < 1e-4 && (a.im - b.im).abs() < 1e-4,
                "{math:?}: {a:?} vs {b:?}"
            );
        }
    }
}

#[test]
fn identical_seeds_identical_orbits_across_backends() {
    let mut sequences: Vec<Vec<(i64, i64)>> = Vec::new();
    for math in [MathType::Float, MathType::Fixed, MathType::Big] {
        let mut e = env(math);
        e.params[0] = 0.375; // p1 seeds the generator
        let formula = Formula::compile(FILE, "Seeded", &e).unwrap();
        let mut eval = formula.evaluator();
        assert!(eval.per_pixel(&formula, pixel(0, 0, 0.0, 0.0)));
        let fg = (1i64 << 29) as f64;
        let seq: Vec<(i64, i64)> = (0..16)
            .map(|_| {
                eval.orbit(&formula);
                let z = eval.z(&formula);
                ((z.re * fg).round() as i64, (z.im * fg).round() as i64)
            })
            .collect();
        sequences.push(seq);
    }
    assert_eq!(sequences[0], sequences[1], "float vs fixed");
    assert_eq!(sequences[0], sequences[2], "float vs big");

    // and the whole thing repeats under the same seed
    let mut e = env(MathType::Float);
    e.params[0] = 0.375;
    let formula = Formula::compile(FILE, "Seeded", &e).unwrap();
    let mut a = formula.evaluator();
    let mut b = formula.evaluator();
    a.per_pixel(&formula, pixel(0, 0, 0.0, 0.0));
    b.per_pixel(&formula, pixel(0, 0, 0.0, 0.0));
    for _ in 0..16 {
        a.orbit(&formula);
        b.orbit(&formula);
        assert_eq!(a.z(&formula), b.z(&formula));
    }
}

#[test]
fn feature_flags_reflect_references() {
    let formula = Formula::compile(FILE, "Params", &env(MathType::Float)).unwrap();
    let flags = formula.flags();
    assert!(flags.uses_p1);
    assert!(flags.uses_p3);
    assert!(flags.uses_ismand);
    assert!(!flags.uses_p2);
    assert!(!flags.uses_p4);
    assert!(!flags.uses_p5);
    assert!(!flags.uses_jump);
    assert!(!flags.uses_rand);
}

#[test]
fn fixed_math_flags_float_only_inputs() {
    let formula = Formula::compile(FILE, "Screen", &env(MathType::Fixed)).unwrap();
    assert!(formula.flags().needs_float);
    let formula = Formula::compile(FILE, "Screen", &env(MathType::Float)).unwrap();
    assert!(!formula.flags().needs_float);
}

#[test]
fn predefined_values_seed_from_environment() {
    let mut e = env(MathType::Float);
    e.maxit = 256;
    e.xdots = 1024;
    e.ydots = 768;
    let formula = Formula::compile(FILE, "Screen", &e).unwrap();
    let mut eval = formula.evaluator();
    eval.per_pixel(&formula, pixel(5, 7, 0.0, 0.0));
    eval.orbit(&formula);
    assert_eq!(eval.var(&formula, "maxit"), Some(Complex::real(256.0)));
    assert_eq!(
        eval.var(&formula, "scrnmax"),
        Some(Complex::new(1024.0, 768.0))
    );
    assert_eq!(eval.var(&formula, "scrnpix"), Some(Complex::new(5.0, 7.0)));
    // z = maxit + scrnmax
    assert_eq!(eval.z(&formula), Complex::new(256.0 + 1024.0, 768.0));
}

#[test]
fn sqr_deposits_last_sqr() {
    let formula = Formula::compile(FILE, "LastSq", &env(MathType::Float)).unwrap();
    let mut eval = formula.evaluator();
    eval.per_pixel(&formula, pixel(0, 0, 3.0, 4.0));
    eval.orbit(&formula);
    assert_eq!(eval.var(&formula, "lastsqr"), Some(Complex::real(25.0)));
    assert_eq!(eval.var(&formula, "w"), Some(Complex::real(25.0)));
}

#[test]
fn plane_inversion_applies_to_pixel() {
    let mut e = env(MathType::Float);
    e.inversion = Some(Inversion {
        radius: 4.0,
        center: Complex::ZERO,
    });
    let formula = Formula::compile(FILE, "Mandel", &e).unwrap();
    let mut eval = formula.evaluator();
    eval.per_pixel(&formula, pixel(0, 0, 1.0, 0.0));
    // |z|^2 = 1, so the point maps to radius/1 * z = (4, 0)
    assert_eq!(eval.var(&formula, "pixel"), Some(Complex::new(4.0, 0.0)));
    assert_eq!(eval.z(&formula), Complex::new(4.0, 0.0));
}

#[test]
fn whitesq_alternates_by_parity() {
    let formula = Formula::compile(FILE, "Mandel", &env(MathType::Float)).unwrap();
    let mut eval = formula.evaluator();
    eval.per_pixel(&formula, pixel(3, 4, 0.0, 0.0));
    assert_eq!(eval.var(&formula, "whitesq"), Some(Complex::real(1.0)));
    eval.per_pixel(&formula, pixel(4, 4, 0.0, 0.0));
    assert_eq!(eval.var(&formula, "whitesq"), Some(Complex::real(0.0)));
}

#[test]
fn compile_errors_leave_later_compiles_clean() {
    let err = Formula::compile(FILE, "Broken", &env(MathType::Float)).unwrap_err();
    assert!(err.report.contains("Undefined Function"));
    assert!(!err.records.is_empty());

    // the substitute program always bails out
    let stub = Formula::failing_stub();
    let mut eval = stub.evaluator();
    assert!(eval.orbit(&stub));

    // and an independent compile is unaffected
    let formula = Formula::compile(FILE, "Mandel", &env(MathType::Float)).unwrap();
    let mut eval = formula.evaluator();
    assert_eq!(iterate(&formula, &mut eval, pixel(0, 0, 3.0, 0.0), 50), 0);
}

#[test]
fn missing_entry_is_a_file_error() {
    let err = Formula::compile(FILE, "NoSuch", &env(MathType::Float)).unwrap_err();
    assert!(err.report.contains("Could not open file"));
}

#[test]
fn unknown_symmetry_warns_but_compiles() {
    let text = "Odd(SIDEWAYS) { z = z*z + pixel, |z| < 4 }";
    let formula = Formula::compile(text, "Odd", &env(MathType::Float)).unwrap();
    assert_eq!(formula.symmetry(), Symmetry::None);
    assert_eq!(formula.warnings().len(), 1);
}

#[test]
fn recompiling_yields_identical_programs() {
    // deterministic precedence sort: same text, same bytecode
    let a = Formula::compile(FILE, "Branch", &env(MathType::Float)).unwrap();
    let b = Formula::compile(FILE, "Branch", &env(MathType::Float)).unwrap();
    let mut ea = a.evaluator();
    let mut eb = b.evaluator();
    for &(re, im) in &[(0.1, 0.2), (-0.4, 0.9), (1.5, -1.5)] {
        ea.per_pixel(&a, pixel(0, 0, re, im));
        eb.per_pixel(&b, pixel(0, 0, re, im));
        for _ in 0..8 {
            assert_eq!(ea.orbit(&a), eb.orbit(&b));
            assert_eq!(ea.z(&a), eb.z(&b));
        }
    }
}
