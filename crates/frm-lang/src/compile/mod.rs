//! Bytecode compilation.
//!
//! The pipeline runs strictly after the prescanner has vouched for the
//! body: the token stream is re-serialized to a normalized string, parsed
//! into precedence records and flattened (`parser`), and the structural
//! jump records are linked to concrete destinations (`jumps`). Sizing is
//! two-pass: a first parse against generous capacities measures the real
//! counts, then the tables are allocated exactly and the parse is run
//! again.

pub mod jumps;
pub mod parser;

pub use parser::{Capacities, ParseOutput, ParserConfig};

use frm_core::{ErrorCode, ErrorRecord, Pos, TokenKind};
use frm_vm::program::{Inversion, ProgramData};

use crate::lexer::Lexer;
use crate::prescan::prescan;

/// Longest accepted prepared formula text.
pub const MAX_FORMULA_CHARS: usize = 8190;

fn flat_record(code: ErrorCode) -> ErrorRecord {
    ErrorRecord {
        statement_start: Pos::new(0),
        error_pos: Pos::new(0),
        code,
    }
}

/// Re-serialize the formula body into the compiler's normalized form:
/// lowercase, whitespace- and comment-free, with one separator between
/// statements. Leading separators are dropped; an empty body is an error.
pub fn prepare(source: &str, body_start: usize) -> Result<String, ErrorRecord> {
    let mut lexer = Lexer::new(source, body_start);
    let mut out = String::new();

    loop {
        let pos = Pos::new(lexer.pos() as u32);
        let tok = lexer.next_token();
        match tok.kind {
            TokenKind::Bad(_) => {
                return Err(ErrorRecord {
                    statement_start: Pos::new(body_start as u32),
                    error_pos: pos,
                    code: ErrorCode::UnexpectedEof,
                });
            }
            TokenKind::EndOfFormula => {
                // no executable instructions
                return Err(ErrorRecord {
                    statement_start: Pos::new(body_start as u32),
                    error_pos: pos,
                    code: ErrorCode::UnexpectedEof,
                });
            }
            _ if tok.text == "," => continue,
            _ => {
                out.push_str(&tok.text);
                break;
            }
        }
    }

    loop {
        let pos = Pos::new(lexer.pos() as u32);
        let tok = lexer.next_token();
        match tok.kind {
            TokenKind::Bad(_) => {
                return Err(ErrorRecord {
                    statement_start: Pos::new(body_start as u32),
                    error_pos: pos,
                    code: ErrorCode::UnexpectedEof,
                });
            }
            TokenKind::EndOfFormula => break,
            _ => out.push_str(&tok.text),
        }
    }
    Ok(out)
}

/// Two-pass allocation: measure against generous fixed capacities, then
/// free, reallocate exactly (plus a small margin) and recompile.
pub fn compile_prepared(prepared: &str, cfg: &ParserConfig) -> Result<ParseOutput, ErrorCode> {
    let measured = parser::parse(prepared, cfg, Capacities::generous())?;
    let caps = Capacities::exact(measured.pend_count, measured.slot_count);
    parser::parse(prepared, cfg, caps)
}

/// Compile a validated entry body into a backend-independent program.
pub fn compile_body(
    source: &str,
    body_start: usize,
    cfg: &ParserConfig,
    inversion: Option<Inversion>,
) -> Result<ProgramData, Vec<ErrorRecord>> {
    let sizes = prescan(source, body_start)?;
    if sizes.chars > MAX_FORMULA_CHARS {
        return Err(vec![flat_record(ErrorCode::FormulaTooLarge)]);
    }

    let prepared = prepare(source, body_start).map_err(|e| vec![e])?;
    let out = compile_prepared(&prepared, cfg).map_err(|code| vec![flat_record(code)])?;

    // the prescanner's measurements bound the compiled sizes
    debug_assert!(out.instrs.len() <= sizes.ops);
    debug_assert!(out.loads.len() <= sizes.loads);
    debug_assert!(out.stores.len() <= sizes.stores);
    debug_assert!(out.jump_kinds.len() <= sizes.jumps);

    let jumps = if out.flags.uses_jump {
        jumps::resolve(&out.instrs, &out.jump_kinds)
            .map_err(|_| vec![flat_record(ErrorCode::JumpParseFailure)])?
    } else {
        Vec::new()
    };

    Ok(ProgramData {
        instrs: out.instrs.into_boxed_slice(),
        loads: out.loads.into_boxed_slice(),
        stores: out.stores.into_boxed_slice(),
        jumps: jumps.into_boxed_slice(),
        slots: out.slots.into_boxed_slice(),
        has_init_section: out.has_init_section,
        inversion,
        flags: out.flags,
    })
}
