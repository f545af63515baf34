//! The prescanner.
//!
//! An independent full pass over the formula body that finds every syntax
//! and structure error up front and accumulates the operation, load, store
//! and jump counts the allocator sizes the compiled program from. It does
//! not feed the compiler; the compiler re-walks the prepared text after
//! this pass has vouched for it.

use frm_core::{
    CompileErrors, ErrorCode, ErrorRecord, JumpKind, LexErrorKind, OpId, ParenKind, Pos,
    TokenKind,
};

use crate::lexer::Lexer;

/// Deepest accepted parenthesis nesting; also bounds the modulus-nesting
/// mask below.
pub const MAX_PARENS: i32 = 64 / 2;

/// Most jump records one formula may compile to.
pub const MAX_JUMPS: usize = 200;

/// Counts measured by a successful prescan.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Prescan {
    pub ops: usize,
    pub loads: usize,
    pub stores: usize,
    pub jumps: usize,
    /// Total characters of normalized token text.
    pub chars: usize,
    pub uses_jump: bool,
}

/// Scan the formula body starting just past the `{`. Returns the measured
/// counts, or every error found (up to the retention cap).
pub fn prescan(source: &str, body_start: usize) -> Result<Prescan, Vec<ErrorRecord>> {
    let mut lexer = Lexer::new(source, body_start);
    let mut errors = CompileErrors::new();
    let mut out = Prescan::default();

    let mut statement_pos = Pos::new(body_start as u32);
    let mut expecting_arg = true;
    let mut new_statement = true;
    let mut assignment_ok = true;
    let mut already_got_colon = false;
    let mut else_has_been_used: u64 = 0;
    let mut waiting_for_mod: u64 = 0;
    let mut waiting_for_endif: i32 = 0;
    let mut paren: i32 = 0;
    let mut done = false;

    while !done {
        let filepos = Pos::new(lexer.pos() as u32);
        let token = lexer.next_token();
        out.chars += token.text.len();
        match token.kind {
            TokenKind::Bad(reason) => {
                assignment_ok = false;
                let code = match reason {
                    LexErrorKind::EndOfFile => {
                        errors.record(statement_pos, filepos, ErrorCode::UnexpectedEof);
                        return Err(errors.into_records());
                    }
                    LexErrorKind::IllegalCharacter => ErrorCode::IllegalChar,
                    LexErrorKind::IllegalVariableName => ErrorCode::IllegalVarName,
                    LexErrorKind::TokenTooLong => ErrorCode::TokenTooLong,
                    LexErrorKind::FuncUsedAsVar => ErrorCode::FuncUsedAsVar,
                    LexErrorKind::JumpMissingBoolean => ErrorCode::JumpNeedsBoolean,
                    LexErrorKind::JumpWithIllegalChar => ErrorCode::NoCharAfterJump,
                    LexErrorKind::UndefinedFunction => ErrorCode::UndefinedFunction,
                    LexErrorKind::IllegalOperator => ErrorCode::UndefinedOperator,
                    LexErrorKind::IllFormedConstant => ErrorCode::InvalidConstant,
                };
                errors.record(statement_pos, filepos, code);
            }
            TokenKind::Paren(ParenKind::Open) => {
                assignment_ok = false;
                new_statement = false;
                paren += 1;
                if paren > MAX_PARENS {
                    errors.record(statement_pos, filepos, ErrorCode::NestingTooDeep);
                } else if !expecting_arg {
                    errors.record(statement_pos, filepos, ErrorCode::ShouldBeOperator);
                }
                waiting_for_mod <<= 1;
            }
            TokenKind::Paren(ParenKind::Close) => {
                assignment_ok = false;
                new_statement = false;
                if paren > 0 {
                    paren -= 1;
                } else {
                    errors.record(statement_pos, filepos, ErrorCode::NeedMatchingOpenParen);
                    paren = 0;
                }
                if waiting_for_mod & 1 != 0 {
                    errors.record(statement_pos, filepos, ErrorCode::UnmatchedModulus);
                } else {
                    waiting_for_mod >>= 1;
                }
                if expecting_arg {
                    errors.record(statement_pos, filepos, ErrorCode::ShouldBeArgument);
                }
            }
            TokenKind::ParamVariable(_)
            | TokenKind::UserVariable
            | TokenKind::PredefVariable(_) => {
                out.ops += 1;
                out.loads += 1;
                new_statement = false;
                if !expecting_arg {
                    errors.record(statement_pos, filepos, ErrorCode::ShouldBeOperator);
                }
                expecting_arg = false;
            }
            TokenKind::RealConstant(_) | TokenKind::ComplexConstant(_) => {
                assignment_ok = false;
                out.ops += 1;
                out.loads += 1;
                new_statement = false;
                if !expecting_arg {
                    errors.record(statement_pos, filepos, ErrorCode::ShouldBeOperator);
                }
                expecting_arg = false;
            }
            TokenKind::Function(_) | TokenKind::ParamFunction(_) => {
                assignment_ok = false;
                new_statement = false;
                out.ops += 1;
                if !expecting_arg {
                    errors.record(statement_pos, filepos, ErrorCode::ShouldBeOperator);
                }
            }
            TokenKind::FlowControl(jump) => {
                assignment_ok = false;
                out.ops += 1;
                out.jumps += 1;
                if !new_statement {
                    errors.record(statement_pos, filepos, ErrorCode::JumpNotFirst);
                } else {
                    out.uses_jump = true;
                    match jump {
                        JumpKind::If => {
                            else_has_been_used <<= 1;
                            waiting_for_endif += 1;
                        }
                        JumpKind::ElseIf => {
                            out.ops += 3; // unconditional jump plus two clears
                            out.jumps += 1; // compiles to two jumps
                            if else_has_been_used & 1 != 0 {
                                errors.record(
                                    statement_pos,
                                    filepos,
                                    ErrorCode::EndifRequiredAfterElse,
                                );
                            } else if waiting_for_endif == 0 {
                                errors.record(
                                    statement_pos,
                                    filepos,
                                    ErrorCode::MisplacedElseOrElseif,
                                );
                            }
                        }
                        JumpKind::Else => {
                            if else_has_been_used & 1 != 0 {
                                errors.record(
                                    statement_pos,
                                    filepos,
                                    ErrorCode::EndifRequiredAfterElse,
                                );
                            } else if waiting_for_endif == 0 {
                                errors.record(
                                    statement_pos,
                                    filepos,
                                    ErrorCode::MisplacedElseOrElseif,
                                );
                            }
                            else_has_been_used |= 1;
                        }
                        JumpKind::EndIf => {
                            else_has_been_used >>= 1;
                            waiting_for_endif -= 1;
                            if waiting_for_endif < 0 {
                                errors.record(statement_pos, filepos, ErrorCode::EndifWithNoIf);
                                waiting_for_endif = 0;
                            }
                        }
                    }
                }
            }
            TokenKind::Operator(op) => {
                out.ops += 1;
                match op {
                    OpId::Comma | OpId::Colon => {
                        out.ops += 1; // statement barrier
                        if paren != 0 {
                            errors.record(statement_pos, filepos, ErrorCode::NeedMoreCloseParens);
                            paren = 0;
                        }
                        if waiting_for_mod != 0 {
                            errors.record(statement_pos, filepos, ErrorCode::UnmatchedModulus);
                            waiting_for_mod = 0;
                        }
                        if !expecting_arg {
                            if op == OpId::Colon {
                                out.ops += 2;
                            } else {
                                out.ops += 1;
                            }
                        } else if !new_statement {
                            errors.record(statement_pos, filepos, ErrorCode::ShouldBeArgument);
                        }
                        if op == OpId::Colon && waiting_for_endif != 0 {
                            errors.record(
                                statement_pos,
                                filepos,
                                ErrorCode::UnmatchedIfInInitSection,
                            );
                            waiting_for_endif = 0;
                        }
                        if op == OpId::Colon {
                            if already_got_colon {
                                errors.record(statement_pos, filepos, ErrorCode::SecondColon);
                            }
                            already_got_colon = true;
                        }
                        new_statement = true;
                        expecting_arg = true;
                        assignment_ok = true;
                        statement_pos = Pos::new(lexer.pos() as u32);
                    }
                    OpId::Assign => {
                        // converts the preceding load into a store
                        out.ops = out.ops.saturating_sub(1);
                        out.loads = out.loads.saturating_sub(1);
                        out.stores += 1;
                        if !assignment_ok {
                            errors.record(statement_pos, filepos, ErrorCode::IllegalAssignment);
                        }
                        expecting_arg = true;
                    }
                    OpId::Mod => {
                        assignment_ok = false;
                        if waiting_for_mod == 0 {
                            out.ops = out.ops.saturating_sub(1);
                        }
                        if waiting_for_mod & 1 == 0 {
                            if !expecting_arg {
                                errors.record(statement_pos, filepos, ErrorCode::ShouldBeOperator);
                            }
                        } else if expecting_arg {
                            errors.record(statement_pos, filepos, ErrorCode::ShouldBeArgument);
                        }
                        waiting_for_mod ^= 1;
                    }
                    OpId::Minus => {
                        assignment_ok = false;
                        expecting_arg = true;
                    }
                    OpId::Pow => {
                        assignment_ok = false;
                        if expecting_arg {
                            errors.record(statement_pos, filepos, ErrorCode::ShouldBeArgument);
                        }
                        let mark = lexer.pos();
                        let peek_pos = Pos::new(mark as u32);
                        let next = lexer.next_token();
                        if next.text.starts_with('-') {
                            errors.record(statement_pos, peek_pos, ErrorCode::NoNegAfterExponent);
                        } else {
                            lexer.seek(mark);
                        }
                        expecting_arg = true;
                    }
                    _ => {
                        // the remaining binary operators all demand a
                        // preceding argument
                        assignment_ok = false;
                        if expecting_arg {
                            errors.record(statement_pos, filepos, ErrorCode::ShouldBeArgument);
                        }
                        expecting_arg = true;
                    }
                }
            }
            TokenKind::EndOfFormula => {
                out.ops += 3;
                if paren != 0 {
                    errors.record(statement_pos, filepos, ErrorCode::NeedMoreCloseParens);
                    paren = 0;
                }
                if waiting_for_mod != 0 {
                    errors.record(statement_pos, filepos, ErrorCode::UnmatchedModulus);
                    waiting_for_mod = 0;
                }
                if waiting_for_endif != 0 {
                    errors.record(statement_pos, filepos, ErrorCode::IfWithNoEndif);
                }
                if expecting_arg && !new_statement {
                    errors.record(statement_pos, filepos, ErrorCode::ShouldBeArgument);
                }
                if out.jumps >= MAX_JUMPS {
                    errors.record(statement_pos, filepos, ErrorCode::TooManyJumps);
                }
                done = true;
            }
        }
        if errors.is_full() {
            done = true;
        }
    }

    if errors.is_empty() {
        Ok(out)
    } else {
        Err(errors.into_records())
    }
}
