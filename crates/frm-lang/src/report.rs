//! Formatted compile-error reporting.
//!
//! Each retained error record expands into a human-readable message with
//! the offending statement and a caret underline beneath the bad token.
//! The statement is re-tokenized from the source, so the rendered text is
//! the normalized form the compiler actually saw.

use frm_core::{ErrorCode, ErrorRecord, LexErrorKind, TokenKind};

use crate::lexer::Lexer;

/// Rendered statement width.
const LINE_WIDTH: usize = 74;

/// Errors with no meaningful source position render as message only.
fn is_flat(code: ErrorCode) -> bool {
    matches!(
        code,
        ErrorCode::CouldNotOpenFile
            | ErrorCode::FormulaTooLarge
            | ErrorCode::TableOverflow
            | ErrorCode::JumpParseFailure
            | ErrorCode::InsufficientMemory
    )
}

/// Render every record against its source text.
pub fn render(source: &str, records: &[ErrorRecord]) -> String {
    let mut out = String::new();
    for rec in records {
        render_one(source, rec, &mut out);
    }
    out
}

fn render_one(source: &str, rec: &ErrorRecord, out: &mut String) {
    let error_pos = rec.error_pos.offset() as usize;
    let line = source
        .bytes()
        .take(error_pos.min(source.len()))
        .filter(|b| *b == b'\n')
        .count()
        + 1;
    out.push_str(&format!("Error at line {}:  {}\n", line, rec.code));
    if is_flat(rec.code) || source.is_empty() {
        return;
    }

    // gather the statement's tokens
    let mut lexer = Lexer::new(source, rec.statement_start.offset() as usize);
    let mut texts: Vec<String> = Vec::new();
    let mut error_index = None;
    loop {
        let at = lexer.pos();
        let tok = lexer.next_token();
        let ends = matches!(
            tok.kind,
            TokenKind::EndOfFormula | TokenKind::Bad(LexErrorKind::EndOfFile)
        ) || tok.is_statement_end();
        if at == error_pos {
            error_index = Some(texts.len());
        }
        if ends && at != error_pos {
            break;
        }
        texts.push(tok.text);
        if ends {
            break;
        }
    }
    if texts.is_empty() {
        return;
    }

    let err_i = error_index.unwrap_or(0).min(texts.len() - 1);
    let mut chars_to_error: usize = texts[..err_i].iter().map(|t| t.len()).sum();
    let chars_in_error = if rec.code == ErrorCode::TokenTooLong {
        33
    } else {
        texts[err_i].len().max(1)
    };

    // slide the window right when the error sits past the render width
    let mut first = 0usize;
    if chars_in_error < LINE_WIDTH {
        while chars_to_error + chars_in_error > LINE_WIDTH && first < err_i {
            chars_to_error -= texts[first].len();
            first += 1;
        }
    } else {
        first = err_i;
        chars_to_error = 0;
    }

    let mut stmt = String::new();
    for text in texts.iter().skip(first) {
        if stmt.len() > LINE_WIDTH {
            break;
        }
        stmt.push_str(text);
    }
    stmt.truncate(LINE_WIDTH);
    out.push_str("  ");
    out.push_str(&stmt);
    out.push('\n');

    out.push_str("  ");
    for _ in 0..chars_to_error {
        out.push(' ');
    }
    let carets = chars_in_error.min(LINE_WIDTH.saturating_sub(chars_to_error).max(1));
    for _ in 0..carets {
        out.push('^');
    }
    out.push('\n');
}
