//! Formula-file entries and the `Name(symmetry) {` header.
//!
//! A formula file holds any number of named entries. Lookup is by name,
//! case-insensitive; the header is validated up to the opening brace
//! before the body is ever scanned.

use frm_core::{ErrorCode, ErrorRecord, Pos};

/// Longest accepted entry name.
pub const MAX_NAME_CHARS: usize = 18;

/// Longest accepted symmetry spelling.
const MAX_SYM_CHARS: usize = 19;

/// Image symmetry declared in an entry header.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub enum Symmetry {
    #[default]
    None,
    XAxisNoParam,
    XAxis,
    YAxisNoParam,
    YAxis,
    XYAxisNoParam,
    XYAxis,
    OriginNoParam,
    Origin,
    PiSymNoParam,
    PiSym,
    XAxisNoImag,
    XAxisNoReal,
    NoPlot,
}

impl Symmetry {
    /// Legacy numeric code.
    pub fn code(self) -> i32 {
        match self {
            Symmetry::None => 0,
            Symmetry::XAxisNoParam => -1,
            Symmetry::XAxis => 1,
            Symmetry::YAxisNoParam => -2,
            Symmetry::YAxis => 2,
            Symmetry::XYAxisNoParam => -3,
            Symmetry::XYAxis => 3,
            Symmetry::OriginNoParam => -4,
            Symmetry::Origin => 4,
            Symmetry::PiSymNoParam => -5,
            Symmetry::PiSym => 5,
            Symmetry::XAxisNoImag => -6,
            Symmetry::XAxisNoReal => 6,
            Symmetry::NoPlot => 99,
        }
    }

    /// Resolve an uppercase spelling from an entry header.
    pub fn from_name(name: &str) -> Option<Symmetry> {
        Some(match name {
            "NOSYM" => Symmetry::None,
            "XAXIS_NOPARM" => Symmetry::XAxisNoParam,
            "XAXIS" => Symmetry::XAxis,
            "YAXIS_NOPARM" => Symmetry::YAxisNoParam,
            "YAXIS" => Symmetry::YAxis,
            "XYAXIS_NOPARM" => Symmetry::XYAxisNoParam,
            "XYAXIS" => Symmetry::XYAxis,
            "ORIGIN_NOPARM" => Symmetry::OriginNoParam,
            "ORIGIN" => Symmetry::Origin,
            "PI_SYM_NOPARM" => Symmetry::PiSymNoParam,
            "PI_SYM" => Symmetry::PiSym,
            "XAXIS_NOIMAG" => Symmetry::XAxisNoImag,
            "XAXIS_NOREAL" => Symmetry::XAxisNoReal,
            "NOPLOT" => Symmetry::NoPlot,
            _ => return None,
        })
    }
}

/// Validated entry header.
#[derive(Clone, Debug)]
pub struct EntryHeader {
    pub symmetry: Symmetry,
    /// Byte offset just past the opening `{`.
    pub body_start: usize,
    /// Non-fatal findings (an unknown symmetry falls back to `None`).
    pub warnings: Vec<ErrorRecord>,
}

fn record(at: usize, code: ErrorCode) -> ErrorRecord {
    ErrorRecord {
        statement_start: Pos::new(at as u32),
        error_pos: Pos::new(at as u32),
        code,
    }
}

/// Find the named entry in a formula file. Returns the byte offset of the
/// entry's name. Matching is case-insensitive; `;` comment lines and the
/// bodies of other entries are skipped.
pub fn find_entry(text: &str, name: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b' ' | b'\t' | b'\r' | b'\n' => i += 1,
            b';' => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'{' => {
                // stray block without a name
                while i < bytes.len() && bytes[i] != b'}' {
                    i += 1;
                }
                i += 1;
            }
            _ => {
                let start = i;
                while i < bytes.len()
                    && !matches!(bytes[i], b' ' | b'\t' | b'\r' | b'\n' | b'(' | b'{')
                {
                    i += 1;
                }
                let candidate = &text[start..i];
                // skip to the end of this entry's body
                while i < bytes.len() && bytes[i] != b'{' {
                    i += 1;
                }
                let body = i;
                while i < bytes.len() && bytes[i] != b'}' {
                    i += 1;
                }
                i += 1;
                if candidate.eq_ignore_ascii_case(name) && body < bytes.len() {
                    return Some(start);
                }
            }
        }
    }
    None
}

/// Validate the header starting at the entry name; errors are fatal
/// except for an unknown symmetry, which is reported and ignored.
pub fn check_header(text: &str, entry_start: usize) -> Result<EntryHeader, ErrorRecord> {
    let bytes = text.as_bytes();
    let mut i = entry_start;
    let mut name_len = 0usize;
    let mut at_end_of_name = false;

    let open = loop {
        let c = match bytes.get(i) {
            None => return Err(record(i, ErrorCode::UnexpectedEof)),
            Some(&c) => c,
        };
        i += 1;
        match c {
            0x1a => return Err(record(i - 1, ErrorCode::UnexpectedEof)),
            b'\r' | b'\n' => return Err(record(i - 1, ErrorCode::NoLeftBracketFirstLine)),
            b' ' | b'\t' => at_end_of_name = true,
            b'(' | b'{' => break c,
            _ => {
                if !at_end_of_name {
                    name_len += 1;
                }
            }
        }
    };

    if name_len > MAX_NAME_CHARS {
        return Err(record(entry_start, ErrorCode::FormulaNameTooLarge));
    }

    let mut warnings = Vec::new();
    let mut symmetry = Symmetry::None;
    let mut c = open;
    if c == b'(' {
        let sym_start = i;
        let mut sym = String::new();
        loop {
            let ch = match bytes.get(i) {
                None => return Err(record(i, ErrorCode::UnexpectedEof)),
                Some(&ch) => ch,
            };
            i += 1;
            match ch {
                0x1a => return Err(record(i - 1, ErrorCode::UnexpectedEof)),
                b'\r' | b'\n' => return Err(record(i - 1, ErrorCode::NoLeftBracketFirstLine)),
                b'{' => return Err(record(i - 1, ErrorCode::NoMatchRightParen)),
                b' ' | b'\t' => {}
                b')' => break,
                _ => {
                    if sym.len() < MAX_SYM_CHARS {
                        sym.push(ch.to_ascii_uppercase() as char);
                    }
                }
            }
        }
        match Symmetry::from_name(&sym) {
            Some(s) => symmetry = s,
            None => warnings.push(record(sym_start, ErrorCode::InvalidSymmetry)),
        }
        c = 0;
    }

    if c != b'{' {
        loop {
            let ch = match bytes.get(i) {
                None => return Err(record(i, ErrorCode::UnexpectedEof)),
                Some(&ch) => ch,
            };
            i += 1;
            match ch {
                0x1a => return Err(record(i - 1, ErrorCode::UnexpectedEof)),
                b'\r' | b'\n' => return Err(record(i - 1, ErrorCode::NoLeftBracketFirstLine)),
                b'{' => break,
                _ => {}
            }
        }
    }

    Ok(EntryHeader {
        symmetry,
        body_start: i,
        warnings,
    })
}
