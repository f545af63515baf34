use thiserror::Error;

use crate::span::Pos;

/// At most this many errors are retained per compile attempt; further
/// errors are suppressed.
pub const MAX_COMPILE_ERRORS: usize = 3;

/// Compile-error codes with their legacy message text.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Error)]
pub enum ErrorCode {
    #[error("Should be an Argument")]
    ShouldBeArgument,
    #[error("Should be an Operator")]
    ShouldBeOperator,
    #[error("')' needs a matching '('")]
    NeedMatchingOpenParen,
    #[error("Need more ')'")]
    NeedMoreCloseParens,
    #[error("Undefined Operator")]
    UndefinedOperator,
    #[error("Undefined Function")]
    UndefinedFunction,
    #[error("Table overflow")]
    TableOverflow,
    #[error("Didn't find matching ')' in symmetry declaration")]
    NoMatchRightParen,
    #[error("No '{{' found on first line")]
    NoLeftBracketFirstLine,
    #[error("Unexpected EOF!")]
    UnexpectedEof,
    #[error("Symmetry below is invalid, will use NOSYM")]
    InvalidSymmetry,
    #[error("Formula is too large")]
    FormulaTooLarge,
    #[error("Insufficient memory to run fractal type 'formula'")]
    InsufficientMemory,
    #[error("Could not open file where formula located")]
    CouldNotOpenFile,
    #[error("No characters may precede jump instruction")]
    JumpNotFirst,
    #[error("No characters may follow this jump instruction")]
    NoCharAfterJump,
    #[error("Jump instruction missing required (boolean argument)")]
    JumpNeedsBoolean,
    #[error("Next jump after \"else\" must be \"endif\"")]
    EndifRequiredAfterElse,
    #[error("\"endif\" has no matching \"if\"")]
    EndifWithNoIf,
    #[error("Misplaced \"else\" or \"elseif()\"")]
    MisplacedElseOrElseif,
    #[error("\"if ()\" in initialization has no matching \"endif\"")]
    UnmatchedIfInInitSection,
    #[error("\"if ()\" has no matching \"endif\"")]
    IfWithNoEndif,
    #[error("Error in parsing jump statements")]
    JumpParseFailure,
    #[error("Formula has too many jump commands")]
    TooManyJumps,
    #[error("Formula name has too many characters")]
    FormulaNameTooLarge,
    #[error("Only variables are allowed to left of assignment")]
    IllegalAssignment,
    #[error("Illegal variable name")]
    IllegalVarName,
    #[error("Invalid constant expression")]
    InvalidConstant,
    #[error("This character not supported by parser")]
    IllegalChar,
    #[error("Nesting of parentheses exceeds maximum depth")]
    NestingTooDeep,
    #[error("Unmatched modulus operator \"|\" in this expression")]
    UnmatchedModulus,
    #[error("Can't use function name as variable")]
    FuncUsedAsVar,
    #[error("Negative exponent must be enclosed in parens")]
    NoNegAfterExponent,
    #[error("Variable or constant exceeds 32 character limit")]
    TokenTooLong,
    #[error("Only one \":\" permitted in a formula")]
    SecondColon,
}

/// One retained compile error: the start of the statement it occurred in,
/// the position of the offending token, and the error code.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct ErrorRecord {
    pub statement_start: Pos,
    pub error_pos: Pos,
    pub code: ErrorCode,
}

/// Accumulator for compile errors, capped at [`MAX_COMPILE_ERRORS`].
///
/// Only the first error per statement is kept, matching the legacy rule
/// that one bad statement reports once.
#[derive(Clone, Debug, Default)]
pub struct CompileErrors {
    records: Vec<ErrorRecord>,
}

impl CompileErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an error unless this statement already has one or the cap is
    /// reached.
    pub fn record(&mut self, statement_start: Pos, error_pos: Pos, code: ErrorCode) {
        if self.records.len() >= MAX_COMPILE_ERRORS {
            return;
        }
        if let Some(last) = self.records.last() {
            if last.statement_start == statement_start {
                return;
            }
        }
        self.records.push(ErrorRecord {
            statement_start,
            error_pos,
            code,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.records.len() >= MAX_COMPILE_ERRORS
    }

    pub fn records(&self) -> &[ErrorRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<ErrorRecord> {
        self.records
    }
}
