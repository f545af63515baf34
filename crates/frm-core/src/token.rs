use crate::complex::Complex;
use crate::span::Span;

/// Which side of a parenthesis pair.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum ParenKind {
    Open,
    Close,
}

/// Flow-control keyword.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum JumpKind {
    If,
    ElseIf,
    Else,
    EndIf,
}

impl JumpKind {
    /// Resolve a lowercase identifier to a flow-control keyword.
    pub fn from_name(name: &str) -> Option<JumpKind> {
        match name {
            "if" => Some(JumpKind::If),
            "elseif" => Some(JumpKind::ElseIf),
            "else" => Some(JumpKind::Else),
            "endif" => Some(JumpKind::EndIf),
            _ => None,
        }
    }

    /// `if` and `elseif` require a parenthesized boolean argument.
    pub fn needs_boolean(self) -> bool {
        matches!(self, JumpKind::If | JumpKind::ElseIf)
    }
}

/// Why a token failed to lex.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum LexErrorKind {
    EndOfFile,
    IllegalCharacter,
    IllegalVariableName,
    TokenTooLong,
    FuncUsedAsVar,
    JumpMissingBoolean,
    JumpWithIllegalChar,
    UndefinedFunction,
    IllegalOperator,
    IllFormedConstant,
}

/// Predefined variable, in symbol-slot order.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum PredefVar {
    Pixel,
    P1,
    P2,
    Z,
    LastSqr,
    Pi,
    E,
    Rand,
    P3,
    WhiteSq,
    ScrnPix,
    ScrnMax,
    MaxIt,
    IsMand,
    Center,
    MagXMag,
    RotSkew,
    P4,
    P5,
}

/// All predefined variables in slot order.
pub const PREDEF_VARS: [PredefVar; 19] = [
    PredefVar::Pixel,
    PredefVar::P1,
    PredefVar::P2,
    PredefVar::Z,
    PredefVar::LastSqr,
    PredefVar::Pi,
    PredefVar::E,
    PredefVar::Rand,
    PredefVar::P3,
    PredefVar::WhiteSq,
    PredefVar::ScrnPix,
    PredefVar::ScrnMax,
    PredefVar::MaxIt,
    PredefVar::IsMand,
    PredefVar::Center,
    PredefVar::MagXMag,
    PredefVar::RotSkew,
    PredefVar::P4,
    PredefVar::P5,
];

impl PredefVar {
    /// The symbol-table slot this variable occupies. Variants are declared
    /// in slot order, matching [`PREDEF_VARS`].
    pub fn slot(self) -> usize {
        self as usize
    }

    /// Lowercase source name.
    pub fn name(self) -> &'static str {
        match self {
            PredefVar::Pixel => "pixel",
            PredefVar::P1 => "p1",
            PredefVar::P2 => "p2",
            PredefVar::Z => "z",
            PredefVar::LastSqr => "lastsqr",
            PredefVar::Pi => "pi",
            PredefVar::E => "e",
            PredefVar::Rand => "rand",
            PredefVar::P3 => "p3",
            PredefVar::WhiteSq => "whitesq",
            PredefVar::ScrnPix => "scrnpix",
            PredefVar::ScrnMax => "scrnmax",
            PredefVar::MaxIt => "maxit",
            PredefVar::IsMand => "ismand",
            PredefVar::Center => "center",
            PredefVar::MagXMag => "magxmag",
            PredefVar::RotSkew => "rotskew",
            PredefVar::P4 => "p4",
            PredefVar::P5 => "p5",
        }
    }

    /// Resolve a lowercase identifier to a predefined variable.
    pub fn lookup(name: &str) -> Option<PredefVar> {
        PREDEF_VARS.iter().copied().find(|v| v.name() == name)
    }

    /// Parameter variables gate UI prompts (p1..p5, ismand).
    pub fn is_param(self) -> bool {
        matches!(
            self,
            PredefVar::P1
                | PredefVar::P2
                | PredefVar::P3
                | PredefVar::P4
                | PredefVar::P5
                | PredefVar::IsMand
        )
    }
}

/// Builtin function identity (excluding the fn1..fn4 slots).
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum FuncId {
    Sin,
    Sinh,
    Cos,
    Cosh,
    Sqr,
    Log,
    Exp,
    Abs,
    Conj,
    Real,
    Imag,
    Flip,
    Tan,
    Tanh,
    CoTan,
    CoTanh,
    CosXX,
    SRand,
    ASin,
    ASinh,
    ACos,
    ACosh,
    ATan,
    ATanh,
    Sqrt,
    CAbs,
    Floor,
    Ceil,
    Trunc,
    Round,
}

impl FuncId {
    /// Resolve a lowercase identifier to a builtin function.
    pub fn lookup(name: &str) -> Option<FuncId> {
        Some(match name {
            "sin" => FuncId::Sin,
            "sinh" => FuncId::Sinh,
            "cos" => FuncId::Cos,
            "cosh" => FuncId::Cosh,
            "sqr" => FuncId::Sqr,
            "log" => FuncId::Log,
            "exp" => FuncId::Exp,
            "abs" => FuncId::Abs,
            "conj" => FuncId::Conj,
            "real" => FuncId::Real,
            "imag" => FuncId::Imag,
            "flip" => FuncId::Flip,
            "tan" => FuncId::Tan,
            "tanh" => FuncId::Tanh,
            "cotan" => FuncId::CoTan,
            "cotanh" => FuncId::CoTanh,
            "cosxx" => FuncId::CosXX,
            "srand" => FuncId::SRand,
            "asin" => FuncId::ASin,
            "asinh" => FuncId::ASinh,
            "acos" => FuncId::ACos,
            "acosh" => FuncId::ACosh,
            "atan" => FuncId::ATan,
            "atanh" => FuncId::ATanh,
            "sqrt" => FuncId::Sqrt,
            "cabs" => FuncId::CAbs,
            "floor" => FuncId::Floor,
            "ceil" => FuncId::Ceil,
            "trunc" => FuncId::Trunc,
            "round" => FuncId::Round,
            _ => return None,
        })
    }
}

/// Operator identity, in legacy id order.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum OpId {
    Comma,
    Ne,
    Assign,
    Eq,
    Lt,
    Lte,
    Gt,
    Gte,
    Mod,
    Or,
    And,
    Colon,
    Plus,
    Minus,
    Mul,
    Div,
    Pow,
}

impl OpId {
    /// `,` and `:` terminate a statement.
    pub fn is_statement_end(self) -> bool {
        matches!(self, OpId::Comma | OpId::Colon)
    }
}

/// Classification of one lexed token.
#[derive(Clone, PartialEq, Debug)]
pub enum TokenKind {
    Paren(ParenKind),
    /// p1..p5 or ismand.
    ParamVariable(PredefVar),
    UserVariable,
    PredefVariable(PredefVar),
    RealConstant(f64),
    ComplexConstant(Complex),
    Function(FuncId),
    /// One of the user-selectable trig slots fn1..fn4 (0-based index).
    ParamFunction(u8),
    FlowControl(JumpKind),
    Operator(OpId),
    EndOfFormula,
    /// A lexical error; the scan can continue past it.
    Bad(LexErrorKind),
}

/// One token of formula source.
#[derive(Clone, PartialEq, Debug)]
pub struct Token {
    /// Normalized (lowercase, whitespace-free) source text of the token.
    pub text: String,
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn is_bad(&self) -> bool {
        matches!(self.kind, TokenKind::Bad(_))
    }

    pub fn is_statement_end(&self) -> bool {
        matches!(self.kind, TokenKind::Operator(op) if op.is_statement_end())
    }
}
