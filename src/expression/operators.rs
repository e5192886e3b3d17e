//! The operator catalogue.
//!
//! Two static tables drive the parser: one consulted when a value or prefix
//! operator is expected, one when an infix operator or terminator is
//! expected. Matching is case-insensitive and first-match-wins, so table
//! order is significant wherever one token is a prefix of another (`<<`
//! before `<=` before `<`, `==` before `=`). Word operators are matched by
//! prefix alone with no word-boundary check: `ANDY` tokenizes as `AND`
//! followed by the symbol `Y`, which the dialect has always done.
//!
//! Rows with no handler are sentinels: brackets and the argument separator.
//! They never evaluate; they only mark unwind points on the operator stack.
//! A prefix-function token carries its arity and includes the opening `(`
//! in its spelling, so `LEN(` is one token while `LEN` alone is a symbol
//! reference.

// ---------------------------------------------------------------------------
// Operator kinds
// ---------------------------------------------------------------------------

/// Identifies the evaluator for an operator or built-in function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    // -- infix arithmetic --
    /// `^`
    Power,
    /// `*`
    Multiply,
    /// `/`
    Divide,
    /// `DIV`: truncated integer division.
    Div,
    /// `MOD` and `%`: truncated signed remainder.
    Mod,
    /// `<<`
    ShiftLeft,
    /// `>>`
    ShiftRight,
    /// `+`: addition or string concatenation.
    Add,
    /// `-`
    Subtract,

    // -- infix comparisons (−1 true, 0 false) --
    /// `=` / `==`
    Equal,
    /// `<>` / `!=`
    NotEqual,
    /// `<=`
    LessOrEqual,
    /// `>=`
    MoreOrEqual,
    /// `<`
    LessThan,
    /// `>`
    MoreThan,

    // -- infix bitwise --
    /// `AND`
    And,
    /// `OR`
    Or,
    /// `EOR`
    Eor,

    // -- prefix signs and byte extraction --
    /// Unary `-`
    Negate,
    /// Unary `+`
    Posate,
    /// `HI(` and unary `>`
    Hi,
    /// `LO(` and unary `<`
    Lo,

    // -- numeric functions --
    /// `SIN(`
    Sin,
    /// `COS(`
    Cos,
    /// `TAN(`
    Tan,
    /// `ASN(`
    ArcSin,
    /// `ACS(`
    ArcCos,
    /// `ATN(`
    ArcTan,
    /// `SQR(`
    Sqrt,
    /// `RAD(`: degrees to radians.
    Rad,
    /// `DEG(`: radians to degrees.
    Deg,
    /// `INT(`
    Int,
    /// `ABS(`
    Abs,
    /// `SGN(`
    Sgn,
    /// `RND(`
    Rnd,
    /// `NOT(`: bitwise complement.
    Not,
    /// `LOG(`: base-10 logarithm.
    Log,
    /// `LN(`
    Ln,
    /// `EXP(`
    Exp,

    // -- time and string functions --
    /// `TIME$(`
    Time,
    /// `STR$(`
    Str,
    /// `STR$~(`: uppercase hex, no prefix.
    StrHex,
    /// `VAL(`
    Val,
    /// `EVAL(`
    Eval,
    /// `LEN(`
    Len,
    /// `CHR$(`
    Chr,
    /// `ASC(`
    Asc,
    /// `MID$(`
    Mid,
    /// `LEFT$(`
    Left,
    /// `RIGHT$(`
    Right,
    /// `STRING$(`
    StringRepeat,
    /// `UPPER$(`
    Upper,
    /// `LOWER$(`
    Lower,
}

// ---------------------------------------------------------------------------
// Table rows
// ---------------------------------------------------------------------------

/// One row of an operator table.
#[derive(Debug, Clone, Copy)]
pub struct Operator {
    /// Token text, stored uppercase; matched case-insensitively.
    pub token: &'static str,
    /// Binding strength; −1 marks a bracket or separator sentinel.
    pub precedence: i8,
    /// Prefix-function arity. On a *stacked* `(` sentinel this field is
    /// repurposed to count the commas still expected inside the bracket.
    pub parameter_count: i8,
    /// Evaluator, or `None` for sentinels.
    pub handler: Option<Op>,
}

impl Operator {
    const fn sentinel(token: &'static str) -> Self {
        Self {
            token,
            precedence: -1,
            parameter_count: 0,
            handler: None,
        }
    }

    const fn infix(token: &'static str, precedence: i8, handler: Op) -> Self {
        Self {
            token,
            precedence,
            parameter_count: 0,
            handler: Some(handler),
        }
    }

    const fn prefix(token: &'static str, precedence: i8, handler: Op) -> Self {
        Self {
            token,
            precedence,
            parameter_count: 0,
            handler: Some(handler),
        }
    }

    const fn function(token: &'static str, parameter_count: i8, handler: Op) -> Self {
        Self {
            token,
            precedence: 10,
            parameter_count,
            handler: Some(handler),
        }
    }
}

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

/// Operators legal where an infix operator or terminator is expected.
pub const BINARY_OPERATORS: &[Operator] = &[
    Operator::sentinel(")"),
    Operator::sentinel("]"),
    Operator::sentinel(","),
    Operator::infix("^", 7, Op::Power),
    Operator::infix("*", 6, Op::Multiply),
    Operator::infix("/", 6, Op::Divide),
    Operator::infix("%", 6, Op::Mod),
    Operator::infix("DIV", 6, Op::Div),
    Operator::infix("MOD", 6, Op::Mod),
    Operator::infix("<<", 6, Op::ShiftLeft),
    Operator::infix(">>", 6, Op::ShiftRight),
    Operator::infix("+", 5, Op::Add),
    Operator::infix("-", 5, Op::Subtract),
    Operator::infix("==", 4, Op::Equal),
    Operator::infix("=", 4, Op::Equal),
    Operator::infix("<>", 4, Op::NotEqual),
    Operator::infix("!=", 4, Op::NotEqual),
    Operator::infix("<=", 4, Op::LessOrEqual),
    Operator::infix(">=", 4, Op::MoreOrEqual),
    Operator::infix("<", 4, Op::LessThan),
    Operator::infix(">", 4, Op::MoreThan),
    Operator::infix("AND", 3, Op::And),
    Operator::infix("OR", 2, Op::Or),
    Operator::infix("EOR", 2, Op::Eor),
];

/// Operators legal where a value is expected.
pub const UNARY_OPERATORS: &[Operator] = &[
    Operator::sentinel("("),
    Operator::sentinel("["),
    Operator::prefix("-", 8, Op::Negate),
    Operator::prefix("+", 8, Op::Posate),
    Operator::function("HI(", 1, Op::Hi),
    Operator::function("LO(", 1, Op::Lo),
    Operator::prefix(">", 10, Op::Hi),
    Operator::prefix("<", 10, Op::Lo),
    Operator::function("SIN(", 1, Op::Sin),
    Operator::function("COS(", 1, Op::Cos),
    Operator::function("TAN(", 1, Op::Tan),
    Operator::function("ASN(", 1, Op::ArcSin),
    Operator::function("ACS(", 1, Op::ArcCos),
    Operator::function("ATN(", 1, Op::ArcTan),
    Operator::function("SQR(", 1, Op::Sqrt),
    Operator::function("RAD(", 1, Op::Rad),
    Operator::function("DEG(", 1, Op::Deg),
    Operator::function("INT(", 1, Op::Int),
    Operator::function("ABS(", 1, Op::Abs),
    Operator::function("SGN(", 1, Op::Sgn),
    Operator::function("RND(", 1, Op::Rnd),
    Operator::function("NOT(", 1, Op::Not),
    Operator::function("LOG(", 1, Op::Log),
    Operator::function("LN(", 1, Op::Ln),
    Operator::function("EXP(", 1, Op::Exp),
    Operator::function("TIME$(", 1, Op::Time),
    Operator::function("STR$(", 1, Op::Str),
    Operator::function("STR$~(", 1, Op::StrHex),
    Operator::function("VAL(", 1, Op::Val),
    Operator::function("EVAL(", 1, Op::Eval),
    Operator::function("LEN(", 1, Op::Len),
    Operator::function("CHR$(", 1, Op::Chr),
    Operator::function("ASC(", 1, Op::Asc),
    Operator::function("MID$(", 3, Op::Mid),
    Operator::function("LEFT$(", 2, Op::Left),
    Operator::function("RIGHT$(", 2, Op::Right),
    Operator::function("STRING$(", 2, Op::StringRepeat),
    Operator::function("UPPER$(", 1, Op::Upper),
    Operator::function("LOWER$(", 1, Op::Lower),
];

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn position(table: &[Operator], token: &str) -> usize {
        table
            .iter()
            .position(|op| op.token == token)
            .unwrap_or_else(|| panic!("token {token} missing"))
    }

    #[test]
    fn sentinels_have_no_handler_and_negative_precedence() {
        for table in [BINARY_OPERATORS, UNARY_OPERATORS] {
            for op in table {
                assert_eq!(
                    op.handler.is_none(),
                    op.precedence < 0,
                    "sentinel marking inconsistent for {}",
                    op.token
                );
            }
        }
    }

    #[test]
    fn longer_tokens_match_before_their_prefixes() {
        // First match wins, so any token that is a prefix of another must
        // appear after it.
        for table in [BINARY_OPERATORS, UNARY_OPERATORS] {
            for (i, earlier) in table.iter().enumerate() {
                for later in &table[i + 1..] {
                    assert!(
                        !later.token.starts_with(earlier.token),
                        "{} is shadowed by earlier {}",
                        later.token,
                        earlier.token
                    );
                }
            }
        }
    }

    #[test]
    fn comparison_token_order() {
        assert!(position(BINARY_OPERATORS, "==") < position(BINARY_OPERATORS, "="));
        assert!(position(BINARY_OPERATORS, "<<") < position(BINARY_OPERATORS, "<="));
        assert!(position(BINARY_OPERATORS, "<=") < position(BINARY_OPERATORS, "<"));
        assert!(position(BINARY_OPERATORS, ">=") < position(BINARY_OPERATORS, ">"));
    }

    #[test]
    fn function_tokens_end_with_open_bracket() {
        for op in UNARY_OPERATORS {
            if op.parameter_count > 0 {
                assert!(
                    op.token.ends_with('('),
                    "function token {} must include its bracket",
                    op.token
                );
            }
        }
    }

    #[test]
    fn tokens_are_stored_uppercase() {
        for table in [BINARY_OPERATORS, UNARY_OPERATORS] {
            for op in table {
                assert_eq!(
                    op.token,
                    op.token.to_ascii_uppercase(),
                    "token {} must be stored uppercase",
                    op.token
                );
            }
        }
    }
}
