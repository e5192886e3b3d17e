//! Expression parsing and evaluation.
//!
//! The engine is a shunting-yard evaluator: a value stack and an operator
//! stack, driven by a state that alternates between *expecting a value or
//! prefix operator* and *expecting an infix operator or terminator*. No AST
//! is built; operators execute against the value stack as precedence
//! resolves, so evaluation order is exactly left-to-right over the source
//! text.
//!
//! The catalogue of operators lives in [`operators`]; their evaluators in
//! the `functions` submodule. The parser itself lives here: token matching,
//! bracket and argument accounting, and the two-pass handling of forward
//! references.
//!
//! # Expressions and the line driver
//!
//! A [`LineParser`] holds a cursor into one line of source. The surrounding
//! driver positions the cursor at the start of an expression, calls one of
//! the `evaluate_expression*` methods, and reads the cursor back afterwards
//! to continue with the rest of the statement. Inside brackets, statement
//! punctuation (`:` separators, argument commas) belongs to the expression;
//! at the top level it terminates the sub-statement.

pub mod operators;

mod functions;

use log::debug;

use crate::context::AssemblyContext;
use crate::error::{ErrorKind, EvalResult, SyntaxError};
use crate::scanner;
use crate::string::AsmString;
use crate::value::Value;

use operators::{Operator, BINARY_OPERATORS, UNARY_OPERATORS};

// ---------------------------------------------------------------------------
// Limits
// ---------------------------------------------------------------------------

/// Value stack bound.
const MAX_VALUES: usize = 128;
/// Operator stack bound.
const MAX_OPERATORS: usize = 32;
/// Nesting bound for `EVAL`, so hostile input cannot exhaust the host
/// call stack.
const MAX_EVAL_DEPTH: u32 = 32;

/// The format `TIME$` uses when called without an argument.
const DEFAULT_TIME_FORMAT: &str = "%a,%d %b %Y.%H:%M:%S";

/// What the parser expects next.
#[derive(Debug, Clone, Copy)]
enum Expected {
    /// A value, a prefix operator, or an open bracket.
    ValueOrUnary,
    /// An infix operator, a close bracket, or an argument separator.
    Binary,
}

// ---------------------------------------------------------------------------
// Line parser
// ---------------------------------------------------------------------------

/// Parses and evaluates the expressions on one line of source.
pub struct LineParser<'l, 'c> {
    line: &'l [u8],
    column: usize,
    ctx: &'c mut AssemblyContext,
    value_stack: Vec<Value>,
    operator_stack: Vec<Operator>,
    eval_depth: u32,
}

impl<'l, 'c> LineParser<'l, 'c> {
    /// Create a parser over a line of source text, cursor at column 0.
    pub fn new(line: &'l str, ctx: &'c mut AssemblyContext) -> Self {
        Self::from_bytes(line.as_bytes(), ctx)
    }

    /// Create a parser over raw line bytes, cursor at column 0. Expression
    /// input is 8-bit clean; it does not have to be UTF-8.
    pub fn from_bytes(line: &'l [u8], ctx: &'c mut AssemblyContext) -> Self {
        Self {
            line,
            column: 0,
            ctx,
            value_stack: Vec::new(),
            operator_stack: Vec::new(),
            eval_depth: 0,
        }
    }

    /// Current cursor position (byte offset into the line).
    #[must_use]
    pub fn column(&self) -> usize {
        self.column
    }

    /// Move the cursor; the driver uses this to step through a statement.
    pub fn set_column(&mut self, column: usize) {
        self.column = column;
    }

    // -----------------------------------------------------------------------
    // Public evaluation entry points
    // -----------------------------------------------------------------------

    /// Evaluate one expression starting at the cursor and leave the cursor
    /// on the terminator that ended it.
    ///
    /// With `allow_one_trailing_close`, a close bracket with no matching
    /// open ends the expression and is left at the cursor for the caller.
    /// The indirect addressing forms (`LDA (addr),Y`, `JMP (addr)`) consume
    /// the open bracket before the expression starts.
    ///
    /// # Errors
    ///
    /// Any [`SyntaxError`]; on the first pass an undefined symbol first
    /// moves the cursor past the whole expression so the driver can carry
    /// on with the line, then reports `SymbolNotDefined`.
    pub fn evaluate_expression(&mut self, allow_one_trailing_close: bool) -> EvalResult<Value> {
        self.value_stack.clear();
        self.operator_stack.clear();

        let mut bracket_count: i32 = 0;
        // Set when a function token has just matched: the number of commas
        // its argument list must contain, handed to the `(` that follows.
        let mut pending_comma_count: i8 = 0;
        let mut expected = Expected::ValueOrUnary;

        while self.advance_and_check_end_of_sub_statement(bracket_count == 0) {
            match expected {
                Expected::ValueOrUnary => {
                    if let Some(mut op) = self.match_unary_operator(&mut pending_comma_count) {
                        if op.handler.is_some() {
                            // Prefix operators pop only strictly tighter
                            // bindings, so consecutive prefixes nest
                            // right-to-left.
                            self.unwind_operators(op.precedence, false)?;
                        } else {
                            // Open bracket: adopt the comma count of the
                            // function that announced it, if any.
                            op.parameter_count = pending_comma_count;
                            pending_comma_count = 0;
                            bracket_count += 1;
                        }
                        self.push_operator(op)?;
                    } else {
                        if self.value_stack.len() == MAX_VALUES {
                            return Err(SyntaxError::new(
                                ErrorKind::ExpressionTooComplex,
                                self.column,
                            ));
                        }
                        let value = match self.get_value() {
                            Ok(value) => value,
                            Err(err) => {
                                if err.kind == ErrorKind::SymbolNotDefined && self.ctx.first_pass {
                                    // Forward reference: on the first pass
                                    // the driver needs the cursor past the
                                    // expression to carry on with the line.
                                    debug!(
                                        "first pass: skipping expression after undefined symbol at column {}",
                                        err.column
                                    );
                                    self.skip_expression(bracket_count, allow_one_trailing_close);
                                }
                                return Err(err);
                            }
                        };
                        self.value_stack.push(value);
                        expected = Expected::Binary;
                    }
                }

                Expected::Binary => {
                    let Some(op) = self.match_table(BINARY_OPERATORS) else {
                        return Err(SyntaxError::new(ErrorKind::InvalidCharacter, self.column));
                    };

                    if op.handler.is_some() {
                        // Infix operators pop equal bindings too: infix is
                        // left-associative.
                        self.unwind_operators(op.precedence, true)?;
                        self.push_operator(op)?;
                        expected = Expected::ValueOrUnary;
                    } else {
                        // Close bracket or argument separator.
                        let separator = op.token == ",";
                        if !separator {
                            bracket_count -= 1;
                        }

                        let mut open_bracket = None;
                        while let Some(top) = self.operator_stack.pop() {
                            match top.handler {
                                Some(handler) => self.apply(handler)?,
                                None => {
                                    open_bracket = Some(top);
                                    break;
                                }
                            }
                        }

                        match open_bracket {
                            Some(mut open) => {
                                if separator {
                                    if open.parameter_count == 0 {
                                        return Err(SyntaxError::new(
                                            ErrorKind::ParameterCount,
                                            self.column - 1,
                                        ));
                                    }
                                    open.parameter_count -= 1;
                                    // The bracket stays open across the
                                    // separator.
                                    self.operator_stack.push(open);
                                    expected = Expected::ValueOrUnary;
                                } else if open.parameter_count != 0 {
                                    return Err(SyntaxError::new(
                                        ErrorKind::ParameterCount,
                                        self.column - 1,
                                    ));
                                }
                            }
                            None => {
                                if allow_one_trailing_close {
                                    // Unmatched close ends the expression;
                                    // rewind so the caller consumes it.
                                    self.column -= 1;
                                    break;
                                }
                                return Err(SyntaxError::new(
                                    ErrorKind::MismatchedParentheses,
                                    self.column - 1,
                                ));
                            }
                        }
                    }
                }
            }
        }

        // End of input: run everything still stacked.
        while let Some(top) = self.operator_stack.pop() {
            match top.handler {
                Some(handler) => self.apply(handler)?,
                None => {
                    return Err(SyntaxError::new(
                        ErrorKind::MismatchedParentheses,
                        self.column,
                    ))
                }
            }
        }

        debug_assert!(
            self.value_stack.len() <= 1,
            "value stack holds {} values after a full unwind",
            self.value_stack.len()
        );

        self.value_stack
            .pop()
            .ok_or_else(|| SyntaxError::new(ErrorKind::EmptyExpression, self.column))
    }

    /// Evaluate an expression that must produce a number.
    ///
    /// # Errors
    ///
    /// As [`Self::evaluate_expression`], plus `TypeMismatch` for a string
    /// result.
    pub fn evaluate_expression_as_double(
        &mut self,
        allow_one_trailing_close: bool,
    ) -> EvalResult<f64> {
        let value = self.evaluate_expression(allow_one_trailing_close)?;
        value
            .as_number()
            .ok_or_else(|| SyntaxError::new(ErrorKind::TypeMismatch, self.column))
    }

    /// Evaluate an expression that must produce a number in signed 32-bit
    /// range (with the dialect's unsigned wraparound).
    ///
    /// # Errors
    ///
    /// As [`Self::evaluate_expression_as_double`], plus `OutOfIntegerRange`.
    pub fn evaluate_expression_as_int(&mut self, allow_one_trailing_close: bool) -> EvalResult<i32> {
        let value = self.evaluate_expression_as_double(allow_one_trailing_close)?;
        self.convert_double_to_int(value)
    }

    /// Evaluate an expression that must produce a number, reinterpreted as
    /// unsigned 32-bit.
    ///
    /// # Errors
    ///
    /// As [`Self::evaluate_expression_as_int`].
    pub fn evaluate_expression_as_unsigned_int(
        &mut self,
        allow_one_trailing_close: bool,
    ) -> EvalResult<u32> {
        #[expect(
            clippy::cast_sign_loss,
            reason = "the unsigned reinterpretation of the 32-bit result is the contract"
        )]
        let value = self.evaluate_expression_as_int(allow_one_trailing_close)? as u32;
        Ok(value)
    }

    /// Evaluate an expression that must produce a string.
    ///
    /// # Errors
    ///
    /// As [`Self::evaluate_expression`], plus `TypeMismatch` for a numeric
    /// result.
    pub fn evaluate_expression_as_string(
        &mut self,
        allow_one_trailing_close: bool,
    ) -> EvalResult<AsmString> {
        match self.evaluate_expression(allow_one_trailing_close)? {
            Value::String(s) => Ok(s),
            Value::Number(_) => Err(SyntaxError::new(ErrorKind::TypeMismatch, self.column)),
        }
    }

    // -----------------------------------------------------------------------
    // The line driver contract
    // -----------------------------------------------------------------------

    /// Skip insignificant whitespace and report whether a significant
    /// character remains in this sub-statement. End of line and `;`/`\`
    /// comments always end it; `:` separators and argument commas end it
    /// only at the top level of an expression.
    pub fn advance_and_check_end_of_sub_statement(&mut self, top_level: bool) -> bool {
        while let Some(c) = self.peek() {
            match c {
                b' ' | b'\t' => self.column += 1,
                b';' | b'\\' => return false,
                b':' | b',' if top_level => return false,
                _ => return true,
            }
        }
        false
    }

    /// Move the cursor past the remainder of an expression without
    /// evaluating it, honouring string and character literals and bracket
    /// nesting. Used on the first pass when a forward reference makes the
    /// expression unresolvable.
    pub fn skip_expression(&mut self, mut bracket_count: i32, allow_one_trailing_close: bool) {
        while self.advance_and_check_end_of_sub_statement(bracket_count == 0) {
            match self.peek() {
                Some(b'"') => self.skip_string_literal(),
                Some(b'\'') => {
                    // Character literal, when well formed.
                    if self.line.len() - self.column >= 3 && self.line[self.column + 2] == b'\'' {
                        self.column += 3;
                    } else {
                        self.column += 1;
                    }
                }
                Some(b'(' | b'[') => {
                    bracket_count += 1;
                    self.column += 1;
                }
                Some(b')' | b']') => {
                    if bracket_count == 0 && allow_one_trailing_close {
                        // The caller will consume the close bracket.
                        break;
                    }
                    bracket_count -= 1;
                    self.column += 1;
                }
                _ => self.column += 1,
            }
        }
    }

    // -----------------------------------------------------------------------
    // Values
    // -----------------------------------------------------------------------

    /// Read one atomic value at the cursor: a numeric literal, the program
    /// counter (`*`), a character literal, a string literal, or a symbol.
    fn get_value(&mut self) -> EvalResult<Value> {
        if let Some(number) = scanner::parse_numeric(self.line, &mut self.column) {
            return Ok(Value::Number(number));
        }

        match self.peek() {
            Some(b'*') => {
                self.column += 1;
                #[expect(
                    clippy::cast_precision_loss,
                    reason = "program counters fit well within f64's exact integer range"
                )]
                let pc = self.ctx.pc as f64;
                Ok(Value::Number(pc))
            }

            Some(b'\'') => {
                // Character literal: exactly 'C'.
                if self.line.len() - self.column < 3 || self.line[self.column + 2] != b'\'' {
                    return Err(SyntaxError::new(ErrorKind::InvalidCharacter, self.column));
                }
                let value = f64::from(self.line[self.column + 1]);
                self.column += 3;
                Ok(Value::Number(value))
            }

            Some(b'"') => self.get_string_literal(),

            Some(c) if scanner::is_symbol_start(c) => {
                let start = self.column;
                let name = scanner::scan_symbol_name(self.line, &mut self.column);
                if name == "TIME$" {
                    // TIME$ with no argument list.
                    return self.format_time(DEFAULT_TIME_FORMAT, start);
                }
                match self.ctx.symbols.lookup(name) {
                    Some(value) => Ok(value.clone()),
                    None => Err(SyntaxError::new(ErrorKind::SymbolNotDefined, start)),
                }
            }

            _ => Err(SyntaxError::new(ErrorKind::InvalidCharacter, self.column)),
        }
    }

    /// Read a string literal at the cursor. A doubled `""` inside the
    /// literal is a single quote character.
    fn get_string_literal(&mut self) -> EvalResult<Value> {
        let mut text = Vec::new();
        self.column += 1;
        let mut closed = false;
        while !closed && self.column < self.line.len() {
            let c = self.line[self.column];
            self.column += 1;
            if c == b'"' {
                if self.peek() == Some(b'"') {
                    text.push(c);
                    self.column += 1;
                } else {
                    closed = true;
                }
            } else {
                text.push(c);
            }
        }
        if !closed {
            return Err(SyntaxError::new(ErrorKind::MissingQuote, self.line.len()));
        }
        Ok(Value::String(AsmString::new(&text)))
    }

    /// Format the assembly time, mapping every failure to the positional
    /// error the caller reports.
    fn format_time(&self, format: &str, column: usize) -> EvalResult<Value> {
        self.ctx
            .format_assembly_time(format)
            .map(Value::String)
            .ok_or_else(|| SyntaxError::new(ErrorKind::TimeResultTooBig, column))
    }

    // -----------------------------------------------------------------------
    // Token matching
    // -----------------------------------------------------------------------

    /// Match an operator token at the cursor against a table,
    /// case-insensitively, first row wins. On a match the cursor moves past
    /// the token.
    fn match_table(&mut self, table: &[Operator]) -> Option<Operator> {
        let rest = &self.line[self.column.min(self.line.len())..];
        for op in table {
            let token = op.token.as_bytes();
            if rest.len() >= token.len()
                && token
                    .iter()
                    .zip(rest)
                    .all(|(&t, &c)| t == c.to_ascii_uppercase())
            {
                self.column += token.len();
                return Some(*op);
            }
        }
        None
    }

    /// Match a prefix operator. A function token spells its opening `(`;
    /// when one matches, the bracket is un-read so the next iteration
    /// processes it as the open-bracket sentinel, and `pending_comma_count`
    /// records how many argument separators that bracket must see.
    fn match_unary_operator(&mut self, pending_comma_count: &mut i8) -> Option<Operator> {
        let op = self.match_table(UNARY_OPERATORS)?;
        if op.token.len() > 1 && op.token.ends_with('(') {
            *pending_comma_count = op.parameter_count - 1;
            self.column -= 1;
            debug_assert_eq!(self.peek(), Some(b'('));
        }
        Some(op)
    }

    // -----------------------------------------------------------------------
    // Stack plumbing
    // -----------------------------------------------------------------------

    /// Byte at the cursor, if any.
    fn peek(&self) -> Option<u8> {
        self.line.get(self.column).copied()
    }

    /// Skip a string literal during [`Self::skip_expression`], honouring
    /// quote doubling. Unterminated literals run to the end of the line;
    /// the skip is best-effort.
    fn skip_string_literal(&mut self) {
        self.column += 1;
        while self.column < self.line.len() {
            let c = self.line[self.column];
            self.column += 1;
            if c == b'"' {
                if self.peek() == Some(b'"') {
                    self.column += 1;
                } else {
                    break;
                }
            }
        }
    }

    /// Pop and run stacked operators that outrank `precedence`: strictly
    /// for prefix operators (`inclusive == false`), equal-or-better for
    /// infix ones.
    fn unwind_operators(&mut self, precedence: i8, inclusive: bool) -> EvalResult<()> {
        while let Some(top) = self.operator_stack.last().copied() {
            let outranks = if inclusive {
                precedence <= top.precedence
            } else {
                precedence < top.precedence
            };
            if !outranks {
                break;
            }
            self.operator_stack.pop();
            let Some(handler) = top.handler else {
                // Sentinels have precedence −1 and never outrank a real
                // operator; reaching one here means unbalanced brackets.
                return Err(SyntaxError::new(
                    ErrorKind::MismatchedParentheses,
                    self.column,
                ));
            };
            self.apply(handler)?;
        }
        Ok(())
    }

    /// Push an operator, enforcing the stack bound.
    fn push_operator(&mut self, op: Operator) -> EvalResult<()> {
        if self.operator_stack.len() == MAX_OPERATORS {
            return Err(SyntaxError::new(
                ErrorKind::ExpressionTooComplex,
                self.column,
            ));
        }
        self.operator_stack.push(op);
        Ok(())
    }

    /// Accept a number as a 32-bit integer. The dialect accepts the whole
    /// of `[-2^31, 2^32 - 1]`; the upper half casts through unsigned and
    /// reinterprets, so `&FFFFFFFF` and −1 are the same integer.
    fn convert_double_to_int(&self, value: f64) -> EvalResult<i32> {
        if value < f64::from(i32::MIN) || value > f64::from(u32::MAX) {
            return Err(SyntaxError::new(
                ErrorKind::OutOfIntegerRange,
                self.column,
            ));
        }
        #[expect(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            reason = "range-checked above; truncation toward zero is the dialect's cast"
        )]
        let converted = if value <= f64::from(i32::MAX) {
            value as i32
        } else {
            (value as u32) as i32
        };
        Ok(converted)
    }
}
