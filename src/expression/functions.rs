//! Operator and built-in function evaluators.
//!
//! Each evaluator pops its operands off the value stack and pushes one
//! result. Numeric semantics follow the BBC BASIC dialect: comparisons
//! yield −1/0, bitwise and shift operators work over 32-bit integers with
//! the unsigned-wraparound coercion, and the maths functions report domain
//! and range trouble as positional errors rather than leaking NaN.

use std::cmp::Ordering;
use std::f64::consts::PI;

use log::trace;

use crate::error::{ErrorKind, EvalResult, SyntaxError};
use crate::string::AsmString;
use crate::value::{format_number, Value};

use super::operators::Op;
use super::{LineParser, MAX_EVAL_DEPTH};

/// `STRING$` caps counts and lengths to keep results under 64 KiB.
const MAX_STRING_REPEAT: usize = 0x10000;

impl LineParser<'_, '_> {
    /// Run one operator against the value stack.
    pub(super) fn apply(&mut self, op: Op) -> EvalResult<()> {
        match op {
            Op::Power => self.eval_power(),
            Op::Multiply => self.eval_multiply(),
            Op::Divide => self.eval_divide(),
            Op::Div => self.eval_div(),
            Op::Mod => self.eval_mod(),
            Op::ShiftLeft => self.eval_shift_left(),
            Op::ShiftRight => self.eval_shift_right(),
            Op::Add => self.eval_add(),
            Op::Subtract => self.eval_subtract(),
            Op::Equal => self.eval_comparison(Ordering::is_eq),
            Op::NotEqual => self.eval_comparison(Ordering::is_ne),
            Op::LessOrEqual => self.eval_comparison(Ordering::is_le),
            Op::MoreOrEqual => self.eval_comparison(Ordering::is_ge),
            Op::LessThan => self.eval_comparison(Ordering::is_lt),
            Op::MoreThan => self.eval_comparison(Ordering::is_gt),
            Op::And => self.eval_and(),
            Op::Or => self.eval_or(),
            Op::Eor => self.eval_eor(),
            Op::Negate => self.eval_negate(),
            Op::Posate => self.eval_posate(),
            Op::Hi => self.eval_hi(),
            Op::Lo => self.eval_lo(),
            Op::Sin => self.eval_sin(),
            Op::Cos => self.eval_cos(),
            Op::Tan => self.eval_tan(),
            Op::ArcSin => self.eval_arc_sin(),
            Op::ArcCos => self.eval_arc_cos(),
            Op::ArcTan => self.eval_arc_tan(),
            Op::Sqrt => self.eval_sqrt(),
            Op::Rad => self.eval_rad(),
            Op::Deg => self.eval_deg(),
            Op::Int => self.eval_int(),
            Op::Abs => self.eval_abs(),
            Op::Sgn => self.eval_sgn(),
            Op::Rnd => self.eval_rnd(),
            Op::Not => self.eval_not(),
            Op::Log => self.eval_log(),
            Op::Ln => self.eval_ln(),
            Op::Exp => self.eval_exp(),
            Op::Time => self.eval_time(),
            Op::Str => self.eval_str(),
            Op::StrHex => self.eval_str_hex(),
            Op::Val => self.eval_val(),
            Op::Eval => self.eval_eval(),
            Op::Len => self.eval_len(),
            Op::Chr => self.eval_chr(),
            Op::Asc => self.eval_asc(),
            Op::Mid => self.eval_mid(),
            Op::Left => self.eval_left(),
            Op::Right => self.eval_right(),
            Op::StringRepeat => self.eval_string_repeat(),
            Op::Upper => self.eval_upper(),
            Op::Lower => self.eval_lower(),
        }
    }

    // -----------------------------------------------------------------------
    // Operand plumbing
    // -----------------------------------------------------------------------

    fn missing_value(&self) -> SyntaxError {
        SyntaxError::new(ErrorKind::MissingValue, self.column)
    }

    fn type_mismatch(&self) -> SyntaxError {
        SyntaxError::new(ErrorKind::TypeMismatch, self.column)
    }

    fn pop_value(&mut self) -> EvalResult<Value> {
        self.value_stack.pop().ok_or_else(|| self.missing_value())
    }

    /// Pop two operands of matching kind (lower stack entry first).
    fn pop_two_values(&mut self) -> EvalResult<(Value, Value)> {
        if self.value_stack.len() < 2 {
            return Err(self.missing_value());
        }
        let b = self.value_stack.pop().ok_or_else(|| self.missing_value())?;
        let a = self.value_stack.pop().ok_or_else(|| self.missing_value())?;
        if a.kind() != b.kind() {
            return Err(self.type_mismatch());
        }
        Ok((a, b))
    }

    fn pop_number(&mut self) -> EvalResult<f64> {
        let value = self.pop_value()?;
        value.as_number().ok_or_else(|| self.type_mismatch())
    }

    fn pop_string(&mut self) -> EvalResult<AsmString> {
        match self.pop_value()? {
            Value::String(s) => Ok(s),
            Value::Number(_) => Err(self.type_mismatch()),
        }
    }

    fn pop_int(&mut self) -> EvalResult<i32> {
        let value = self.pop_number()?;
        self.convert_double_to_int(value)
    }

    /// Pop two numeric operands (lower stack entry first).
    fn pop_two_numbers(&mut self) -> EvalResult<(f64, f64)> {
        if self.value_stack.len() < 2 {
            return Err(self.missing_value());
        }
        let b = self.pop_number()?;
        let a = self.pop_number()?;
        Ok((a, b))
    }

    fn pop_two_ints(&mut self) -> EvalResult<(i32, i32)> {
        let (a, b) = self.pop_two_numbers()?;
        Ok((self.convert_double_to_int(a)?, self.convert_double_to_int(b)?))
    }

    fn push_number(&mut self, value: f64) {
        self.value_stack.push(Value::Number(value));
    }

    fn push_string(&mut self, value: AsmString) {
        self.value_stack.push(Value::String(value));
    }

    // -----------------------------------------------------------------------
    // Infix arithmetic
    // -----------------------------------------------------------------------

    fn eval_add(&mut self) -> EvalResult<()> {
        match self.pop_two_values()? {
            (Value::Number(a), Value::Number(b)) => self.push_number(a + b),
            (Value::String(a), Value::String(b)) => self.push_string(a.concat(&b)),
            // pop_two_values only yields matching kinds
            _ => return Err(self.type_mismatch()),
        }
        Ok(())
    }

    fn eval_subtract(&mut self) -> EvalResult<()> {
        let (a, b) = self.pop_two_numbers()?;
        self.push_number(a - b);
        Ok(())
    }

    fn eval_multiply(&mut self) -> EvalResult<()> {
        let (a, b) = self.pop_two_numbers()?;
        self.push_number(a * b);
        Ok(())
    }

    fn eval_divide(&mut self) -> EvalResult<()> {
        let (a, b) = self.pop_two_numbers()?;
        if b == 0.0 {
            return Err(SyntaxError::new(ErrorKind::DivisionByZero, self.column - 1));
        }
        self.push_number(a / b);
        Ok(())
    }

    fn eval_power(&mut self) -> EvalResult<()> {
        let (a, b) = self.pop_two_numbers()?;
        let result = a.powf(b);
        if result.is_infinite() && a.is_finite() && b.is_finite() {
            return Err(SyntaxError::new(ErrorKind::NumberTooBig, self.column - 1));
        }
        if result.is_nan() && !a.is_nan() && !b.is_nan() {
            return Err(SyntaxError::new(
                ErrorKind::IllegalOperation,
                self.column - 1,
            ));
        }
        self.push_number(result);
        Ok(())
    }

    fn eval_div(&mut self) -> EvalResult<()> {
        let (a, b) = self.pop_two_ints()?;
        if b == 0 {
            return Err(SyntaxError::new(ErrorKind::DivisionByZero, self.column - 1));
        }
        // i32::MIN DIV -1 wraps instead of trapping.
        self.push_number(f64::from(a.wrapping_div(b)));
        Ok(())
    }

    fn eval_mod(&mut self) -> EvalResult<()> {
        let (a, b) = self.pop_two_ints()?;
        if b == 0 {
            return Err(SyntaxError::new(ErrorKind::DivisionByZero, self.column - 1));
        }
        self.push_number(f64::from(a.wrapping_rem(b)));
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Shifts and bitwise operators
    // -----------------------------------------------------------------------

    fn eval_shift_left(&mut self) -> EvalResult<()> {
        let (value, shift) = self.pop_two_ints()?;
        self.push_number(f64::from(shift_32(value, shift, false)));
        Ok(())
    }

    fn eval_shift_right(&mut self) -> EvalResult<()> {
        let (value, shift) = self.pop_two_ints()?;
        self.push_number(f64::from(shift_32(value, shift, true)));
        Ok(())
    }

    fn eval_and(&mut self) -> EvalResult<()> {
        let (a, b) = self.pop_two_ints()?;
        self.push_number(f64::from(a & b));
        Ok(())
    }

    fn eval_or(&mut self) -> EvalResult<()> {
        let (a, b) = self.pop_two_ints()?;
        self.push_number(f64::from(a | b));
        Ok(())
    }

    fn eval_eor(&mut self) -> EvalResult<()> {
        let (a, b) = self.pop_two_ints()?;
        self.push_number(f64::from(a ^ b));
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Comparisons
    // -----------------------------------------------------------------------

    /// Compare two same-kind operands and push the dialect's truth value:
    /// −1 when `predicate` accepts the ordering, 0 otherwise.
    fn eval_comparison(&mut self, predicate: fn(Ordering) -> bool) -> EvalResult<()> {
        let (a, b) = self.pop_two_values()?;
        let Some(ordering) = Value::compare(&a, &b) else {
            return Err(self.type_mismatch());
        };
        self.push_number(if predicate(ordering) { -1.0 } else { 0.0 });
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Prefix operators
    // -----------------------------------------------------------------------

    fn eval_negate(&mut self) -> EvalResult<()> {
        let value = self.pop_number()?;
        self.push_number(-value);
        Ok(())
    }

    fn eval_posate(&mut self) -> EvalResult<()> {
        if self.value_stack.is_empty() {
            return Err(self.missing_value());
        }
        // Unary plus leaves its operand alone.
        Ok(())
    }

    fn eval_not(&mut self) -> EvalResult<()> {
        let value = self.pop_int()?;
        self.push_number(f64::from(!value));
        Ok(())
    }

    fn eval_lo(&mut self) -> EvalResult<()> {
        let value = self.pop_int()?;
        self.push_number(f64::from(value & 0xFF));
        Ok(())
    }

    fn eval_hi(&mut self) -> EvalResult<()> {
        let value = self.pop_int()?;
        self.push_number(f64::from((value & 0xFFFF) >> 8));
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Maths functions
    // -----------------------------------------------------------------------

    fn eval_sin(&mut self) -> EvalResult<()> {
        let value = self.pop_number()?;
        self.push_number(value.sin());
        Ok(())
    }

    fn eval_cos(&mut self) -> EvalResult<()> {
        let value = self.pop_number()?;
        self.push_number(value.cos());
        Ok(())
    }

    fn eval_tan(&mut self) -> EvalResult<()> {
        let value = self.pop_number()?;
        self.push_number(value.tan());
        Ok(())
    }

    fn eval_arc_sin(&mut self) -> EvalResult<()> {
        let value = self.pop_number()?;
        let result = value.asin();
        if result.is_nan() && !value.is_nan() {
            return Err(SyntaxError::new(
                ErrorKind::IllegalOperation,
                self.column - 1,
            ));
        }
        self.push_number(result);
        Ok(())
    }

    fn eval_arc_cos(&mut self) -> EvalResult<()> {
        let value = self.pop_number()?;
        let result = value.acos();
        if result.is_nan() && !value.is_nan() {
            return Err(SyntaxError::new(
                ErrorKind::IllegalOperation,
                self.column - 1,
            ));
        }
        self.push_number(result);
        Ok(())
    }

    fn eval_arc_tan(&mut self) -> EvalResult<()> {
        let value = self.pop_number()?;
        self.push_number(value.atan());
        Ok(())
    }

    fn eval_sqrt(&mut self) -> EvalResult<()> {
        let value = self.pop_number()?;
        if value < 0.0 {
            return Err(SyntaxError::new(
                ErrorKind::IllegalOperation,
                self.column - 1,
            ));
        }
        self.push_number(value.sqrt());
        Ok(())
    }

    fn eval_rad(&mut self) -> EvalResult<()> {
        let value = self.pop_number()?;
        self.push_number(value * PI / 180.0);
        Ok(())
    }

    fn eval_deg(&mut self) -> EvalResult<()> {
        let value = self.pop_number()?;
        self.push_number(value * 180.0 / PI);
        Ok(())
    }

    fn eval_int(&mut self) -> EvalResult<()> {
        let value = self.pop_int()?;
        self.push_number(f64::from(value));
        Ok(())
    }

    fn eval_abs(&mut self) -> EvalResult<()> {
        let value = self.pop_number()?;
        self.push_number(value.abs());
        Ok(())
    }

    fn eval_sgn(&mut self) -> EvalResult<()> {
        let value = self.pop_number()?;
        let sign = if value < 0.0 {
            -1.0
        } else if value > 0.0 {
            1.0
        } else {
            0.0
        };
        self.push_number(sign);
        Ok(())
    }

    fn eval_rnd(&mut self) -> EvalResult<()> {
        let limit = self.pop_number()?;
        let result = if limit < 1.0 {
            return Err(SyntaxError::new(
                ErrorKind::IllegalOperation,
                self.column - 1,
            ));
        } else if limit == 1.0 {
            self.ctx.random_unit()
        } else {
            let scaled = self.ctx.random_unit() * limit;
            f64::from(self.convert_double_to_int(scaled)?)
        };
        self.push_number(result);
        Ok(())
    }

    fn eval_log(&mut self) -> EvalResult<()> {
        let value = self.pop_number()?;
        if value <= 0.0 {
            return Err(SyntaxError::new(
                ErrorKind::IllegalOperation,
                self.column - 1,
            ));
        }
        self.push_number(value.log10());
        Ok(())
    }

    fn eval_ln(&mut self) -> EvalResult<()> {
        let value = self.pop_number()?;
        if value <= 0.0 {
            return Err(SyntaxError::new(
                ErrorKind::IllegalOperation,
                self.column - 1,
            ));
        }
        self.push_number(value.ln());
        Ok(())
    }

    fn eval_exp(&mut self) -> EvalResult<()> {
        let value = self.pop_number()?;
        let result = value.exp();
        if result.is_infinite() && value.is_finite() {
            return Err(SyntaxError::new(
                ErrorKind::IllegalOperation,
                self.column - 1,
            ));
        }
        self.push_number(result);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Time and string functions
    // -----------------------------------------------------------------------

    fn eval_time(&mut self) -> EvalResult<()> {
        let format = self.pop_string()?;
        let format = String::from_utf8_lossy(format.as_bytes()).into_owned();
        let value = self.format_time(&format, self.column)?;
        self.value_stack.push(value);
        Ok(())
    }

    fn eval_str(&mut self) -> EvalResult<()> {
        let value = self.pop_number()?;
        self.push_string(AsmString::from(format_number(value).as_str()));
        Ok(())
    }

    fn eval_str_hex(&mut self) -> EvalResult<()> {
        let value = self.pop_int()?;
        #[expect(
            clippy::cast_sign_loss,
            reason = "hex output shows the unsigned 32-bit representation"
        )]
        let bits = value as u32;
        self.push_string(AsmString::from(format!("{bits:X}").as_str()));
        Ok(())
    }

    fn eval_val(&mut self) -> EvalResult<()> {
        let text = self.pop_string()?;
        self.push_number(crate::scanner::parse_leading_double(text.as_bytes()));
        Ok(())
    }

    fn eval_eval(&mut self) -> EvalResult<()> {
        let source = self.pop_string()?;
        if self.eval_depth >= MAX_EVAL_DEPTH {
            return Err(SyntaxError::new(
                ErrorKind::ExpressionTooComplex,
                self.column,
            ));
        }
        trace!("EVAL: nested expression ({} bytes)", source.len());
        let mut nested = LineParser::from_bytes(source.as_bytes(), &mut *self.ctx);
        nested.eval_depth = self.eval_depth + 1;
        let value = nested.evaluate_expression(false)?;
        self.value_stack.push(value);
        Ok(())
    }

    fn eval_len(&mut self) -> EvalResult<()> {
        let text = self.pop_string()?;
        #[expect(
            clippy::cast_precision_loss,
            reason = "line-sized string lengths fit in f64 exactly"
        )]
        let length = text.len() as f64;
        self.push_number(length);
        Ok(())
    }

    fn eval_chr(&mut self) -> EvalResult<()> {
        let code = self.pop_int()?;
        if !(0..=255).contains(&code) {
            return Err(SyntaxError::new(ErrorKind::IllegalOperation, self.column));
        }
        #[expect(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            reason = "range-checked to a byte above"
        )]
        let byte = code as u8;
        self.push_string(AsmString::new(&[byte]));
        Ok(())
    }

    fn eval_asc(&mut self) -> EvalResult<()> {
        let text = self.pop_string()?;
        if text.is_empty() {
            return Err(SyntaxError::new(ErrorKind::IllegalOperation, self.column));
        }
        self.push_number(f64::from(text.byte_at(0)));
        Ok(())
    }

    fn eval_mid(&mut self) -> EvalResult<()> {
        if self.value_stack.len() < 3 {
            return Err(self.missing_value());
        }
        let length = self.pop_number()?;
        let index = self.pop_number()?;
        let text = self.pop_string()?;
        // 1-based start index.
        let index = self.convert_double_to_int(index)?.wrapping_sub(1);
        let length = self.convert_double_to_int(length)?;
        if index < 0 || index as usize > text.len() || length < 0 {
            return Err(SyntaxError::new(ErrorKind::IllegalOperation, self.column));
        }
        #[expect(clippy::cast_sign_loss, reason = "both checked non-negative above")]
        let result = text.substring(index as usize, length as usize);
        self.push_string(result);
        Ok(())
    }

    fn eval_left(&mut self) -> EvalResult<()> {
        if self.value_stack.len() < 2 {
            return Err(self.missing_value());
        }
        let count = self.pop_number()?;
        let text = self.pop_string()?;
        let count = self.convert_double_to_int(count)?;
        if count < 0 || count as usize > text.len() {
            return Err(SyntaxError::new(ErrorKind::IllegalOperation, self.column));
        }
        #[expect(clippy::cast_sign_loss, reason = "checked non-negative above")]
        let result = text.substring(0, count as usize);
        self.push_string(result);
        Ok(())
    }

    fn eval_right(&mut self) -> EvalResult<()> {
        if self.value_stack.len() < 2 {
            return Err(self.missing_value());
        }
        let count = self.pop_number()?;
        let text = self.pop_string()?;
        let count = self.convert_double_to_int(count)?;
        if count < 0 || count as usize > text.len() {
            return Err(SyntaxError::new(ErrorKind::IllegalOperation, self.column));
        }
        #[expect(clippy::cast_sign_loss, reason = "checked non-negative above")]
        let count = count as usize;
        let result = text.substring(text.len() - count, count);
        self.push_string(result);
        Ok(())
    }

    fn eval_string_repeat(&mut self) -> EvalResult<()> {
        if self.value_stack.len() < 2 {
            return Err(self.missing_value());
        }
        let text = self.pop_string()?;
        let count = self.pop_number()?;
        let count = self.convert_double_to_int(count)?;
        if count < 0 {
            return Err(SyntaxError::new(ErrorKind::IllegalOperation, self.column));
        }
        #[expect(clippy::cast_sign_loss, reason = "checked non-negative above")]
        let count = count as usize;
        if count >= MAX_STRING_REPEAT
            || text.len() >= MAX_STRING_REPEAT
            || count * text.len() >= MAX_STRING_REPEAT
        {
            return Err(SyntaxError::new(ErrorKind::IllegalOperation, self.column));
        }
        self.push_string(text.repeat(count));
        Ok(())
    }

    fn eval_upper(&mut self) -> EvalResult<()> {
        let text = self.pop_string()?;
        self.push_string(text.upper());
        Ok(())
    }

    fn eval_lower(&mut self) -> EvalResult<()> {
        let text = self.pop_string()?;
        self.push_string(text.lower());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Shift helper
// ---------------------------------------------------------------------------

#[expect(
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    reason = "the logical shift is defined over the 32-bit pattern"
)]
fn logical_shift_left(value: i32, amount: u32) -> i32 {
    ((value as u32) << amount) as i32
}

fn arithmetic_shift_right(value: i32, amount: u32) -> i32 {
    // `>>` on i32 sign-extends.
    value >> amount
}

/// 32-bit shift with the dialect's symmetric semantics: a shift past 31
/// bits in either direction yields 0, a negative count shifts the other
/// way, left shifts are logical, and right shifts are arithmetic
/// (sign-extending).
fn shift_32(value: i32, shift: i32, rightward: bool) -> i32 {
    if shift > 31 || shift < -31 {
        return 0;
    }
    if shift == 0 {
        return value;
    }
    let rightward = if shift > 0 { rightward } else { !rightward };
    let amount = shift.unsigned_abs();
    if rightward {
        arithmetic_shift_right(value, amount)
    } else {
        logical_shift_left(value, amount)
    }
}

#[cfg(test)]
mod shift_tests {
    use super::shift_32;

    #[test]
    fn left_shift_is_logical() {
        assert_eq!(shift_32(1, 4, false), 16);
        assert_eq!(shift_32(-1, 1, false), -2);
        assert_eq!(shift_32(0x4000_0000, 1, false), i32::MIN);
    }

    #[test]
    fn right_shift_is_arithmetic() {
        assert_eq!(shift_32(16, 2, true), 4);
        assert_eq!(shift_32(-1, 1, true), -1);
        assert_eq!(shift_32(-8, 2, true), -2);
    }

    #[test]
    fn negative_counts_reverse_direction() {
        assert_eq!(shift_32(16, -2, false), 4);
        assert_eq!(shift_32(1, -4, true), 16);
        assert_eq!(shift_32(-1, -1, false), -1);
    }

    #[test]
    fn oversized_counts_clear() {
        assert_eq!(shift_32(1, 32, false), 0);
        assert_eq!(shift_32(1, -32, false), 0);
        assert_eq!(shift_32(-1, 40, true), 0);
    }

    #[test]
    fn zero_count_is_identity() {
        assert_eq!(shift_32(123, 0, false), 123);
        assert_eq!(shift_32(-123, 0, true), -123);
    }
}
