//! Expression engine for a 6502 macro assembler.
//!
//! Evaluates the arithmetic, logical, and string expressions found in
//! operand fields, directive arguments, and symbol assignments. The dialect
//! follows BBC BASIC conventions: comparisons yield −1 for true and 0 for
//! false, the integer operators work over 32-bit values with unsigned
//! wraparound (`&FFFFFFFF` is −1), and the function set runs from `SIN(`
//! to `MID$(`.
//!
//! Evaluation is direct: a shunting-yard parser executes operators against
//! a value stack as it consumes the line, with no intermediate tree. The
//! engine is two-pass aware: on the first pass an undefined symbol skips
//! the rest of the expression so the driver can keep walking the line, and
//! only the second pass treats it as fatal.
//!
//! All assembler-wide state (symbols, program counter, pass flag, clock,
//! random stream) is an explicit [`AssemblyContext`] value:
//!
//! ```
//! use asmbeeb::{AssemblyContext, LineParser, Value};
//!
//! let mut ctx = AssemblyContext::new();
//! ctx.symbols.define("screen", Value::Number(f64::from(0x3000)));
//!
//! let mut parser = LineParser::new("screen + 40 * 8", &mut ctx);
//! let value = parser.evaluate_expression(false).unwrap();
//! assert_eq!(value, Value::Number(12608.0));
//! ```

pub mod context;
pub mod error;
pub mod expression;
pub mod scanner;
pub mod string;
pub mod symbols;
pub mod value;

pub use context::AssemblyContext;
pub use error::{ErrorKind, EvalResult, SyntaxError};
pub use expression::LineParser;
pub use string::AsmString;
pub use symbols::SymbolTable;
pub use value::{Value, ValueKind};
