//! Shared assembly state consumed by the expression engine.
//!
//! The engine itself is stateless between calls; everything process-wide
//! (the symbol table, the program counter, the pass flag, the assembly
//! timestamp, and the random number stream) lives in an [`AssemblyContext`]
//! that the driver passes to every evaluation. Nothing here is ambient:
//! two contexts never share state.

use std::fmt::Write as _;

use chrono::{Local, TimeZone};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

use crate::string::AsmString;
use crate::symbols::SymbolTable;

/// `strftime` results are capped the way a fixed formatting buffer caps
/// them; anything at or past this length reports an error.
const MAX_TIME_RESULT: usize = 256;

/// Process-wide assembler state, passed explicitly to each evaluation.
#[derive(Debug)]
pub struct AssemblyContext {
    /// Defined symbols.
    pub symbols: SymbolTable,
    /// The program counter: the address the emitter is assembling into.
    /// Expressions read it through `*`.
    pub pc: i64,
    /// Whether this is the first pass, where forward references are
    /// tolerated so that addresses can settle for the second pass.
    pub first_pass: bool,
    /// The timestamp baked at the start of assembly. `TIME$` formats this
    /// value, so a whole build shares one instant.
    pub assembly_time: i64,
    /// Random stream for `RND`, seeded so builds can be reproduced.
    rng: StdRng,
}

impl AssemblyContext {
    /// Create a context for a fresh assembly: empty symbol table, PC 0,
    /// first pass, clock read once, random stream seeded from the clock.
    #[must_use]
    pub fn new() -> Self {
        let assembly_time = chrono::Utc::now().timestamp();
        Self {
            symbols: SymbolTable::new(),
            pc: 0,
            first_pass: true,
            assembly_time,
            rng: StdRng::seed_from_u64(assembly_time.unsigned_abs()),
        }
    }

    /// Reseed the random stream, for reproducible builds.
    pub fn set_random_seed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    /// Next raw random value.
    pub fn next_random(&mut self) -> u32 {
        self.rng.next_u32()
    }

    /// Next random value as a real in `[0, 1)`.
    pub fn random_unit(&mut self) -> f64 {
        f64::from(self.next_random()) / (f64::from(u32::MAX) + 1.0)
    }

    /// Format the assembly timestamp with a `strftime`-style format string
    /// against local time.
    ///
    /// Returns `None` when the format is invalid, when the result is empty,
    /// or when it would not fit the result buffer; the caller maps all
    /// three to the same error.
    #[must_use]
    pub fn format_assembly_time(&self, format: &str) -> Option<AsmString> {
        let stamp = Local.timestamp_opt(self.assembly_time, 0).single()?;
        let mut out = String::new();
        write!(out, "{}", stamp.format(format)).ok()?;
        if out.is_empty() || out.len() >= MAX_TIME_RESULT {
            return None;
        }
        Some(AsmString::from(out.as_str()))
    }
}

impl Default for AssemblyContext {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
