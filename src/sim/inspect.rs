//! Rendering memory for humans.
//!
//! [`MemDump`] is a read-only [`Display`] adapter over a slice of memory:
//! every address in a range is printed as its 16-bit binary word, optionally
//! split at the opcode/operand boundary of the active mode, and optionally
//! annotated with the mnemonic the word decodes to.
//!
//! ```
//! use lmcp::ast::OpcodeSet;
//! use lmcp::sim::inspect::MemDump;
//!
//! let words = [(1 << 13) + 3, 0];
//! let dump = MemDump::new(&words, OpcodeSet::new(false), 0..2).mnemonics(true);
//! let text = dump.to_string();
//! assert!(text.contains("0: 0010000000000011  LDA 3"));
//! assert!(text.contains("1: 0000000000000000  HLT 0"));
//! ```

use std::fmt::{self, Display};
use std::ops::Range;

use crate::ast::OpcodeSet;

/// A [`Display`] adapter rendering a range of memory.
#[derive(Debug, Clone)]
pub struct MemDump<'a> {
    words: &'a [u16],
    set: OpcodeSet,
    range: Range<usize>,
    fields: bool,
    mnemonics: bool,
}

impl<'a> MemDump<'a> {
    /// Creates a dump of the given address range.
    ///
    /// Addresses past the end of memory are silently skipped.
    pub fn new(words: &'a [u16], set: OpcodeSet, range: Range<usize>) -> Self {
        MemDump { words, set, range, fields: false, mnemonics: false }
    }

    /// Split each word at the opcode/operand boundary, with a column header.
    pub fn fields(mut self, enabled: bool) -> Self {
        self.fields = enabled;
        self
    }

    /// Annotate each word with the mnemonic it decodes to.
    ///
    /// Words whose opcode field decodes to nothing are annotated `DAT`, since
    /// only a data line can produce them.
    pub fn mnemonics(mut self, enabled: bool) -> Self {
        self.mnemonics = enabled;
        self
    }
}

impl Display for MemDump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shift = self.set.shift() as usize;

        if self.fields {
            writeln!(f, "ADDR  OPCODE OPERAND")?;
        }
        for addr in self.range.clone() {
            let Some(&word) = self.words.get(addr) else { break };
            let (code, oper) = (word >> shift, word & self.set.max_operand());

            match self.fields {
                false => write!(f, "{addr:>5}: {word:016b}")?,
                true  => write!(f, "{addr:>5}: {code:0cw$b} {oper:0ow$b}", cw = 16 - shift, ow = shift)?,
            }
            if self.mnemonics {
                match self.set.decode(code) {
                    Some(op) => write!(f, "  {op} {oper}")?,
                    None => write!(f, "  DAT {word}")?,
                }
            }
            writeln!(f)?;
        }

        Ok(())
    }
}
