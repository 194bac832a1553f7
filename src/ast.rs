//! The semantic types of LMC Prime programs.
//!
//! This module holds the types that give meaning to validated source:
//! - [`Opcode`]: an operation and its numeric code,
//! - [`OpcodeSet`]: the active opcode set and its field layout,
//! - [`MachineConfig`]: the mode flags declared by a program's headers,
//! - [`Stmt`] and [`StmtKind`]: one validated body line,
//! - [`Operand`]: a numeral or label operand.
//!
//! A machine word is 16 bits, split into an opcode field and an operand
//! field. Where the split falls depends on the mode: the base set uses a
//! 3-bit opcode field, the extended set a 4-bit one.
//!
//! ```
//! use lmcp::ast::OpcodeSet;
//!
//! let base = OpcodeSet::new(false);
//! assert_eq!(base.shift(), 13);
//! assert_eq!(base.max_operand(), 8191);
//!
//! let ext = OpcodeSet::new(true);
//! assert_eq!(ext.shift(), 12);
//! assert_eq!(ext.addr_space(), 4096);
//! ```

use crate::parse::lex::Ident;

/// An LMC Prime operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    /// Halt execution.
    HLT,
    /// Load the word at the operand address into the accumulator.
    LDA,
    /// Store the accumulator at the operand address.
    STA,
    /// Add the word at the operand address to the accumulator (wrapping).
    ADD,
    /// Subtract the word at the operand address from the accumulator (wrapping).
    SUB,
    /// Branch unconditionally to the operand address.
    BRA,
    /// Branch if the accumulator is zero.
    BRZ,
    /// Branch if the accumulator is positive (0 < acc < 2^15).
    BRP,
    /// Read an integer from input into the accumulator (extended only).
    INP,
    /// Write the accumulator as an unsigned decimal (extended only).
    OUT,
    /// Write the character with code `acc % 256` (extended only).
    OTA,
    /// Write the accumulator as a signed decimal (extended only).
    OTS,
    /// Write the accumulator as a 16-digit binary string (extended only).
    OTB,
    /// Like `OTB`, but with `0` digits rendered as spaces (extended only).
    OTC,
    /// Reserve a data word. Shares code 0 with `HLT`: a `DAT 0` cell is
    /// indistinguishable from `HLT`, and this aliasing is part of the
    /// language.
    DAT,
}

impl Opcode {
    /// The numeric code this opcode encodes to.
    pub fn code(self) -> u16 {
        match self {
            Opcode::HLT | Opcode::DAT => 0,
            Opcode::LDA => 1,
            Opcode::STA => 2,
            Opcode::ADD => 3,
            Opcode::SUB => 4,
            Opcode::BRA => 5,
            Opcode::BRZ => 6,
            Opcode::BRP => 7,
            Opcode::INP => 8,
            Opcode::OUT => 9,
            Opcode::OTA => 10,
            Opcode::OTS => 11,
            Opcode::OTB => 12,
            Opcode::OTC => 13,
        }
    }

    /// Whether this opcode only exists in the extended set.
    pub fn is_extended(self) -> bool {
        matches!(self,
            Opcode::INP | Opcode::OUT | Opcode::OTA |
            Opcode::OTS | Opcode::OTB | Opcode::OTC
        )
    }

    /// Whether this opcode's operand field is meaningless at runtime.
    ///
    /// This is exactly the extended I/O group. The validator lets any
    /// operand through for these (a numeral passes to the encoder as-is,
    /// anything else is dropped).
    pub fn ignores_operand(self) -> bool {
        self.is_extended()
    }

    /// Whether this opcode may legally appear without an operand.
    pub fn zero_operand(self) -> bool {
        matches!(self, Opcode::HLT | Opcode::DAT) || self.is_extended()
    }
}
impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Opcode::HLT => "HLT",
            Opcode::LDA => "LDA",
            Opcode::STA => "STA",
            Opcode::ADD => "ADD",
            Opcode::SUB => "SUB",
            Opcode::BRA => "BRA",
            Opcode::BRZ => "BRZ",
            Opcode::BRP => "BRP",
            Opcode::INP => "INP",
            Opcode::OUT => "OUT",
            Opcode::OTA => "OTA",
            Opcode::OTS => "OTS",
            Opcode::OTB => "OTB",
            Opcode::OTC => "OTC",
            Opcode::DAT => "DAT",
        })
    }
}

/// The active opcode set, which fixes the opcode/operand field split.
///
/// The base set holds the eight core operations in a 3-bit opcode field,
/// leaving 13 bits (addresses 0..8192) for the operand. The extended set
/// adds the six I/O operations and widens the opcode field to 4 bits,
/// shrinking the operand field to 12 bits (addresses 0..4096).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpcodeSet {
    extended: bool,
}

impl OpcodeSet {
    /// Creates the base (`extended = false`) or extended (`extended = true`) set.
    pub fn new(extended: bool) -> Self {
        OpcodeSet { extended }
    }

    /// Whether this is the extended set.
    pub fn is_extended(self) -> bool {
        self.extended
    }

    /// The bit position of the opcode field.
    pub fn shift(self) -> u32 {
        if self.extended { 12 } else { 13 }
    }

    /// The largest value the operand field can hold.
    ///
    /// This doubles as the operand bitmask and as the largest valid address.
    pub fn max_operand(self) -> u16 {
        (1 << self.shift()) - 1
    }

    /// The number of addressable words.
    pub fn addr_space(self) -> usize {
        1 << self.shift()
    }

    /// Resolves an identifier to an opcode of this set.
    ///
    /// Returns `None` for labels and for extended mnemonics when this is the
    /// base set; in base mode `INP`, `OUT`, etc. are ordinary labels.
    pub fn lookup(self, id: &Ident) -> Option<Opcode> {
        let op = match id {
            Ident::HLT => Opcode::HLT,
            Ident::DAT => Opcode::DAT,
            Ident::LDA => Opcode::LDA,
            Ident::STA => Opcode::STA,
            Ident::ADD => Opcode::ADD,
            Ident::SUB => Opcode::SUB,
            Ident::BRA => Opcode::BRA,
            Ident::BRZ => Opcode::BRZ,
            Ident::BRP => Opcode::BRP,
            Ident::INP => Opcode::INP,
            Ident::OUT => Opcode::OUT,
            Ident::OTA => Opcode::OTA,
            Ident::OTS => Opcode::OTS,
            Ident::OTB => Opcode::OTB,
            Ident::OTC => Opcode::OTC,
            Ident::Label(_) => return None,
        };

        match op.is_extended() && !self.extended {
            false => Some(op),
            true  => None,
        }
    }

    /// Resolves a numeric code to an opcode of this set.
    ///
    /// Code 0 always decodes as [`Opcode::HLT`], never [`Opcode::DAT`].
    pub fn decode(self, code: u16) -> Option<Opcode> {
        let op = match code {
            0 => Opcode::HLT,
            1 => Opcode::LDA,
            2 => Opcode::STA,
            3 => Opcode::ADD,
            4 => Opcode::SUB,
            5 => Opcode::BRA,
            6 => Opcode::BRZ,
            7 => Opcode::BRP,
            8 => Opcode::INP,
            9 => Opcode::OUT,
            10 => Opcode::OTA,
            11 => Opcode::OTS,
            12 => Opcode::OTB,
            13 => Opcode::OTC,
            _ => return None,
        };

        match op.is_extended() && !self.extended {
            false => Some(op),
            true  => None,
        }
    }
}

/// The mode flags declared by a program's two header lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MachineConfig {
    /// `EXT`: whether the extended opcode set is active.
    pub extended: bool,
    /// `RET`: whether the final accumulator is echoed to output after `HLT`.
    pub auto_print: bool,
}
impl MachineConfig {
    /// The opcode set selected by the `EXT` flag.
    pub fn opcodes(self) -> OpcodeSet {
        OpcodeSet::new(self.extended)
    }
}

/// An instruction operand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    /// A numeric operand, stored in the operand field directly.
    Num(u16),
    /// A label operand (uppercased), replaced by its address at encoding.
    Label(String),
}

/// One validated body line.
#[derive(Debug, PartialEq, Eq)]
pub struct Stmt {
    /// What this line encodes.
    pub kind: StmtKind,
    /// The line's 0-based body index, which is also its address.
    pub line: usize,
}

/// The encodable content of a body line.
///
/// By the time a [`Stmt`] exists, the label/opcode/numeral ambiguity of the
/// surface grammar has been resolved; any leading label has gone into the
/// symbol table and is not repeated here.
#[derive(Debug, PartialEq, Eq)]
pub enum StmtKind {
    /// An opcode with an explicit operand field value.
    Instr(Opcode, Operand),
    /// An opcode with no operand; the operand field encodes as 0.
    ZeroOp(Opcode),
    /// A raw data word, occupying all 16 bits.
    Data(u16),
}
