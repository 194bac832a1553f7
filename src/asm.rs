//! Assembling token lines into a memory image.
//!
//! This module covers the two assembly passes:
//! - **validating** ([`validate`]): reads the two header lines into a
//!   [`MachineConfig`], pre-scans the body for labels ([`SymbolTable`]), and
//!   resolves each body line into an unambiguous [`Stmt`],
//! - **encoding** ([`encode`]): packs each statement into a 16-bit word of a
//!   [`MemImage`] covering the full address space.
//!
//! [`assemble`] runs both. Validation stops at the first failure and returns
//! an [`AsmErr`] naming the offending line.
//!
//! ```
//! use lmcp::parse::parse_lines;
//! use lmcp::asm::assemble;
//!
//! let lines = parse_lines("EXT 0\nRET 0\nLDA X\nHLT\nX DAT 7").unwrap();
//! let image = assemble(&lines).unwrap();
//! assert_eq!(image.words[0], (1 << 13) + 2); // LDA 2
//! assert_eq!(image.words[1], 0);             // HLT
//! assert_eq!(image.words[2], 7);             // DAT 7
//! ```
//!
//! # Syntax
//!
//! Lines 0 and 1 must be `EXT (0|1|TRUE|FALSE)` and `RET (0|1|TRUE|FALSE)`.
//! Every later line is one to three terms, one of
//!
//! ```text
//! OPCODE
//! OPCODE OPERAND
//! LABEL  OPCODE
//! LABEL  OPCODE OPERAND
//! ```
//!
//! where the first term of a two-term line is an opcode if it names one in
//! the active set and a label otherwise. Body line *i* assembles into
//! address *i*; a leading label names that address. Labels resolve through a
//! pre-scan, so operands may refer forward.

use std::borrow::Cow;
use std::collections::hash_map::Entry;
use std::collections::HashMap;

use crate::ast::{MachineConfig, Opcode, OpcodeSet, Operand, Stmt, StmtKind};
use crate::parse::{Term, TokenLine};

/// Error from assembling a program.
#[derive(Debug, PartialEq, Eq)]
pub struct AsmErr {
    /// The kind of error.
    pub kind: AsmErrKind,
    /// The 0-based index of the offending line, if the error points at one.
    ///
    /// Body lines count from 0 *after* the headers, so the index of a body
    /// error equals the address the line would have assembled to.
    pub line: Option<usize>,
}
impl AsmErr {
    fn new(kind: AsmErrKind, line: usize) -> Self {
        AsmErr { kind, line: Some(line) }
    }
}
impl std::fmt::Display for AsmErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.line {
            Some(line) => write!(f, "line {line}: {}", self.kind),
            None => self.kind.fmt(f),
        }
    }
}
impl std::error::Error for AsmErr {}
impl crate::err::Error for AsmErr {
    fn line(&self) -> Option<usize> {
        self.line
    }
    fn help(&self) -> Option<Cow<str>> {
        self.kind.help()
    }
}

/// The kinds of errors assembly can raise.
#[derive(Debug, PartialEq, Eq)]
pub enum AsmErrKind {
    /// A header line is missing or malformed. Carries the expected keyword.
    InvalidHeader(&'static str),
    /// A line has fewer terms than its opcode needs.
    TooFewTerms,
    /// A line has more terms than any line shape allows.
    TooManyTerms,
    /// A term in opcode position names no opcode of the active set.
    InvalidOpcode(String),
    /// A term in label position cannot be a label.
    InvalidLabel(String),
    /// A label was declared twice. Carries the line of the first declaration.
    DuplicateLabel(String, usize),
    /// An operand is neither a numeral nor a known label.
    InvalidOperand(String),
    /// A numeric operand does not fit the operand field. Carries the field max.
    OperandTooBig(u16, u16),
    /// The body has more lines than the address space has words.
    ProgramTooLarge(usize, usize),
}
impl std::fmt::Display for AsmErrKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AsmErrKind::InvalidHeader(kw)       => write!(f, "not in format: {kw} (0|1|TRUE|FALSE)"),
            AsmErrKind::TooFewTerms             => f.write_str("too few terms"),
            AsmErrKind::TooManyTerms            => f.write_str("too many terms"),
            AsmErrKind::InvalidOpcode(t)        => write!(f, "invalid opcode {t}"),
            AsmErrKind::InvalidLabel(t)         => write!(f, "invalid label {t}"),
            AsmErrKind::DuplicateLabel(l, at)   => write!(f, "duplicate label {l}, first declared at line {at}"),
            AsmErrKind::InvalidOperand(t)       => write!(f, "invalid operand {t}"),
            AsmErrKind::OperandTooBig(n, max)   => write!(f, "operand {n} does not fit the operand field (max {max})"),
            AsmErrKind::ProgramTooLarge(n, cap) => write!(f, "program has {n} lines but memory only holds {cap}"),
        }
    }
}
impl AsmErrKind {
    fn help(&self) -> Option<Cow<str>> {
        match self {
            AsmErrKind::InvalidHeader(_)      => Some("the first two lines must declare the EXT and RET flags".into()),
            AsmErrKind::TooFewTerms           => Some("only HLT, DAT, and the extended I/O opcodes can appear without an operand".into()),
            AsmErrKind::TooManyTerms          => Some("a line is at most LABEL OPCODE OPERAND".into()),
            AsmErrKind::InvalidOpcode(_)      => Some("this term must name an opcode of the active set".into()),
            AsmErrKind::InvalidLabel(_)       => Some("a numeral can never be a label".into()),
            AsmErrKind::DuplicateLabel(..)    => Some("labels must be unique across the program".into()),
            AsmErrKind::InvalidOperand(_)     => Some("an operand is a non-negative numeral or a declared label".into()),
            AsmErrKind::OperandTooBig(..)     => Some("base mode operands go up to 8191, extended mode up to 4095".into()),
            AsmErrKind::ProgramTooLarge(..)   => Some("the body must fit the address space of the active mode".into()),
        }
    }
}

/// The symbol table of a program: every label and the address it names.
///
/// Built by a pre-scan over the whole body before any operand is validated,
/// so forward references resolve. Labels are stored uppercased and looked up
/// case-insensitively.
#[derive(Debug, PartialEq, Eq, Default)]
pub struct SymbolTable {
    label_map: HashMap<String, SymbolData>,
}
#[derive(Debug, PartialEq, Eq)]
struct SymbolData {
    addr: u16,
    src_line: usize,
}

impl SymbolTable {
    /// Scans the body lines for label declarations.
    ///
    /// A line declares a label when it has at least two terms and its first
    /// term is an identifier that names no opcode of the active set. The
    /// label's address is the line's body index.
    pub fn new(body: &[TokenLine], set: OpcodeSet) -> Result<Self, AsmErr> {
        let mut label_map: HashMap<String, SymbolData> = HashMap::new();

        for (i, line) in body.iter().enumerate() {
            if line.terms.len() < 2 { continue };
            let id = match &line.terms[0] {
                Term::Num(_) => return Err(AsmErr::new(AsmErrKind::InvalidLabel(line.terms[0].to_string()), i)),
                Term::Ident(id) => id,
            };
            if set.lookup(id).is_some() { continue };

            match label_map.entry(id.to_string().to_uppercase()) {
                Entry::Occupied(e) => {
                    let kind = AsmErrKind::DuplicateLabel(e.key().clone(), e.get().src_line);
                    return Err(AsmErr::new(kind, i));
                },
                Entry::Vacant(e) => {
                    e.insert(SymbolData { addr: i as u16, src_line: i });
                },
            }
        }

        Ok(SymbolTable { label_map })
    }

    /// Gets the address of a given label, case-insensitively.
    pub fn lookup(&self, label: &str) -> Option<u16> {
        self.label_map.get(&label.to_uppercase()).map(|sd| sd.addr)
    }

    /// Whether a given label is declared anywhere in the program.
    pub fn contains(&self, label: &str) -> bool {
        self.label_map.contains_key(&label.to_uppercase())
    }
}

/// A fully validated program, ready to encode.
#[derive(Debug)]
pub struct Program {
    /// The mode flags from the header lines.
    pub config: MachineConfig,
    /// The label table.
    pub sym: SymbolTable,
    /// The validated body lines.
    pub stmts: Vec<Stmt>,
}

/// An encoded program: one 16-bit word per address, plus the mode flags the
/// execution engine needs to decode them.
///
/// The image spans the full address space of its mode, not just the program;
/// cells past the program are zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemImage {
    /// The memory words.
    pub words: Box<[u16]>,
    /// The mode flags of the program.
    pub config: MachineConfig,
}
impl MemImage {
    /// The opcode set the image was encoded with.
    pub fn opcodes(&self) -> OpcodeSet {
        self.config.opcodes()
    }
}

fn parse_header(line: Option<&TokenLine>, keyword: &'static str, index: usize) -> Result<bool, AsmErr> {
    let err = || AsmErr::new(AsmErrKind::InvalidHeader(keyword), index);

    let Some(line) = line else { return Err(err()) };
    let [kw, value] = &line.terms[..] else { return Err(err()) };

    let Term::Ident(kw) = kw else { return Err(err()) };
    if !kw.to_string().eq_ignore_ascii_case(keyword) { return Err(err()) };

    match value {
        Term::Num(0) => Ok(false),
        Term::Num(1) => Ok(true),
        Term::Ident(id) if id.to_string().eq_ignore_ascii_case("TRUE")  => Ok(true),
        Term::Ident(id) if id.to_string().eq_ignore_ascii_case("FALSE") => Ok(false),
        _ => Err(err()),
    }
}

fn parse_operand(op: Opcode, term: &Term, set: OpcodeSet, sym: &SymbolTable) -> Result<StmtKind, AsmErrKind> {
    // DAT literals fill the whole word, so the only bound is u16 (which the
    // lexer already enforced). They never take labels.
    if op == Opcode::DAT {
        return match term {
            Term::Num(n) => Ok(StmtKind::Data(*n)),
            Term::Ident(_) => Err(AsmErrKind::InvalidOperand(term.to_string())),
        };
    }
    // The I/O opcodes ignore their operand field: numerals pass through
    // unvalidated, anything else is dropped.
    if op.ignores_operand() {
        return match term {
            Term::Num(n) => Ok(StmtKind::Instr(op, Operand::Num(*n))),
            Term::Ident(_) => Ok(StmtKind::ZeroOp(op)),
        };
    }

    match term {
        Term::Num(n) if *n <= set.max_operand() => Ok(StmtKind::Instr(op, Operand::Num(*n))),
        Term::Num(n) => Err(AsmErrKind::OperandTooBig(*n, set.max_operand())),
        Term::Ident(id) => {
            let label = id.to_string().to_uppercase();
            match sym.contains(&label) {
                true  => Ok(StmtKind::Instr(op, Operand::Label(label))),
                false => Err(AsmErrKind::InvalidOperand(id.to_string())),
            }
        },
    }
}

fn parse_zero_op(term: &Term, set: OpcodeSet) -> Result<StmtKind, AsmErrKind> {
    let Term::Ident(id) = term else { return Err(AsmErrKind::InvalidOpcode(term.to_string())) };
    let Some(op) = set.lookup(id) else { return Err(AsmErrKind::InvalidOpcode(id.to_string())) };

    match op {
        Opcode::DAT => Ok(StmtKind::Data(0)),
        op if op.zero_operand() => Ok(StmtKind::ZeroOp(op)),
        _ => Err(AsmErrKind::TooFewTerms),
    }
}

fn parse_stmt(line: &TokenLine, i: usize, set: OpcodeSet, sym: &SymbolTable) -> Result<Stmt, AsmErr> {
    let kind = match &line.terms[..] {
        [] => unreachable!("token lines are never empty"),

        // OPCODE (or a bare term that is not one)
        [t0] => parse_zero_op(t0, set),

        // OPCODE OPERAND, or LABEL OPCODE
        [t0, t1] => match t0 {
            Term::Num(_) => Err(AsmErrKind::InvalidLabel(t0.to_string())),
            Term::Ident(id) => match set.lookup(id) {
                Some(op) => parse_operand(op, t1, set, sym),
                None => parse_zero_op(t1, set),
            },
        },

        // LABEL OPCODE OPERAND
        [t0, t1, t2] => match t0 {
            Term::Num(_) => Err(AsmErrKind::InvalidLabel(t0.to_string())),
            Term::Ident(id) if set.lookup(id).is_some() => Err(AsmErrKind::TooManyTerms),
            Term::Ident(_) => match t1 {
                Term::Ident(id1) => match set.lookup(id1) {
                    Some(op) => parse_operand(op, t2, set, sym),
                    None => Err(AsmErrKind::InvalidOpcode(id1.to_string())),
                },
                Term::Num(_) => Err(AsmErrKind::InvalidOpcode(t1.to_string())),
            },
        },

        _ => Err(AsmErrKind::TooManyTerms),
    };

    match kind {
        Ok(kind) => Ok(Stmt { kind, line: i }),
        Err(kind) => Err(AsmErr::new(kind, i)),
    }
}

/// Validates a program's token lines.
///
/// This checks the headers, sizes the body against the address space, builds
/// the symbol table, and resolves each body line, stopping at the first error.
pub fn validate(lines: &[TokenLine]) -> Result<Program, AsmErr> {
    let extended   = parse_header(lines.first(), "EXT", 0)?;
    let auto_print = parse_header(lines.get(1), "RET", 1)?;
    let config = MachineConfig { extended, auto_print };
    let set = config.opcodes();

    let body = &lines[2..];
    if body.len() > set.addr_space() {
        return Err(AsmErr { kind: AsmErrKind::ProgramTooLarge(body.len(), set.addr_space()), line: None });
    }

    let sym = SymbolTable::new(body, set)?;
    let stmts = body.iter()
        .enumerate()
        .map(|(i, line)| parse_stmt(line, i, set, &sym))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Program { config, sym, stmts })
}

/// Encodes a validated program into its memory image.
pub fn encode(program: &Program) -> MemImage {
    let set = program.config.opcodes();
    let mut words = vec![0u16; set.addr_space()].into_boxed_slice();

    for stmt in &program.stmts {
        words[stmt.line] = match &stmt.kind {
            StmtKind::Data(n) => *n,
            StmtKind::ZeroOp(op) => op.code() << set.shift(),
            StmtKind::Instr(op, operand) => {
                let value = match operand {
                    Operand::Num(n) => *n,
                    Operand::Label(label) => program.sym.lookup(label)
                        .unwrap_or_else(|| unreachable!("operand labels are checked during validation")),
                };
                (op.code() << set.shift()).wrapping_add(value)
            },
        };
    }

    MemImage { words, config: program.config }
}

/// Validates and encodes a program's token lines.
pub fn assemble(lines: &[TokenLine]) -> Result<MemImage, AsmErr> {
    Ok(encode(&validate(lines)?))
}

#[cfg(test)]
mod tests {
    use crate::asm::{assemble, validate, AsmErr, AsmErrKind, MemImage};
    use crate::parse::parse_lines;

    fn asm(src: &str) -> Result<MemImage, AsmErr> {
        assemble(&parse_lines(src).unwrap())
    }

    #[test]
    fn test_headers() {
        assert!(asm("EXT 0\nRET 0").is_ok());
        assert!(asm("ext true\nret FALSE").is_ok());
        assert!(asm("Ext 1\nRet 1\nINP\nHLT").is_ok());

        let e = asm("").unwrap_err();
        assert_eq!(e, AsmErr { kind: AsmErrKind::InvalidHeader("EXT"), line: Some(0) });
        let e = asm("EXT 0").unwrap_err();
        assert_eq!(e, AsmErr { kind: AsmErrKind::InvalidHeader("RET"), line: Some(1) });
        let e = asm("RET 0\nEXT 0").unwrap_err();
        assert_eq!(e, AsmErr { kind: AsmErrKind::InvalidHeader("EXT"), line: Some(0) });
        let e = asm("EXT 2\nRET 0").unwrap_err();
        assert_eq!(e, AsmErr { kind: AsmErrKind::InvalidHeader("EXT"), line: Some(0) });
        let e = asm("EXT 0\nRET yes").unwrap_err();
        assert_eq!(e, AsmErr { kind: AsmErrKind::InvalidHeader("RET"), line: Some(1) });
        let e = asm("EXT 0 0\nRET 0").unwrap_err();
        assert_eq!(e, AsmErr { kind: AsmErrKind::InvalidHeader("EXT"), line: Some(0) });
    }

    #[test]
    fn test_base_encoding() {
        let image = asm("EXT 0\nRET 0\nLDA 3\nADD 3\nHLT\nDAT 5").unwrap();
        assert_eq!(image.words.len(), 8192);
        assert_eq!(image.words[0], (1 << 13) + 3);
        assert_eq!(image.words[1], (3 << 13) + 3);
        assert_eq!(image.words[2], 0);
        assert_eq!(image.words[3], 5);
        assert_eq!(image.words[4], 0);
    }

    #[test]
    fn test_label_resolution() {
        // Forward and backward references, case-insensitively
        let image = asm("EXT 0\nRET 0\nloop ADD five\nBRA Loop\nFIVE DAT 5").unwrap();
        assert_eq!(image.words[0], (3 << 13) + 2);
        assert_eq!(image.words[1], (5 << 13));
        assert_eq!(image.words[2], 5);
    }

    #[test]
    fn test_label_opcode_disambiguation() {
        // FOO HLT declares FOO; HLT FOO would be an operand error instead
        let program = validate(&parse_lines("EXT 0\nRET 0\nFOO HLT\nBRA FOO").unwrap()).unwrap();
        assert_eq!(program.sym.lookup("FOO"), Some(0));

        let image = asm("EXT 0\nRET 0\nFOO HLT\nBRA FOO").unwrap();
        assert_eq!(image.words[0], 0);
        assert_eq!(image.words[1], 5 << 13);

        let e = asm("EXT 0\nRET 0\nHLT FOO").unwrap_err();
        assert_eq!(e, AsmErr::new(AsmErrKind::InvalidOperand("FOO".to_string()), 0));
    }

    #[test]
    fn test_duplicate_label() {
        let e = asm("EXT 0\nRET 0\nX DAT 1\nHLT\nx DAT 2").unwrap_err();
        assert_eq!(e.kind, AsmErrKind::DuplicateLabel("X".to_string(), 0));
        assert_eq!(e.line, Some(2));
    }

    #[test]
    fn test_numeral_never_label() {
        let e = asm("EXT 0\nRET 0\n5 HLT").unwrap_err();
        assert_eq!(e.kind, AsmErrKind::InvalidLabel("5".to_string()));

        let e = asm("EXT 0\nRET 0\n12 LDA 0\nHLT").unwrap_err();
        assert_eq!(e.kind, AsmErrKind::InvalidLabel("12".to_string()));
    }

    #[test]
    fn test_operand_range() {
        assert!(asm("EXT 0\nRET 0\nLDA 8191\nHLT").is_ok());
        let e = asm("EXT 0\nRET 0\nLDA 8192\nHLT").unwrap_err();
        assert_eq!(e.kind, AsmErrKind::OperandTooBig(8192, 8191));

        assert!(asm("EXT 1\nRET 0\nLDA 4095\nHLT").is_ok());
        let e = asm("EXT 1\nRET 0\nLDA 4096\nHLT").unwrap_err();
        assert_eq!(e.kind, AsmErrKind::OperandTooBig(4096, 4095));
    }

    #[test]
    fn test_dat() {
        // The full 16-bit range, whole-word encoding
        let image = asm("EXT 0\nRET 0\nDAT 65535").unwrap();
        assert_eq!(image.words[0], 65535);

        // Bare DAT reserves a zero cell; DAT 0 aliases HLT
        let image = asm("EXT 0\nRET 0\nX DAT\nDAT 0\nHLT").unwrap();
        assert_eq!(image.words[0], 0);
        assert_eq!(image.words[1], 0);
        assert_eq!(image.words[2], 0);

        // DAT never takes a label
        let e = asm("EXT 0\nRET 0\nX DAT 1\nDAT X").unwrap_err();
        assert_eq!(e, AsmErr::new(AsmErrKind::InvalidOperand("X".to_string()), 1));
    }

    #[test]
    fn test_term_counts() {
        let e = asm("EXT 0\nRET 0\nLDA").unwrap_err();
        assert_eq!(e.kind, AsmErrKind::TooFewTerms);
        let e = asm("EXT 0\nRET 0\nX LDA").unwrap_err();
        assert_eq!(e.kind, AsmErrKind::TooFewTerms);

        // A recognized opcode cannot be a label
        let e = asm("EXT 0\nRET 0\nLDA LDA 5").unwrap_err();
        assert_eq!(e.kind, AsmErrKind::TooManyTerms);
        let e = asm("EXT 0\nRET 0\nX LDA 5 3").unwrap_err();
        assert_eq!(e.kind, AsmErrKind::TooManyTerms);
    }

    #[test]
    fn test_invalid_opcode() {
        let e = asm("EXT 0\nRET 0\nFOO").unwrap_err();
        assert_eq!(e.kind, AsmErrKind::InvalidOpcode("FOO".to_string()));
        let e = asm("EXT 0\nRET 0\nX FOO 5").unwrap_err();
        assert_eq!(e.kind, AsmErrKind::InvalidOpcode("FOO".to_string()));
        let e = asm("EXT 0\nRET 0\nX 5 5").unwrap_err();
        assert_eq!(e.kind, AsmErrKind::InvalidOpcode("5".to_string()));

        // Extended opcodes are not part of the base set
        let e = asm("EXT 0\nRET 0\nOUT 5").unwrap_err();
        assert_eq!(e.kind, AsmErrKind::InvalidOpcode("5".to_string()));
    }

    #[test]
    fn test_extended_mnemonic_as_base_label() {
        // In base mode INP is an ordinary label
        let image = asm("EXT 0\nRET 0\nINP HLT\nBRA INP").unwrap();
        assert_eq!(image.words[0], 0);
        assert_eq!(image.words[1], 5 << 13);
    }

    #[test]
    fn test_extended_io_operands() {
        // Numerals pass into the operand field, other operands are dropped
        let image = asm("EXT 1\nRET 0\nINP\nOUT 5\nOTA FOO\nHLT").unwrap();
        assert_eq!(image.words.len(), 4096);
        assert_eq!(image.words[0], 8 << 12);
        assert_eq!(image.words[1], (9 << 12) + 5);
        assert_eq!(image.words[2], 10 << 12);
    }

    #[test]
    fn test_unknown_label_operand() {
        let e = asm("EXT 0\nRET 0\nBRA NOWHERE\nHLT").unwrap_err();
        assert_eq!(e, AsmErr::new(AsmErrKind::InvalidOperand("NOWHERE".to_string()), 0));
    }

    #[test]
    fn test_program_too_large() {
        let src = format!("EXT 1\nRET 0\n{}", "HLT\n".repeat(4097));
        let e = asm(&src).unwrap_err();
        assert_eq!(e.kind, AsmErrKind::ProgramTooLarge(4097, 4096));
        assert_eq!(e.line, None);

        let src = format!("EXT 1\nRET 0\n{}", "HLT\n".repeat(4096));
        assert!(asm(&src).is_ok());
    }
}
