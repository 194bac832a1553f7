//! Tokenizing LMC Prime assembly.
//!
//! This module holds the tokens that characterize LMC Prime assembly ([`Token`]).
//! It is used by the parser to convert source text into token lines.
//!
//! The grammar is deliberately small: a token is either a non-negative numeral
//! ([`Token::Unsigned`]) or an identifier ([`Token::Ident`]), and an identifier
//! is either a mnemonic or a label. Anything that starts with a digit is lexed
//! as a numeral and can never become a label.

use std::num::IntErrorKind;

use logos::{Lexer, Logos};

/// A unit of information in LMC Prime source code.
#[derive(Debug, Logos, PartialEq, Eq)]
#[logos(skip r"[ \t]+", error = LexErr)]
pub enum Token {
    // The numeral regex spans over tokens that are technically invalid
    // (e.g., 23trst matches even though it shouldn't).
    // This is intended. The regex collects one discernable unit
    // and validates it using the callback.

    /// A non-negative numeric value (e.g., `9`, `42`, `65535`).
    #[regex(r"\d\w*", lex_unsigned_dec)]
    Unsigned(u16),

    /// An identifier.
    ///
    /// This can refer to either:
    /// - a label (e.g., `LOOP`, `COUNT`, `FIVE`)
    /// - a mnemonic (e.g., `LDA`, `ADD`, `HLT`)
    ///
    /// This token type is case-insensitive.
    #[regex(r"[A-Za-z_]\w*", |lx| lx.slice().parse::<Ident>().expect("should be infallible"))]
    Ident(Ident),

    /// A comment, which starts with a semicolon and spans the remaining part of the line.
    #[regex(r";[^\n]*")]
    Comment,

    /// A new line.
    #[regex(r"\r?\n")]
    NewLine,
}

macro_rules! ident_enum {
    ($($mnemonic:ident),+) => {
        /// An identifier.
        ///
        /// This can refer to either:
        /// - a label (e.g., `LOOP`, `COUNT`, `FIVE`)
        /// - a mnemonic (e.g., `LDA`, `ADD`, `HLT`)
        ///
        /// Mnemonic recognition is case-insensitive. Note that the lexer does
        /// not know the active opcode set: extended mnemonics lex as their
        /// mnemonic variant even in base mode, and the validator decides
        /// whether they act as opcodes or fall back to being labels.
        #[derive(Debug, PartialEq, Eq, Clone)]
        pub enum Ident {
            $(
                #[allow(missing_docs)]
                $mnemonic
            ),+,
            #[allow(missing_docs)]
            Label(String)
        }

        impl std::str::FromStr for Ident {
            type Err = std::convert::Infallible;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match &*s.to_uppercase() {
                    $(stringify!($mnemonic) => Ok(Self::$mnemonic)),*,
                    _ => Ok(Self::Label(s.to_string()))
                }
            }
        }

        impl std::fmt::Display for Ident {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(Self::$mnemonic => f.write_str(stringify!($mnemonic))),*,
                    Self::Label(id) => f.write_str(id)
                }
            }
        }
    };
}
ident_enum! {
    HLT, DAT, LDA, STA, ADD, SUB, BRA, BRZ, BRP,
    INP, OUT, OTA, OTS, OTB, OTC
}

/// Any errors raised in attempting to tokenize an input stream.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub enum LexErr {
    /// Numeric literal cannot fit within the range of a u16.
    DoesNotFitU16,
    /// Numeric literal has invalid digits (i.e., not 0-9).
    InvalidNumeric,
    /// Int parsing failed but the reason why is unknown.
    UnknownIntErr,
    /// A symbol was used which is not allowed in LMC Prime source files.
    #[default]
    InvalidSymbol,
}
impl std::fmt::Display for LexErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LexErr::DoesNotFitU16  => f.write_str("numeric token does not fit 16-bit unsigned integer"),
            LexErr::InvalidNumeric => f.write_str("invalid numeric literal"),
            LexErr::UnknownIntErr  => f.write_str("could not parse integer"),
            LexErr::InvalidSymbol  => f.write_str("unrecognized symbol"),
        }
    }
}
impl std::error::Error for LexErr {}
impl crate::err::Error for LexErr {
    fn help(&self) -> Option<std::borrow::Cow<str>> {
        match self {
            LexErr::DoesNotFitU16  => Some(format!("the range for a 16-bit unsigned integer is [{}, {}]", u16::MIN, u16::MAX).into()),
            LexErr::InvalidNumeric => Some("a token starting with a digit must be a numeral consisting only of digits 0-9".into()),
            LexErr::UnknownIntErr  => None,
            LexErr::InvalidSymbol  => Some("this char does not occur in any token in LMC Prime source".into()),
        }
    }
}

fn lex_unsigned_dec(lx: &Lexer<'_, Token>) -> Result<u16, LexErr> {
    lx.slice().parse::<u16>()
        .map_err(|e| match e.kind() {
            IntErrorKind::InvalidDigit => LexErr::InvalidNumeric,
            IntErrorKind::PosOverflow  => LexErr::DoesNotFitU16,
            _ => LexErr::UnknownIntErr,
        })
}
