//! Parsing LMC Prime source code into token lines.
//!
//! This module is used to convert source text into the token lines
//! ([`TokenLine`]) consumed by the assembler (see [`crate::asm`]).
//! A token line is the whitespace-split, comment-stripped content of one
//! source line; blank and comment-only lines vanish entirely, so the index of
//! a token line in the returned sequence is its line number everywhere else
//! in the pipeline (and, for body lines, its address).
//!
//! ```
//! use lmcp::parse::{parse_lines, Term};
//!
//! let lines = parse_lines("EXT 0\nRET 0\n\n; setup\nLDA X ; comment").unwrap();
//! assert_eq!(lines.len(), 3);
//! assert_eq!(lines[2].terms.len(), 2);
//! assert!(matches!(lines[2].terms[1], Term::Ident(_)));
//! ```

pub mod lex;

use logos::Logos;

use crate::err::LexErr;
use lex::{Ident, Token};

/// One logical line of source: its tokens, in order.
///
/// Token lines are never empty; blank and comment-only source lines
/// do not produce one.
#[derive(Debug, PartialEq, Eq)]
pub struct TokenLine {
    /// The terms of the line.
    pub terms: Vec<Term>,
}

/// A single term of a token line.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Term {
    /// A non-negative numeral. Numerals are never labels.
    Num(u16),
    /// An identifier (a mnemonic or a label).
    Ident(Ident),
}
impl std::fmt::Display for Term {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Term::Num(n)    => n.fmt(f),
            Term::Ident(id) => id.fmt(f),
        }
    }
}

/// An error raised while tokenizing, tagged with the line it occurred on.
///
/// The line index uses the same gap-free numbering as the resulting token
/// lines: blank and comment-only lines do not count.
#[derive(Debug, PartialEq, Eq)]
pub struct ParseErr {
    /// The lexing failure.
    pub kind: LexErr,
    /// The 0-based index of the offending line.
    pub line: usize,
}
impl std::fmt::Display for ParseErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}: {}", self.line, self.kind)
    }
}
impl std::error::Error for ParseErr {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.kind)
    }
}
impl crate::err::Error for ParseErr {
    fn line(&self) -> Option<usize> {
        Some(self.line)
    }
    fn help(&self) -> Option<std::borrow::Cow<str>> {
        crate::err::Error::help(&self.kind)
    }
}

/// Tokenizes source text into a sequence of token lines.
///
/// Comments (from `;` to the end of the line) are stripped, and lines with
/// nothing left after stripping are dropped.
pub fn parse_lines(src: &str) -> Result<Vec<TokenLine>, ParseErr> {
    let mut lines = vec![];
    let mut terms = vec![];

    for m_token in Token::lexer(src) {
        match m_token {
            Ok(Token::Unsigned(n)) => terms.push(Term::Num(n)),
            Ok(Token::Ident(id))   => terms.push(Term::Ident(id)),
            Ok(Token::Comment)     => {},
            Ok(Token::NewLine) => {
                if !terms.is_empty() {
                    lines.push(TokenLine { terms: std::mem::take(&mut terms) });
                }
            },
            Err(kind) => return Err(ParseErr { kind, line: lines.len() }),
        }
    }
    if !terms.is_empty() {
        lines.push(TokenLine { terms });
    }

    Ok(lines)
}

#[cfg(test)]
mod tests {
    use crate::err::LexErr;
    use crate::parse::lex::Ident;
    use crate::parse::{parse_lines, Term};

    fn ident(s: &str) -> Term {
        Term::Ident(s.parse().unwrap())
    }

    #[test]
    fn test_lines_split() {
        let lines = parse_lines("EXT 0\nRET 1\nLDA X\nX DAT 5").unwrap();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0].terms, vec![ident("EXT"), Term::Num(0)]);
        assert_eq!(lines[2].terms, vec![Term::Ident(Ident::LDA), ident("X")]);
        assert_eq!(lines[3].terms, vec![ident("X"), Term::Ident(Ident::DAT), Term::Num(5)]);
    }

    #[test]
    fn test_gaps_removed() {
        let lines = parse_lines("EXT 0\n\n; banner comment\nRET 0\n   \nHLT\n").unwrap();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[2].terms, vec![Term::Ident(Ident::HLT)]);
    }

    #[test]
    fn test_trailing_comment() {
        let lines = parse_lines("ADD five ; five is below").unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].terms, vec![Term::Ident(Ident::ADD), ident("five")]);
    }

    #[test]
    fn test_lex_error_line() {
        // Errors carry the gap-free line index
        let e = parse_lines("EXT 0\n; gap\nRET 0\nLDA 65536").unwrap_err();
        assert_eq!(e.kind, LexErr::DoesNotFitU16);
        assert_eq!(e.line, 2);
    }

    #[test]
    fn test_empty_source() {
        assert_eq!(parse_lines("").unwrap(), vec![]);
        assert_eq!(parse_lines("\n\n; nothing\n").unwrap(), vec![]);
    }
}
