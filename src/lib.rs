//! `lmcp` is a crate for parsing, assembling, and simulating LMC Prime
//! assembly, a 16-bit Little Man Computer dialect.
//!
//! An LMC Prime program is a plain text file. Its first two lines declare the
//! machine's mode flags, and every line after that assembles into one 16-bit
//! word of memory:
//!
//! ```text
//! EXT 1            ; extended opcode set
//! RET 0            ; no echo of the final accumulator
//! LDA X
//! ADD X
//! OUT
//! HLT
//! X DAT 21
//! ```
//!
//! The crate is split by pipeline stage:
//! - [`parse`]: turning source text into token lines,
//! - [`ast`]: the types validated programs are made of,
//! - [`asm`]: validating token lines and encoding them into a memory image,
//! - [`sim`]: running the memory image,
//! - [`err`]: the common error interface.
//!
//! # Usage
//!
//! To run a program, parse it, assemble it, and hand the image to a
//! [`Simulator`](sim::Simulator) along with an IO device:
//!
//! ```
//! use lmcp::parse::parse_lines;
//! use lmcp::asm::assemble;
//! use lmcp::sim::Simulator;
//! use lmcp::sim::io::BufferedIO;
//!
//! let src = "
//!     EXT 1
//!     RET 0
//!     LDA X
//!     ADD X
//!     OUT
//!     HLT
//!     X DAT 21
//! ";
//!
//! let lines = parse_lines(src)?;
//! let image = assemble(&lines)?;
//!
//! let io = BufferedIO::new();
//! let mut sim = Simulator::new(image, io.clone().into());
//! let acc = sim.run()?;
//!
//! assert_eq!(acc, 42);
//! assert_eq!(io.take_output(), vec!["42".to_string()]);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! Programs that take input (`INP`) read lines from the same device; see
//! [`sim::io`] for the available devices, including a stdio-backed one for
//! interactive use.

#![warn(missing_docs)]

pub mod asm;
pub mod ast;
pub mod err;
pub mod parse;
pub mod sim;
