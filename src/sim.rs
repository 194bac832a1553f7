//! Executing an assembled memory image.
//!
//! This module manages the execution of LMC Prime programs. The main
//! struct is [`Simulator`], which executes a [`MemImage`]:
//!
//! ```
//! use lmcp::parse::parse_lines;
//! use lmcp::asm::assemble;
//! use lmcp::sim::Simulator;
//!
//! let src = "
//!     EXT 0
//!     RET 0
//!     LDA X
//!     ADD X
//!     HLT
//!     X DAT 21
//! ";
//! let image = assemble(&parse_lines(src).unwrap()).unwrap();
//! let mut sim = Simulator::new(image, Default::default());
//! assert_eq!(sim.run().unwrap(), 42);
//! ```
//!
//! The machine state is an accumulator, a program counter, and the memory
//! image, all starting from a known state (zeroed registers, the encoded
//! words, zero everywhere past the program). Each step fetches the word at
//! the program counter, splits it at the mode's opcode/operand boundary,
//! advances the counter, and dispatches. All input and output goes through
//! the device in [`io`]; [`inspect`] renders memory for humans.

pub mod inspect;
pub mod io;

use std::borrow::Cow;

use crate::asm::MemImage;
use crate::ast::{MachineConfig, Opcode, OpcodeSet};
use io::{IoDevice, SimIO};

/// Errors that can occur during simulation.
#[derive(Debug, PartialEq, Eq)]
pub enum SimErr {
    /// The decoded opcode field matches no opcode of the active set.
    ///
    /// Carries the offending code. The accumulator at the point of failure is
    /// deliberately not part of the error; a run that trips this produces no
    /// result.
    IllegalOpcode(u16),
    /// The input stream closed while `INP` was waiting for a line.
    InputClosed,
}
impl std::fmt::Display for SimErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SimErr::IllegalOpcode(code) => write!(f, "illegal opcode {code}"),
            SimErr::InputClosed => f.write_str("input closed during INP"),
        }
    }
}
impl std::error::Error for SimErr {}
impl crate::err::Error for SimErr {
    fn help(&self) -> Option<Cow<str>> {
        match self {
            SimErr::IllegalOpcode(_) => Some("make sure the program counter cannot run into a DAT cell".into()),
            SimErr::InputClosed => Some("the program executed INP with no input left to read".into()),
        }
    }
}

/// Anything that can cause a step to break a running loop.
enum StepBreak {
    /// A `HLT` was executed.
    Halt,
    /// A fatal error was raised.
    Err(SimErr),
}
impl From<SimErr> for StepBreak {
    fn from(value: SimErr) -> Self {
        StepBreak::Err(value)
    }
}

/// A condition that can pause the execution of the simulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PauseCondition {
    /// Execution reached a `HLT`.
    Halt,
    /// Execution paused because the tripwire (e.g. a step limit) said so.
    Tripwire,
    /// Execution has not paused cleanly.
    #[default]
    Unsuccessful,
}

/// Executes assembled programs.
#[derive(Debug)]
pub struct Simulator {
    /// The machine's memory, one word per address of the mode's address space.
    pub mem: Box<[u16]>,

    /// The accumulator.
    pub acc: u16,

    /// The program counter, always within the address space.
    pub pc: u16,

    /// The IO device attached to this simulator.
    pub io: SimIO,

    /// The number of instructions run since the simulator was created.
    pub instructions_run: u64,

    /// The mode flags of the loaded program.
    config: MachineConfig,

    /// Why the last run loop stopped.
    pause_condition: PauseCondition,
}

impl Simulator {
    /// Creates a simulator over a memory image, with some IO device attached.
    pub fn new(image: MemImage, io: SimIO) -> Self {
        debug_assert_eq!(image.words.len(), image.opcodes().addr_space());

        Self {
            mem: image.words,
            acc: 0,
            pc: 0,
            io,
            instructions_run: 0,
            config: image.config,
            pause_condition: PauseCondition::default(),
        }
    }

    /// The opcode set the machine decodes with.
    pub fn opcodes(&self) -> OpcodeSet {
        self.config.opcodes()
    }

    /// Whether the last execution of the simulator hit a `HLT`.
    pub fn hit_halt(&self) -> bool {
        self.pause_condition == PauseCondition::Halt
    }

    /// Renders a range of memory for humans (see [`inspect::MemDump`]).
    pub fn inspect(&self, range: std::ops::Range<usize>) -> inspect::MemDump<'_> {
        inspect::MemDump::new(&self.mem, self.opcodes(), range)
    }

    fn fetch_decode(&mut self) -> (u16, u16) {
        let set = self.opcodes();
        let word = self.mem[usize::from(self.pc)];
        // pc wraps around the address space rather than running off it
        self.pc = (self.pc + 1) & set.max_operand();
        (word >> set.shift(), word & set.max_operand())
    }

    fn read_input(&mut self) -> Result<u16, SimErr> {
        loop {
            let line = self.io.read_line().ok_or(SimErr::InputClosed)?;
            match line.trim().parse::<i64>() {
                Ok(n) => return Ok(n.rem_euclid(1 << 16) as u16),
                Err(_) => self.io.write_line("enter a valid integer"),
            }
        }
    }

    /// Runs one step, returning on `HLT` or error why the loop should stop.
    fn step(&mut self) -> Result<(), StepBreak> {
        let (code, operand) = self.fetch_decode();
        let op = self.opcodes().decode(code)
            .ok_or(SimErr::IllegalOpcode(code))?;

        let addr = usize::from(operand);
        match op {
            Opcode::HLT => return Err(StepBreak::Halt),
            Opcode::LDA => self.acc = self.mem[addr],
            Opcode::STA => self.mem[addr] = self.acc,
            Opcode::ADD => self.acc = self.acc.wrapping_add(self.mem[addr]),
            Opcode::SUB => self.acc = self.acc.wrapping_sub(self.mem[addr]),
            Opcode::BRA => self.pc = operand,
            Opcode::BRZ => if self.acc == 0 { self.pc = operand },
            // positive means strictly between 0 and 2^15:
            // zero and high-bit values stay put
            Opcode::BRP => if 0 < self.acc && self.acc < 0x8000 { self.pc = operand },
            Opcode::INP => self.acc = self.read_input()?,
            Opcode::OUT => self.io.write_line(&self.acc.to_string()),
            Opcode::OTA => {
                let ch = char::from((self.acc % 256) as u8);
                self.io.write_line(&ch.to_string());
            },
            Opcode::OTS => {
                // the wrong-by-one signed read of the original machine,
                // kept exactly: 0xFFFF prints 0, 0x8000 prints -32767
                let sign = i32::from(self.acc >> 15);
                let signed = i32::from(self.acc) - sign * 0xFFFF;
                self.io.write_line(&signed.to_string());
            },
            Opcode::OTB => self.io.write_line(&format!("{:016b}", self.acc)),
            Opcode::OTC => self.io.write_line(&format!("{:016b}", self.acc).replace('0', " ")),
            Opcode::DAT => unreachable!("DAT never decodes (code 0 is HLT)"),
        }
        self.instructions_run += 1;

        Ok(())
    }

    fn halt(&mut self) {
        self.pause_condition = PauseCondition::Halt;
        if self.config.auto_print {
            self.io.write_line(&self.acc.to_string());
        }
    }

    /// Execute the program while the tripwire allows it.
    ///
    /// Stops when the tripwire returns false, a `HLT` executes (echoing the
    /// accumulator first if the program set autoPrint), or an error is
    /// raised. [`Simulator::hit_halt`] tells the first two apart.
    pub fn run_while(&mut self, mut tripwire: impl FnMut(&Simulator) -> bool) -> Result<(), SimErr> {
        self.pause_condition = PauseCondition::Unsuccessful;

        loop {
            if !tripwire(self) {
                self.pause_condition = PauseCondition::Tripwire;
                return Ok(());
            }
            match self.step() {
                Ok(()) => {},
                Err(StepBreak::Halt) => {
                    self.halt();
                    return Ok(());
                },
                Err(StepBreak::Err(e)) => return Err(e),
            }
        }
    }

    /// Execute the program to completion, returning the final accumulator.
    pub fn run(&mut self) -> Result<u16, SimErr> {
        self.run_while(|_| true)?;
        Ok(self.acc)
    }

    /// Execute the program, pausing after at most `max_steps` instructions.
    pub fn run_with_limit(&mut self, max_steps: u64) -> Result<(), SimErr> {
        let i0 = self.instructions_run;
        self.run_while(|sim| sim.instructions_run.wrapping_sub(i0) < max_steps)
    }

    /// Perform one instruction step.
    ///
    /// A `HLT` is not an error here; it sets the halt flag
    /// ([`Simulator::hit_halt`]) and performs the autoPrint echo.
    pub fn step_in(&mut self) -> Result<(), SimErr> {
        match self.step() {
            Ok(()) => Ok(()),
            Err(StepBreak::Halt) => {
                self.halt();
                Ok(())
            },
            Err(StepBreak::Err(e)) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::asm::{assemble, MemImage};
    use crate::parse::parse_lines;
    use crate::sim::io::BufferedIO;
    use crate::sim::{SimErr, Simulator};

    fn image(src: &str) -> MemImage {
        assemble(&parse_lines(src).unwrap()).unwrap()
    }
    fn sim_with_io(src: &str) -> (Simulator, BufferedIO) {
        let io = BufferedIO::new();
        (Simulator::new(image(src), io.clone().into()), io)
    }

    #[test]
    fn test_arith() {
        let src = "EXT 0\nRET 0\nLDA X\nADD X\nADD Y\nSUB X\nHLT\nX DAT 10\nY DAT 100";
        let mut sim = Simulator::new(image(src), Default::default());
        assert_eq!(sim.run().unwrap(), 110);
        assert!(sim.hit_halt());
        assert_eq!(sim.instructions_run, 4);
    }

    #[test]
    fn test_arith_wraparound() {
        // 0 - 1 == 65535, 65535 + 2 == 1
        let src = "EXT 0\nRET 0\nSUB ONE\nHLT\nONE DAT 1";
        let mut sim = Simulator::new(image(src), Default::default());
        assert_eq!(sim.run().unwrap(), 65535);

        let src = "EXT 0\nRET 0\nLDA M\nADD TWO\nHLT\nM DAT 65535\nTWO DAT 2";
        let mut sim = Simulator::new(image(src), Default::default());
        assert_eq!(sim.run().unwrap(), 1);
    }

    #[test]
    fn test_sta_lda() {
        // Stores are visible to later loads, and untouched memory reads 0
        let src = "EXT 0\nRET 0\nLDA X\nSTA 20\nLDA 21\nADD 20\nHLT\nX DAT 7";
        let mut sim = Simulator::new(image(src), Default::default());
        assert_eq!(sim.run().unwrap(), 7);
        assert_eq!(sim.mem[20], 7);
    }

    #[test]
    fn test_bra() {
        // The skipped cell would halt with acc == 0
        let src = "EXT 0\nRET 0\nBRA OVER\nHLT\nOVER LDA X\nHLT\nX DAT 3";
        let mut sim = Simulator::new(image(src), Default::default());
        assert_eq!(sim.run().unwrap(), 3);
    }

    #[test]
    fn test_brz() {
        let src = "EXT 0\nRET 0\nLDA X\nBRZ SKIP\nHLT\nSKIP LDA Y\nHLT\nX DAT 0\nY DAT 9";
        let mut sim = Simulator::new(image(src), Default::default());
        assert_eq!(sim.run().unwrap(), 9);

        let src = "EXT 0\nRET 0\nLDA Y\nBRZ SKIP\nHLT\nSKIP LDA X\nHLT\nX DAT 0\nY DAT 9";
        let mut sim = Simulator::new(image(src), Default::default());
        assert_eq!(sim.run().unwrap(), 9);
    }

    #[test]
    fn test_brp_boundaries() {
        // BRP takes the branch iff 0 < acc < 32768
        for (value, taken) in [(0u16, false), (1, true), (32767, true), (32768, false), (65535, false)] {
            let src = format!(
                "EXT 0\nRET 0\nLDA X\nBRP YES\nLDA NO_\nHLT\nYES LDA OK\nHLT\nX DAT {value}\nNO_ DAT 111\nOK DAT 222"
            );
            let mut sim = Simulator::new(image(&src), Default::default());
            let expected = if taken { 222 } else { 111 };
            assert_eq!(sim.run().unwrap(), expected, "acc = {value}");
        }
    }

    #[test]
    fn test_loop_countdown() {
        // Sums 3 + 2 + 1 by counting down through BRP
        let src = "
            EXT 0
            RET 0
            LDA N
            LOOP BRZ DONE
            ADD SUM
            STA SUM
            LDA N
            SUB ONE
            STA N
            BRA LOOP
            DONE LDA SUM
            HLT
            N DAT 3
            ONE DAT 1
            SUM DAT 0
        ";
        let mut sim = Simulator::new(image(src), Default::default());
        assert_eq!(sim.run().unwrap(), 6);
    }

    #[test]
    fn test_out_and_auto_print() {
        let (mut sim, io) = sim_with_io("EXT 1\nRET 1\nLDA X\nOUT\nHLT\nX DAT 300");
        assert_eq!(sim.run().unwrap(), 300);
        // OUT once, then the autoPrint echo
        assert_eq!(io.take_output(), vec!["300".to_string(), "300".to_string()]);

        let (mut sim, io) = sim_with_io("EXT 1\nRET 0\nLDA X\nOUT\nHLT\nX DAT 300");
        sim.run().unwrap();
        assert_eq!(io.take_output(), vec!["300".to_string()]);
    }

    #[test]
    fn test_ota() {
        // 65 -> 'A'; 321 % 256 == 65 -> 'A' as well
        let (mut sim, io) = sim_with_io("EXT 1\nRET 0\nLDA X\nOTA\nLDA Y\nOTA\nHLT\nX DAT 65\nY DAT 321");
        sim.run().unwrap();
        assert_eq!(io.take_output(), vec!["A".to_string(), "A".to_string()]);
    }

    #[test]
    fn test_ots() {
        for (value, printed) in [(5u16, "5"), (0, "0"), (32767, "32767"), (32768, "-32767"), (65535, "0")] {
            let (mut sim, io) = sim_with_io(&format!("EXT 1\nRET 0\nLDA X\nOTS\nHLT\nX DAT {value}"));
            sim.run().unwrap();
            assert_eq!(io.take_output(), vec![printed.to_string()], "acc = {value}");
        }
    }

    #[test]
    fn test_otb_otc() {
        let (mut sim, io) = sim_with_io("EXT 1\nRET 0\nLDA X\nOTB\nOTC\nHLT\nX DAT 5");
        sim.run().unwrap();
        assert_eq!(io.take_output(), vec![
            "0000000000000101".to_string(),
            "             1 1".to_string(),
        ]);
    }

    #[test]
    fn test_inp() {
        let (mut sim, io) = sim_with_io("EXT 1\nRET 0\nINP\nHLT");
        io.push_input("37");
        assert_eq!(sim.run().unwrap(), 37);

        // Negatives reduce modulo 2^16
        let (mut sim, io) = sim_with_io("EXT 1\nRET 0\nINP\nHLT");
        io.push_input("-1");
        assert_eq!(sim.run().unwrap(), 65535);
        let (mut sim, io) = sim_with_io("EXT 1\nRET 0\nINP\nHLT");
        io.push_input("65537");
        assert_eq!(sim.run().unwrap(), 1);
    }

    #[test]
    fn test_inp_retries() {
        let (mut sim, io) = sim_with_io("EXT 1\nRET 0\nINP\nHLT");
        io.push_input("twelve");
        io.push_input("12");
        assert_eq!(sim.run().unwrap(), 12);
        assert_eq!(io.take_output(), vec!["enter a valid integer".to_string()]);
    }

    #[test]
    fn test_inp_input_closed() {
        let mut sim = Simulator::new(image("EXT 1\nRET 0\nINP\nHLT"), Default::default());
        assert_eq!(sim.run(), Err(SimErr::InputClosed));
        assert!(!sim.hit_halt());
    }

    #[test]
    fn test_illegal_opcode() {
        // Every 3-bit code is legal in base mode, so only the extended set
        // can trip this: 57344 == 14 << 12, and 14 names nothing
        let src = "EXT 1\nRET 0\nDAT 57344";
        let mut sim = Simulator::new(image(src), Default::default());
        assert_eq!(sim.run(), Err(SimErr::IllegalOpcode(14)));
        assert!(!sim.hit_halt());
    }

    #[test]
    fn test_run_with_limit() {
        // BRA 0 never halts
        let src = "EXT 0\nRET 0\nBRA 0";
        let mut sim = Simulator::new(image(src), Default::default());
        sim.run_with_limit(1000).unwrap();
        assert!(!sim.hit_halt());
        assert_eq!(sim.instructions_run, 1000);
    }

    #[test]
    fn test_step_in() {
        let src = "EXT 0\nRET 0\nLDA X\nHLT\nX DAT 4";
        let mut sim = Simulator::new(image(src), Default::default());
        sim.step_in().unwrap();
        assert_eq!(sim.acc, 4);
        assert_eq!(sim.pc, 1);
        assert!(!sim.hit_halt());
        sim.step_in().unwrap();
        assert!(sim.hit_halt());
    }

    #[test]
    fn test_fresh_runs_identical() {
        // Two fresh simulators over the same image behave identically
        let src = "EXT 1\nRET 1\nLDA X\nADD X\nOUT\nHLT\nX DAT 50";
        for _ in 0..2 {
            let (mut sim, io) = sim_with_io(src);
            assert_eq!(sim.run().unwrap(), 100);
            assert_eq!(io.take_output(), vec!["100".to_string(), "100".to_string()]);
        }
    }
}
