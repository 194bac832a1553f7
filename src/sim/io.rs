//! Line-based IO devices for the simulator.
//!
//! All of the simulator's input and output (`INP`, the `OT*` family, and the
//! autoPrint echo) goes through one [`IoDevice`], so the engine itself never
//! touches stdin or stdout. The devices provided here:
//! - [`EmptyIO`]: immediately closed input, discarded output,
//! - [`BufferedIO`]: input and output queues shared behind locks, for tests
//!   and embedders,
//! - [`BiChannelIO`]: reader and writer threads bridged by channels, with a
//!   [`BiChannelIO::stdio`] constructor for interactive use.
//!
//! [`SimIO`] wraps the three for storage in the simulator.

use std::collections::VecDeque;
use std::io::{BufRead, Write};
use std::sync::{Arc, PoisonError, RwLock};

use crossbeam_channel as cbc;

/// A line-oriented IO device.
pub trait IoDevice {
    /// Reads one line of input.
    ///
    /// This blocks until a line is available and returns `None` only once the
    /// input stream is closed for good.
    fn read_line(&mut self) -> Option<String>;

    /// Writes one line of output.
    fn write_line(&mut self, line: &str);

    /// Closes the device, joining any threads it owns.
    fn close(self);
}

/// An IO device with no input and discarded output.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyIO;
impl IoDevice for EmptyIO {
    fn read_line(&mut self) -> Option<String> {
        None
    }
    fn write_line(&mut self, _line: &str) {}
    fn close(self) {}
}

/// An IO device holding its input and output in shared buffers.
///
/// Clones share the same buffers, so a test can keep one clone, hand the
/// other to the simulator, and inspect the output afterwards.
///
/// ```
/// use lmcp::sim::io::{BufferedIO, IoDevice};
///
/// let io = BufferedIO::new();
/// let mut dev = io.clone();
/// io.push_input("37");
/// assert_eq!(dev.read_line().as_deref(), Some("37"));
/// dev.write_line("74");
/// assert_eq!(io.take_output(), vec!["74".to_string()]);
/// ```
#[derive(Debug, Default, Clone)]
pub struct BufferedIO {
    input: Arc<RwLock<VecDeque<String>>>,
    output: Arc<RwLock<Vec<String>>>,
}
impl BufferedIO {
    /// Creates a new device with empty buffers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one line to the input queue.
    pub fn push_input(&self, line: &str) {
        self.input.write()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(line.to_string());
    }

    /// Takes all output written so far, clearing the buffer.
    pub fn take_output(&self) -> Vec<String> {
        std::mem::take(&mut *self.output.write().unwrap_or_else(PoisonError::into_inner))
    }
}
impl IoDevice for BufferedIO {
    fn read_line(&mut self) -> Option<String> {
        self.input.write()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
    }
    fn write_line(&mut self, line: &str) {
        self.output.write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line.to_string());
    }
    fn close(self) {}
}

/// Indicates the reader or writer function stopped and its thread should wind down.
#[derive(Debug)]
pub struct Stop;

/// An IO device that pipes lines over channels to a reader thread and a
/// writer thread.
///
/// The channels are bounded to one line, so the reader thread pulls at most
/// one line ahead of the program.
pub struct BiChannelIO {
    read_data: cbc::Receiver<String>,
    write_data: cbc::Sender<String>,
    write_handler: std::thread::JoinHandle<()>,
}
impl BiChannelIO {
    /// Creates a device from a reader and writer function.
    ///
    /// Each function runs on its own thread; the reader until it returns
    /// `Err(Stop)` or the device is dropped, the writer until the device is
    /// closed.
    pub fn new(
        mut reader: impl FnMut() -> Result<String, Stop> + Send + 'static,
        mut writer: impl FnMut(&str) -> Result<(), Stop> + Send + 'static,
    ) -> Self {
        let (read_tx, read_rx) = cbc::bounded(1);
        let (write_tx, write_rx) = cbc::bounded::<String>(1);

        std::thread::spawn(move || loop {
            let Ok(line) = reader() else { return };
            if read_tx.send(line).is_err() { return };
        });
        let write_handler = std::thread::spawn(move || {
            for line in write_rx {
                if writer(&line).is_err() { return };
            }
        });

        Self { read_data: read_rx, write_data: write_tx, write_handler }
    }

    /// Creates a device bridging this process's stdin and stdout.
    pub fn stdio() -> Self {
        Self::new(
            || {
                let mut line = String::new();
                match std::io::stdin().lock().read_line(&mut line) {
                    Ok(0) | Err(_) => Err(Stop),
                    Ok(_) => {
                        if line.ends_with('\n') { line.pop(); };
                        if line.ends_with('\r') { line.pop(); };
                        Ok(line)
                    },
                }
            },
            |line| {
                let mut stdout = std::io::stdout().lock();
                writeln!(stdout, "{line}").map_err(|_| Stop)?;
                stdout.flush().map_err(|_| Stop)
            },
        )
    }
}
impl IoDevice for BiChannelIO {
    fn read_line(&mut self) -> Option<String> {
        self.read_data.recv().ok()
    }
    fn write_line(&mut self, line: &str) {
        let _ = self.write_data.send(line.to_string());
    }
    fn close(self) {
        let BiChannelIO { read_data, write_data, write_handler } = self;
        // Dropping the channel ends tells both threads to wind down.
        // The reader thread may be mid-read, so it is not joined.
        drop(read_data);
        drop(write_data);
        let _ = write_handler.join();
    }
}

/// All the IO devices the simulator can hold.
#[derive(Default)]
pub enum SimIO {
    /// No IO.
    #[default]
    Empty,
    /// IO through shared buffers.
    Buffered(BufferedIO),
    /// IO through channel-backed threads.
    BiChannel(BiChannelIO),
}
impl std::fmt::Debug for SimIO {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SimIO::Empty        => f.write_str("Empty"),
            SimIO::Buffered(io) => io.fmt(f),
            SimIO::BiChannel(_) => f.write_str("BiChannel(..)"),
        }
    }
}
impl From<EmptyIO> for SimIO {
    fn from(_value: EmptyIO) -> Self {
        SimIO::Empty
    }
}
impl From<BufferedIO> for SimIO {
    fn from(value: BufferedIO) -> Self {
        SimIO::Buffered(value)
    }
}
impl From<BiChannelIO> for SimIO {
    fn from(value: BiChannelIO) -> Self {
        SimIO::BiChannel(value)
    }
}
impl IoDevice for SimIO {
    fn read_line(&mut self) -> Option<String> {
        match self {
            SimIO::Empty => None,
            SimIO::Buffered(io) => io.read_line(),
            SimIO::BiChannel(io) => io.read_line(),
        }
    }
    fn write_line(&mut self, line: &str) {
        match self {
            SimIO::Empty => {},
            SimIO::Buffered(io) => io.write_line(line),
            SimIO::BiChannel(io) => io.write_line(line),
        }
    }
    fn close(self) {
        match self {
            SimIO::Empty => {},
            SimIO::Buffered(io) => io.close(),
            SimIO::BiChannel(io) => io.close(),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::sim::io::{BiChannelIO, BufferedIO, IoDevice, Stop};

    #[test]
    fn test_buffered_io() {
        let io = BufferedIO::new();
        let mut dev = io.clone();

        io.push_input("first");
        io.push_input("second");
        assert_eq!(dev.read_line().as_deref(), Some("first"));
        assert_eq!(dev.read_line().as_deref(), Some("second"));
        assert_eq!(dev.read_line(), None);

        dev.write_line("a");
        dev.write_line("b");
        assert_eq!(io.take_output(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(io.take_output(), Vec::<String>::new());
    }

    #[test]
    fn test_bichannel_io() {
        let inputs = ["one", "two"];
        let mut next = 0;
        let (out_tx, out_rx) = crossbeam_channel::unbounded::<String>();

        let mut dev = BiChannelIO::new(
            move || {
                let line = inputs.get(next).ok_or(Stop)?;
                next += 1;
                Ok(line.to_string())
            },
            move |line| out_tx.send(line.to_string()).map_err(|_| Stop),
        );

        assert_eq!(dev.read_line().as_deref(), Some("one"));
        assert_eq!(dev.read_line().as_deref(), Some("two"));
        assert_eq!(dev.read_line(), None);

        dev.write_line("out!");
        dev.close();
        assert_eq!(out_rx.recv().ok().as_deref(), Some("out!"));
    }
}
