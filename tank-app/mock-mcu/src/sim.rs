//! Simulated board peripherals: logging output pins and a stdio serial link.

use std::collections::VecDeque;
use std::convert::Infallible;
use std::io::{self, BufRead};
use std::sync::mpsc;

use embassy_time::Timer;
use embedded_hal::digital::{ErrorType as PinErrorType, OutputPin};
use embedded_io_async::{ErrorKind, ErrorType, Read, ReadReady, Write};
use tracing::{error, trace};

/// Output pin that only records its level and traces edges.
pub struct SimPin {
    label: &'static str,
    high: bool,
}

impl SimPin {
    pub fn new(label: &'static str) -> Self {
        Self { label, high: false }
    }

    fn drive(
        &mut self,
        high: bool,
    ) {
        if self.high != high {
            trace!(pin = self.label, high, "edge");
        }
        self.high = high;
    }
}

impl PinErrorType for SimPin {
    type Error = Infallible;
}

impl OutputPin for SimPin {
    fn set_low(&mut self) -> Result<(), Infallible> {
        self.drive(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.drive(true);
        Ok(())
    }
}

/// Stdout failure surfaced through the serial link.
#[derive(Debug)]
pub struct LinkError(io::ErrorKind);

impl embedded_io_async::Error for LinkError {
    fn kind(&self) -> ErrorKind {
        match self.0 {
            io::ErrorKind::BrokenPipe => ErrorKind::BrokenPipe,
            io::ErrorKind::Interrupted => ErrorKind::Interrupted,
            _ => ErrorKind::Other,
        }
    }
}

impl From<io::Error> for LinkError {
    fn from(e: io::Error) -> Self {
        LinkError(e.kind())
    }
}

/// Serial link backed by the process' stdin and stdout.
///
/// Stdin is read on a helper thread, playing the part of the UART receiver;
/// the drive loop only ever polls the bytes it has already delivered.
pub struct StdioSerial {
    rx: mpsc::Receiver<Vec<u8>>,
    pending: VecDeque<u8>,
}

impl StdioSerial {
    pub fn open() -> Self {
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            let stdin = io::stdin();
            let mut line = String::new();
            loop {
                line.clear();
                match stdin.lock().read_line(&mut line) {
                    Ok(0) => break,
                    Ok(_) => {
                        if tx.send(line.as_bytes().to_vec()).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        error!("stdin read failed: {e}");
                        break;
                    }
                }
            }
        });
        Self {
            rx,
            pending: VecDeque::new(),
        }
    }

    fn fill(&mut self) {
        while let Ok(chunk) = self.rx.try_recv() {
            self.pending.extend(chunk);
        }
    }
}

impl ErrorType for StdioSerial {
    type Error = LinkError;
}

impl ReadReady for StdioSerial {
    fn read_ready(&mut self) -> Result<bool, LinkError> {
        self.fill();
        Ok(!self.pending.is_empty())
    }
}

impl Read for StdioSerial {
    async fn read(
        &mut self,
        buf: &mut [u8],
    ) -> Result<usize, LinkError> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            self.fill();
            if !self.pending.is_empty() {
                break;
            }
            Timer::after_millis(1).await;
        }
        let n = buf.len().min(self.pending.len());
        for (slot, byte) in buf.iter_mut().zip(self.pending.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl Write for StdioSerial {
    async fn write(
        &mut self,
        buf: &[u8],
    ) -> Result<usize, LinkError> {
        io::Write::write_all(&mut io::stdout().lock(), buf)?;
        Ok(buf.len())
    }

    async fn flush(&mut self) -> Result<(), LinkError> {
        io::Write::flush(&mut io::stdout().lock())?;
        Ok(())
    }
}
