mod line_reader;
mod ring;

use core::fmt;

pub use line_reader::LineReader;
pub use ring::{RxConsumer, RxProducer, RxRing};

use crate::{clock::Clock, config::LinkTiming};

/// Transmit side of the serial driver.
///
/// Peer prompts and operator text share this channel. `write_fmt` makes
/// `write!(tx, ...)` work on any implementor, so numeric fields are formatted
/// with the usual `{}` / `{:02x}` specifiers and streamed byte by byte.
pub trait SerialTx {
    fn write_byte(&mut self, byte: u8);

    fn write_bytes(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.write_byte(byte);
        }
    }

    fn write_str(&mut self, text: &str) {
        self.write_bytes(text.as_bytes());
    }

    fn write_fmt(&mut self, args: fmt::Arguments<'_>) {
        let _ = fmt::Write::write_fmt(&mut TxFmt(self), args);
    }
}

impl<T: SerialTx + ?Sized> SerialTx for &mut T {
    fn write_byte(&mut self, byte: u8) {
        (**self).write_byte(byte)
    }

    fn write_bytes(&mut self, bytes: &[u8]) {
        (**self).write_bytes(bytes)
    }
}

struct TxFmt<'a, T: ?Sized>(&'a mut T);

impl<T: SerialTx + ?Sized> fmt::Write for TxFmt<'_, T> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.0.write_bytes(s.as_bytes());
        Ok(())
    }
}

/// Both directions of the link as seen from the poll loop.
pub struct SerialLink<'r, T, C, const N: usize> {
    pub reader: LineReader<'r, C, N>,
    pub tx: T,
}

impl<'r, T: SerialTx, C: Clock, const N: usize> SerialLink<'r, T, C, N> {
    pub fn new(rx: RxConsumer<'r, N>, tx: T, clock: C, timing: LinkTiming) -> Self {
        Self {
            reader: LineReader::new(rx, clock, timing),
            tx,
        }
    }

    pub fn timing(&self) -> &LinkTiming {
        self.reader.timing()
    }

    /// Sends `prompt` and waits for the peer's single-byte reply.
    pub fn prompt(&mut self, prompt: u8) -> Option<u8> {
        self.tx.write_byte(prompt);
        self.reader.wait_for_answer()
    }
}
