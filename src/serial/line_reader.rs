use embassy_time::Duration;

use super::RxConsumer;
use crate::{clock::Clock, config::LinkTiming};

/// Line-oriented decoder over the receive ring with bounded waits.
pub struct LineReader<'r, C, const N: usize> {
    rx: RxConsumer<'r, N>,
    clock: C,
    timing: LinkTiming,
}

impl<'r, C: Clock, const N: usize> LineReader<'r, C, N> {
    pub fn new(rx: RxConsumer<'r, N>, clock: C, timing: LinkTiming) -> Self {
        Self { rx, clock, timing }
    }

    pub fn timing(&self) -> &LinkTiming {
        &self.timing
    }

    /// Reads one line using the dump idle budget. See [`read_line_within`].
    ///
    /// [`read_line_within`]: LineReader::read_line_within
    pub fn read_line(&mut self, buf: &mut [u8]) -> usize {
        self.read_line_within(buf, self.timing.line_idle)
    }

    /// Reads bytes into `buf` until a line feed, until `buf.len() - 1` bytes
    /// are stored, or until no byte arrives for `idle`.
    ///
    /// `buf` is zeroed first, so the stored bytes are always followed by a
    /// zero. Returns the number of stored bytes; 0 means an empty line or a
    /// timeout, and a timeout discards any partial line. A result of exactly
    /// `buf.len() - 1` may be a truncated line whose tail is still queued.
    pub fn read_line_within(&mut self, buf: &mut [u8], idle: Duration) -> usize {
        buf.fill(0);
        if buf.is_empty() {
            return 0;
        }
        let limit = buf.len() - 1;
        let mut len = 0usize;
        while len < limit {
            let Some(byte) = self.next_byte(idle) else {
                return 0;
            };
            if byte == b'\n' {
                break;
            }
            buf[len] = byte;
            len += 1;
        }
        buf[len] = 0;
        len
    }

    /// Polls for a single reply byte, `answer_attempts` times at
    /// `answer_poll` spacing.
    pub fn wait_for_answer(&mut self) -> Option<u8> {
        for _ in 0..self.timing.answer_attempts {
            self.clock.pause(self.timing.answer_poll);
            if let Some(byte) = self.rx.remove() {
                return Some(byte);
            }
        }
        None
    }

    pub fn flush(&mut self) {
        self.rx.flush();
    }

    pub fn pause(&mut self, duration: Duration) {
        self.clock.pause(duration);
    }

    fn next_byte(&mut self, idle: Duration) -> Option<u8> {
        let deadline = self.clock.now() + idle;
        loop {
            if let Some(byte) = self.rx.remove() {
                return Some(byte);
            }
            if self.clock.now() >= deadline {
                return None;
            }
            self.clock.pause(self.timing.rx_poll);
        }
    }
}
