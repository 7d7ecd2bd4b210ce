use embassy_time::Duration;

use crate::dump::DumpProtocol;

/// Slots in the receive ring; one slot stays free, so 255 bytes are buffered.
pub const RX_RING_SLOTS: usize = 256;

// 9600 baud delivers a byte roughly every millisecond; a line stalls well
// before this expires only if the peer stopped sending.
pub const LINE_IDLE_TIMEOUT_MS: u64 = 20;
pub const SHELL_LINE_IDLE_TIMEOUT_MS: u64 = 60_000;
pub const RX_POLL_INTERVAL_US: u64 = 50;
pub const ANSWER_POLL_INTERVAL_MS: u64 = 100;
pub const ANSWER_POLL_ATTEMPTS: u16 = 100;
pub const POST_ATTEMPT_DELAY_MS: u64 = 5_100;

pub const DUMP_NAME_PREFIX: &str = "dump";
pub const DUMP_NAME_SLOTS: u8 = 100;
pub const DUMP_NAME_MAX: usize = 12;
pub const DUMP_LINE_COUNT: u16 = 512;
/// Line buffer handed to the reader during a dump: 16 data bytes plus the
/// terminator slot, leaving room for CR LF in the 20-byte record buffer.
pub const DUMP_LINE_MAX: usize = 17;
pub const DUMP_RECORD_MAX: usize = DUMP_LINE_MAX + 2;

pub const SHELL_LINE_MAX: usize = 48;
pub const SHELL_CAT_CHUNK: usize = 8;
pub const SHELL_LS_NAME_COLUMN: usize = 32;
pub const SHELL_CAPTURE_FILE: &str = "txt3";
pub const SHELL_CAPTURE_END: &[u8] = b"end of file";
pub const SHELL_CAPTURE_IDLE_LIMIT: u16 = 32;

/// Bounded-wait budgets for the serial link.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LinkTiming {
    /// Longest gap between two bytes of a dump line.
    pub line_idle: Duration,
    /// Longest gap between two bytes of an operator line.
    pub shell_idle: Duration,
    /// Sleep between ring checks while a line is pending.
    pub rx_poll: Duration,
    pub answer_poll: Duration,
    pub answer_attempts: u16,
    /// Quiet period after each dump attempt before the session ends.
    pub post_attempt_delay: Duration,
}

impl Default for LinkTiming {
    fn default() -> Self {
        Self {
            line_idle: Duration::from_millis(LINE_IDLE_TIMEOUT_MS),
            shell_idle: Duration::from_millis(SHELL_LINE_IDLE_TIMEOUT_MS),
            rx_poll: Duration::from_micros(RX_POLL_INTERVAL_US),
            answer_poll: Duration::from_millis(ANSWER_POLL_INTERVAL_MS),
            answer_attempts: ANSWER_POLL_ATTEMPTS,
            post_attempt_delay: Duration::from_millis(POST_ATTEMPT_DELAY_MS),
        }
    }
}

impl LinkTiming {
    pub fn answer_budget(&self) -> Duration {
        self.answer_poll * u32::from(self.answer_attempts)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ShellConfig {
    /// Consecutive idle reads that end a `test` capture.
    pub capture_idle_limit: u16,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            capture_idle_limit: SHELL_CAPTURE_IDLE_LIMIT,
        }
    }
}

/// What a mounted session does before handing control back to the mount loop.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SessionMode {
    /// One bulk-dump attempt per mount cycle.
    #[default]
    Dump,
    /// Interactive operator shell until `init`.
    Shell,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SessionConfig {
    pub mode: SessionMode,
    pub timing: LinkTiming,
    pub dump: DumpProtocol,
    pub shell: ShellConfig,
}
