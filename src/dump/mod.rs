//! Bulk-dump handshake: invite the peer, pick a free `dumpNN` name, create and
//! open the file, then capture a fixed number of lines into it.
//!
//! [`DumpEngine`] is the I/O-free protocol state machine. [`run_dump_attempt`]
//! drives it against a filesystem and a serial link.

mod driver;
mod engine;
mod machine;
mod names;

use core::fmt;

pub use driver::run_dump_attempt;
pub use engine::DumpEngine;
pub use machine::{DumpAction, DumpEvent};
pub use names::{dump_name, select_suffix, DumpName};

use crate::config::DUMP_LINE_COUNT;

/// Single-byte prompts and acknowledgements of the peer handshake.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DumpProtocol {
    pub invite: u8,
    pub start: u8,
    pub ready: u8,
    pub open: u8,
    pub ack: u8,
    pub line_count: u16,
}

impl Default for DumpProtocol {
    fn default() -> Self {
        Self {
            invite: b't',
            start: b's',
            ready: b'r',
            open: b'm',
            ack: b'a',
            line_count: DUMP_LINE_COUNT,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DumpAbort {
    /// Peer did not answer the invite with the start byte.
    NoStart(Option<u8>),
    NamesExhausted,
    CreateFailed,
    NotReady(Option<u8>),
    OpenFailed,
    NotOpened(Option<u8>),
    ShortWrite { line: u16 },
    /// No directory handle to run the attempt in.
    NoDirectory,
    /// The machine produced no action for an event.
    Stalled,
}

struct Reply(Option<u8>);

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(byte) if byte.is_ascii_graphic() => write!(f, "'{}'", byte as char),
            Some(byte) => write!(f, "0x{:02x}", byte),
            None => f.write_str("timeout"),
        }
    }
}

impl fmt::Display for DumpAbort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoStart(reply) => write!(f, "no_start reply={}", Reply(*reply)),
            Self::NamesExhausted => f.write_str("names_exhausted"),
            Self::CreateFailed => f.write_str("create_failed"),
            Self::NotReady(reply) => write!(f, "not_ready reply={}", Reply(*reply)),
            Self::OpenFailed => f.write_str("open_failed"),
            Self::NotOpened(reply) => write!(f, "not_opened reply={}", Reply(*reply)),
            Self::ShortWrite { line } => write!(f, "short_write line={}", line),
            Self::NoDirectory => f.write_str("no_directory"),
            Self::Stalled => f.write_str("stalled"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DumpOutcome {
    Success,
    Aborted(DumpAbort),
}

impl DumpOutcome {
    pub fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }
}

impl fmt::Display for DumpOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => f.write_str("success"),
            Self::Aborted(reason) => write!(f, "aborted reason={}", reason),
        }
    }
}

/// Result of one dump attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DumpReport {
    pub outcome: DumpOutcome,
    /// File created for this attempt, if any.
    pub name: Option<DumpName>,
    pub lines_written: u16,
    /// Line slots that timed out or arrived empty.
    pub errors: u16,
}

impl DumpReport {
    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }
}
