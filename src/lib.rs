//! Serial bulk-dump capture and card shell.
//!
//! A peer device pushes a bounded dump of newline-terminated lines over an
//! interrupt-fed serial link; the host stores it in a uniquely named file on a
//! mounted FAT volume. The same link carries a small operator shell for
//! inspecting the card.
//!
//! The filesystem engine, the card protocol and the byte-level serial driver
//! are collaborators behind the traits in [`storage`], [`serial`] and
//! [`mount`].

#![cfg_attr(not(any(test, feature = "std")), no_std)]

pub mod clock;
pub mod config;
pub mod dump;
pub mod mount;
pub mod serial;
pub mod shell;
pub mod storage;
#[cfg(test)]
pub(crate) mod testing;

pub use clock::Clock;
#[cfg(feature = "std")]
pub use clock::StdClock;
pub use config::{LinkTiming, SessionConfig, SessionMode, ShellConfig};
pub use dump::{
    run_dump_attempt, DumpAbort, DumpEngine, DumpName, DumpOutcome, DumpProtocol, DumpReport,
};
pub use mount::{CycleOutcome, MountFailure, MountLoop, SessionReport, SystemControl};
pub use serial::{LineReader, RxConsumer, RxProducer, RxRing, SerialLink, SerialTx};
pub use shell::{Shell, ShellCommand, ShellControl};
pub use storage::{
    DiskInfo, EntryInfo, FileSystem, FsError, PartitionLayout, Storage, StorageError, WorkingDir,
};
