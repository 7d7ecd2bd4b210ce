//! Mount/recovery loop: device init, partition (with superfloppy fallback),
//! filesystem, root directory, one session, teardown, repeat.


use core::fmt;

use crate::{
    clock::Clock,
    config::{SessionConfig, SessionMode},
    dump::{run_dump_attempt, DumpAbort, DumpOutcome, DumpReport},
    serial::{SerialLink, SerialTx},
    shell::Shell,
    storage::{PartitionLayout, Storage, WorkingDir},
};

/// Full device reset, the only way out of an unrecoverable mount state.
pub trait SystemControl {
    fn reset(&mut self);
}

impl<R: SystemControl + ?Sized> SystemControl for &mut R {
    fn reset(&mut self) {
        (**self).reset()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MountFailure {
    DeviceInit,
    /// Neither the partition table nor the whole-device layout opened.
    Partition,
    Filesystem,
    RootDir,
}

impl MountFailure {
    /// Failures that retrying alone does not clear.
    pub fn needs_reset(self) -> bool {
        matches!(self, Self::Partition | Self::Filesystem)
    }
}

impl fmt::Display for MountFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DeviceInit => f.write_str("device_init"),
            Self::Partition => f.write_str("partition"),
            Self::Filesystem => f.write_str("filesystem"),
            Self::RootDir => f.write_str("root_dir"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionReport {
    Dump(DumpReport),
    /// Shell ended by `init`.
    Shell,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CycleOutcome {
    SessionCompleted(SessionReport),
    Retry(MountFailure),
    ResetRequested(MountFailure),
}

impl CycleOutcome {
    fn failed(failure: MountFailure) -> Self {
        if failure.needs_reset() {
            Self::ResetRequested(failure)
        } else {
            Self::Retry(failure)
        }
    }
}

pub struct MountLoop<'r, S, T, C, R, const N: usize> {
    storage: S,
    link: SerialLink<'r, T, C, N>,
    control: R,
    config: SessionConfig,
}

impl<'r, S, T, C, R, const N: usize> MountLoop<'r, S, T, C, R, N>
where
    S: Storage,
    T: SerialTx,
    C: Clock,
    R: SystemControl,
{
    pub fn new(storage: S, link: SerialLink<'r, T, C, N>, control: R, config: SessionConfig) -> Self {
        Self {
            storage,
            link,
            control,
            config,
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn control(&self) -> &R {
        &self.control
    }

    /// Mounts forever. Never returns; a reset is requested through
    /// [`SystemControl`] whenever a cycle hits an unrecoverable failure.
    pub fn run(&mut self) -> ! {
        loop {
            self.step();
        }
    }

    /// Runs `cycles` mount cycles, failed ones included, then returns.
    pub fn run_for(&mut self, cycles: u32) {
        for _ in 0..cycles {
            self.step();
        }
    }

    /// One cycle, escalating to [`SystemControl::reset`] when required.
    pub fn step(&mut self) -> CycleOutcome {
        let outcome = self.run_cycle();
        if let CycleOutcome::ResetRequested(failure) = &outcome {
            log::warn!("mount: reset reason={}", failure);
            self.control.reset();
        }
        outcome
    }

    /// Performs exactly one mount attempt and, if it mounts, one session.
    pub fn run_cycle(&mut self) -> CycleOutcome {
        if let Err(err) = self.storage.init_device() {
            log::trace!("mount: init_retry err={}", err);
            return CycleOutcome::failed(MountFailure::DeviceInit);
        }

        let partition = match self.storage.open_partition(PartitionLayout::Primary(0)) {
            Ok(partition) => partition,
            Err(primary_err) => match self.storage.open_partition(PartitionLayout::Superfloppy) {
                Ok(partition) => {
                    log::debug!("mount: superfloppy primary_err={}", primary_err);
                    partition
                }
                Err(err) => {
                    log::warn!("mount: partition_failed err={}", err);
                    return CycleOutcome::failed(MountFailure::Partition);
                }
            },
        };

        let mut fs = match self.storage.open_filesystem(&partition) {
            Ok(fs) => fs,
            Err(err) => {
                log::warn!("mount: filesystem_failed err={}", err);
                self.storage.close_partition(partition);
                return CycleOutcome::failed(MountFailure::Filesystem);
            }
        };

        let mut cwd = match WorkingDir::open_root(&mut fs) {
            Ok(cwd) => cwd,
            Err(err) => {
                log::warn!("mount: root_dir_failed err={}", err);
                self.storage.close_filesystem(fs);
                self.storage.close_partition(partition);
                return CycleOutcome::failed(MountFailure::RootDir);
            }
        };

        log::info!("mount: mounted mode={:?}", self.config.mode);
        let report = match self.config.mode {
            SessionMode::Dump => SessionReport::Dump(self.dump_session(&mut fs, &mut cwd)),
            SessionMode::Shell => {
                Shell::new(
                    &mut self.storage,
                    &mut fs,
                    &mut cwd,
                    &mut self.link,
                    self.config.shell,
                )
                .run();
                SessionReport::Shell
            }
        };

        cwd.close(&mut fs);
        self.storage.close_filesystem(fs);
        self.storage.close_partition(partition);
        CycleOutcome::SessionCompleted(report)
    }

    fn dump_session(&mut self, fs: &mut S::Fs, cwd: &mut WorkingDir<S::Fs>) -> DumpReport {
        self.link.reader.flush();
        let report = match cwd.handle(fs) {
            Ok(dir) => run_dump_attempt(fs, dir, &mut self.link, self.config.dump),
            Err(err) => {
                log::warn!("mount: dump_no_dir err={}", err);
                DumpReport {
                    outcome: DumpOutcome::Aborted(DumpAbort::NoDirectory),
                    name: None,
                    lines_written: 0,
                    errors: 0,
                }
            }
        };
        if report.is_success() {
            self.link.tx.write_str("Success\n");
        }
        let delay = self.link.timing().post_attempt_delay;
        self.link.reader.pause(delay);
        report
    }
}
