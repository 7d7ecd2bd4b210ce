//! Collaborator contracts for the card and its FAT volume.
//!
//! The block protocol, partition parsing and the FAT engine live behind these
//! traits. Handles are plain values owned by the caller; closing consumes them.

mod working_dir;

use core::fmt;

pub use working_dir::WorkingDir;

/// Entry yielded by directory enumeration.
pub trait EntryInfo {
    fn name(&self) -> &str;
    fn size(&self) -> u32;
    fn is_dir(&self) -> bool;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FsError {
    NotFound,
    AlreadyExists,
    InvalidName,
    NotDirectory,
    IsDirectory,
    InvalidSeek,
    Full,
    Io,
}

impl fmt::Display for FsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => f.write_str("entry not found"),
            Self::AlreadyExists => f.write_str("entry already exists"),
            Self::InvalidName => f.write_str("invalid entry name"),
            Self::NotDirectory => f.write_str("not a directory"),
            Self::IsDirectory => f.write_str("is a directory"),
            Self::InvalidSeek => f.write_str("seek past end of file"),
            Self::Full => f.write_str("volume full"),
            Self::Io => f.write_str("volume i/o error"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageError {
    DeviceInit,
    NoPartition,
    NoFilesystem,
    Io,
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DeviceInit => f.write_str("device init failed"),
            Self::NoPartition => f.write_str("partition not found"),
            Self::NoFilesystem => f.write_str("no filesystem on partition"),
            Self::Io => f.write_str("device i/o error"),
        }
    }
}

impl From<FsError> for StorageError {
    fn from(_: FsError) -> Self {
        Self::Io
    }
}

/// Mounted FAT volume.
pub trait FileSystem {
    type Entry: EntryInfo;
    type Dir;
    type File;

    fn open_root(&mut self) -> Result<Self::Dir, FsError>;
    fn open_dir(&mut self, entry: &Self::Entry) -> Result<Self::Dir, FsError>;
    fn close_dir(&mut self, dir: Self::Dir);
    /// Next entry of `dir`, or `None` once enumeration is exhausted. Iteration
    /// can be restarted with [`reset_dir`](FileSystem::reset_dir).
    fn read_dir(&mut self, dir: &mut Self::Dir) -> Option<Self::Entry>;
    fn reset_dir(&mut self, dir: &mut Self::Dir);

    fn create_file(&mut self, dir: &mut Self::Dir, name: &str) -> Result<Self::Entry, FsError>;
    fn create_dir(&mut self, dir: &mut Self::Dir, name: &str) -> Result<Self::Entry, FsError>;
    fn delete(&mut self, entry: &Self::Entry) -> Result<(), FsError>;

    fn open_file(&mut self, entry: &Self::Entry) -> Result<Self::File, FsError>;
    fn read_file(&mut self, file: &mut Self::File, buf: &mut [u8]) -> Result<usize, FsError>;
    /// Returns the number of bytes accepted, which may be short.
    fn write_file(&mut self, file: &mut Self::File, data: &[u8]) -> Result<usize, FsError>;
    fn seek_file(&mut self, file: &mut Self::File, offset: u32) -> Result<(), FsError>;
    fn close_file(&mut self, file: Self::File);

    fn free_bytes(&mut self) -> Result<u64, FsError>;
    fn size_bytes(&mut self) -> Result<u64, FsError>;
}

/// Scans `dir` from the start for an entry named exactly `name`. The
/// directory is rewound before and after the scan.
pub fn find_entry<F: FileSystem>(fs: &mut F, dir: &mut F::Dir, name: &str) -> Option<F::Entry> {
    fs.reset_dir(dir);
    let mut found = None;
    while let Some(entry) = fs.read_dir(dir) {
        if entry.name() == name {
            found = Some(entry);
            break;
        }
    }
    fs.reset_dir(dir);
    found
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PartitionLayout {
    /// Entry of the MBR partition table.
    Primary(u8),
    /// No partition table; the volume spans the whole device.
    Superfloppy,
}

impl fmt::Display for PartitionLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary(index) => write!(f, "primary{}", index),
            Self::Superfloppy => f.write_str("superfloppy"),
        }
    }
}

/// Card identification and capability registers.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DiskInfo {
    pub manufacturer: u8,
    pub oem: heapless::String<4>,
    pub product: heapless::String<8>,
    pub revision: u8,
    pub serial: u32,
    pub manufacturing_year: u16,
    pub manufacturing_month: u8,
    /// Bytes.
    pub capacity: u64,
    pub flag_copy: bool,
    pub flag_write_protect: bool,
    pub flag_write_protect_temp: bool,
    pub format: u8,
}

/// Removable card: device init, partition table, volume mount.
pub trait Storage {
    type Partition;
    type Fs: FileSystem;

    fn init_device(&mut self) -> Result<(), StorageError>;
    fn open_partition(&mut self, layout: PartitionLayout) -> Result<Self::Partition, StorageError>;
    fn close_partition(&mut self, partition: Self::Partition);
    fn open_filesystem(&mut self, partition: &Self::Partition) -> Result<Self::Fs, StorageError>;
    fn close_filesystem(&mut self, fs: Self::Fs);

    fn disk_info(&mut self) -> Result<DiskInfo, StorageError>;
    /// Flushes buffered writes, if the collaborator buffers at all.
    fn sync(&mut self) -> Result<(), StorageError>;
}
