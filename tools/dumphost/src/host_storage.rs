//! Card emulation over a host directory.
//!
//! The card directory is the volume. A `part0` subdirectory, when present,
//! plays the first primary partition; otherwise the mount loop falls back to
//! the whole-directory (superfloppy) layout.

use std::{
    fs::{self, File, OpenOptions},
    io::{self, Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};

use sd_dumper::{
    DiskInfo, EntryInfo, FileSystem, FsError, PartitionLayout, Storage, StorageError,
    SystemControl,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HostEntry {
    path: PathBuf,
    name: String,
    size: u32,
    is_dir: bool,
}

impl HostEntry {
    fn from_path(path: PathBuf) -> Result<Self, FsError> {
        let meta = fs::metadata(&path).map_err(map_io)?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or(FsError::InvalidName)?
            .to_owned();
        Ok(Self {
            name,
            size: u32::try_from(meta.len()).unwrap_or(u32::MAX),
            is_dir: meta.is_dir(),
            path,
        })
    }
}

impl EntryInfo for HostEntry {
    fn name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> u32 {
        self.size
    }

    fn is_dir(&self) -> bool {
        self.is_dir
    }
}

/// Directory handle: a sorted listing snapshot plus a read cursor. Rewinding
/// takes a fresh snapshot so entries created meanwhile show up.
///
/// Below the volume root the listing starts with a `..` entry, as on FAT.
pub struct HostDir {
    path: PathBuf,
    parent: Option<PathBuf>,
    entries: Vec<HostEntry>,
    cursor: usize,
}

impl HostDir {
    fn open(path: PathBuf, root: &Path) -> Result<Self, FsError> {
        if !path.is_dir() {
            return Err(FsError::NotDirectory);
        }
        let parent = if path == root {
            None
        } else {
            path.parent().map(Path::to_path_buf)
        };
        let mut dir = Self {
            path,
            parent,
            entries: Vec::new(),
            cursor: 0,
        };
        dir.refresh()?;
        Ok(dir)
    }

    fn refresh(&mut self) -> Result<(), FsError> {
        let mut entries = Vec::new();
        for item in fs::read_dir(&self.path).map_err(map_io)? {
            let item = item.map_err(map_io)?;
            // Names that are not valid UTF-8 cannot be addressed from the shell.
            if let Ok(entry) = HostEntry::from_path(item.path()) {
                entries.push(entry);
            }
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        if let Some(parent) = &self.parent {
            entries.insert(
                0,
                HostEntry {
                    path: parent.clone(),
                    name: "..".to_owned(),
                    size: 0,
                    is_dir: true,
                },
            );
        }
        self.entries = entries;
        self.cursor = 0;
        Ok(())
    }
}

pub struct HostFs {
    root: PathBuf,
}

impl HostFs {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

fn map_io(err: io::Error) -> FsError {
    match err.kind() {
        io::ErrorKind::NotFound => FsError::NotFound,
        io::ErrorKind::AlreadyExists => FsError::AlreadyExists,
        io::ErrorKind::InvalidInput => FsError::InvalidName,
        _ => FsError::Io,
    }
}

fn child_path(dir: &HostDir, name: &str) -> Result<PathBuf, FsError> {
    let valid = !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0']);
    if valid {
        Ok(dir.path.join(name))
    } else {
        Err(FsError::InvalidName)
    }
}

impl FileSystem for HostFs {
    type Entry = HostEntry;
    type Dir = HostDir;
    type File = File;

    fn open_root(&mut self) -> Result<HostDir, FsError> {
        HostDir::open(self.root.clone(), &self.root)
    }

    fn open_dir(&mut self, entry: &HostEntry) -> Result<HostDir, FsError> {
        HostDir::open(entry.path.clone(), &self.root)
    }

    fn close_dir(&mut self, _dir: HostDir) {}

    fn read_dir(&mut self, dir: &mut HostDir) -> Option<HostEntry> {
        let entry = dir.entries.get(dir.cursor).cloned()?;
        dir.cursor += 1;
        Some(entry)
    }

    fn reset_dir(&mut self, dir: &mut HostDir) {
        if let Err(err) = dir.refresh() {
            log::warn!("host_fs: rescan_failed path={} err={}", dir.path.display(), err);
            dir.cursor = 0;
        }
    }

    fn create_file(&mut self, dir: &mut HostDir, name: &str) -> Result<HostEntry, FsError> {
        let path = child_path(dir, name)?;
        OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(map_io)?;
        HostEntry::from_path(path)
    }

    fn create_dir(&mut self, dir: &mut HostDir, name: &str) -> Result<HostEntry, FsError> {
        let path = child_path(dir, name)?;
        fs::create_dir(&path).map_err(map_io)?;
        HostEntry::from_path(path)
    }

    fn delete(&mut self, entry: &HostEntry) -> Result<(), FsError> {
        if entry.name == ".." {
            return Err(FsError::InvalidName);
        }
        if entry.is_dir {
            fs::remove_dir(&entry.path).map_err(map_io)
        } else {
            fs::remove_file(&entry.path).map_err(map_io)
        }
    }

    fn open_file(&mut self, entry: &HostEntry) -> Result<File, FsError> {
        if entry.is_dir {
            return Err(FsError::IsDirectory);
        }
        OpenOptions::new()
            .read(true)
            .write(true)
            .open(&entry.path)
            .map_err(map_io)
    }

    fn read_file(&mut self, file: &mut File, buf: &mut [u8]) -> Result<usize, FsError> {
        file.read(buf).map_err(map_io)
    }

    fn write_file(&mut self, file: &mut File, data: &[u8]) -> Result<usize, FsError> {
        file.write(data).map_err(map_io)
    }

    fn seek_file(&mut self, file: &mut File, offset: u32) -> Result<(), FsError> {
        let len = file.metadata().map_err(map_io)?.len();
        if u64::from(offset) > len {
            return Err(FsError::InvalidSeek);
        }
        file.seek(SeekFrom::Start(u64::from(offset)))
            .map(|_| ())
            .map_err(map_io)
    }

    fn close_file(&mut self, mut file: File) {
        if let Err(err) = file.flush() {
            log::warn!("host_fs: flush_failed err={}", err);
        }
    }

    fn free_bytes(&mut self) -> Result<u64, FsError> {
        fs2::available_space(&self.root).map_err(map_io)
    }

    fn size_bytes(&mut self) -> Result<u64, FsError> {
        fs2::total_space(&self.root).map_err(map_io)
    }
}

pub struct HostStorage {
    card: PathBuf,
}

impl HostStorage {
    pub fn new(card: impl Into<PathBuf>) -> Self {
        Self { card: card.into() }
    }
}

impl Storage for HostStorage {
    type Partition = PathBuf;
    type Fs = HostFs;

    fn init_device(&mut self) -> Result<(), StorageError> {
        if self.card.is_dir() {
            Ok(())
        } else {
            Err(StorageError::DeviceInit)
        }
    }

    fn open_partition(&mut self, layout: PartitionLayout) -> Result<PathBuf, StorageError> {
        let path = match layout {
            PartitionLayout::Primary(index) => self.card.join(format!("part{}", index)),
            PartitionLayout::Superfloppy => self.card.clone(),
        };
        if path.is_dir() {
            Ok(path)
        } else {
            Err(StorageError::NoPartition)
        }
    }

    fn close_partition(&mut self, _partition: PathBuf) {}

    fn open_filesystem(&mut self, partition: &PathBuf) -> Result<HostFs, StorageError> {
        fs::read_dir(partition).map_err(|_| StorageError::NoFilesystem)?;
        Ok(HostFs::new(partition.clone()))
    }

    fn close_filesystem(&mut self, _fs: HostFs) {}

    fn disk_info(&mut self) -> Result<DiskInfo, StorageError> {
        let capacity = fs2::total_space(&self.card).map_err(|_| StorageError::Io)?;
        let mut info = DiskInfo {
            capacity,
            ..DiskInfo::default()
        };
        let _ = info.oem.push_str("HD");
        let _ = info.product.push_str("HOSTDIR");
        Ok(info)
    }

    fn sync(&mut self) -> Result<(), StorageError> {
        Ok(())
    }
}

/// Host stand-in for the device reset: the next cycle simply starts over.
#[derive(Debug, Default)]
pub struct HostControl {
    pub resets: u32,
}

impl SystemControl for HostControl {
    fn reset(&mut self) {
        self.resets += 1;
        log::warn!("host: reset count={}", self.resets);
    }
}
