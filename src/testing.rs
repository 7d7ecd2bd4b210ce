//! In-crate fakes: a scripted serial wire driven by simulated time and an
//! in-memory volume.

use std::{cell::RefCell, collections::VecDeque, rc::Rc};

use embassy_time::{Duration, Instant};

use crate::{
    clock::Clock,
    config::LinkTiming,
    mount::SystemControl,
    serial::{LineReader, RxConsumer, RxProducer, SerialLink, SerialTx},
    storage::{DiskInfo, EntryInfo, FileSystem, FsError, PartitionLayout, Storage, StorageError},
};

pub(crate) fn test_timing() -> LinkTiming {
    LinkTiming {
        line_idle: Duration::from_millis(20),
        shell_idle: Duration::from_millis(200),
        rx_poll: Duration::from_millis(1),
        answer_poll: Duration::from_millis(10),
        answer_attempts: 10,
        post_attempt_delay: Duration::from_millis(50),
    }
}

#[derive(Clone, Debug)]
pub(crate) enum WireItem {
    Byte(u8),
    /// Silence on the line, measured from when the gap reaches the head.
    Gap(Duration),
}

struct WireState<'r, const N: usize> {
    producer: RxProducer<'r, N>,
    now: Instant,
    pending: VecDeque<WireItem>,
    gap_until: Option<Instant>,
    sent: Vec<u8>,
    script: VecDeque<(u8, Vec<WireItem>)>,
}

impl<const N: usize> WireState<'_, N> {
    fn pump(&mut self) {
        loop {
            if let Some(until) = self.gap_until {
                if self.now < until {
                    return;
                }
                self.gap_until = None;
            }
            match self.pending.front() {
                None => return,
                Some(WireItem::Gap(gap)) => {
                    self.gap_until = Some(self.now + *gap);
                    self.pending.pop_front();
                }
                Some(WireItem::Byte(byte)) => {
                    if self.producer.is_full() {
                        return;
                    }
                    self.producer.insert(*byte);
                    self.pending.pop_front();
                }
            }
        }
    }
}

/// Peer side of a simulated link. Bytes queued with [`Wire::feed`] reach the
/// ring only while the reader waits, like bytes arriving from a UART.
#[derive(Clone)]
pub(crate) struct Wire<'r, const N: usize> {
    state: Rc<RefCell<WireState<'r, N>>>,
}

impl<'r, const N: usize> Wire<'r, N> {
    pub(crate) fn new(producer: RxProducer<'r, N>) -> Self {
        Self {
            state: Rc::new(RefCell::new(WireState {
                producer,
                now: Instant::from_ticks(0),
                pending: VecDeque::new(),
                gap_until: None,
                sent: Vec::new(),
                script: VecDeque::new(),
            })),
        }
    }

    pub(crate) fn feed(&self, bytes: &[u8]) {
        let mut state = self.state.borrow_mut();
        state
            .pending
            .extend(bytes.iter().copied().map(WireItem::Byte));
    }

    pub(crate) fn feed_line(&self, line: &str) {
        self.feed(line.as_bytes());
        self.feed(b"\n");
    }

    pub(crate) fn push(&self, item: WireItem) {
        self.state.borrow_mut().pending.push_back(item);
    }

    /// Queues `reply` once the host sends `trigger`. Triggers are matched in
    /// order; a byte that is not the next trigger is only recorded.
    pub(crate) fn on_send(&self, trigger: u8, reply: Vec<WireItem>) {
        self.state.borrow_mut().script.push_back((trigger, reply));
    }

    pub(crate) fn now(&self) -> Instant {
        self.state.borrow().now
    }

    pub(crate) fn sent(&self) -> Vec<u8> {
        self.state.borrow().sent.clone()
    }

    pub(crate) fn sent_text(&self) -> String {
        String::from_utf8_lossy(&self.state.borrow().sent).into_owned()
    }

    pub(crate) fn clear_sent(&self) {
        self.state.borrow_mut().sent.clear();
    }

    pub(crate) fn clock(&self) -> WireClock<'r, N> {
        WireClock { wire: self.clone() }
    }

    pub(crate) fn tx(&self) -> WireTx<'r, N> {
        WireTx { wire: self.clone() }
    }

    pub(crate) fn reader(
        &self,
        rx: RxConsumer<'r, N>,
        timing: LinkTiming,
    ) -> LineReader<'r, WireClock<'r, N>, N> {
        LineReader::new(rx, self.clock(), timing)
    }

    pub(crate) fn link(
        &self,
        rx: RxConsumer<'r, N>,
        timing: LinkTiming,
    ) -> SerialLink<'r, WireTx<'r, N>, WireClock<'r, N>, N> {
        SerialLink::new(rx, self.tx(), self.clock(), timing)
    }
}

pub(crate) struct WireClock<'r, const N: usize> {
    wire: Wire<'r, N>,
}

impl<const N: usize> Clock for WireClock<'_, N> {
    fn now(&self) -> Instant {
        self.wire.now()
    }

    fn pause(&mut self, duration: Duration) {
        let mut state = self.wire.state.borrow_mut();
        state.now += duration;
        state.pump();
    }
}

pub(crate) struct WireTx<'r, const N: usize> {
    wire: Wire<'r, N>,
}

impl<const N: usize> SerialTx for WireTx<'_, N> {
    fn write_byte(&mut self, byte: u8) {
        let mut state = self.wire.state.borrow_mut();
        state.sent.push(byte);
        if matches!(state.script.front(), Some((trigger, _)) if *trigger == byte) {
            if let Some((_, reply)) = state.script.pop_front() {
                state.pending.extend(reply);
            }
        }
    }
}

pub(crate) fn bytes(data: &[u8]) -> Vec<WireItem> {
    data.iter().copied().map(WireItem::Byte).collect()
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct MemEntry {
    node: usize,
    name: String,
    size: u32,
    is_dir: bool,
}

impl EntryInfo for MemEntry {
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

#[derive(Clone, Debug)]
struct MemNode {
    name: String,
    parent: usize,
    is_dir: bool,
    data: Vec<u8>,
    deleted: bool,
}

#[derive(Debug)]
pub(crate) struct MemDir {
    node: usize,
    cursor: usize,
}

#[derive(Debug)]
pub(crate) struct MemFile {
    node: usize,
    pos: usize,
}

/// In-memory volume. Node 0 is the root directory. Entries enumerate in
/// creation order.
#[derive(Clone, Debug)]
pub(crate) struct MemFs {
    nodes: Vec<MemNode>,
    pub(crate) open_dirs: usize,
    /// Most directory handles ever open at once.
    pub(crate) peak_open_dirs: usize,
    pub(crate) open_files: usize,
    pub(crate) dir_opens: usize,
    /// Directories whose `open_dir` fails with `Io`.
    pub(crate) fail_open_dir_named: Vec<String>,
    pub(crate) fail_create: bool,
    pub(crate) fail_open_file: bool,
    /// Writes accepted before every further write comes back short.
    pub(crate) short_write_after: Option<usize>,
    writes: usize,
    pub(crate) capacity: u64,
}

impl MemFs {
    pub(crate) fn new() -> Self {
        Self {
            nodes: vec![MemNode {
                name: String::new(),
                parent: 0,
                is_dir: true,
                data: Vec::new(),
                deleted: false,
            }],
            open_dirs: 0,
            peak_open_dirs: 0,
            open_files: 0,
            dir_opens: 0,
            fail_open_dir_named: Vec::new(),
            fail_create: false,
            fail_open_file: false,
            short_write_after: None,
            writes: 0,
            capacity: 1 << 20,
        }
    }

    fn add(&mut self, parent: usize, name: &str, is_dir: bool, data: &[u8]) -> usize {
        self.nodes.push(MemNode {
            name: name.to_string(),
            parent,
            is_dir,
            data: data.to_vec(),
            deleted: false,
        });
        self.nodes.len() - 1
    }

    fn lookup(&self, path: &str) -> Option<usize> {
        let mut node = 0usize;
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            node = self.child(node, segment)?;
        }
        Some(node)
    }

    fn child(&self, parent: usize, name: &str) -> Option<usize> {
        self.nodes
            .iter()
            .enumerate()
            .skip(1)
            .find(|(_, n)| !n.deleted && n.parent == parent && n.name == name)
            .map(|(idx, _)| idx)
    }

    fn parent_of(&self, path: &str) -> (usize, String) {
        let trimmed = path.trim_matches('/');
        match trimmed.rsplit_once('/') {
            Some((dir, name)) => (self.lookup(dir).unwrap_or(0), name.to_string()),
            None => (0, trimmed.to_string()),
        }
    }

    pub(crate) fn with_file(mut self, path: &str, data: &[u8]) -> Self {
        let (parent, name) = self.parent_of(path);
        self.add(parent, &name, false, data);
        self
    }

    pub(crate) fn with_dir(mut self, path: &str) -> Self {
        let (parent, name) = self.parent_of(path);
        self.add(parent, &name, true, &[]);
        self
    }

    pub(crate) fn exists(&self, path: &str) -> bool {
        self.lookup(path).is_some()
    }

    pub(crate) fn contents(&self, path: &str) -> Option<Vec<u8>> {
        self.lookup(path).map(|node| self.nodes[node].data.clone())
    }

    pub(crate) fn names_in(&self, path: &str) -> Vec<String> {
        let Some(dir) = self.lookup(path) else {
            return Vec::new();
        };
        self.nodes
            .iter()
            .skip(1)
            .filter(|n| !n.deleted && n.parent == dir)
            .map(|n| n.name.clone())
            .collect()
    }

    fn entry(&self, node: usize) -> MemEntry {
        let n = &self.nodes[node];
        MemEntry {
            node,
            name: n.name.clone(),
            size: n.data.len() as u32,
            is_dir: n.is_dir,
        }
    }

    fn create(&mut self, dir: &MemDir, name: &str, is_dir: bool) -> Result<MemEntry, FsError> {
        if self.fail_create {
            return Err(FsError::Io);
        }
        if name.is_empty() {
            return Err(FsError::InvalidName);
        }
        if self.child(dir.node, name).is_some() {
            return Err(FsError::AlreadyExists);
        }
        let node = self.add(dir.node, name, is_dir, &[]);
        Ok(self.entry(node))
    }

    fn track_dir_open(&mut self) {
        self.open_dirs += 1;
        self.dir_opens += 1;
        self.peak_open_dirs = self.peak_open_dirs.max(self.open_dirs);
    }

    fn used_bytes(&self) -> u64 {
        self.nodes
            .iter()
            .filter(|n| !n.deleted)
            .map(|n| n.data.len() as u64)
            .sum()
    }
}

impl FileSystem for MemFs {
    type Entry = MemEntry;
    type Dir = MemDir;
    type File = MemFile;

    fn open_root(&mut self) -> Result<MemDir, FsError> {
        self.track_dir_open();
        Ok(MemDir { node: 0, cursor: 0 })
    }

    fn open_dir(&mut self, entry: &MemEntry) -> Result<MemDir, FsError> {
        let node = self.nodes.get(entry.node).ok_or(FsError::NotFound)?;
        if node.deleted {
            return Err(FsError::NotFound);
        }
        if !node.is_dir {
            return Err(FsError::NotDirectory);
        }
        if self.fail_open_dir_named.contains(&node.name) {
            return Err(FsError::Io);
        }
        self.track_dir_open();
        Ok(MemDir {
            node: entry.node,
            cursor: 0,
        })
    }

    fn close_dir(&mut self, _dir: MemDir) {
        self.open_dirs -= 1;
    }

    fn read_dir(&mut self, dir: &mut MemDir) -> Option<MemEntry> {
        while dir.cursor + 1 < self.nodes.len() {
            dir.cursor += 1;
            let node = &self.nodes[dir.cursor];
            if !node.deleted && node.parent == dir.node {
                return Some(self.entry(dir.cursor));
            }
        }
        dir.cursor = 0;
        None
    }

    fn reset_dir(&mut self, dir: &mut MemDir) {
        dir.cursor = 0;
    }

    fn create_file(&mut self, dir: &mut MemDir, name: &str) -> Result<MemEntry, FsError> {
        self.create(dir, name, false)
    }

    fn create_dir(&mut self, dir: &mut MemDir, name: &str) -> Result<MemEntry, FsError> {
        self.create(dir, name, true)
    }

    fn delete(&mut self, entry: &MemEntry) -> Result<(), FsError> {
        let node = self.nodes.get_mut(entry.node).ok_or(FsError::NotFound)?;
        if node.deleted {
            return Err(FsError::NotFound);
        }
        node.deleted = true;
        Ok(())
    }

    fn open_file(&mut self, entry: &MemEntry) -> Result<MemFile, FsError> {
        if self.fail_open_file {
            return Err(FsError::Io);
        }
        let node = self.nodes.get(entry.node).ok_or(FsError::NotFound)?;
        if node.is_dir {
            return Err(FsError::IsDirectory);
        }
        self.open_files += 1;
        Ok(MemFile {
            node: entry.node,
            pos: 0,
        })
    }

    fn read_file(&mut self, file: &mut MemFile, buf: &mut [u8]) -> Result<usize, FsError> {
        let data = &self.nodes[file.node].data;
        let start = file.pos.min(data.len());
        let count = buf.len().min(data.len() - start);
        buf[..count].copy_from_slice(&data[start..start + count]);
        file.pos += count;
        Ok(count)
    }

    fn write_file(&mut self, file: &mut MemFile, data: &[u8]) -> Result<usize, FsError> {
        self.writes += 1;
        let accepted = match self.short_write_after {
            Some(limit) if self.writes > limit => data.len() / 2,
            _ => data.len(),
        };
        let stored = &mut self.nodes[file.node].data;
        let end = file.pos + accepted;
        if stored.len() < end {
            stored.resize(end, 0);
        }
        stored[file.pos..end].copy_from_slice(&data[..accepted]);
        file.pos = end;
        Ok(accepted)
    }

    fn seek_file(&mut self, file: &mut MemFile, offset: u32) -> Result<(), FsError> {
        if offset as usize > self.nodes[file.node].data.len() {
            return Err(FsError::InvalidSeek);
        }
        file.pos = offset as usize;
        Ok(())
    }

    fn close_file(&mut self, _file: MemFile) {
        self.open_files -= 1;
    }

    fn free_bytes(&mut self) -> Result<u64, FsError> {
        Ok(self.capacity.saturating_sub(self.used_bytes()))
    }

    fn size_bytes(&mut self) -> Result<u64, FsError> {
        Ok(self.capacity)
    }
}

pub(crate) fn sample_disk_info() -> DiskInfo {
    let mut info = DiskInfo {
        manufacturer: 0x03,
        revision: 0x80,
        serial: 0x1234_abcd,
        manufacturing_month: 7,
        manufacturing_year: 2009,
        capacity: 2 * 1024 * 1024 * 1024,
        flag_copy: false,
        flag_write_protect: false,
        flag_write_protect_temp: false,
        format: 0,
        ..DiskInfo::default()
    };
    let _ = info.oem.push_str("SD");
    let _ = info.product.push_str("SU02G");
    info
}

/// Card whose mount steps fail on demand. The volume survives remounts.
pub(crate) struct MemStorage {
    pub(crate) volume: Option<MemFs>,
    pub(crate) init_failures: u32,
    pub(crate) primary_partition_fails: bool,
    pub(crate) superfloppy_fails: bool,
    pub(crate) filesystem_failures: u32,
    pub(crate) root_failures: u32,
    pub(crate) sync_fails: bool,
    pub(crate) disk_info: Option<DiskInfo>,
    pub(crate) layouts_tried: Vec<PartitionLayout>,
    pub(crate) open_partitions: usize,
    pub(crate) filesystem_opens: usize,
    pub(crate) filesystem_closes: usize,
    pub(crate) syncs: usize,
}

impl MemStorage {
    pub(crate) fn new(volume: MemFs) -> Self {
        Self {
            volume: Some(volume),
            init_failures: 0,
            primary_partition_fails: false,
            superfloppy_fails: false,
            filesystem_failures: 0,
            root_failures: 0,
            sync_fails: false,
            disk_info: Some(sample_disk_info()),
            layouts_tried: Vec::new(),
            open_partitions: 0,
            filesystem_opens: 0,
            filesystem_closes: 0,
            syncs: 0,
        }
    }

    pub(crate) fn volume(&self) -> &MemFs {
        self.volume.as_ref().expect("volume is closed")
    }
}

pub(crate) struct MemPartition {
    pub(crate) layout: PartitionLayout,
}

pub(crate) struct MemMounted {
    pub(crate) fs: MemFs,
    root_failures: u32,
}

impl FileSystem for MemMounted {
    type Entry = MemEntry;
    type Dir = MemDir;
    type File = MemFile;

    fn open_root(&mut self) -> Result<MemDir, FsError> {
        if self.root_failures > 0 {
            self.root_failures -= 1;
            return Err(FsError::Io);
        }
        self.fs.open_root()
    }

    fn open_dir(&mut self, entry: &MemEntry) -> Result<MemDir, FsError> {
        self.fs.open_dir(entry)
    }

    fn close_dir(&mut self, dir: MemDir) {
        self.fs.close_dir(dir)
    }

    fn read_dir(&mut self, dir: &mut MemDir) -> Option<MemEntry> {
        self.fs.read_dir(dir)
    }

    fn reset_dir(&mut self, dir: &mut MemDir) {
        self.fs.reset_dir(dir)
    }

    fn create_file(&mut self, dir: &mut MemDir, name: &str) -> Result<MemEntry, FsError> {
        self.fs.create_file(dir, name)
    }

    fn create_dir(&mut self, dir: &mut MemDir, name: &str) -> Result<MemEntry, FsError> {
        self.fs.create_dir(dir, name)
    }

    fn delete(&mut self, entry: &MemEntry) -> Result<(), FsError> {
        self.fs.delete(entry)
    }

    fn open_file(&mut self, entry: &MemEntry) -> Result<MemFile, FsError> {
        self.fs.open_file(entry)
    }

    fn read_file(&mut self, file: &mut MemFile, buf: &mut [u8]) -> Result<usize, FsError> {
        self.fs.read_file(file, buf)
    }

    fn write_file(&mut self, file: &mut MemFile, data: &[u8]) -> Result<usize, FsError> {
        self.fs.write_file(file, data)
    }

    fn seek_file(&mut self, file: &mut MemFile, offset: u32) -> Result<(), FsError> {
        self.fs.seek_file(file, offset)
    }

    fn close_file(&mut self, file: MemFile) {
        self.fs.close_file(file)
    }

    fn free_bytes(&mut self) -> Result<u64, FsError> {
        self.fs.free_bytes()
    }

    fn size_bytes(&mut self) -> Result<u64, FsError> {
        self.fs.size_bytes()
    }
}

impl Storage for MemStorage {
    type Partition = MemPartition;
    type Fs = MemMounted;

    fn init_device(&mut self) -> Result<(), StorageError> {
        if self.init_failures > 0 {
            self.init_failures -= 1;
            return Err(StorageError::DeviceInit);
        }
        Ok(())
    }

    fn open_partition(&mut self, layout: PartitionLayout) -> Result<MemPartition, StorageError> {
        self.layouts_tried.push(layout);
        let fails = match layout {
            PartitionLayout::Primary(_) => self.primary_partition_fails,
            PartitionLayout::Superfloppy => self.superfloppy_fails,
        };
        if fails {
            return Err(StorageError::NoPartition);
        }
        self.open_partitions += 1;
        Ok(MemPartition { layout })
    }

    fn close_partition(&mut self, _partition: MemPartition) {
        self.open_partitions -= 1;
    }

    fn open_filesystem(&mut self, _partition: &MemPartition) -> Result<MemMounted, StorageError> {
        if self.filesystem_failures > 0 {
            self.filesystem_failures -= 1;
            return Err(StorageError::NoFilesystem);
        }
        let fs = self.volume.take().ok_or(StorageError::NoFilesystem)?;
        self.filesystem_opens += 1;
        let root_failures = self.root_failures;
        self.root_failures = 0;
        Ok(MemMounted { fs, root_failures })
    }

    fn close_filesystem(&mut self, fs: MemMounted) {
        self.filesystem_closes += 1;
        self.volume = Some(fs.fs);
    }

    fn disk_info(&mut self) -> Result<DiskInfo, StorageError> {
        self.disk_info.clone().ok_or(StorageError::Io)
    }

    fn sync(&mut self) -> Result<(), StorageError> {
        if self.sync_fails {
            return Err(StorageError::Io);
        }
        self.syncs += 1;
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct CountingReset {
    pub(crate) resets: usize,
}

impl SystemControl for CountingReset {
    fn reset(&mut self) {
        self.resets += 1;
    }
}
