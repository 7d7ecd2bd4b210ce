//! Operator shell over the serial link: `cd`, `ls`, `cat`, `disk`, `rm`,
//! `touch`, `write`, `mkdir`, `sync`, `test` and `init`.
//!
//! Failures are reported on the link and the shell keeps going; only `init`
//! ends a session.

mod command;

pub use command::ShellCommand;

use command::strip_cr;

use crate::{
    clock::Clock,
    config::{
        ShellConfig, SHELL_CAPTURE_END, SHELL_CAPTURE_FILE, SHELL_CAT_CHUNK, SHELL_LINE_MAX,
        SHELL_LS_NAME_COLUMN,
    },
    serial::{SerialLink, SerialTx},
    storage::{EntryInfo, FileSystem, Storage, WorkingDir},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShellControl {
    Continue,
    /// `init`: close the volume and remount.
    Exit,
}

/// One shell session, borrowing the handles of the current mount cycle.
pub struct Shell<'a, 'r, S: Storage, T, C, const N: usize> {
    storage: &'a mut S,
    fs: &'a mut S::Fs,
    cwd: &'a mut WorkingDir<S::Fs>,
    link: &'a mut SerialLink<'r, T, C, N>,
    config: ShellConfig,
}

impl<'a, 'r, S, T, C, const N: usize> Shell<'a, 'r, S, T, C, N>
where
    S: Storage,
    T: SerialTx,
    C: Clock,
{
    pub fn new(
        storage: &'a mut S,
        fs: &'a mut S::Fs,
        cwd: &'a mut WorkingDir<S::Fs>,
        link: &'a mut SerialLink<'r, T, C, N>,
        config: ShellConfig,
    ) -> Self {
        Self {
            storage,
            fs,
            cwd,
            link,
            config,
        }
    }

    /// Prompts, reads and executes lines until `init`.
    pub fn run(&mut self) {
        let idle = self.link.timing().shell_idle;
        let mut line = [0u8; SHELL_LINE_MAX];
        loop {
            self.link.tx.write_str("> ");
            let len = self.link.reader.read_line_within(&mut line, idle);
            if len == 0 {
                continue;
            }
            if self.execute(&line[..len]) == ShellControl::Exit {
                log::info!("shell: exit");
                return;
            }
        }
    }

    pub fn execute(&mut self, line: &[u8]) -> ShellControl {
        let command = ShellCommand::parse(strip_cr(line));
        log::debug!("shell: exec cmd={}", command.label());
        match command {
            ShellCommand::Init => return ShellControl::Exit,
            ShellCommand::Cd(name) => self.cd(name),
            ShellCommand::Ls => self.ls(),
            ShellCommand::Cat(name) => self.cat(name),
            ShellCommand::Disk => self.disk(),
            ShellCommand::Rm(name) => self.rm(name),
            ShellCommand::Touch(name) => self.touch(name),
            ShellCommand::Write { name, offset } => self.write(name, offset),
            ShellCommand::Mkdir(name) => self.mkdir(name),
            ShellCommand::Sync => {
                if let Err(err) = self.storage.sync() {
                    log::warn!("shell: sync_failed err={}", err);
                    self.link.tx.write_str("error syncing disk\n");
                }
            }
            ShellCommand::Test => self.test(),
            ShellCommand::Unknown(raw) => {
                let tx = &mut self.link.tx;
                tx.write_str("error unknown command: ");
                tx.write_bytes(raw);
                tx.write_byte(b'\n');
            }
        }
        ShellControl::Continue
    }

    fn report(&mut self, message: &str, name: &str) {
        let tx = &mut self.link.tx;
        tx.write_str(message);
        tx.write_str(name);
        tx.write_byte(b'\n');
    }

    fn cd(&mut self, name: &str) {
        if name.is_empty() {
            return;
        }
        if self.cwd.change(self.fs, name).is_err() {
            self.report("error directory not found: ", name);
        }
    }

    fn ls(&mut self) {
        let Ok(dir) = self.cwd.handle(self.fs) else {
            return;
        };
        self.fs.reset_dir(dir);
        while let Some(entry) = self.fs.read_dir(dir) {
            let tx = &mut self.link.tx;
            let name = entry.name();
            tx.write_str(name);
            tx.write_byte(if entry.is_dir() { b'/' } else { b' ' });
            let pad = (SHELL_LS_NAME_COLUMN + 4).saturating_sub(name.len());
            for _ in 0..pad {
                tx.write_byte(b' ');
            }
            writeln!(tx, "{}", entry.size());
        }
    }

    /// Looks `name` up in the current directory and opens it as a file.
    fn open(&mut self, name: &str) -> Option<<S::Fs as FileSystem>::File> {
        let entry = self.cwd.find(self.fs, name).ok().flatten()?;
        self.fs.open_file(&entry).ok()
    }

    fn cat(&mut self, name: &str) {
        if name.is_empty() {
            return;
        }
        let Some(mut file) = self.open(name) else {
            self.report("error opening ", name);
            return;
        };

        let mut chunk = [0u8; SHELL_CAT_CHUNK];
        let mut offset = 0u32;
        loop {
            let size = match self.fs.read_file(&mut file, &mut chunk) {
                Ok(0) | Err(_) => break,
                Ok(size) => size,
            };
            let tx = &mut self.link.tx;
            write!(tx, "{:08x}:", offset);
            for (index, byte) in chunk.iter().enumerate() {
                if index < size {
                    write!(tx, " {:02x}", byte);
                } else {
                    tx.write_str("   ");
                }
            }
            tx.write_byte(b' ');
            for &byte in &chunk[..size] {
                tx.write_byte(if (32..=126).contains(&byte) { byte } else { b'.' });
            }
            tx.write_byte(b'\n');
            offset = offset.wrapping_add(SHELL_CAT_CHUNK as u32);
        }
        self.fs.close_file(file);
    }

    fn disk(&mut self) {
        let info = self.storage.disk_info();
        let free = self.fs.free_bytes();
        let size = self.fs.size_bytes();
        let (Ok(info), Ok(free), Ok(size)) = (info, free, size) else {
            self.link.tx.write_str("error reading disk info\n");
            return;
        };
        let tx = &mut self.link.tx;
        writeln!(tx, "manuf:  0x{:02x}", info.manufacturer);
        writeln!(tx, "oem:    {}", info.oem);
        writeln!(tx, "prod:   {}", info.product);
        writeln!(tx, "rev:    {:02x}", info.revision);
        writeln!(tx, "serial: 0x{:08x}", info.serial);
        writeln!(tx, "date:   {}/{}", info.manufacturing_month, info.manufacturing_year);
        writeln!(tx, "size:   {}MB", info.capacity / 1024 / 1024);
        writeln!(tx, "copy:   {}", u8::from(info.flag_copy));
        writeln!(
            tx,
            "wr.pr.: {}/{}",
            u8::from(info.flag_write_protect_temp),
            u8::from(info.flag_write_protect)
        );
        writeln!(tx, "format: {}", info.format);
        writeln!(tx, "free:   {}/{}", free, size);
    }

    fn rm(&mut self, name: &str) {
        if name.is_empty() {
            return;
        }
        let deleted = match self.cwd.find(self.fs, name) {
            Ok(Some(entry)) => self.fs.delete(&entry).is_ok(),
            _ => false,
        };
        if !deleted {
            self.report("error deleting file: ", name);
        }
    }

    fn touch(&mut self, name: &str) {
        if name.is_empty() {
            return;
        }
        let created = match self.cwd.handle(self.fs) {
            Ok(dir) => self.fs.create_file(dir, name).is_ok(),
            Err(_) => false,
        };
        if !created {
            self.report("error creating file: ", name);
        }
    }

    fn mkdir(&mut self, name: &str) {
        if name.is_empty() {
            return;
        }
        let created = match self.cwd.handle(self.fs) {
            Ok(dir) => self.fs.create_dir(dir, name).is_ok(),
            Err(_) => false,
        };
        if !created {
            self.report("error creating directory: ", name);
        }
    }

    fn write(&mut self, name: &str, offset: Option<u32>) {
        let Some(offset) = offset else {
            return;
        };
        if name.is_empty() {
            return;
        }
        let Some(mut file) = self.open(name) else {
            self.report("error opening ", name);
            return;
        };
        if self.fs.seek_file(&mut file, offset).is_err() {
            self.report("error seeking on ", name);
            self.fs.close_file(file);
            return;
        }

        let idle = self.link.timing().shell_idle;
        let mut line = [0u8; SHELL_LINE_MAX];
        loop {
            self.link.tx.write_str("< ");
            let len = self.link.reader.read_line_within(&mut line, idle);
            if len == 0 {
                break;
            }
            if !matches!(self.fs.write_file(&mut file, &line[..len]), Ok(n) if n == len) {
                self.link.tx.write_str("error writing to file\n");
                break;
            }
        }
        self.fs.close_file(file);
    }

    /// Captures streamed lines into the fixed capture file until the end
    /// marker, a write failure or too many consecutive idle reads.
    fn test(&mut self) {
        let created = match self.cwd.handle(self.fs) {
            Ok(dir) => self.fs.create_file(dir, SHELL_CAPTURE_FILE).is_ok(),
            Err(_) => false,
        };
        if !created {
            self.link.tx.write_str("error creating\n");
            return;
        }
        let Some(mut file) = self.open(SHELL_CAPTURE_FILE) else {
            self.link.tx.write_str("error opening\n");
            return;
        };
        self.link.tx.write_str("ok\n");

        let idle = self.link.timing().line_idle;
        let mut line = [0u8; SHELL_LINE_MAX];
        let mut idle_reads = 0u16;
        loop {
            let len = self.link.reader.read_line_within(&mut line, idle);
            if len == 0 {
                if !matches!(self.fs.write_file(&mut file, b"\n"), Ok(1)) {
                    self.link.tx.write_str("error writing\n");
                    break;
                }
                idle_reads += 1;
                if idle_reads >= self.config.capture_idle_limit {
                    log::info!("shell: capture_idle_stop reads={}", idle_reads);
                    break;
                }
                continue;
            }
            idle_reads = 0;
            if &line[..len] == SHELL_CAPTURE_END {
                break;
            }
            if !matches!(self.fs.write_file(&mut file, &line[..len]), Ok(n) if n == len) {
                self.link.tx.write_str("error writing to file\n");
                break;
            }
        }
        self.fs.close_file(file);
    }
}
