use super::{find_entry, EntryInfo, FileSystem, FsError};

/// Current directory of a mount cycle, holding at most one open handle.
///
/// Changing directory releases the held handle before the next one is
/// acquired. When the new directory cannot be opened, the previous one is
/// reopened; if even that fails the handle is dropped and the root is
/// reattached on next use.
pub struct WorkingDir<F: FileSystem> {
    dir: Option<F::Dir>,
    /// `None` while the root is current.
    entry: Option<F::Entry>,
}

impl<F: FileSystem> WorkingDir<F> {
    pub fn open_root(fs: &mut F) -> Result<Self, FsError> {
        let dir = fs.open_root()?;
        Ok(Self {
            dir: Some(dir),
            entry: None,
        })
    }

    pub fn is_root(&self) -> bool {
        self.entry.is_none()
    }

    pub fn is_attached(&self) -> bool {
        self.dir.is_some()
    }

    /// Name of the current directory, empty for the root.
    pub fn name(&self) -> &str {
        self.entry.as_ref().map_or("", |entry| entry.name())
    }

    pub fn handle(&mut self, fs: &mut F) -> Result<&mut F::Dir, FsError> {
        if self.dir.is_none() {
            self.entry = None;
            self.dir = Some(fs.open_root()?);
        }
        self.dir.as_mut().ok_or(FsError::Io)
    }

    pub fn find(&mut self, fs: &mut F, name: &str) -> Result<Option<F::Entry>, FsError> {
        let dir = self.handle(fs)?;
        Ok(find_entry(fs, dir, name))
    }

    /// Enters the subdirectory `name` of the current directory.
    pub fn change(&mut self, fs: &mut F, name: &str) -> Result<(), FsError> {
        let target = self.find(fs, name)?.ok_or(FsError::NotFound)?;
        if !target.is_dir() {
            return Err(FsError::NotDirectory);
        }

        if let Some(old) = self.dir.take() {
            fs.close_dir(old);
        }
        match fs.open_dir(&target) {
            Ok(dir) => {
                self.dir = Some(dir);
                self.entry = Some(target);
                Ok(())
            }
            Err(err) => {
                log::warn!("fs: cd_reopen name={} err={}", name, err);
                let reopened = match self.entry.as_ref() {
                    Some(previous) => fs.open_dir(previous),
                    None => fs.open_root(),
                };
                match reopened {
                    Ok(dir) => self.dir = Some(dir),
                    Err(reopen_err) => {
                        log::warn!("fs: cd_detached err={}", reopen_err);
                        self.entry = None;
                    }
                }
                Err(err)
            }
        }
    }

    pub fn close(mut self, fs: &mut F) {
        if let Some(dir) = self.dir.take() {
            fs.close_dir(dir);
        }
    }
}
