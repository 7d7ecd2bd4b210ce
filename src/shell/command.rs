/// One parsed operator line. Arguments borrow from the input line and may be
/// empty, which the executor treats as a no-op.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShellCommand<'a> {
    Init,
    Cd(&'a str),
    Ls,
    Cat(&'a str),
    Disk,
    Rm(&'a str),
    Touch(&'a str),
    /// `None` when the line carries no offset field.
    Write { name: &'a str, offset: Option<u32> },
    Mkdir(&'a str),
    Sync,
    Test,
    Unknown(&'a [u8]),
}

impl<'a> ShellCommand<'a> {
    /// Matches `line` against the command vocabulary; first match wins.
    pub fn parse(line: &'a [u8]) -> Self {
        let Ok(text) = core::str::from_utf8(line) else {
            return Self::Unknown(line);
        };
        match text {
            "init" => return Self::Init,
            "ls" => return Self::Ls,
            "disk" => return Self::Disk,
            "sync" => return Self::Sync,
            "test" => return Self::Test,
            _ => {}
        }
        if let Some(arg) = text.strip_prefix("cd ") {
            return Self::Cd(arg);
        }
        if let Some(arg) = text.strip_prefix("cat ") {
            return Self::Cat(arg);
        }
        if let Some(arg) = text.strip_prefix("rm ") {
            return Self::Rm(arg);
        }
        if let Some(arg) = text.strip_prefix("touch ") {
            return Self::Touch(arg);
        }
        if let Some(arg) = text.strip_prefix("write ") {
            return match arg.split_once(' ') {
                Some((name, offset)) => Self::Write {
                    name,
                    offset: Some(parse_offset(offset.as_bytes())),
                },
                None => Self::Write {
                    name: arg,
                    offset: None,
                },
            };
        }
        if let Some(arg) = text.strip_prefix("mkdir ") {
            return Self::Mkdir(arg);
        }
        Self::Unknown(line)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Cd(_) => "cd",
            Self::Ls => "ls",
            Self::Cat(_) => "cat",
            Self::Disk => "disk",
            Self::Rm(_) => "rm",
            Self::Touch(_) => "touch",
            Self::Write { .. } => "write",
            Self::Mkdir(_) => "mkdir",
            Self::Sync => "sync",
            Self::Test => "test",
            Self::Unknown(_) => "unknown",
        }
    }
}

/// Value of the leading decimal digits; no digits reads as zero, overflow
/// saturates.
pub(super) fn parse_offset(bytes: &[u8]) -> u32 {
    bytes
        .iter()
        .take_while(|b| b.is_ascii_digit())
        .fold(0u32, |acc, d| {
            acc.saturating_mul(10).saturating_add(u32::from(d - b'0'))
        })
}

/// Drops a trailing carriage return left by terminals that send CR LF.
pub(super) fn strip_cr(line: &[u8]) -> &[u8] {
    line.strip_suffix(b"\r").unwrap_or(line)
}
