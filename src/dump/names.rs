use core::fmt::Write as _;

use crate::{
    config::{DUMP_NAME_MAX, DUMP_NAME_PREFIX, DUMP_NAME_SLOTS},
    storage::{EntryInfo, FileSystem},
};

pub type DumpName = heapless::String<DUMP_NAME_MAX>;

pub fn dump_name(suffix: u8) -> DumpName {
    let mut name = DumpName::new();
    let _ = write!(name, "{}{}", DUMP_NAME_PREFIX, suffix);
    name
}

/// Suffix of `name` if it is exactly the candidate name for that suffix.
fn parse_suffix(name: &str) -> Option<u8> {
    let digits = name.strip_prefix(DUMP_NAME_PREFIX)?.as_bytes();
    if digits.is_empty() || digits.len() > 2 || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    if digits.len() > 1 && digits[0] == b'0' {
        return None;
    }
    let value = digits.iter().fold(0u8, |acc, d| acc * 10 + (d - b'0'));
    (value < DUMP_NAME_SLOTS).then_some(value)
}

/// First suffix in `0..DUMP_NAME_SLOTS` whose name is not taken in `dir`.
///
/// One pass over the directory; the directory is rewound before and after.
pub fn select_suffix<F: FileSystem>(fs: &mut F, dir: &mut F::Dir) -> Option<u8> {
    let mut taken = 0u128;
    fs.reset_dir(dir);
    while let Some(entry) = fs.read_dir(dir) {
        if let Some(suffix) = parse_suffix(entry.name()) {
            taken |= 1u128 << suffix;
        }
    }
    fs.reset_dir(dir);
    (0..DUMP_NAME_SLOTS).find(|suffix| taken & (1u128 << suffix) == 0)
}
