use std::path::Path;

use anyhow::{anyhow, Context, Result};
use embassy_time::Duration;
use sd_dumper::{SessionConfig, SessionMode};
use serde::Deserialize;

/// On-disk session overrides. Every field is optional; absent fields keep
/// the library defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub mode: Option<ModeName>,
    #[serde(default)]
    pub timing: TimingFile,
    #[serde(default)]
    pub dump: DumpFile,
    #[serde(default)]
    pub shell: ShellFile,
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ModeName {
    Dump,
    Shell,
}

impl From<ModeName> for SessionMode {
    fn from(mode: ModeName) -> Self {
        match mode {
            ModeName::Dump => SessionMode::Dump,
            ModeName::Shell => SessionMode::Shell,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimingFile {
    pub line_idle_ms: Option<u64>,
    pub shell_idle_ms: Option<u64>,
    pub rx_poll_us: Option<u64>,
    pub answer_poll_ms: Option<u64>,
    pub answer_attempts: Option<u16>,
    pub post_attempt_delay_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DumpFile {
    pub line_count: Option<u16>,
    pub invite: Option<char>,
    pub start: Option<char>,
    pub ready: Option<char>,
    pub open: Option<char>,
    pub ack: Option<char>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ShellFile {
    pub capture_idle_limit: Option<u16>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn apply(&self, config: &mut SessionConfig) -> Result<()> {
        if let Some(mode) = self.mode {
            config.mode = mode.into();
        }

        let t = &self.timing;
        let timing = &mut config.timing;
        if let Some(ms) = t.line_idle_ms {
            timing.line_idle = Duration::from_millis(ms);
        }
        if let Some(ms) = t.shell_idle_ms {
            timing.shell_idle = Duration::from_millis(ms);
        }
        if let Some(us) = t.rx_poll_us {
            timing.rx_poll = Duration::from_micros(us);
        }
        if let Some(ms) = t.answer_poll_ms {
            timing.answer_poll = Duration::from_millis(ms);
        }
        if let Some(attempts) = t.answer_attempts {
            if attempts == 0 {
                return Err(anyhow!("timing.answer_attempts must be at least 1"));
            }
            timing.answer_attempts = attempts;
        }
        if let Some(ms) = t.post_attempt_delay_ms {
            timing.post_attempt_delay = Duration::from_millis(ms);
        }

        let d = &self.dump;
        let protocol = &mut config.dump;
        if let Some(count) = d.line_count {
            protocol.line_count = count;
        }
        for (value, slot, key) in [
            (d.invite, &mut protocol.invite, "invite"),
            (d.start, &mut protocol.start, "start"),
            (d.ready, &mut protocol.ready, "ready"),
            (d.open, &mut protocol.open, "open"),
            (d.ack, &mut protocol.ack, "ack"),
        ] {
            if let Some(ch) = value {
                *slot = ascii_byte(ch).ok_or_else(|| anyhow!("dump.{key} must be one ASCII character"))?;
            }
        }

        if let Some(limit) = self.shell.capture_idle_limit {
            config.shell.capture_idle_limit = limit;
        }
        Ok(())
    }
}

fn ascii_byte(ch: char) -> Option<u8> {
    ch.is_ascii().then_some(ch as u8)
}
