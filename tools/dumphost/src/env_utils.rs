use anyhow::{anyhow, Context, Result};

use crate::port_detect;

pub fn parse_env_u32(name: &str, default: u32) -> Result<u32> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse::<u32>()
            .with_context(|| format!("{name} must be an unsigned integer")),
        Err(std::env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(anyhow!("{name} invalid: {err}")),
    }
}

/// Port from `--port`, then `DUMPHOST_PORT`, then autodetection.
pub fn resolve_port(explicit: Option<String>) -> Result<String> {
    if let Some(port) = explicit.filter(|p| !p.trim().is_empty()) {
        return Ok(port);
    }
    if let Ok(port) = std::env::var("DUMPHOST_PORT") {
        if !port.trim().is_empty() {
            return Ok(port);
        }
    }

    if let Some(port) = port_detect::detect_port() {
        return Ok(port);
    }

    let candidates = port_detect::list_candidates();
    let mut message = String::from(
        "DUMPHOST_PORT is not set and autodetection was not conclusive. Pass --port or set DUMPHOST_PORT.",
    );
    if !candidates.is_empty() {
        message.push_str(" Candidates:\n");
        for candidate in candidates {
            message.push_str("  - ");
            message.push_str(&candidate);
            message.push('\n');
        }
    }
    Err(anyhow!(message))
}

pub fn resolve_baud(explicit: Option<u32>, default: u32) -> Result<u32> {
    match explicit {
        Some(baud) => Ok(baud),
        None => parse_env_u32("DUMPHOST_BAUD", default),
    }
}
