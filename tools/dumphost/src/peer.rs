//! Peer-side simulator for exercising a dump host over a real serial pair.

use std::{
    fs,
    io::{self, Read, Write},
    path::Path,
    time::Duration,
};

use anyhow::{Context, Result};
use sd_dumper::DumpProtocol;
use serialport::SerialPort;

/// Lines streamed after the open acknowledgement.
pub fn load_lines(source: Option<&Path>, count: u16) -> Result<Vec<Vec<u8>>> {
    let mut lines: Vec<Vec<u8>> = match source {
        Some(path) => fs::read(path)
            .with_context(|| format!("failed to read {}", path.display()))?
            .split(|&b| b == b'\n')
            .map(|line| line.strip_suffix(b"\r").unwrap_or(line).to_vec())
            .collect(),
        None => (0..count).map(|i| format!("{:04x}", i).into_bytes()).collect(),
    };
    lines.truncate(usize::from(count));
    Ok(lines)
}

/// Answers one byte received from the host. Returns the bytes to send back.
pub fn answer(protocol: &DumpProtocol, byte: u8, lines: &[Vec<u8>]) -> Option<Vec<u8>> {
    if byte == protocol.invite {
        Some(vec![protocol.start])
    } else if byte == protocol.ready {
        Some(vec![protocol.ack])
    } else if byte == protocol.open {
        let mut out = vec![protocol.ack];
        for line in lines {
            out.extend_from_slice(line);
            out.push(b'\n');
        }
        Some(out)
    } else {
        None
    }
}

pub fn serve(mut port: Box<dyn SerialPort>, protocol: DumpProtocol, lines: &[Vec<u8>]) -> Result<()> {
    log::info!("peer: ready lines={}", lines.len());
    let mut buf = [0u8; 64];
    let mut stdout = io::stdout();
    loop {
        let n = match port.read(&mut buf) {
            Ok(n) => n,
            Err(err) if matches!(err.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) => {
                continue;
            }
            Err(err) => return Err(err).context("serial read failed"),
        };
        for &byte in &buf[..n] {
            match answer(&protocol, byte, lines) {
                Some(reply) => {
                    log::debug!("peer: answer prompt={:?} bytes={}", byte as char, reply.len());
                    // Give the host time to switch from sending to polling.
                    std::thread::sleep(Duration::from_millis(5));
                    port.write_all(&reply).context("serial write failed")?;
                    port.flush()?;
                }
                None => {
                    stdout.write_all(&[byte])?;
                    stdout.flush()?;
                }
            }
        }
    }
}
