use std::{
    io::{self, Read, Write},
    thread,
    time::Duration,
};

use anyhow::{Context, Result};
use sd_dumper::{
    config::{LinkTiming, RX_RING_SLOTS},
    RxProducer, RxRing, SerialLink, SerialTx, StdClock,
};
use serialport::SerialPort;
use static_cell::StaticCell;

static RX_RING: StaticCell<RxRing<RX_RING_SLOTS>> = StaticCell::new();

pub type HostLink = SerialLink<'static, PortTx, StdClock, RX_RING_SLOTS>;

pub fn open_port(port: &str, baud: u32) -> Result<Box<dyn SerialPort>> {
    let mut serial = serialport::new(port, baud)
        .timeout(Duration::from_millis(50))
        .open()
        .with_context(|| format!("failed to open serial port {port} @ {baud}"))?;

    // Keep lines low so attaching does not reset the peer.
    let _ = serial.write_data_terminal_ready(false);
    let _ = serial.write_request_to_send(false);
    Ok(serial)
}

/// Opens `port` and wires it to the library link: a reader thread plays the
/// receive interrupt and feeds the ring, the returned link transmits directly.
pub fn attach(port: &str, baud: u32, timing: LinkTiming) -> Result<HostLink> {
    let serial = open_port(port, baud)?;
    let reader = serial
        .try_clone()
        .with_context(|| format!("failed to clone serial port {port}"))?;

    let (producer, consumer) = RX_RING.init(RxRing::new()).split();
    thread::Builder::new()
        .name("rx".into())
        .spawn(move || pump_rx(reader, producer))
        .context("failed to spawn rx thread")?;

    log::info!("link: attached port={} baud={}", port, baud);
    Ok(SerialLink::new(
        consumer,
        PortTx { port: serial },
        StdClock::new(),
        timing,
    ))
}

fn pump_rx(mut port: Box<dyn SerialPort>, mut producer: RxProducer<'static, RX_RING_SLOTS>) {
    let mut buf = [0u8; 64];
    let mut reported = 0;
    loop {
        match port.read(&mut buf) {
            Ok(0) => {}
            Ok(n) => {
                for &byte in &buf[..n] {
                    producer.insert(byte);
                }
                if producer.dropped() != reported {
                    reported = producer.dropped();
                    log::warn!("link: rx_overrun dropped={}", reported);
                }
            }
            Err(err) if matches!(err.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) => {}
            Err(err) => {
                log::error!("link: rx_failed err={}", err);
                return;
            }
        }
    }
}

pub struct PortTx {
    port: Box<dyn SerialPort>,
}

impl SerialTx for PortTx {
    fn write_byte(&mut self, byte: u8) {
        self.write_bytes(&[byte]);
    }

    fn write_bytes(&mut self, bytes: &[u8]) {
        if let Err(err) = self.port.write_all(bytes).and_then(|_| self.port.flush()) {
            log::warn!("link: tx_failed err={}", err);
        }
    }
}
