//! Replay transport: events from JSON lines, policies out as JSON.
//!
//! Each input line is one [`Event`]:
//!
//! ```text
//! {"event":"connected"}
//! {"event":"packet_in","switch":1,"port":1,"payload":[0,0,0,0,0,187, ...]}
//! {"event":"port_down","switch":1,"port":2}
//! {"event":"backend_health","service":"web","backend":"10.0.0.2","alive":false}
//! ```
//!
//! Blank lines and lines starting with `#` are ignored.

use std::io::Write;

use async_trait::async_trait;
use nib_policy::{Controller, PacketOut, Policy, SwitchPorts, TransportError, TransportResult};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::app::Event;
use crate::error::{NibdError, Result};

/// A [`Controller`] that serves a fixed topology, counts packet-outs and
/// writes every installed policy as one JSON line.
pub struct ReplayController<W: Write + Send> {
    topology: SwitchPorts,
    sink: W,
    packets_out: u64,
    installs: u64,
}

impl<W: Write + Send> ReplayController<W> {
    pub fn new(topology: SwitchPorts, sink: W) -> Self {
        Self {
            topology,
            sink,
            packets_out: 0,
            installs: 0,
        }
    }

    pub fn packets_out(&self) -> u64 {
        self.packets_out
    }

    pub fn installs(&self) -> u64 {
        self.installs
    }

    pub fn sink(&self) -> &W {
        &self.sink
    }
}

#[async_trait]
impl<W: Write + Send> Controller for ReplayController<W> {
    async fn current_switches(&mut self) -> TransportResult<SwitchPorts> {
        Ok(self.topology.clone())
    }

    fn pkt_out(&mut self, out: PacketOut) -> TransportResult<()> {
        self.packets_out += 1;
        debug!(
            "pkt_out switch={} len={} actions={:?}",
            out.switch,
            out.payload.len(),
            out.actions
        );
        Ok(())
    }

    fn update(&mut self, policy: &Policy) -> TransportResult<()> {
        let line =
            serde_json::to_string(policy).map_err(|e| TransportError::install(e.to_string()))?;
        writeln!(self.sink, "{}", line).map_err(|e| TransportError::install(e.to_string()))?;
        self.sink
            .flush()
            .map_err(|e| TransportError::install(e.to_string()))?;
        self.installs += 1;
        Ok(())
    }
}

/// Parses one input line. `line_no` is 1-based, for error messages.
pub fn parse_event_line(line_no: usize, line: &str) -> Result<Option<Event>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    serde_json::from_str(line)
        .map(Some)
        .map_err(|e| NibdError::Event {
            line: line_no,
            message: e.to_string(),
        })
}

/// Forwards events read from `reader` into `tx` until EOF or until the
/// receiver goes away. Lines that fail to parse are logged and skipped.
pub async fn read_events<R>(reader: R, tx: mpsc::Sender<Event>) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut line_no = 0;

    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        let event = match parse_event_line(line_no, &line) {
            Ok(Some(event)) => event,
            Ok(None) => continue,
            Err(e) => {
                warn!("{}", e);
                continue;
            }
        };
        if tx.send(event).await.is_err() {
            debug!("Event receiver closed, stopping reader");
            break;
        }
    }
    Ok(())
}
