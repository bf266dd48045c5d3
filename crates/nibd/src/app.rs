//! Controller application shell.
//!
//! [`App`] owns the NIB, the registered handlers, the policy compiler and
//! the controller transport. Events are handled to completion one at a time;
//! the only timer is the compiler's pending install.

use std::net::Ipv4Addr;
use std::time::Duration;

use nib_policy::{Controller, Policy};
use nib_types::{PortId, SwitchId};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, instrument, warn};

use crate::compiler::{CompilerStats, PolicyCompiler};
use crate::config::NibdConfig;
use crate::error::Result;
use crate::handler::{Handler, PacketIn};
use crate::learning::LearningHandler;
use crate::load_balancer::{LoadBalancerConfig, LoadBalancerHandler};
use crate::nib::{Nib, Service};
use crate::packet::EthernetFrame;

/// An event delivered by the controller transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    Connected,
    PacketIn {
        switch: SwitchId,
        port: PortId,
        payload: Vec<u8>,
    },
    PortUp {
        switch: SwitchId,
        port: PortId,
    },
    PortDown {
        switch: SwitchId,
        port: PortId,
    },
    BackendHealth {
        service: String,
        backend: Ipv4Addr,
        alive: bool,
    },
}

pub struct App<C: Controller> {
    nib: Nib,
    handlers: Vec<Box<dyn Handler>>,
    compiler: PolicyCompiler,
    controller: C,
    discarded: u64,
    ignored: u64,
}

impl<C: Controller> App<C> {
    /// Creates an application with no handlers.
    pub fn new(controller: C, install_delay: Duration) -> Self {
        Self {
            nib: Nib::new(),
            handlers: Vec::new(),
            compiler: PolicyCompiler::new(install_delay),
            controller,
            discarded: 0,
            ignored: 0,
        }
    }

    /// Learning switch followed by the load balancer, with the given
    /// services registered.
    pub fn from_config(
        config: &NibdConfig,
        services: &LoadBalancerConfig,
        controller: C,
    ) -> Result<Self> {
        let mut app = Self::new(controller, config.install_delay());
        app.register(Box::new(LearningHandler::new(
            config.controller.client_id.clone(),
        )));
        app.register(Box::new(LoadBalancerHandler::new()));
        for service in &services.services {
            app.add_service(service.to_service())?;
        }
        Ok(app)
    }

    /// Handlers see events and contribute policy in registration order.
    pub fn register(&mut self, handler: Box<dyn Handler>) {
        info!("Registering handler {}", handler.name());
        self.handlers.push(handler);
    }

    pub fn add_service(&mut self, service: Service) -> Result<()> {
        info!(
            "Adding service {} at {} with {} backends",
            service.name,
            service.virtual_ip,
            service.backends().len()
        );
        self.nib.add_service(service)?;
        Ok(())
    }

    /// Loads the topology snapshot, notifies handlers and installs the
    /// initial policy.
    pub async fn connected(&mut self) -> Result<()> {
        let switches = self.controller.current_switches().await?;
        info!("Connected: {} switches", switches.len());

        let stale = self.nib.set_all_ports(&switches);
        if !stale.is_empty() {
            debug!("Unlearned {} hosts on vanished ports", stale.len());
        }
        for handler in &mut self.handlers {
            handler.connected(&mut self.nib);
        }
        self.update_and_clear_dirty()
    }

    /// Runs every handler on a packet-in and emits their packet-outs.
    ///
    /// A payload that does not parse is dropped before the NIB is touched.
    #[instrument(skip(self, payload), fields(len = payload.len()))]
    pub fn packet_in(&mut self, switch: SwitchId, port: PortId, payload: &[u8]) -> Result<()> {
        let frame = match EthernetFrame::parse(payload) {
            Ok(frame) => frame,
            Err(e) => {
                self.discarded += 1;
                warn!("Discarding packet from {}:{}: {}", switch, port, e);
                return Ok(());
            }
        };
        let packet = PacketIn {
            switch,
            port,
            payload,
            frame: &frame,
        };

        for handler in &mut self.handlers {
            for out in handler.packet_in(&mut self.nib, &packet) {
                self.controller.pkt_out(out)?;
            }
        }

        if self.nib.is_dirty() {
            self.compiler.defer(Instant::now());
        }
        Ok(())
    }

    /// Forgets hosts seen on the port, re-adds it and installs synchronously.
    #[instrument(skip(self))]
    pub fn port_up(&mut self, switch: SwitchId, port: PortId) -> Result<()> {
        let stale = self.nib.unlearn_port(switch, port);
        if !stale.is_empty() {
            debug!("Unlearned {} stale hosts", stale.len());
        }
        self.nib.add_port(switch, port);
        self.update_and_clear_dirty()
    }

    /// Forgets hosts seen on the port, removes it and installs synchronously.
    #[instrument(skip(self))]
    pub fn port_down(&mut self, switch: SwitchId, port: PortId) -> Result<()> {
        let gone = self.nib.unlearn_port(switch, port);
        if !gone.is_empty() {
            debug!("Unlearned {} hosts", gone.len());
        }
        self.nib.delete_port(switch, port);
        self.update_and_clear_dirty()
    }

    /// Applies a backend health event; a change is installed on the
    /// deferred path. Events naming an unknown service or backend are
    /// counted and dropped.
    #[instrument(skip(self))]
    pub fn backend_health(&mut self, service: &str, backend: Ipv4Addr, alive: bool) -> Result<()> {
        match self.nib.set_backend_health(service, backend, alive) {
            Ok(true) => {
                info!(
                    "Backend {} of {} is now {}",
                    backend,
                    service,
                    if alive { "up" } else { "down" }
                );
                self.compiler.defer(Instant::now());
            }
            Ok(false) => {}
            Err(e) => {
                self.ignored += 1;
                warn!("Ignoring health event: {}", e);
            }
        }
        Ok(())
    }

    pub fn update_and_clear_dirty(&mut self) -> Result<()> {
        self.compiler
            .update_and_clear_dirty(&self.handlers, &mut self.nib, &mut self.controller)?;
        Ok(())
    }

    /// Runs the pending install if its deadline has passed.
    pub fn fire_pending(&mut self) -> Result<bool> {
        let installed = self.compiler.fire_pending(
            Instant::now(),
            &self.handlers,
            &mut self.nib,
            &mut self.controller,
        )?;
        Ok(installed)
    }

    /// The policy the current NIB compiles to.
    pub fn policy(&self) -> Policy {
        PolicyCompiler::compile(&self.handlers, &self.nib)
    }

    pub async fn handle(&mut self, event: Event) -> Result<()> {
        match event {
            Event::Connected => self.connected().await,
            Event::PacketIn {
                switch,
                port,
                payload,
            } => self.packet_in(switch, port, &payload),
            Event::PortUp { switch, port } => self.port_up(switch, port),
            Event::PortDown { switch, port } => self.port_down(switch, port),
            Event::BackendHealth {
                service,
                backend,
                alive,
            } => self.backend_health(&service, backend, alive),
        }
    }

    /// Handles events until the channel closes, firing the pending install
    /// when it comes due. A pending install is flushed before returning.
    pub async fn run(&mut self, mut events: mpsc::Receiver<Event>) -> Result<()> {
        info!("Starting event loop");

        loop {
            let deadline = self.compiler.pending_deadline();
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => self.handle(event).await?,
                    None => {
                        info!("Event stream closed");
                        break;
                    }
                },
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.fire_pending()?;
                }
            }
        }

        self.compiler
            .flush(&self.handlers, &mut self.nib, &mut self.controller)?;
        self.log_stats();
        Ok(())
    }

    pub fn log_stats(&self) {
        let stats = self.compiler.stats();
        info!(
            "Compiler: installs={} deferred_scheduled={} deferred_coalesced={} deferred_skipped={}",
            stats.installs,
            stats.deferred_scheduled,
            stats.deferred_coalesced,
            stats.deferred_skipped
        );
        for handler in &self.handlers {
            let lines = handler.dump_stats();
            if !lines.is_empty() {
                info!("{}: {}", handler.name(), lines.join(" "));
            }
        }
        if self.discarded > 0 {
            info!("Discarded {} malformed packets", self.discarded);
        }
        if self.ignored > 0 {
            info!("Ignored {} health events", self.ignored);
        }
    }

    pub fn nib(&self) -> &Nib {
        &self.nib
    }

    pub fn is_dirty(&self) -> bool {
        self.nib.is_dirty()
    }

    pub fn controller(&self) -> &C {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut C {
        &mut self.controller
    }

    pub fn compiler_stats(&self) -> &CompilerStats {
        self.compiler.stats()
    }

    pub fn last_installed(&self) -> Option<&Policy> {
        self.compiler.last_installed()
    }

    pub fn pending_deadline(&self) -> Option<Instant> {
        self.compiler.pending_deadline()
    }

    pub fn discarded_packets(&self) -> u64 {
        self.discarded
    }

    pub fn ignored_events(&self) -> u64 {
        self.ignored
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_event_json_shape() {
        let event: Event =
            serde_json::from_str(r#"{"event":"port_up","switch":1,"port":3}"#).unwrap();
        assert_eq!(
            event,
            Event::PortUp {
                switch: SwitchId::new(1),
                port: PortId::new(3),
            }
        );

        let event: Event = serde_json::from_str(
            r#"{"event":"backend_health","service":"web","backend":"10.0.0.2","alive":false}"#,
        )
        .unwrap();
        assert_eq!(
            event,
            Event::BackendHealth {
                service: "web".into(),
                backend: Ipv4Addr::new(10, 0, 0, 2),
                alive: false,
            }
        );

        let event: Event = serde_json::from_str(r#"{"event":"connected"}"#).unwrap();
        assert_eq!(event, Event::Connected);
    }
}
