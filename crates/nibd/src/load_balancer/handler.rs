//! LoadBalancerHandler - connection pinning and address-rewrite rules.

use nib_policy::{Action, Match, PacketOut, Policy, Rule};
use tracing::{info, instrument, warn};

use crate::handler::{Handler, PacketIn};
use crate::nib::{Client, Nib};

/// Priority of rewrite rules; above the learning switch's punt rule.
pub const REWRITE_PRIORITY: u16 = 100;

#[derive(Debug, Default)]
pub struct LoadBalancerHandler {
    assignments: u64,
}

impl LoadBalancerHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of client→backend assignments made so far.
    pub fn assignments(&self) -> u64 {
        self.assignments
    }
}

impl Handler for LoadBalancerHandler {
    fn name(&self) -> &str {
        "load_balancer"
    }

    /// Forward and reverse rewrite rules for every connection whose backend
    /// is live and sits on the client's switch. Paths across switches need a
    /// routing table and are left to packet-in handling.
    fn policy(&self, nib: &Nib) -> Policy {
        let mut policy = Policy::new();

        for service in nib.services() {
            for conn in service.connections() {
                let Some(backend) = service.backend(conn.backend).filter(|b| b.is_live()) else {
                    continue;
                };
                let client = conn.client;
                if backend.location.switch != client.location.switch
                    || !nib.is_port_active(client.location)
                {
                    continue;
                }

                policy.push(Rule::new(
                    client.location.switch,
                    REWRITE_PRIORITY,
                    Match::any().ip4(client.ip, service.virtual_ip),
                    vec![
                        Action::SetEthDst(backend.mac),
                        Action::SetIp4Dst(backend.ip),
                        Action::Output(backend.location.port),
                    ],
                ));
                policy.push(Rule::new(
                    client.location.switch,
                    REWRITE_PRIORITY,
                    Match::any().ip4(backend.ip, client.ip),
                    vec![
                        Action::SetEthSrc(service.virtual_mac),
                        Action::SetIp4Src(service.virtual_ip),
                        Action::Output(client.location.port),
                    ],
                ));
            }
        }

        policy
    }

    fn connected(&mut self, nib: &mut Nib) {
        nib.refresh_backend_reachability();
        for service in nib.services() {
            let live = service.backends().iter().filter(|b| b.is_live()).count();
            info!(
                "Service {} ({}): {}/{} backends reachable",
                service.name,
                service.virtual_ip,
                live,
                service.backends().len()
            );
        }
    }

    #[instrument(skip_all, fields(switch = %packet.switch, port = %packet.port))]
    fn packet_in(&mut self, nib: &mut Nib, packet: &PacketIn<'_>) -> Vec<PacketOut> {
        let Some(ip) = packet.frame.ipv4 else {
            return vec![];
        };
        let Some(service) = nib.service_by_vip(ip.dst) else {
            return vec![];
        };
        if service.live_backend_for(ip.src).is_some() {
            return vec![];
        }
        let service_name = service.name.clone();

        let client = Client {
            ip: ip.src,
            mac: packet.frame.source,
            location: packet.location(),
        };
        match nib.assign_backend(ip.dst, client) {
            Some(backend) => {
                self.assignments += 1;
                info!(
                    "Pinned client {} to {} backend {}",
                    client.ip, service_name, backend.ip
                );
            }
            None => warn!(
                "No live backend for {} ({}), client {} unserved",
                service_name, ip.dst, client.ip
            ),
        }

        vec![]
    }

    fn dump_stats(&self) -> Vec<String> {
        vec![format!("assignments={}", self.assignments)]
    }
}
