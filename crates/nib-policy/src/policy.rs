//! Policy document: match→action rules keyed by switch.

use nib_types::{MacAddress, PortId, SwitchId};
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

/// EtherType of IPv4 payloads.
pub const ETH_TYPE_IPV4: u16 = 0x0800;

/// Header pattern. Unset fields are wildcards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Match {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_port: Option<PortId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eth_src: Option<MacAddress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eth_dst: Option<MacAddress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eth_type: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip4_src: Option<Ipv4Addr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip4_dst: Option<Ipv4Addr>,
}

impl Match {
    /// Matches every packet.
    pub fn any() -> Self {
        Self::default()
    }

    pub fn in_port(mut self, port: PortId) -> Self {
        self.in_port = Some(port);
        self
    }

    /// IPv4 source/destination pair; also pins the EtherType to IPv4.
    pub fn ip4(mut self, src: Ipv4Addr, dst: Ipv4Addr) -> Self {
        self.eth_type = Some(ETH_TYPE_IPV4);
        self.ip4_src = Some(src);
        self.ip4_dst = Some(dst);
        self
    }

    /// Returns true if no field is constrained.
    pub fn is_wildcard(&self) -> bool {
        *self == Self::default()
    }
}

/// Action applied to a matching packet, in list order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Action {
    /// Forward out a physical port.
    Output(PortId),
    /// Punt to the controller application identified by the tag.
    SendToController(String),
    SetEthSrc(MacAddress),
    SetEthDst(MacAddress),
    SetIp4Src(Ipv4Addr),
    SetIp4Dst(Ipv4Addr),
}

/// A single match→action rule installed on one switch.
///
/// Higher `priority` wins when several rules match the same packet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rule {
    pub switch: SwitchId,
    pub priority: u16,
    #[serde(rename = "match")]
    pub pattern: Match,
    pub actions: Vec<Action>,
}

impl Rule {
    pub fn new(switch: SwitchId, priority: u16, pattern: Match, actions: Vec<Action>) -> Self {
        Self {
            switch,
            priority,
            pattern,
            actions,
        }
    }
}

/// Ordered policy document.
///
/// Rule order is the composition order of the sub-policies that produced it;
/// two documents computed from the same state compare equal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Policy {
    rules: Vec<Rule>,
}

impl Policy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Concatenates sub-policies, preserving their order.
    pub fn union(parts: impl IntoIterator<Item = Policy>) -> Self {
        let rules = parts.into_iter().flat_map(|p| p.rules).collect();
        Self { rules }
    }

    pub fn push(&mut self, rule: Rule) {
        self.rules.push(rule);
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Rules destined for one switch, in document order.
    pub fn rules_for(&self, switch: SwitchId) -> impl Iterator<Item = &Rule> {
        self.rules.iter().filter(move |r| r.switch == switch)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl From<Vec<Rule>> for Policy {
    fn from(rules: Vec<Rule>) -> Self {
        Self { rules }
    }
}

impl FromIterator<Rule> for Policy {
    fn from_iter<I: IntoIterator<Item = Rule>>(iter: I) -> Self {
        Self {
            rules: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn punt(switch: u64) -> Rule {
        Rule::new(
            SwitchId::new(switch),
            0,
            Match::any(),
            vec![Action::SendToController("app".into())],
        )
    }

    #[test]
    fn test_union_preserves_order() {
        let a = Policy::from(vec![punt(1), punt(2)]);
        let b = Policy::from(vec![punt(3)]);
        let all = Policy::union([a, b]);

        let switches: Vec<u64> = all.rules().iter().map(|r| r.switch.as_u64()).collect();
        assert_eq!(switches, vec![1, 2, 3]);
    }

    #[test]
    fn test_rules_for_switch() {
        let policy: Policy = vec![punt(1), punt(2), punt(1)].into_iter().collect();
        assert_eq!(policy.rules_for(SwitchId::new(1)).count(), 2);
        assert_eq!(policy.rules_for(SwitchId::new(9)).count(), 0);
    }

    #[test]
    fn test_ip4_match_pins_ethertype() {
        let m = Match::any().ip4(Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 100));
        assert_eq!(m.eth_type, Some(ETH_TYPE_IPV4));
        assert!(!m.is_wildcard());
        assert!(Match::any().is_wildcard());
    }

    #[test]
    fn test_rule_json_shape() {
        let rule = Rule::new(
            SwitchId::new(1),
            10,
            Match::any().in_port(PortId::new(1)),
            vec![Action::Output(PortId::new(2))],
        );
        let json = serde_json::to_value(&rule).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "switch": 1,
                "priority": 10,
                "match": { "in_port": 1 },
                "actions": [ { "type": "output", "value": 2 } ]
            })
        );
    }
}
