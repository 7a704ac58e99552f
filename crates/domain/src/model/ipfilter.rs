use std::net::IpAddr;

use chrono::{DateTime, Utc};
use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// IP filter rules
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IpRuleKind {
    Allow,
    Deny,
}

/// One allow/deny rule over a CIDR block or single address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpRule {
    pub id: Uuid,
    /// CIDR (`10.0.0.0/8`) or single address (`203.0.113.9`).
    pub cidr: String,
    pub kind: IpRuleKind,
    #[serde(default)]
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl IpRule {
    /// Parse `cidr` into a network; a bare address becomes a /32 (or
    /// /128) host route.
    pub fn network(&self) -> Option<IpNet> {
        if let Ok(net) = self.cidr.parse::<IpNet>() {
            return Some(net);
        }
        self.cidr.parse::<IpAddr>().ok().map(IpNet::from)
    }

    pub fn matches(&self, ip: IpAddr) -> bool {
        self.network().map(|net| net.contains(&ip)).unwrap_or(false)
    }
}

/// Evaluate the full ruleset against one address.
///
/// Policy: any matching deny rejects; otherwise, if allow rules exist the
/// address must match one of them; otherwise accept.
pub fn evaluate_rules(rules: &[IpRule], ip: IpAddr) -> bool {
    let mut has_allow = false;
    let mut allowed = false;
    for rule in rules {
        match rule.kind {
            IpRuleKind::Deny => {
                if rule.matches(ip) {
                    return false;
                }
            }
            IpRuleKind::Allow => {
                has_allow = true;
                if rule.matches(ip) {
                    allowed = true;
                }
            }
        }
    }
    !has_allow || allowed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(cidr: &str, kind: IpRuleKind) -> IpRule {
        IpRule {
            id: Uuid::new_v4(),
            cidr: cidr.to_string(),
            kind,
            description: String::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn empty_ruleset_accepts() {
        assert!(evaluate_rules(&[], "198.51.100.7".parse().unwrap()));
    }

    #[test]
    fn deny_wins_over_allow() {
        let rules = vec![
            rule("198.51.100.0/24", IpRuleKind::Allow),
            rule("198.51.100.7", IpRuleKind::Deny),
        ];
        assert!(!evaluate_rules(&rules, "198.51.100.7".parse().unwrap()));
        assert!(evaluate_rules(&rules, "198.51.100.8".parse().unwrap()));
    }

    #[test]
    fn allowlist_mode_rejects_unlisted() {
        let rules = vec![rule("10.0.0.0/8", IpRuleKind::Allow)];
        assert!(evaluate_rules(&rules, "10.1.2.3".parse().unwrap()));
        assert!(!evaluate_rules(&rules, "192.0.2.1".parse().unwrap()));
    }

    #[test]
    fn bare_address_is_host_route() {
        let rules = vec![rule("192.0.2.1", IpRuleKind::Deny)];
        assert!(!evaluate_rules(&rules, "192.0.2.1".parse().unwrap()));
        assert!(evaluate_rules(&rules, "192.0.2.2".parse().unwrap()));
    }
}
