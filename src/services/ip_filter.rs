//! IP allowlist matching
//!
//! Entries are exact addresses (`192.168.1.10`, `::1`) or CIDR blocks
//! (`10.0.0.0/8`, `fd00::/8`). IPv4-mapped IPv6 clients match IPv4 rules.

use std::net::IpAddr;

/// Error raised for an unparseable allowlist entry
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IpRuleError {
    #[error("invalid IP address '{0}'")]
    InvalidAddress(String),
    #[error("invalid CIDR prefix in '{0}'")]
    InvalidPrefix(String),
}

/// A single allowlist entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpRule {
    Exact(IpAddr),
    Cidr { network: IpAddr, prefix: u8 },
}

impl IpRule {
    /// Parse an exact address or a CIDR block
    pub fn parse(entry: &str) -> Result<Self, IpRuleError> {
        let entry = entry.trim();
        match entry.split_once('/') {
            Some((address, prefix)) => {
                let network: IpAddr = address
                    .trim()
                    .parse()
                    .map_err(|_| IpRuleError::InvalidAddress(entry.to_string()))?;
                let network = network.to_canonical();
                let prefix: u8 = prefix
                    .trim()
                    .parse()
                    .map_err(|_| IpRuleError::InvalidPrefix(entry.to_string()))?;
                let max = if network.is_ipv4() { 32 } else { 128 };
                if prefix > max {
                    return Err(IpRuleError::InvalidPrefix(entry.to_string()));
                }
                Ok(Self::Cidr { network, prefix })
            }
            None => entry
                .parse::<IpAddr>()
                .map(|ip| Self::Exact(ip.to_canonical()))
                .map_err(|_| IpRuleError::InvalidAddress(entry.to_string())),
        }
    }

    /// Whether `ip` is covered by this rule
    pub fn matches(&self, ip: IpAddr) -> bool {
        let ip = ip.to_canonical();
        match *self {
            Self::Exact(allowed) => allowed == ip,
            Self::Cidr { network, prefix } => match (network, ip) {
                (IpAddr::V4(net), IpAddr::V4(addr)) => {
                    let mask = if prefix == 0 {
                        0
                    } else {
                        u32::MAX << (32 - u32::from(prefix))
                    };
                    (u32::from(net) & mask) == (u32::from(addr) & mask)
                }
                (IpAddr::V6(net), IpAddr::V6(addr)) => {
                    let mask = if prefix == 0 {
                        0
                    } else {
                        u128::MAX << (128 - u32::from(prefix))
                    };
                    (u128::from(net) & mask) == (u128::from(addr) & mask)
                }
                _ => false,
            },
        }
    }
}

/// Parsed allowlist; an empty list admits every client
#[derive(Debug, Clone, Default)]
pub struct IpAllowlist {
    rules: Vec<IpRule>,
}

impl IpAllowlist {
    pub fn from_entries<S: AsRef<str>>(entries: &[S]) -> Result<Self, IpRuleError> {
        let rules = entries
            .iter()
            .map(|e| e.as_ref())
            .filter(|e| !e.trim().is_empty())
            .map(IpRule::parse)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rules })
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Check a client address; an unknown address only passes an empty list
    pub fn allows(&self, ip: Option<IpAddr>) -> bool {
        if self.rules.is_empty() {
            return true;
        }
        match ip {
            Some(ip) => self.rules.iter().any(|rule| rule.matches(ip)),
            None => false,
        }
    }
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;
    use std::net::Ipv4Addr;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        #[test]
        fn cidr_contains_its_own_network(addr in any::<u32>(), prefix in 0u8..=32) {
            let network = Ipv4Addr::from(addr);
            let rule = IpRule::parse(&format!("{}/{}", network, prefix)).unwrap();
            prop_assert!(rule.matches(IpAddr::V4(network)));
        }

        #[test]
        fn slash_32_is_exact(a in any::<u32>(), b in any::<u32>()) {
            let rule = IpRule::parse(&format!("{}/32", Ipv4Addr::from(a))).unwrap();
            prop_assert_eq!(rule.matches(IpAddr::V4(Ipv4Addr::from(b))), a == b);
        }

        #[test]
        fn exact_rule_matches_only_itself(a in any::<u32>(), b in any::<u32>()) {
            let rule = IpRule::parse(&Ipv4Addr::from(a).to_string()).unwrap();
            prop_assert_eq!(rule.matches(IpAddr::V4(Ipv4Addr::from(b))), a == b);
        }
    }
}
