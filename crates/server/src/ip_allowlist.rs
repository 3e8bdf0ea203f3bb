//! Flat IP allow-list for the document handler's step-4 gate. A CIDR
//! block is handled by simple prefix arithmetic over the address's own
//! integer representation rather than pulling in a dedicated CIDR
//! crate — the teacher/pack never reach for one, and a handful of
//! allow-listed ranges doesn't need general-purpose subnet math.

use std::net::IpAddr;

#[derive(Debug, Clone, Copy)]
pub enum IpRange {
    V4 { network: u32, prefix_len: u32 },
    V6 { network: u128, prefix_len: u32 },
}

#[derive(Debug, thiserror::Error)]
#[error("invalid CIDR entry: {0}")]
pub struct ParseRangeError(pub String);

impl IpRange {
    pub fn parse(entry: &str) -> Result<Self, ParseRangeError> {
        let (addr_part, prefix_part) = match entry.split_once('/') {
            Some((a, p)) => (a, Some(p)),
            None => (entry, None),
        };
        let addr: IpAddr = addr_part
            .parse()
            .map_err(|_| ParseRangeError(entry.to_string()))?;
        match addr {
            IpAddr::V4(v4) => {
                let prefix_len = prefix_part
                    .map(|p| p.parse::<u32>())
                    .transpose()
                    .map_err(|_| ParseRangeError(entry.to_string()))?
                    .unwrap_or(32);
                if prefix_len > 32 {
                    return Err(ParseRangeError(entry.to_string()));
                }
                Ok(IpRange::V4 {
                    network: mask_v4(u32::from(v4), prefix_len),
                    prefix_len,
                })
            }
            IpAddr::V6(v6) => {
                let prefix_len = prefix_part
                    .map(|p| p.parse::<u32>())
                    .transpose()
                    .map_err(|_| ParseRangeError(entry.to_string()))?
                    .unwrap_or(128);
                if prefix_len > 128 {
                    return Err(ParseRangeError(entry.to_string()));
                }
                Ok(IpRange::V6 {
                    network: mask_v6(u128::from(v6), prefix_len),
                    prefix_len,
                })
            }
        }
    }

    pub fn contains(&self, addr: IpAddr) -> bool {
        match (self, addr) {
            (IpRange::V4 { network, prefix_len }, IpAddr::V4(v4)) => {
                mask_v4(u32::from(v4), *prefix_len) == *network
            }
            (IpRange::V6 { network, prefix_len }, IpAddr::V6(v6)) => {
                mask_v6(u128::from(v6), *prefix_len) == *network
            }
            _ => false,
        }
    }
}

fn mask_v4(addr: u32, prefix_len: u32) -> u32 {
    if prefix_len == 0 {
        0
    } else {
        addr & (u32::MAX << (32 - prefix_len))
    }
}

fn mask_v6(addr: u128, prefix_len: u32) -> u128 {
    if prefix_len == 0 {
        0
    } else {
        addr & (u128::MAX << (128 - prefix_len))
    }
}

#[derive(Debug, Clone, Default)]
pub struct IpAllowList {
    ranges: Vec<IpRange>,
}

impl IpAllowList {
    pub fn parse(entries: &[String]) -> Result<Self, ParseRangeError> {
        let ranges = entries
            .iter()
            .map(|e| IpRange::parse(e))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { ranges })
    }

    /// An empty list permits everything — the allow-list is opt-in.
    pub fn is_allowed(&self, addr: IpAddr) -> bool {
        self.ranges.is_empty() || self.ranges.iter().any(|r| r.contains(addr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_allowlist_permits_everything() {
        let list = IpAllowList::default();
        assert!(list.is_allowed("10.0.0.1".parse().unwrap()));
    }

    #[test]
    fn single_host_entry_matches_only_itself() {
        let list = IpAllowList::parse(&["10.0.0.5".to_string()]).unwrap();
        assert!(list.is_allowed("10.0.0.5".parse().unwrap()));
        assert!(!list.is_allowed("10.0.0.6".parse().unwrap()));
    }

    #[test]
    fn cidr_entry_matches_whole_block() {
        let list = IpAllowList::parse(&["192.168.1.0/24".to_string()]).unwrap();
        assert!(list.is_allowed("192.168.1.200".parse().unwrap()));
        assert!(!list.is_allowed("192.168.2.1".parse().unwrap()));
    }

    #[test]
    fn v6_cidr_entry_matches_prefix() {
        let list = IpAllowList::parse(&["2001:db8::/32".to_string()]).unwrap();
        assert!(list.is_allowed("2001:db8::1".parse().unwrap()));
        assert!(!list.is_allowed("2001:db9::1".parse().unwrap()));
    }

    #[test]
    fn malformed_entry_is_rejected() {
        assert!(IpRange::parse("not-an-ip").is_err());
        assert!(IpRange::parse("10.0.0.1/99").is_err());
    }
}
