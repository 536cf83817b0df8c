//! IPv4 address and mask parsing
//!
//! Textual input from the shell and the topology file is validated here
//! before it reaches the route table or the policy trie.

use crate::{Error, Result};
use std::net::Ipv4Addr;

/// Parse a dotted-quad address: exactly four octets, each 0-255.
pub fn parse_ipv4(s: &str) -> Result<Ipv4Addr> {
    let octets = parse_octets(s).ok_or_else(|| Error::InvalidAddress(s.to_string()))?;
    Ok(Ipv4Addr::from(octets))
}

/// Parse a prefix length (integer 0-32).
pub fn parse_prefix_len(s: &str) -> Result<u8> {
    match s.trim().parse::<u8>() {
        Ok(len) if len <= 32 => Ok(len),
        _ => Err(Error::InvalidMask(s.to_string())),
    }
}

/// Parse a netmask.
///
/// Accepts a dotted four-octet mask (`255.255.0.0`, contiguity is not
/// required) or a bare prefix length (`16`) which is expanded to the
/// contiguous mask.
pub fn parse_netmask(s: &str) -> Result<Ipv4Addr> {
    if s.contains('.') {
        let octets = parse_octets(s).ok_or_else(|| Error::InvalidMask(s.to_string()))?;
        Ok(Ipv4Addr::from(octets))
    } else {
        parse_prefix_len(s).map(mask_from_len)
    }
}

/// Contiguous mask with the top `len` bits set.
pub fn mask_from_len(len: u8) -> Ipv4Addr {
    let bits = if len == 0 {
        0
    } else {
        !0u32 << (32 - u32::from(len.min(32)))
    };
    Ipv4Addr::from(bits)
}

fn parse_octets(s: &str) -> Option<[u8; 4]> {
    let parts: Vec<&str> = s.trim().split('.').collect();
    if parts.len() != 4 {
        return None;
    }

    let mut octets = [0u8; 4];
    for (slot, part) in octets.iter_mut().zip(parts) {
        if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        *slot = part.parse().ok()?;
    }
    Some(octets)
}
