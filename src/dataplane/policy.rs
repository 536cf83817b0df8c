//! Destination policies
//!
//! A binary trie over the 32 address bits. A policy is attached at the node
//! reached by the first N bits of a prefix, where N is the number of set
//! bits in the mask (the mask does not have to be contiguous). Resolution
//! walks the destination address and keeps the deepest policy seen, which
//! gives longest-prefix-match semantics.

use crate::{Error, Result};
use std::fmt;
use std::net::Ipv4Addr;
use tracing::debug;

const ADDRESS_BITS: usize = 32;

/// Policy attached to a destination prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    /// Drop every packet to the prefix
    Block,
    /// Drop packets arriving with a TTL below the threshold
    MinTtl(u32),
}

impl Policy {
    /// Whether a packet with `ttl` passes this policy
    pub fn permits(&self, ttl: u32) -> bool {
        match *self {
            Policy::Block => false,
            Policy::MinTtl(min) => ttl >= min,
        }
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Policy::Block => write!(f, "block"),
            Policy::MinTtl(n) => write!(f, "ttl-min={}", n),
        }
    }
}

/// Capability used by the forwarder: resolve the policy for a destination.
pub trait PolicyResolver {
    fn resolve(&self, destination: Ipv4Addr) -> Option<Policy>;
}

/// A configured policy as reconstructed from the trie
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyEntry {
    /// Address bits along the path, zero-filled
    pub prefix: Ipv4Addr,
    /// Depth of the node
    pub prefix_len: u8,
    pub policy: Policy,
}

impl fmt::Display for PolicyEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}   {{{}}}",
            self.prefix,
            crate::protocol::addr::mask_from_len(self.prefix_len),
            self.policy
        )
    }
}

#[derive(Debug, Default)]
struct TrieNode {
    children: [Option<Box<TrieNode>>; 2],
    policy: Option<Policy>,
    terminal: bool,
}

/// Binary prefix trie holding destination policies
#[derive(Debug, Default)]
pub struct PolicyTrie {
    root: TrieNode,
    len: usize,
}

impl PolicyTrie {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `policy` to the path selected by `prefix` and `mask`,
    /// replacing any policy already there.
    pub fn set_policy(&mut self, prefix: Ipv4Addr, mask: Ipv4Addr, policy: Policy) -> Result<()> {
        let depth = path_len(prefix, mask)?;
        let bits = u32::from(prefix);

        let mut node = &mut self.root;
        for i in 0..depth {
            let bit = bit_at(bits, i);
            node = node.children[bit].get_or_insert_with(Box::default).as_mut();
        }

        if node.policy.is_none() {
            self.len += 1;
        }
        node.policy = Some(policy);
        node.terminal = true;

        debug!("Policy {} set on {}/{} ({} bits)", policy, prefix, mask, depth);
        Ok(())
    }

    /// Clear the policy on the path selected by `prefix` and `mask`.
    ///
    /// Returns `false`, without touching the trie, when the path does not
    /// exist or carries no policy. Nodes are never pruned.
    pub fn unset_policy(&mut self, prefix: Ipv4Addr, mask: Ipv4Addr) -> Result<bool> {
        let depth = path_len(prefix, mask)?;
        let bits = u32::from(prefix);

        let mut node = &mut self.root;
        for i in 0..depth {
            match node.children[bit_at(bits, i)].as_deref_mut() {
                Some(child) => node = child,
                None => return Ok(false),
            }
        }

        if node.policy.take().is_none() {
            return Ok(false);
        }
        node.terminal = false;
        self.len -= 1;

        debug!("Policy removed from {}/{}", prefix, mask);
        Ok(true)
    }

    /// Longest-prefix-match policy for `address`
    pub fn get_policy(&self, address: Ipv4Addr) -> Option<Policy> {
        let bits = u32::from(address);
        let mut node = &self.root;
        let mut best = node.policy;

        for i in 0..ADDRESS_BITS {
            match node.children[bit_at(bits, i)].as_deref() {
                Some(child) => {
                    node = child;
                    if node.policy.is_some() {
                        best = node.policy;
                    }
                }
                None => break,
            }
        }
        best
    }

    /// Every configured policy, 0-branch before 1-branch
    pub fn entries(&self) -> Vec<PolicyEntry> {
        let mut out = Vec::with_capacity(self.len);
        collect(&self.root, 0, 0, &mut out);
        out
    }

    /// Number of configured policies
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl PolicyResolver for PolicyTrie {
    fn resolve(&self, destination: Ipv4Addr) -> Option<Policy> {
        self.get_policy(destination)
    }
}

/// Path length is the population count of the mask. An empty path would
/// attach the policy to the root and is rejected.
fn path_len(prefix: Ipv4Addr, mask: Ipv4Addr) -> Result<usize> {
    let depth = u32::from(mask).count_ones() as usize;
    if depth == 0 {
        return Err(Error::InvalidMask(format!("{} (no bits set for {})", mask, prefix)));
    }
    Ok(depth)
}

fn bit_at(bits: u32, index: usize) -> usize {
    ((bits >> (ADDRESS_BITS - 1 - index)) & 1) as usize
}

fn collect(node: &TrieNode, path: u32, depth: u8, out: &mut Vec<PolicyEntry>) {
    debug_assert!(usize::from(depth) <= ADDRESS_BITS, "policy trie deeper than 32 bits");

    if let (true, Some(policy)) = (node.terminal, node.policy) {
        let prefix = if depth == 0 {
            0
        } else {
            path << (ADDRESS_BITS - usize::from(depth))
        };
        out.push(PolicyEntry {
            prefix: Ipv4Addr::from(prefix),
            prefix_len: depth,
            policy,
        });
    }

    for (bit, child) in node.children.iter().enumerate() {
        if let Some(child) = child.as_deref() {
            collect(child, (path << 1) | bit as u32, depth + 1, out);
        }
    }
}
