//! Routing table
//!
//! Routes are kept in an AVL tree ordered by (prefix, mask). Every insert
//! and delete rebalances on the way back to the root, so lookups stay
//! O(log n) and the in-order walk yields the routes sorted.
//!
//! The table is administrative state: the forwarder does not consult it
//! when relaying packets.

use crate::{Error, Result};
use std::cmp::Ordering;
use std::fmt;
use std::net::Ipv4Addr;
use tracing::debug;

/// Ordering key of a route
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RouteKey {
    pub prefix: Ipv4Addr,
    pub mask: u8,
}

/// Route entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteEntry {
    /// Destination network
    pub prefix: Ipv4Addr,
    /// Mask length (0-32)
    pub mask: u8,
    /// Next hop
    pub next_hop: Ipv4Addr,
    /// Route metric
    pub metric: u32,
}

impl RouteEntry {
    pub fn key(&self) -> RouteKey {
        RouteKey {
            prefix: self.prefix,
            mask: self.mask,
        }
    }
}

impl fmt::Display for RouteEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} via {} metric {}",
            self.prefix, self.mask, self.next_hop, self.metric
        )
    }
}

/// Rebalancing case
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    LeftLeft,
    LeftRight,
    RightLeft,
    RightRight,
}

/// Number of rebalancing rotations performed, per case
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RotationCounts {
    pub ll: u64,
    pub lr: u64,
    pub rl: u64,
    pub rr: u64,
}

impl RotationCounts {
    fn record(&mut self, rotation: Rotation) {
        match rotation {
            Rotation::LeftLeft => self.ll += 1,
            Rotation::LeftRight => self.lr += 1,
            Rotation::RightLeft => self.rl += 1,
            Rotation::RightRight => self.rr += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.ll + self.lr + self.rl + self.rr
    }
}

/// Diagnostic snapshot of the table shape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteTableStats {
    pub node_count: usize,
    pub height: u32,
    pub rotations: RotationCounts,
}

impl fmt::Display for RouteTableStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "nodes={} height={} rotations: LL={} LR={} RL={} RR={}",
            self.node_count,
            self.height,
            self.rotations.ll,
            self.rotations.lr,
            self.rotations.rl,
            self.rotations.rr
        )
    }
}

type Link = Option<Box<Node>>;

#[derive(Debug)]
struct Node {
    entry: RouteEntry,
    height: u32,
    left: Link,
    right: Link,
}

impl Node {
    fn leaf(entry: RouteEntry) -> Box<Self> {
        Box::new(Self {
            entry,
            height: 1,
            left: None,
            right: None,
        })
    }

    fn update_height(&mut self) {
        self.height = 1 + height(&self.left).max(height(&self.right));
    }

    fn balance(&self) -> i64 {
        i64::from(height(&self.left)) - i64::from(height(&self.right))
    }
}

fn height(link: &Link) -> u32 {
    link.as_ref().map_or(0, |n| n.height)
}

/// AVL-balanced routing table
#[derive(Debug, Default)]
pub struct RouteTable {
    root: Link,
    len: usize,
    rotations: RotationCounts,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a route, or update next hop and metric of an existing one.
    ///
    /// Returns `true` when a new node was created. Invalid input is rejected
    /// before the tree is touched.
    pub fn insert(
        &mut self,
        prefix: Ipv4Addr,
        mask: u8,
        next_hop: Ipv4Addr,
        metric: u32,
    ) -> Result<bool> {
        validate_mask(mask)?;

        let entry = RouteEntry {
            prefix,
            mask,
            next_hop,
            metric,
        };
        let mut created = false;
        let root = self.root.take();
        self.root = Some(insert_node(root, entry, &mut self.rotations, &mut created));
        if created {
            self.len += 1;
        }

        debug!(
            "Route {}/{} via {} metric {} ({})",
            prefix,
            mask,
            next_hop,
            metric,
            if created { "added" } else { "updated" }
        );
        debug_assert!(self.check_invariants(), "AVL invariant broken by insert");
        Ok(created)
    }

    /// Remove a route. Returns `false` when no such route exists.
    pub fn delete(&mut self, prefix: Ipv4Addr, mask: u8) -> Result<bool> {
        validate_mask(mask)?;

        let key = RouteKey { prefix, mask };
        let mut removed = false;
        let root = self.root.take();
        self.root = delete_node(root, &key, &mut self.rotations, &mut removed);
        if removed {
            self.len -= 1;
            debug!("Route {}/{} removed", prefix, mask);
        }

        debug_assert!(self.check_invariants(), "AVL invariant broken by delete");
        Ok(removed)
    }

    /// Exact-match lookup by (prefix, mask)
    pub fn find(&self, prefix: Ipv4Addr, mask: u8) -> Result<Option<&RouteEntry>> {
        validate_mask(mask)?;

        let key = RouteKey { prefix, mask };
        let mut cursor = self.root.as_deref();
        while let Some(node) = cursor {
            cursor = match key.cmp(&node.entry.key()) {
                Ordering::Less => node.left.as_deref(),
                Ordering::Greater => node.right.as_deref(),
                Ordering::Equal => return Ok(Some(&node.entry)),
            };
        }
        Ok(None)
    }

    /// All routes in ascending key order
    pub fn inorder(&self) -> Vec<RouteEntry> {
        self.iter().copied().collect()
    }

    /// In-order iterator over the routes
    pub fn iter(&self) -> Iter<'_> {
        let mut iter = Iter { stack: Vec::new() };
        iter.push_left(self.root.as_deref());
        iter
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn height(&self) -> u32 {
        height(&self.root)
    }

    pub fn stats(&self) -> RouteTableStats {
        RouteTableStats {
            node_count: self.len,
            height: self.height(),
            rotations: self.rotations,
        }
    }

    /// Hierarchical dump, one `[prefix/mask]` per line.
    ///
    /// Left children use `├── `, right children `└── `.
    pub fn render_tree(&self) -> String {
        let mut out = String::new();
        if let Some(root) = self.root.as_deref() {
            out.push_str(&format!("[{}/{}]\n", root.entry.prefix, root.entry.mask));
            let has_children = root.left.is_some() || root.right.is_some();
            let indent = if has_children { "|   " } else { "    " };
            render_children(root, indent, &mut out);
        }
        out
    }

    /// Verify heights, balance factors, key order and node count.
    pub fn check_invariants(&self) -> bool {
        let mut previous: Option<RouteKey> = None;
        let mut count = 0;
        check_node(self.root.as_deref(), &mut previous, &mut count).is_some() && count == self.len
    }
}

fn validate_mask(mask: u8) -> Result<()> {
    if mask > 32 {
        return Err(Error::InvalidMask(mask.to_string()));
    }
    Ok(())
}

fn insert_node(
    link: Link,
    entry: RouteEntry,
    rotations: &mut RotationCounts,
    created: &mut bool,
) -> Box<Node> {
    let mut node = match link {
        Some(node) => node,
        None => {
            *created = true;
            return Node::leaf(entry);
        }
    };

    match entry.key().cmp(&node.entry.key()) {
        Ordering::Less => {
            node.left = Some(insert_node(node.left.take(), entry, rotations, created));
        }
        Ordering::Greater => {
            node.right = Some(insert_node(node.right.take(), entry, rotations, created));
        }
        Ordering::Equal => {
            node.entry.next_hop = entry.next_hop;
            node.entry.metric = entry.metric;
            return node;
        }
    }

    rebalance(node, rotations)
}

fn delete_node(
    link: Link,
    key: &RouteKey,
    rotations: &mut RotationCounts,
    removed: &mut bool,
) -> Link {
    let mut node = link?;

    match key.cmp(&node.entry.key()) {
        Ordering::Less => node.left = delete_node(node.left.take(), key, rotations, removed),
        Ordering::Greater => node.right = delete_node(node.right.take(), key, rotations, removed),
        Ordering::Equal => {
            *removed = true;
            match (node.left.take(), node.right.take()) {
                (None, None) => return None,
                (Some(child), None) | (None, Some(child)) => return Some(child),
                (Some(left), Some(right)) => {
                    // Replace with the in-order successor
                    let (right, successor) = take_min(right, rotations);
                    node.entry = successor;
                    node.left = Some(left);
                    node.right = right;
                }
            }
        }
    }

    Some(rebalance(node, rotations))
}

/// Detach the minimum entry of a subtree, rebalancing along the left spine.
fn take_min(mut node: Box<Node>, rotations: &mut RotationCounts) -> (Link, RouteEntry) {
    match node.left.take() {
        None => {
            let Node { entry, right, .. } = *node;
            (right, entry)
        }
        Some(left) => {
            let (left, min) = take_min(left, rotations);
            node.left = left;
            (Some(rebalance(node, rotations)), min)
        }
    }
}

fn rebalance(mut node: Box<Node>, rotations: &mut RotationCounts) -> Box<Node> {
    node.update_height();
    let balance = node.balance();

    if balance > 1 {
        if let Some(left) = node.left.take() {
            let rotation = if left.balance() >= 0 {
                Rotation::LeftLeft
            } else {
                Rotation::LeftRight
            };
            node.left = Some(match rotation {
                Rotation::LeftRight => rotate_left(left),
                _ => left,
            });
            rotations.record(rotation);
            return rotate_right(node);
        }
    } else if balance < -1 {
        if let Some(right) = node.right.take() {
            let rotation = if right.balance() <= 0 {
                Rotation::RightRight
            } else {
                Rotation::RightLeft
            };
            node.right = Some(match rotation {
                Rotation::RightLeft => rotate_right(right),
                _ => right,
            });
            rotations.record(rotation);
            return rotate_left(node);
        }
    }

    node
}

fn rotate_right(mut y: Box<Node>) -> Box<Node> {
    match y.left.take() {
        Some(mut x) => {
            y.left = x.right.take();
            y.update_height();
            x.right = Some(y);
            x.update_height();
            x
        }
        None => y,
    }
}

fn rotate_left(mut x: Box<Node>) -> Box<Node> {
    match x.right.take() {
        Some(mut y) => {
            x.right = y.left.take();
            x.update_height();
            y.left = Some(x);
            y.update_height();
            y
        }
        None => x,
    }
}

fn render_children(node: &Node, indent: &str, out: &mut String) {
    if let Some(left) = node.left.as_deref() {
        render_node(left, indent, true, out);
    }
    if let Some(right) = node.right.as_deref() {
        render_node(right, indent, false, out);
    }
}

fn render_node(node: &Node, indent: &str, is_left: bool, out: &mut String) {
    let connector = if is_left { "├── " } else { "└── " };
    out.push_str(&format!(
        "{}{}[{}/{}]\n",
        indent, connector, node.entry.prefix, node.entry.mask
    ));

    let is_leaf = node.left.is_none() && node.right.is_none();
    let extension = if !is_left || is_leaf { "    " } else { "|   " };
    render_children(node, &format!("{}{}", indent, extension), out);
}

/// Returns the subtree height when every node is consistent.
fn check_node(
    node: Option<&Node>,
    previous: &mut Option<RouteKey>,
    count: &mut usize,
) -> Option<u32> {
    let Some(node) = node else {
        return Some(0);
    };

    let left = check_node(node.left.as_deref(), previous, count)?;

    let key = node.entry.key();
    if previous.is_some_and(|prev| prev >= key) {
        return None;
    }
    *previous = Some(key);
    *count += 1;

    let right = check_node(node.right.as_deref(), previous, count)?;

    let expected = 1 + left.max(right);
    let balance = i64::from(left) - i64::from(right);
    if node.height != expected || !(-1..=1).contains(&balance) {
        return None;
    }
    Some(expected)
}

/// In-order iterator, see [`RouteTable::iter`]
pub struct Iter<'a> {
    stack: Vec<&'a Node>,
}

impl<'a> Iter<'a> {
    fn push_left(&mut self, mut node: Option<&'a Node>) {
        while let Some(n) = node {
            self.stack.push(n);
            node = n.left.as_deref();
        }
    }
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a RouteEntry;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.push_left(node.right.as_deref());
        Some(&node.entry)
    }
}
