//! Full binary prefix tree: one edge per bit, no path compression.
//!
//! Grounded on the node-shape conventions of the teacher crate's
//! `tree/mod.rs` (`Node`/two-child-slots, boxed recursion, panic-safe
//! `mem::take`-based mutation) but without the generic `TreeProperties`
//! machinery: nodes here always carry a plain `Vec<Route>` rather than a
//! generic leaf/inner value split, since the spec's binary tree has no
//! leaf-merging or path compression at all (§4.2).

use std::marker::PhantomData;

use log::{debug, trace};

use crate::error::Error;
use crate::family::{format_masked, Family, UintBits};
use crate::order::{sort_ascending, sort_descending_length};
use crate::route::{matches_filter, remove_matching, AttrMap, Route};

#[derive(Debug)]
struct Node {
	children: [Option<Box<Node>>; 2],
	routes: Vec<Route>,
}

impl Node {
	fn new() -> Self {
		Node {
			children: [None, None],
			routes: Vec::new(),
		}
	}

	fn is_empty(&self) -> bool {
		self.routes.is_empty() && self.children[0].is_none() && self.children[1].is_none()
	}

	fn find_exact(&self, bits: u128, depth: u32, target_len: u32) -> Option<&Node> {
		if depth == target_len {
			return Some(self);
		}
		let side = bit_side(bits, depth);
		self.children[side].as_deref()?.find_exact(bits, depth + 1, target_len)
	}

	fn collect_all(&self, filter: &AttrMap, out: &mut Vec<Route>) {
		out.extend(self.routes.iter().filter(|r| matches_filter(r, filter)).cloned());
		for child in self.children.iter().flatten() {
			child.collect_all(filter, out);
		}
	}

	fn collect_match(&self, bits: u128, depth: u32, target_len: u32, filter: &AttrMap, out: &mut Vec<Route>) {
		out.extend(self.routes.iter().filter(|r| matches_filter(r, filter)).cloned());
		if depth == target_len {
			return;
		}
		let side = bit_side(bits, depth);
		if let Some(child) = &self.children[side] {
			child.collect_match(bits, depth + 1, target_len, filter, out);
		}
	}

	fn collect_wildcard(
		&self,
		addr: u128,
		wildcard: u128,
		depth: u32,
		max_depth: u32,
		filter: &AttrMap,
		out: &mut Vec<Route>,
	) {
		out.extend(self.routes.iter().filter(|r| matches_filter(r, filter)).cloned());
		if depth == max_depth {
			return;
		}
		let dont_care = bit_side(wildcard, depth) == 1;
		if dont_care {
			for child in self.children.iter().flatten() {
				child.collect_wildcard(addr, wildcard, depth + 1, max_depth, filter, out);
			}
		} else {
			let side = bit_side(addr, depth);
			if let Some(child) = &self.children[side] {
				child.collect_wildcard(addr, wildcard, depth + 1, max_depth, filter, out);
			}
		}
	}

	fn collect_descendants(&self, filter: &AttrMap, out: &mut Vec<Route>) {
		for child in self.children.iter().flatten() {
			child.collect_all(filter, out);
		}
	}

	/// Returns `true` if `self` became empty and the caller should prune it.
	fn delete_at(
		&mut self,
		bits: u128,
		depth: u32,
		target_len: u32,
		filter: &AttrMap,
		out: &mut Vec<Route>,
	) -> bool {
		if depth == target_len {
			remove_matching(&mut self.routes, filter, out);
		} else {
			let side = bit_side(bits, depth);
			if let Some(child) = &mut self.children[side] {
				if child.delete_at(bits, depth + 1, target_len, filter, out) {
					self.children[side] = None;
				}
			}
		}
		self.is_empty()
	}

	/// Filtered removal over this node and its whole subtree; returns
	/// whether `self` became empty.
	fn flush_subtree(&mut self, filter: &AttrMap, out: &mut Vec<Route>) -> bool {
		remove_matching(&mut self.routes, filter, out);
		for side in 0..2 {
			if let Some(child) = &mut self.children[side] {
				if child.flush_subtree(filter, out) {
					self.children[side] = None;
				}
			}
		}
		self.is_empty()
	}
}

#[inline]
fn bit_side(bits: u128, i: u32) -> usize {
	usize::from(bits.bit_at(i))
}

/// Full binary prefix tree over one address family (§4.2).
///
/// `IPPrefixTree` ([`crate::IPPrefixTree`]) is this tree bound to
/// [`crate::family::Ipv4`].
#[derive(Debug)]
pub struct BinaryTree<F: Family> {
	root: Option<Box<Node>>,
	len: usize,
	next_seq: u64,
	_family: PhantomData<F>,
}

impl<F: Family> Default for BinaryTree<F> {
	fn default() -> Self {
		Self::new()
	}
}

impl<F: Family> BinaryTree<F> {
	/// New, empty tree.
	pub fn new() -> Self {
		BinaryTree {
			root: None,
			len: 0,
			next_seq: 0,
			_family: PhantomData,
		}
	}

	/// Number of [`Route`] records stored in the tree.
	pub fn len(&self) -> usize {
		self.len
	}

	/// Whether the tree holds no routes.
	pub fn is_empty(&self) -> bool {
		self.len == 0
	}

	/// Insert a new route at `prefix` with the given attributes (§4.2
	/// "Insert"). No deduplication: inserting the same `(prefix, attrs)`
	/// twice yields two distinct routes at the same node.
	pub fn add(&mut self, prefix: &str, attrs: AttrMap) -> Result<Route, Error> {
		let (bits, prefix_len) = F::parse_prefix(prefix)?;
		let bits = bits.mask_to_len(prefix_len).to_u128();
		let canonical = format_masked::<F>(bits, prefix_len);

		let seq = self.next_seq;
		self.next_seq += 1;
		let route = Route::new(canonical, attrs, seq, bits, prefix_len);

		let mut node = self.root.get_or_insert_with(|| Box::new(Node::new()));
		for depth in 0..prefix_len {
			let side = bit_side(bits, depth);
			node = node.children[side].get_or_insert_with(|| Box::new(Node::new()));
		}
		node.routes.push(route.clone());
		self.len += 1;
		trace!("binary tree: inserted {route}");
		Ok(route)
	}

	/// Longest-match lookup (§4.2 "Longest match"). `query` may be a bare
	/// address (treated as full width) or an explicit `"address/len"`.
	pub fn get(&self, query: &str, filter: &AttrMap) -> Result<Vec<Route>, Error> {
		let (bits, query_len) = F::parse_prefix(query)?;
		let bits = bits.to_u128();
		let Some(root) = &self.root else {
			return Ok(Vec::new());
		};

		let mut best: Option<&Node> = None;
		let mut current = root.as_ref();
		let mut depth = 0;
		loop {
			if !current.routes.is_empty() {
				best = Some(current);
			}
			if depth == query_len {
				break;
			}
			let side = bit_side(bits, depth);
			match &current.children[side] {
				Some(child) => {
					current = child.as_ref();
					depth += 1;
				},
				None => break,
			}
		}

		let mut out = match best {
			Some(node) => node.routes.iter().filter(|r| matches_filter(r, filter)).cloned().collect(),
			None => Vec::new(),
		};
		sort_ascending(&mut out);
		Ok(out)
	}

	/// Whether `address` resolves to at least one route (`address in tree`).
	pub fn contains(&self, address: &str) -> Result<bool, Error> {
		Ok(!self.get(address, &AttrMap::new())?.is_empty())
	}

	/// `show` with no prefix: every route in the tree, filtered and sorted
	/// (§4.2 "Exact").
	pub fn show_all(&self, filter: &AttrMap) -> Vec<Route> {
		let mut out = Vec::new();
		if let Some(root) = &self.root {
			root.collect_all(filter, &mut out);
		}
		sort_ascending(&mut out);
		out
	}

	/// `show(prefix, as_root=False)`: routes attached exactly at `prefix`,
	/// or `[]` if the node is absent or carries no routes.
	pub fn show_exact(&self, prefix: &str, filter: &AttrMap) -> Result<Vec<Route>, Error> {
		let (bits, prefix_len) = F::parse_prefix(prefix)?;
		let bits = bits.mask_to_len(prefix_len).to_u128();
		let Some(root) = &self.root else {
			return Ok(Vec::new());
		};
		let mut out = match root.find_exact(bits, 0, prefix_len) {
			Some(node) => node.routes.iter().filter(|r| matches_filter(r, filter)).cloned().collect(),
			None => Vec::new(),
		};
		sort_ascending(&mut out);
		Ok(out)
	}

	/// `show(prefix, as_root=True)`: the node at `prefix` (whether or not it
	/// carries routes) plus every route in its subtree, filtered and sorted.
	/// Fails with [`Error::UnknownPrefix`] if no node exists at that bit
	/// path at all.
	pub fn show_subtree(&self, prefix: &str, filter: &AttrMap) -> Result<Vec<Route>, Error> {
		let (bits, prefix_len) = F::parse_prefix(prefix)?;
		let bits = bits.mask_to_len(prefix_len).to_u128();
		let canonical = format_masked::<F>(bits, prefix_len);
		let node = self
			.root
			.as_deref()
			.and_then(|root| root.find_exact(bits, 0, prefix_len))
			.ok_or_else(|| Error::unknown_prefix(canonical.clone()))?;
		let mut out = Vec::new();
		node.collect_all(filter, &mut out);
		sort_ascending(&mut out);
		Ok(out)
	}

	/// Routes of the first ancestor of `prefix` that carries routes (§4.2
	/// "parent"). Returns `[]` if `prefix` is absent, carries no routes
	/// itself, or has no covering ancestor.
	pub fn parent(&self, prefix: &str, filter: &AttrMap) -> Result<Vec<Route>, Error> {
		let (bits, prefix_len) = F::parse_prefix(prefix)?;
		let bits = bits.mask_to_len(prefix_len).to_u128();
		let Some(root) = &self.root else {
			return Ok(Vec::new());
		};

		// Walk down recording every visited node on the path, then confirm
		// the target node itself exists and carries routes before walking
		// back up (§9: "upward walks can use a stack recorded during
		// descent").
		let mut path = Vec::new();
		let mut current = root.as_ref();
		let mut depth = 0;
		path.push(current);
		while depth < prefix_len {
			let side = bit_side(bits, depth);
			match &current.children[side] {
				Some(child) => {
					current = child.as_ref();
					path.push(current);
					depth += 1;
				},
				None => return Ok(Vec::new()),
			}
		}
		if current.routes.is_empty() {
			return Ok(Vec::new());
		}

		for ancestor in path[..path.len() - 1].iter().rev() {
			if !ancestor.routes.is_empty() {
				let mut out: Vec<Route> = ancestor
					.routes
					.iter()
					.filter(|r| matches_filter(r, filter))
					.cloned()
					.collect();
				sort_ascending(&mut out);
				return Ok(out);
			}
		}
		Ok(Vec::new())
	}

	/// Routes of every strict descendant of `prefix` that carries routes,
	/// excluding `prefix` itself (§4.2 "children"). Fails with
	/// [`Error::UnknownPrefix`] if no node exists at `prefix`.
	pub fn children(&self, prefix: &str, filter: &AttrMap) -> Result<Vec<Route>, Error> {
		let (bits, prefix_len) = F::parse_prefix(prefix)?;
		let bits = bits.mask_to_len(prefix_len).to_u128();
		let canonical = format_masked::<F>(bits, prefix_len);
		let node = self
			.root
			.as_deref()
			.and_then(|root| root.find_exact(bits, 0, prefix_len))
			.ok_or_else(|| Error::unknown_prefix(canonical.clone()))?;
		let mut out = Vec::new();
		node.collect_descendants(filter, &mut out);
		sort_ascending(&mut out);
		Ok(out)
	}

	/// Every route whose prefix is a proper prefix of, or equal to, `query`
	/// (§4.2 "match").
	pub fn match_(&self, query: &str, filter: &AttrMap) -> Result<Vec<Route>, Error> {
		let (bits, query_len) = F::parse_prefix(query)?;
		let bits = bits.to_u128();
		let mut out = Vec::new();
		if let Some(root) = &self.root {
			root.collect_match(bits, 0, query_len, filter, &mut out);
		}
		sort_ascending(&mut out);
		Ok(out)
	}

	/// Wildcard-mask match (§4.2 "wcmatch"): a set wildcard bit means
	/// "don't care" at that position, descending into both children.
	pub fn wcmatch(&self, address: &str, wildcard: &str, filter: &AttrMap) -> Result<Vec<Route>, Error> {
		let (addr_bits, _) = F::parse_prefix(address)?;
		let (wc_bits, _) = F::parse_prefix(wildcard)?;
		let addr_bits = addr_bits.to_u128();
		let wc_bits = wc_bits.to_u128();
		let mut out = Vec::new();
		if let Some(root) = &self.root {
			root.collect_wildcard(addr_bits, wc_bits, 0, F::WIDTH, filter, &mut out);
		}
		sort_ascending(&mut out);
		Ok(out)
	}

	/// Remove routes at `prefix` (all of them if `filter` is empty,
	/// otherwise only those whose attributes are a superset of `filter`),
	/// then prune any ancestor left with no routes and no descendants
	/// (§4.2 "delete"). Fails with [`Error::UnknownPrefix`] if `prefix` is
	/// absent.
	pub fn delete(&mut self, prefix: &str, filter: &AttrMap) -> Result<Vec<Route>, Error> {
		let (bits, prefix_len) = F::parse_prefix(prefix)?;
		let bits = bits.mask_to_len(prefix_len).to_u128();
		let canonical = format_masked::<F>(bits, prefix_len);

		let Some(root) = &self.root else {
			return Err(Error::unknown_prefix(canonical.clone()));
		};
		if root.find_exact(bits, 0, prefix_len).is_none() {
			return Err(Error::unknown_prefix(canonical.clone()));
		}

		let mut out = Vec::new();
		let root_mut = self.root.as_mut().unwrap();
		let root_empty = root_mut.delete_at(bits, 0, prefix_len, filter, &mut out);
		if root_empty {
			self.root = None;
		}
		self.len -= out.len();
		debug!("binary tree: deleted {} route(s) at {canonical}", out.len());
		Ok(out)
	}

	/// Empty the whole tree (`prefix=None, attrs` empty), or remove every
	/// route passing `filter` and prune empty subtrees (`prefix=None,
	/// attrs` non-empty), or the same restricted to the subtree rooted at
	/// `prefix` (`prefix=Some`, including that node). Never fails — a
	/// missing `prefix` or route-free tree is simply a no-op (§4.2
	/// "flush").
	pub fn flush(&mut self, prefix: Option<&str>, filter: &AttrMap) -> Result<Vec<Route>, Error> {
		let Some(prefix) = prefix else {
			if filter.is_empty() {
				let removed = self.len;
				self.root = None;
				self.len = 0;
				debug!("binary tree: flushed entire tree ({removed} route(s))");
				return Ok(Vec::new());
			}
			let mut out = Vec::new();
			if let Some(root) = &mut self.root {
				if root.flush_subtree(filter, &mut out) {
					self.root = None;
				}
			}
			self.len -= out.len();
			return Ok(out);
		};

		let (bits, prefix_len) = F::parse_prefix(prefix)?;
		let bits = bits.mask_to_len(prefix_len).to_u128();
		let mut out = Vec::new();
		let Some(root) = &mut self.root else {
			return Ok(out);
		};
		if prefix_len == 0 {
			if root.flush_subtree(filter, &mut out) {
				self.root = None;
			}
			self.len -= out.len();
			return Ok(out);
		}
		// descend to the exact node's parent to allow pruning it away
		let mut current = root.as_mut();
		for depth in 0..prefix_len - 1 {
			let side = bit_side(bits, depth);
			match &mut current.children[side] {
				Some(child) => current = child.as_mut(),
				None => return Ok(out),
			}
		}
		let side = bit_side(bits, prefix_len - 1);
		if let Some(child) = &mut current.children[side] {
			if child.flush_subtree(filter, &mut out) {
				current.children[side] = None;
			}
		}
		self.len -= out.len();
		Ok(out)
	}
}

impl<F: Family> IntoIterator for &BinaryTree<F> {
	type Item = Route;
	type IntoIter = std::vec::IntoIter<Route>;

	/// Iterate all routes in descending prefix-length order, insertion
	/// order breaking ties (§4.2 "Iteration").
	fn into_iter(self) -> Self::IntoIter {
		let mut out = self.show_all(&AttrMap::new());
		sort_descending_length(&mut out);
		out.into_iter()
	}
}
