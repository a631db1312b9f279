//! End-to-end scenarios (spec §8) plus a structural equivalence check
//! between the two tree algorithms bound to the same family.

use ip_rib::family::Ipv4;
use ip_rib::{AttrMap, AttrValue, BinaryTree, IPPrefixTree, IPRadixTree, PatriciaTree};

mod common {
	use std::io::Write;

	pub fn init() {
		let _ = env_logger::builder()
			.format(|buf, record| writeln!(buf, "{}", record.args()))
			.is_test(true)
			.try_init();
	}
}

fn attrs(pairs: &[(&str, &str)]) -> AttrMap {
	pairs.iter().map(|(k, v)| ((*k).to_owned(), AttrValue::from(*v))).collect()
}

/// S1: an empty tree answers every query as empty, with zero length.
#[test]
fn s1_empty_tree() {
	common::init();
	let rib = IPPrefixTree::new();
	assert!(rib.get("1.2.3.4", &AttrMap::new()).unwrap().is_empty());
	assert_eq!(rib.len(), 0);
	assert!(!rib.contains("1.2.3.4").unwrap());
}

/// S2: longest match returns the most specific covering route.
#[test]
fn s2_longest_match() {
	let mut rib = IPPrefixTree::new();
	rib.add("192.168.1.0/24", attrs(&[("via", "10.0.0.1")])).unwrap();
	rib.add("192.168.1.0/25", AttrMap::new()).unwrap();

	let narrow = rib.get("192.168.1.1", &AttrMap::new()).unwrap();
	assert_eq!(narrow.len(), 1);
	assert_eq!(narrow[0].prefix(), "192.168.1.0/25");

	let wide = rib.get("192.168.1.128", &AttrMap::new()).unwrap();
	assert_eq!(wide.len(), 1);
	assert_eq!(wide[0].prefix(), "192.168.1.0/24");
	assert_eq!(wide[0].get("via"), Some(&AttrValue::from("10.0.0.1")));
}

/// S3: a prefix can carry several distinct routes, filterable by attribute.
#[test]
fn s3_multiple_routes_at_one_prefix() {
	let mut rib = IPPrefixTree::new();
	rib.add("192.168.1.0/24", attrs(&[("via", "10.0.0.1")])).unwrap();
	rib.add("192.168.1.0/24", attrs(&[("via", "10.0.0.2")])).unwrap();

	assert_eq!(rib.get("192.168.1.128", &AttrMap::new()).unwrap().len(), 2);

	let filtered = rib.get("192.168.1.128", &attrs(&[("via", "10.0.0.2")])).unwrap();
	assert_eq!(filtered.len(), 1);
	assert_eq!(filtered[0].get("via"), Some(&AttrValue::from("10.0.0.2")));
}

/// S4: `show(prefix, as_root=True)` enumerates a subtree, ascending order.
#[test]
fn s4_subtree_show() {
	let mut rib = IPPrefixTree::new();
	rib.add("192.168.1.0/24", AttrMap::new()).unwrap();
	rib.add("192.168.1.0/25", AttrMap::new()).unwrap();
	rib.add("192.168.1.0/26", AttrMap::new()).unwrap();
	rib.add("192.168.1.0/27", AttrMap::new()).unwrap();

	let subtree = rib.show_subtree("192.168.1.0/25", &AttrMap::new()).unwrap();
	let prefixes: Vec<&str> = subtree.iter().map(|r| r.prefix()).collect();
	assert_eq!(prefixes, vec!["192.168.1.0/25", "192.168.1.0/26", "192.168.1.0/27"]);
}

/// S5: a wildcard mask with don't-care bits matches several sibling prefixes.
#[test]
fn s5_wildcard_match() {
	let mut rib = IPPrefixTree::new();
	rib.add("192.168.0.0/23", AttrMap::new()).unwrap();
	rib.add("192.168.1.0/24", AttrMap::new()).unwrap();
	rib.add("192.168.2.0/25", AttrMap::new()).unwrap();
	rib.add("192.168.3.0/26", AttrMap::new()).unwrap();
	rib.add("192.168.4.0/27", AttrMap::new()).unwrap();

	let matched = rib.wcmatch("192.168.0.10", "0.0.3.0", &AttrMap::new()).unwrap();
	let prefixes: Vec<&str> = matched.iter().map(|r| r.prefix()).collect();
	assert_eq!(
		prefixes,
		vec![
			"192.168.0.0/23",
			"192.168.1.0/24",
			"192.168.2.0/25",
			"192.168.3.0/26",
		]
	);
}

/// S6: attribute-filtered flush leaves non-matching routes behind; a bare
/// flush then empties the tree.
#[test]
fn s6_attribute_filtered_flush() {
	let mut rib = IPPrefixTree::new();
	rib.add("10.0.0.0/8", attrs(&[("proto", "bgp")])).unwrap();
	rib.add("10.0.0.0/8", attrs(&[("proto", "bgp")])).unwrap();
	rib.add("10.0.0.0/8", attrs(&[("proto", "ospf")])).unwrap();

	let removed = rib.flush(None, &attrs(&[("proto", "bgp")])).unwrap();
	assert_eq!(removed.len(), 2);
	assert_eq!(rib.len(), 1);
	assert_eq!(rib.show_all(&AttrMap::new())[0].get("proto"), Some(&AttrValue::from("ospf")));

	rib.flush(None, &AttrMap::new()).unwrap();
	assert_eq!(rib.len(), 0);
}

/// S7: a PATRICIA insert that diverges mid-label forces a split; all three
/// routes remain reachable afterwards, in ascending order.
#[test]
fn s7_patricia_split() {
	let mut rib6 = IPRadixTree::new();
	rib6.add("2a01:db8::/32", attrs(&[("via", "A")])).unwrap();
	rib6.add("2a01:db8:acad::/48", attrs(&[("via", "B")])).unwrap();
	rib6.add("2a01::/16", attrs(&[("via", "C")])).unwrap();

	let all = rib6.show_all(&AttrMap::new());
	let prefixes: Vec<&str> = all.iter().map(|r| r.prefix()).collect();
	assert_eq!(prefixes, vec!["2a01::/16", "2a01:db8::/32", "2a01:db8:acad::/48"]);

	let matched = rib6.get("2a01:db8:acad::1", &AttrMap::new()).unwrap();
	assert_eq!(matched.len(), 1);
	assert_eq!(matched[0].prefix(), "2a01:db8:acad::/48");
}

/// S8: `parent`/`children` walk the tree structurally.
#[test]
fn s8_parent_children() {
	let mut rib = IPPrefixTree::new();
	rib.add("192.168.1.0/24", AttrMap::new()).unwrap();
	rib.add("192.168.1.0/25", AttrMap::new()).unwrap();
	rib.add("192.168.1.0/26", AttrMap::new()).unwrap();

	let parent = rib.parent("192.168.1.0/26", &AttrMap::new()).unwrap();
	assert_eq!(parent.len(), 1);
	assert_eq!(parent[0].prefix(), "192.168.1.0/25");

	let children = rib.children("192.168.1.0/24", &AttrMap::new()).unwrap();
	let prefixes: Vec<&str> = children.iter().map(|r| r.prefix()).collect();
	assert_eq!(prefixes, vec!["192.168.1.0/25", "192.168.1.0/26"]);

	assert!(rib.children("192.168.1.0/26", &AttrMap::new()).unwrap().is_empty());
}

/// Testable property 8: insert then fully delete the same prefix restores
/// the tree to empty.
#[test]
fn add_then_delete_restores_empty_tree() {
	let mut rib = IPPrefixTree::new();
	rib.add("10.0.0.0/8", AttrMap::new()).unwrap();
	rib.delete("10.0.0.0/8", &AttrMap::new()).unwrap();
	assert_eq!(rib.len(), 0);
	assert!(rib.show_all(&AttrMap::new()).is_empty());
}

/// `delete` on an absent prefix fails with `UnknownPrefix`.
#[test]
fn delete_missing_prefix_is_an_error() {
	let mut rib = IPPrefixTree::new();
	assert!(matches!(
		rib.delete("10.0.0.0/8", &AttrMap::new()),
		Err(ip_rib::Error::UnknownPrefix { .. })
	));
}

/// Testable property 9: `match` is a superset of the longest-match result.
#[test]
fn match_is_a_superset_of_longest_match() {
	let mut rib = IPPrefixTree::new();
	rib.add("10.0.0.0/8", AttrMap::new()).unwrap();
	rib.add("10.1.0.0/16", AttrMap::new()).unwrap();

	let longest = rib.get("10.1.2.3", &AttrMap::new()).unwrap();
	let matched = rib.match_("10.1.2.3/32", &AttrMap::new()).unwrap();
	assert_eq!(matched.len(), 2);
	for route in &longest {
		assert!(matched.iter().any(|r| r.prefix() == route.prefix()));
	}
}

/// Testable property 4 (generic-engine form): `BinaryTree<F>` and
/// `PatriciaTree<F>` instantiated on the same family, fed the same
/// operations, must return the same sorted routes for every query. The
/// public `IPPrefixTree`/`IPRadixTree` aliases pin each algorithm to a
/// different family (§6), so this drives both generic trees directly on
/// IPv4 to compare the algorithms rather than the aliases.
#[test]
fn binary_and_patricia_trees_agree_on_the_same_family() {
	let mut binary: BinaryTree<Ipv4> = BinaryTree::new();
	let mut patricia: PatriciaTree<Ipv4> = PatriciaTree::new();

	let inserts = [
		("10.0.0.0/8", "a"),
		("10.1.0.0/16", "b"),
		("10.1.2.0/24", "c"),
		("10.2.0.0/16", "d"),
		("192.168.0.0/16", "e"),
	];
	for (prefix, tag) in inserts {
		binary.add(prefix, attrs(&[("tag", tag)])).unwrap();
		patricia.add(prefix, attrs(&[("tag", tag)])).unwrap();
	}

	assert_eq!(binary.len(), patricia.len());

	let queries = ["10.1.2.3", "10.2.5.5", "192.168.1.1", "8.8.8.8"];
	for query in queries {
		let from_binary: Vec<String> = binary
			.get(query, &AttrMap::new())
			.unwrap()
			.iter()
			.map(|r| r.prefix().to_owned())
			.collect();
		let from_patricia: Vec<String> = patricia
			.get(query, &AttrMap::new())
			.unwrap()
			.iter()
			.map(|r| r.prefix().to_owned())
			.collect();
		assert_eq!(from_binary, from_patricia, "mismatch for query {query}");
	}

	let mut binary_all: Vec<String> = binary.show_all(&AttrMap::new()).iter().map(|r| r.prefix().to_owned()).collect();
	let mut patricia_all: Vec<String> =
		patricia.show_all(&AttrMap::new()).iter().map(|r| r.prefix().to_owned()).collect();
	binary_all.sort_unstable();
	patricia_all.sort_unstable();
	assert_eq!(binary_all, patricia_all);

	binary.delete("10.1.0.0/16", &AttrMap::new()).unwrap();
	patricia.delete("10.1.0.0/16", &AttrMap::new()).unwrap();
	assert_eq!(binary.len(), patricia.len());
	assert_eq!(
		binary.get("10.1.2.3", &AttrMap::new()).unwrap()[0].prefix(),
		patricia.get("10.1.2.3", &AttrMap::new()).unwrap()[0].prefix()
	);
}
