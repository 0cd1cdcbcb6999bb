// crates/payments-mcp/tests/admission.rs
// ============================================================================
// Module: Admission Tests
// Description: Toolset admission over the default payment catalogue.
// Purpose: Validate which catalogue tools a deployment exposes.
// Dependencies: payments-mcp
// ============================================================================

//! Catalogue admission integration tests.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::collections::BTreeSet;

use payments_mcp::Tool;
use payments_mcp::ToolSink;
use payments_mcp::ToolsetGroup;
use payments_mcp::catalog::Access;
use payments_mcp::catalog::DEFAULT_TOOLSETS;
use payments_mcp::default_toolset_group;

#[derive(Default)]
struct NameSink {
    names: Vec<String>,
}

impl ToolSink for NameSink {
    fn add_tools(&mut self, tools: Vec<Tool>) {
        self.names.extend(tools.iter().map(|tool| tool.name().to_string()));
    }
}

fn registered(group: &ToolsetGroup) -> BTreeSet<String> {
    let mut sink = NameSink::default();
    group.register_tools(&mut sink);
    sink.names.into_iter().collect()
}

fn catalogue_names(toolsets: &[&str], include_writes: bool) -> BTreeSet<String> {
    DEFAULT_TOOLSETS
        .iter()
        .filter(|spec| toolsets.contains(&spec.name))
        .flat_map(|spec| spec.tools.iter())
        .filter(|binding| include_writes || binding.access == Access::Read)
        .map(|binding| binding.name.to_string())
        .collect()
}

#[test]
fn empty_selection_exposes_whole_catalogue() {
    let mut group = default_toolset_group(false);
    group.enable_toolsets::<&str>(&[]).unwrap();
    let names: Vec<&str> = DEFAULT_TOOLSETS.iter().map(|spec| spec.name).collect();
    assert_eq!(registered(&group), catalogue_names(&names, true));
}

#[test]
fn selected_toolsets_expose_only_their_tools() {
    let mut group = default_toolset_group(false);
    group.enable_toolsets(&["orders", "refunds"]).unwrap();
    let names = registered(&group);
    assert_eq!(names, catalogue_names(&["orders", "refunds"], true));
    assert!(names.contains("create_refund"));
    assert!(!names.contains("fetch_payment"));
}

#[test]
fn read_only_catalogue_drops_every_write_tool() {
    let mut group = default_toolset_group(true);
    group.enable_toolsets(&["orders"]).unwrap();
    let names = registered(&group);
    assert_eq!(names, catalogue_names(&["orders"], false));
    assert!(!names.contains("create_order"));
}

#[test]
fn everything_on_is_sticky_across_later_selections() {
    let mut group = default_toolset_group(false);
    group.enable_toolsets::<&str>(&[]).unwrap();
    group.enable_toolsets(&["orders"]).unwrap();
    assert!(group.everything_on());
    assert!(registered(&group).contains("fetch_payout"));
}

#[test]
fn unknown_toolset_is_rejected() {
    let mut group = default_toolset_group(false);
    let err = group.enable_toolset("loans").unwrap_err();
    assert!(err.to_string().contains("does not exist"));
    assert!(registered(&group).is_empty());
}
