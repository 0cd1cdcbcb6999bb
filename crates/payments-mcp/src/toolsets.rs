// crates/payments-mcp/src/toolsets.rs
// ============================================================================
// Module: Toolset Admission
// Description: Named tool groupings with enablement and read-only policy.
// Purpose: Decide which tools a server instance exposes.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! A [`Toolset`] groups related read and write tools under a name. A
//! [`ToolsetGroup`] owns every toolset known to a deployment and decides which
//! of them reach the server: only enabled toolsets are registered, and a
//! read-only group suppresses every write tool.
//!
//! ## Invariants
//! - Every toolset in a group carries the group's read-only flag.
//! - Once everything is turned on, every toolset present (including ones added
//!   later) is enabled. The [`AdmissionPolicy::All`] state is sticky.
//! - Registration never emits a write tool from a read-only toolset.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use thiserror::Error;

use crate::tools::Tool;

// ============================================================================
// SECTION: Toolset
// ============================================================================

/// Named group of read and write tools.
#[derive(Debug, Clone)]
pub struct Toolset {
    /// Toolset name, unique within a group.
    name: String,
    /// Human-readable description.
    description: String,
    /// Suppresses write tools when true.
    read_only: bool,
    /// Non-mutating tools.
    read_tools: Vec<Tool>,
    /// Mutating tools.
    write_tools: Vec<Tool>,
}

impl Toolset {
    /// Builds an empty, writable toolset.
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            read_only: false,
            read_tools: Vec::new(),
            write_tools: Vec::new(),
        }
    }

    /// Appends non-mutating tools.
    #[must_use]
    pub fn add_read_tools(mut self, tools: impl IntoIterator<Item = Tool>) -> Self {
        self.read_tools.extend(tools);
        self
    }

    /// Appends mutating tools. Dropped when the toolset is read-only.
    #[must_use]
    pub fn add_write_tools(mut self, tools: impl IntoIterator<Item = Tool>) -> Self {
        if !self.read_only {
            self.write_tools.extend(tools);
        }
        self
    }

    /// Toolset name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Toolset description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns true when write tools are suppressed.
    #[must_use]
    pub const fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Non-mutating tools.
    #[must_use]
    pub fn read_tools(&self) -> &[Tool] {
        &self.read_tools
    }

    /// Mutating tools currently held.
    #[must_use]
    pub fn write_tools(&self) -> &[Tool] {
        &self.write_tools
    }

    /// Tools this toolset contributes when enabled.
    fn active_tools(&self) -> impl Iterator<Item = &Tool> {
        let writes: &[Tool] = if self.read_only { &[] } else { &self.write_tools };
        self.read_tools.iter().chain(writes)
    }
}

// ============================================================================
// SECTION: Tool Sink
// ============================================================================

/// Receiver of admitted tools, typically the MCP server.
pub trait ToolSink {
    /// Registers tools. Registration is additive.
    fn add_tools(&mut self, tools: Vec<Tool>);
}

// ============================================================================
// SECTION: Toolset Group
// ============================================================================

/// Enablement policy for a toolset group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdmissionPolicy {
    /// Only the named toolsets are enabled.
    Selective(BTreeSet<String>),
    /// Every present and future toolset is enabled.
    All,
}

impl AdmissionPolicy {
    /// Returns true when the policy admits `name`.
    fn admits(&self, name: &str) -> bool {
        match self {
            Self::Selective(enabled) => enabled.contains(name),
            Self::All => true,
        }
    }
}

/// Registry of toolsets with admission control.
#[derive(Debug, Clone)]
pub struct ToolsetGroup {
    /// Toolsets keyed by name.
    toolsets: BTreeMap<String, Toolset>,
    /// Group-wide read-only flag.
    read_only: bool,
    /// Current enablement policy.
    policy: AdmissionPolicy,
}

impl ToolsetGroup {
    /// Builds an empty group with nothing enabled.
    #[must_use]
    pub const fn new(read_only: bool) -> Self {
        Self {
            toolsets: BTreeMap::new(),
            read_only,
            policy: AdmissionPolicy::Selective(BTreeSet::new()),
        }
    }

    /// Builds a toolset that already carries this group's read-only flag, so
    /// write tools are dropped as soon as they are added.
    #[must_use]
    pub fn new_toolset(&self, name: impl Into<String>, description: impl Into<String>) -> Toolset {
        let mut toolset = Toolset::new(name, description);
        toolset.read_only = self.read_only;
        toolset
    }

    /// Adds a toolset, stamping it with the group's read-only flag.
    ///
    /// A toolset with an existing name replaces the old one. Under selective
    /// admission the replacement starts disabled.
    pub fn add_toolset(&mut self, mut toolset: Toolset) {
        toolset.read_only = self.read_only;
        if let AdmissionPolicy::Selective(enabled) = &mut self.policy {
            enabled.remove(toolset.name());
        }
        self.toolsets.insert(toolset.name.clone(), toolset);
    }

    /// Enables one toolset by name.
    ///
    /// # Errors
    ///
    /// Returns [`ToolsetError::NotFound`] when no toolset has that name.
    pub fn enable_toolset(&mut self, name: &str) -> Result<(), ToolsetError> {
        if !self.toolsets.contains_key(name) {
            return Err(ToolsetError::NotFound(name.to_string()));
        }
        if let AdmissionPolicy::Selective(enabled) = &mut self.policy {
            enabled.insert(name.to_string());
        }
        Ok(())
    }

    /// Enables the named toolsets, or everything when `names` is empty.
    ///
    /// Names are processed in order and processing stops at the first unknown
    /// name. Toolsets enabled before the failure stay enabled.
    ///
    /// # Errors
    ///
    /// Returns [`ToolsetError::NotFound`] for the first unknown name.
    pub fn enable_toolsets<S: AsRef<str>>(&mut self, names: &[S]) -> Result<(), ToolsetError> {
        if names.is_empty() {
            self.policy = AdmissionPolicy::All;
            return Ok(());
        }
        if self.everything_on() {
            return Ok(());
        }
        for name in names {
            self.enable_toolset(name.as_ref())?;
        }
        Ok(())
    }

    /// Returns true when every toolset is enabled.
    #[must_use]
    pub const fn everything_on(&self) -> bool {
        matches!(self.policy, AdmissionPolicy::All)
    }

    /// Returns true when the group suppresses write tools.
    #[must_use]
    pub const fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Returns true when `name` exists and is enabled.
    #[must_use]
    pub fn is_enabled(&self, name: &str) -> bool {
        self.toolsets.contains_key(name) && self.policy.admits(name)
    }

    /// Looks up a toolset by name.
    #[must_use]
    pub fn toolset(&self, name: &str) -> Option<&Toolset> {
        self.toolsets.get(name)
    }

    /// Iterates toolset names in sorted order.
    pub fn toolset_names(&self) -> impl Iterator<Item = &str> {
        self.toolsets.keys().map(String::as_str)
    }

    /// Registers every enabled toolset's tools with `sink`.
    ///
    /// Read tools are always registered; write tools only when the toolset is
    /// writable. Disabled toolsets contribute nothing.
    pub fn register_tools(&self, sink: &mut dyn ToolSink) {
        for toolset in self.toolsets.values().filter(|toolset| self.policy.admits(&toolset.name)) {
            let tools: Vec<Tool> = toolset.active_tools().cloned().collect();
            if !tools.is_empty() {
                sink.add_tools(tools);
            }
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Toolset admission errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolsetError {
    /// No toolset is registered under the name.
    #[error("toolset {0} does not exist")]
    NotFound(String),
}

// ============================================================================
// SECTION: Tests
// ============================================================================
