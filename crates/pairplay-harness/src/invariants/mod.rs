//! Invariant checking for deterministic simulation testing.
//!
//! Invariants are properties that must always hold during system execution.
//! Unlike example-based tests that check specific scenarios, invariants
//! verify behavioral properties across all possible execution paths.
//!
//! # Architecture
//!
//! Every node publishes a [`StatusSnapshot`]; a [`LanSnapshot`] collects them
//! and registered [`Invariant`] checks run against it. Per-node invariants
//! hold after every processed event. Cross-node invariants only hold once
//! every runtime has drained its queue, so they live in
//! [`InvariantRegistry::settled()`].
//!
//! # Usage
//!
//! ```ignore
//! let registry = InvariantRegistry::standard();
//! let snapshot = LanSnapshot::from_nodes(vec![host.status(), guest.status()]);
//! registry.check_all(&snapshot)?;
//! ```

mod checks;

pub use checks::{ExclusiveActivity, LinkSymmetry, PendingNeedsAdvertising, SeatsAreComplementary};
use pairplay_app::StatusSnapshot;

/// Invariant check result.
pub type InvariantResult = Result<(), Violation>;

/// Published state of every node on the LAN at one point in time.
#[derive(Debug, Clone, Default)]
pub struct LanSnapshot {
    /// Per-node snapshots.
    pub nodes: Vec<StatusSnapshot>,
}

impl LanSnapshot {
    /// Snapshot of the given nodes.
    pub fn from_nodes(nodes: Vec<StatusSnapshot>) -> Self {
        Self { nodes }
    }
}

/// Invariant violation with context.
#[derive(Debug, Clone)]
pub struct Violation {
    /// Name of the violated invariant.
    pub invariant: &'static str,
    /// Description of what went wrong.
    pub message: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.invariant, self.message)
    }
}

impl std::error::Error for Violation {}

/// An invariant that can be checked against LAN state.
pub trait Invariant: Send + Sync {
    /// Invariant name for error reporting.
    fn name(&self) -> &'static str;

    /// Check the invariant against the current state.
    ///
    /// Returns `Ok(())` if the invariant holds, or a [`Violation`]
    /// describing what went wrong.
    fn check(&self, state: &LanSnapshot) -> InvariantResult;
}

/// Registry of invariants to check.
pub struct InvariantRegistry {
    invariants: Vec<Box<dyn Invariant>>,
}

impl Default for InvariantRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl InvariantRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self { invariants: Vec::new() }
    }

    /// Per-node invariants that hold after every processed event.
    ///
    /// Includes:
    /// - [`ExclusiveActivity`]: advertising, browsing and connected are
    ///   mutually exclusive
    /// - [`PendingNeedsAdvertising`]: an offer only waits while advertising
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.add(ExclusiveActivity);
        registry.add(PendingNeedsAdvertising);
        registry
    }

    /// [`standard()`](Self::standard) plus the cross-node invariants that
    /// hold once the LAN is quiet.
    ///
    /// Adds:
    /// - [`LinkSymmetry`]: connected peers name each other
    /// - [`SeatsAreComplementary`]: two views of one game agree on whose turn
    ///   it is
    pub fn settled() -> Self {
        let mut registry = Self::standard();
        registry.add(LinkSymmetry);
        registry.add(SeatsAreComplementary);
        registry
    }

    /// Add an invariant to the registry.
    pub fn add<I: Invariant + 'static>(&mut self, invariant: I) {
        self.invariants.push(Box::new(invariant));
    }

    /// Check all invariants against the given state.
    ///
    /// Returns `Ok(())` if all invariants hold, or all violations found.
    pub fn check_all(&self, state: &LanSnapshot) -> Result<(), Vec<Violation>> {
        let violations: Vec<_> =
            self.invariants.iter().filter_map(|inv| inv.check(state).err()).collect();

        if violations.is_empty() { Ok(()) } else { Err(violations) }
    }

    /// Check all invariants, panicking on the first violation.
    ///
    /// Use this in tests where you want immediate failure with context.
    #[allow(clippy::panic)]
    pub fn assert_all(&self, state: &LanSnapshot, context: &str) {
        if let Err(violations) = self.check_all(state) {
            let messages: Vec<_> = violations.iter().map(ToString::to_string).collect();
            panic!("Invariant violation {context}:\n  {}", messages.join("\n  "));
        }
    }

    /// Number of registered invariants.
    pub fn len(&self) -> usize {
        self.invariants.len()
    }

    /// Check if registry is empty.
    pub fn is_empty(&self) -> bool {
        self.invariants.is_empty()
    }
}
