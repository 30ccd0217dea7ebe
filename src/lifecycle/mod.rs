//! Lifecycle management for navigator components

use crate::error::Result;

/// Trait for components that follow a lifecycle pattern.
///
/// For the fusion engine, deactivation means the AR view was paused; a later
/// activation belongs to a new tracking session.
pub trait LifecycleNode: Send + Sync {
    /// Component name used in logs
    fn name(&self) -> &str;

    /// Validate configuration and prepare internal state
    fn on_configure(&mut self) -> Result<()>;

    /// Start accepting samples
    fn on_activate(&mut self) -> Result<()>;

    /// Stop accepting samples
    fn on_deactivate(&mut self) -> Result<()>;

    /// Drop all runtime state
    fn on_cleanup(&mut self) -> Result<()>;

    /// Current lifecycle state
    fn state(&self) -> State;
}

/// Base implementation for lifecycle nodes
#[derive(Debug, Clone)]
pub struct LifecycleNodeBase {
    pub name: String,
    state: State,
}

/// State of a lifecycle node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Unconfigured,
    Inactive,
    Active,
}

impl LifecycleNodeBase {
    /// Create a new lifecycle node base in the given state
    pub fn new(name: &str, state: State) -> Self {
        LifecycleNodeBase {
            name: name.to_string(),
            state,
        }
    }

    pub fn get_state(&self) -> State {
        self.state
    }

    /// Set the state, returning the previous one
    pub fn set_state(&mut self, state: State) -> State {
        let previous = self.state;
        if previous != state {
            log::debug!("{}: {:?} -> {:?}", self.name, previous, state);
        }
        self.state = state;
        previous
    }

    pub fn is_active(&self) -> bool {
        self.state == State::Active
    }
}
