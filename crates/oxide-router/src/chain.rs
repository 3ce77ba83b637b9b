//! Per-request handler chain.

use std::sync::Arc;

use crate::handler::HandlerUnit;

/// Where a chain is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainState {
    /// The next unit has not run yet.
    Pending,
    /// A unit is executing.
    Running,
    /// Every unit ran, or a response was committed.
    Exhausted,
}

/// An ordered list of units with a cursor, bound to one request.
///
/// The units are shared with every other request on the same route; only
/// the cursor is per request.
#[derive(Debug, Clone)]
pub struct HandlerChain {
    units: Arc<[HandlerUnit]>,
    cursor: usize,
    active: usize,
}

impl HandlerChain {
    /// Creates a chain positioned before its first unit.
    pub fn new(units: Arc<[HandlerUnit]>) -> Self {
        Self {
            units,
            cursor: 0,
            active: 0,
        }
    }

    /// An empty chain.
    pub fn empty() -> Self {
        Self::new(Arc::from(Vec::new()))
    }

    /// Creates a chain of one unit.
    pub fn single(unit: HandlerUnit) -> Self {
        Self::new(Arc::from(vec![unit]))
    }

    /// Number of units in the chain.
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Returns true for a chain without units.
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Index of the next unit to run.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// State of the chain given whether the response has been committed.
    pub fn state(&self, committed: bool) -> ChainState {
        if committed {
            ChainState::Exhausted
        } else if self.active > 0 {
            ChainState::Running
        } else if self.cursor >= self.units.len() {
            ChainState::Exhausted
        } else {
            ChainState::Pending
        }
    }

    pub(crate) fn reset(&mut self) {
        self.cursor = 0;
        self.active = 0;
    }

    /// Takes the unit under the cursor and moves past it.
    pub(crate) fn advance(&mut self) -> Option<HandlerUnit> {
        let unit = self.units.get(self.cursor)?.clone();
        self.cursor += 1;
        Some(unit)
    }

    pub(crate) fn enter(&mut self) {
        self.active += 1;
    }

    pub(crate) fn leave(&mut self) {
        self.active = self.active.saturating_sub(1);
    }
}

impl Default for HandlerChain {
    fn default() -> Self {
        Self::empty()
    }
}
