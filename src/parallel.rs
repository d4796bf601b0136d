//! Collective-communication contract of the response solver.
//!
//! The solver is written for a data-parallel runtime in which every process executes the
//! same sequence of collective operations. Only the coordinator writes files and prints
//! diagnostics.
use std::sync::atomic::{AtomicUsize, Ordering};

use log::debug;

use crate::defaults;

pub trait Communicator: Sync {
    fn rank(&self) -> usize;

    fn size(&self) -> usize;

    fn is_coordinator(&self) -> bool {
        self.rank() == 0
    }

    /// Waits until all pending work of every process is finished.
    fn fence(&self);

    /// Redistributes the work between the processes.
    fn load_balance(&self);
}

/// The work is rebalanced in the first iterations, when the cost of the functions
/// changes quickly, and afterwards in fixed intervals.
pub fn load_balance_due(iteration: usize) -> bool {
    iteration < defaults::LOAD_BALANCE_FIRST || iteration % defaults::LOAD_BALANCE_INTERVAL == 0
}

/// Single process world. Collective operations are no-ops, but are counted.
#[derive(Debug, Default)]
pub struct SerialWorld {
    fences: AtomicUsize,
    balances: AtomicUsize,
}

impl SerialWorld {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fence_count(&self) -> usize {
        self.fences.load(Ordering::Relaxed)
    }

    pub fn load_balance_count(&self) -> usize {
        self.balances.load(Ordering::Relaxed)
    }
}

impl Communicator for SerialWorld {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn fence(&self) {
        self.fences.fetch_add(1, Ordering::Relaxed);
    }

    fn load_balance(&self) {
        let n: usize = self.balances.fetch_add(1, Ordering::Relaxed);
        debug!("load balancing #{} on a single process", n + 1);
    }
}
