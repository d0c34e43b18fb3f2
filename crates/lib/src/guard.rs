//! Per-operation re-entrancy guard.
//!
//! Each user-triggered long-running operation holds a guard for the duration of its backend calls.
//! Acquiring disables the operation's control in the view; dropping the guard re-enables it, on
//! every exit path.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::view::ChatView;

/// A user-triggered operation (and the control that triggers it).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    NewChat,
    Send,
    Delete,
    Switch,
    Scrape,
    Upload,
    ChangeModel,
}

impl Operation {
    pub const ALL: [Operation; 7] = [
        Operation::NewChat,
        Operation::Send,
        Operation::Delete,
        Operation::Switch,
        Operation::Scrape,
        Operation::Upload,
        Operation::ChangeModel,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Operation::NewChat => "new chat",
            Operation::Send => "send",
            Operation::Delete => "delete",
            Operation::Switch => "switch chat",
            Operation::Scrape => "url scrape",
            Operation::Upload => "upload",
            Operation::ChangeModel => "model change",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One in-flight flag per operation.
#[derive(Debug, Default)]
pub struct OperationLocks {
    busy: [AtomicBool; Operation::ALL.len()],
}

impl OperationLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_busy(&self, op: Operation) -> bool {
        self.busy[op.index()].load(Ordering::Acquire)
    }

    /// Mark `op` in flight and disable its control. `None` when it is already running.
    pub fn try_acquire<'a>(
        &'a self,
        op: Operation,
        view: &'a dyn ChatView,
    ) -> Option<OperationGuard<'a>> {
        self.busy[op.index()]
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        view.set_control_enabled(op, false);
        Some(OperationGuard {
            locks: self,
            op,
            view,
        })
    }
}

/// Releases the operation and re-enables its control when dropped.
pub struct OperationGuard<'a> {
    locks: &'a OperationLocks,
    op: Operation,
    view: &'a dyn ChatView,
}

impl OperationGuard<'_> {
    pub fn operation(&self) -> Operation {
        self.op
    }
}

impl Drop for OperationGuard<'_> {
    fn drop(&mut self) {
        self.locks.busy[self.op.index()].store(false, Ordering::Release);
        self.view.set_control_enabled(self.op, true);
    }
}
