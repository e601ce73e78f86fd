// SPDX-FileCopyrightText: 2025 Contributors to the libssp-rs project.
// SPDX-License-Identifier: Apache-2.0

//! Ambient execution lock of the consumer's runtime.
//!
//! Some consumers can only run callback code while holding a process-wide
//! exclusive lock (an interpreter lock, a UI thread token). The client models
//! that lock as an [`ExecutionGate`]:
//!
//! - handlers are invoked inside [`with_gate`] on the run-loop thread
//! - every blocking call into the session runs inside [`allow_blocking`], which
//!   drops the gate for the duration of the call if the calling thread holds it
//!
//! Without the second rule, a caller holding the gate while waiting for
//! `stop()` and the loop thread waiting for the gate to deliver the final
//! `disconnected` event would wait on each other forever.

use std::{
    sync::{Condvar, Mutex, PoisonError},
    thread::{self, ThreadId},
};

/// An exclusive, thread-owned lock the consumer runtime requires around
/// handler code.
pub trait ExecutionGate: Send + Sync {
    /// Blocks until the current thread owns the gate.
    fn acquire(&self);

    /// Gives the gate up. Has no effect if the current thread does not own it.
    fn release(&self);

    fn is_held_by_current_thread(&self) -> bool;
}

/// Gate for consumers without an ambient lock. Every operation is a no-op.
#[derive(Debug, Default, Clone, Copy)]
pub struct FreeGate;

impl ExecutionGate for FreeGate {
    fn acquire(&self) {}

    fn release(&self) {}

    fn is_held_by_current_thread(&self) -> bool {
        false
    }
}

/// A global-interpreter-style lock: one owning thread at a time, acquired
/// explicitly by consumer code through [`InterpreterLock::lock`] and by the
/// client around handler invocations.
#[derive(Debug, Default)]
pub struct InterpreterLock {
    owner: Mutex<Option<ThreadId>>,
    available: Condvar,
}

impl InterpreterLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the lock for the current thread until the guard is dropped.
    pub fn lock(&self) -> InterpreterLockGuard<'_> {
        self.acquire();
        InterpreterLockGuard { lock: self }
    }
}

impl ExecutionGate for InterpreterLock {
    fn acquire(&self) {
        let me = thread::current().id();
        let mut owner = self.owner.lock().unwrap_or_else(PoisonError::into_inner);
        while owner.is_some_and(|id| id != me) {
            owner = self
                .available
                .wait(owner)
                .unwrap_or_else(PoisonError::into_inner);
        }
        *owner = Some(me);
    }

    fn release(&self) {
        let me = thread::current().id();
        let mut owner = self.owner.lock().unwrap_or_else(PoisonError::into_inner);
        if *owner == Some(me) {
            *owner = None;
            self.available.notify_all();
        }
    }

    fn is_held_by_current_thread(&self) -> bool {
        let owner = self.owner.lock().unwrap_or_else(PoisonError::into_inner);
        *owner == Some(thread::current().id())
    }
}

/// Releases the [`InterpreterLock`] on drop.
pub struct InterpreterLockGuard<'a> {
    lock: &'a InterpreterLock,
}

impl Drop for InterpreterLockGuard<'_> {
    fn drop(&mut self) {
        self.lock.release();
    }
}

struct Relock<'a>(&'a dyn ExecutionGate);

impl Drop for Relock<'_> {
    fn drop(&mut self) {
        self.0.acquire();
    }
}

struct Unlock<'a>(&'a dyn ExecutionGate);

impl Drop for Unlock<'_> {
    fn drop(&mut self) {
        self.0.release();
    }
}

/// Runs a blocking call with the gate released, re-acquiring it afterwards
/// (also on unwind) if the current thread held it on entry.
pub(crate) fn allow_blocking<R>(gate: &dyn ExecutionGate, f: impl FnOnce() -> R) -> R {
    if !gate.is_held_by_current_thread() {
        return f();
    }
    gate.release();
    let _relock = Relock(gate);
    f()
}

/// Runs consumer code with the gate held. Re-entrant: a thread already
/// holding the gate runs `f` directly.
pub(crate) fn with_gate<R>(gate: &dyn ExecutionGate, f: impl FnOnce() -> R) -> R {
    if gate.is_held_by_current_thread() {
        return f();
    }
    gate.acquire();
    let _unlock = Unlock(gate);
    f()
}
