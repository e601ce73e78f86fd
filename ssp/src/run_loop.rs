// SPDX-FileCopyrightText: 2025 Contributors to the libssp-rs project.
// SPDX-License-Identifier: Apache-2.0

//! Background run loop owning the session thread.
//!
//! A [`RunLoop`] owns exactly one thread per started lifetime. The thread
//! first runs a one-shot init task, raises the "init complete" signal, and then
//! processes posted tasks in FIFO order until stopped.
//!
//! Stopping has two shapes:
//!
//! - from any other thread, [`RunLoop::stop`] queues a quit message behind
//!   every task already posted, so those tasks (typically the final events a
//!   session raised while stopping) still run, and then joins the thread
//! - from the loop thread itself (a handler tearing its own client down) the
//!   loop cannot be joined; it finishes the task that is running, discards
//!   whatever is still queued, and exits. The thread is joined by the next
//!   `start()`/`stop()` issued from another thread.

use std::{
    any::Any,
    panic::{AssertUnwindSafe, catch_unwind},
    sync::{
        Arc, Condvar, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicBool, Ordering},
        mpsc,
    },
    thread::{self, JoinHandle, ThreadId},
    time::Duration,
};

use tracing::{debug, error, warn};

type Task = Box<dyn FnOnce(&LoopHandle) + Send + 'static>;

enum Message {
    Task(Task),
    Quit,
}

/// Cloneable handle for posting work onto a running loop.
///
/// Handed to the init task and to every posted task. Posting to a loop that
/// has exited drops the task and returns `false`.
#[derive(Clone)]
pub struct LoopHandle {
    sender: mpsc::Sender<Message>,
    thread_id: ThreadId,
    abort: Arc<AtomicBool>,
}

impl LoopHandle {
    /// Queues `task` to run on the loop thread.
    pub fn post<F>(&self, task: F) -> bool
    where
        F: FnOnce(&LoopHandle) + Send + 'static,
    {
        !self.abort.load(Ordering::Acquire)
            && self.sender.send(Message::Task(Box::new(task))).is_ok()
    }

    pub fn is_loop_thread(&self) -> bool {
        thread::current().id() == self.thread_id
    }
}

impl std::fmt::Debug for LoopHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopHandle")
            .field("thread_id", &self.thread_id)
            .finish()
    }
}

/// "Initial task complete" flag guarded by a mutex and signalled through a
/// condition variable.
#[derive(Default)]
struct InitSignal {
    done: Mutex<bool>,
    cond: Condvar,
}

impl InitSignal {
    fn set(&self) {
        *self.done.lock().unwrap_or_else(PoisonError::into_inner) = true;
        self.cond.notify_all();
    }

    fn wait(&self, timeout: Duration) -> bool {
        let done = self.done.lock().unwrap_or_else(PoisonError::into_inner);
        let (done, _) = self
            .cond
            .wait_timeout_while(done, timeout, |done| !*done)
            .unwrap_or_else(PoisonError::into_inner);
        *done
    }
}

#[derive(Default)]
struct LoopState {
    sender: Option<mpsc::Sender<Message>>,
    thread: Option<JoinHandle<()>>,
    abort: Option<Arc<AtomicBool>>,
    /// Init signal of the current lifetime. Each lifetime gets its own, so a
    /// detached thread finishing late cannot complete a newer lifetime's wait.
    init: Arc<InitSignal>,
    /// A thread that stopped itself and still has to be joined.
    exiting: Option<JoinHandle<()>>,
}

/// Dedicated thread running an init task followed by a task loop.
pub struct RunLoop {
    name: String,
    state: Mutex<LoopState>,
}

impl Default for RunLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl RunLoop {
    pub fn new() -> Self {
        Self::with_name("ssp-loop")
    }

    /// Creates a stopped loop whose thread will carry `name`.
    pub fn with_name(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(LoopState::default()),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, LoopState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Spawns the loop thread, which runs `init` before entering the task loop.
    ///
    /// Returns immediately, without waiting for `init`. Returns `false` and
    /// does nothing if the loop is already running or the thread could not be
    /// spawned.
    pub fn start<F>(&self, init: F) -> bool
    where
        F: FnOnce(&LoopHandle) + Send + 'static,
    {
        let exiting = self.lock_state().exiting.take();
        join_loop_thread(exiting);

        let mut state = self.lock_state();
        if state.sender.is_some() {
            warn!(name = %self.name, "Run loop is already running");
            return false;
        }

        let (sender, receiver) = mpsc::channel();
        let abort = Arc::new(AtomicBool::new(false));
        let init_signal = Arc::new(InitSignal::default());
        let thread_init = init_signal.clone();
        let thread_sender = sender.clone();
        let thread_abort = abort.clone();

        let spawned = thread::Builder::new()
            .name(self.name.clone())
            .spawn(move || {
                let handle = LoopHandle {
                    sender: thread_sender,
                    thread_id: thread::current().id(),
                    abort: thread_abort,
                };
                run(handle, receiver, init, thread_init);
            });

        match spawned {
            Ok(thread) => {
                debug!(name = %self.name, "Run loop started");
                state.sender = Some(sender);
                state.thread = Some(thread);
                state.abort = Some(abort);
                state.init = init_signal;
                true
            }
            Err(e) => {
                error!(name = %self.name, "Failed to spawn run loop thread: {}", e);
                false
            }
        }
    }

    /// Stops the loop and joins its thread.
    ///
    /// Tasks posted before the call still run. When called from the loop
    /// thread itself, the loop exits after the current task instead, dropping
    /// the rest of the queue, and the call returns without joining. No-op if
    /// the loop is not running.
    pub fn stop(&self) {
        let mut state = self.lock_state();
        let exiting = state.exiting.take();
        let Some(sender) = state.sender.take() else {
            drop(state);
            join_loop_thread(exiting);
            return;
        };
        let thread = state.thread.take();
        let abort = state.abort.take();

        let on_loop_thread = thread
            .as_ref()
            .is_some_and(|t| t.thread().id() == thread::current().id());
        if on_loop_thread {
            if let Some(abort) = abort {
                abort.store(true, Ordering::Release);
            }
            state.exiting = thread;
            drop(state);
            drop(sender);
            debug!(name = %self.name, "Run loop stop requested from its own thread");
            join_loop_thread(exiting);
            return;
        }
        drop(state);

        // The loop only ends on Quit, so this send failing means it already died.
        let _ = sender.send(Message::Quit);
        drop(sender);
        join_loop_thread(exiting);
        join_loop_thread(thread);
        debug!(name = %self.name, "Run loop stopped");
    }

    /// Asks the loop to quit without waiting for it.
    ///
    /// Used when the loop thread is wedged in a task that may never return;
    /// the thread is left to finish on its own.
    pub fn detach(&self) {
        let mut state = self.lock_state();
        if let Some(sender) = state.sender.take() {
            let _ = sender.send(Message::Quit);
        }
        state.abort = None;
        if state.thread.take().is_some() {
            warn!(name = %self.name, "Run loop detached without joining its thread");
        }
    }

    /// Waits up to `timeout` for the init task of the current lifetime to
    /// finish. Returns whether it did.
    pub fn wait_init(&self, timeout: Duration) -> bool {
        let init = self.lock_state().init.clone();
        init.wait(timeout)
    }

    /// Queues `task` on the loop. Returns `false` if the loop is not running.
    pub fn post<F>(&self, task: F) -> bool
    where
        F: FnOnce(&LoopHandle) + Send + 'static,
    {
        match &self.lock_state().sender {
            Some(sender) => sender.send(Message::Task(Box::new(task))).is_ok(),
            None => false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.lock_state().sender.is_some()
    }

    pub fn is_loop_thread(&self) -> bool {
        self.lock_state()
            .thread
            .as_ref()
            .is_some_and(|t| t.thread().id() == thread::current().id())
    }
}

impl Drop for RunLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run<F>(
    handle: LoopHandle,
    receiver: mpsc::Receiver<Message>,
    init: F,
    init_signal: Arc<InitSignal>,
) where
    F: FnOnce(&LoopHandle),
{
    if let Err(panic) = catch_unwind(AssertUnwindSafe(|| init(&handle))) {
        error!("Run loop init task panicked: {}", panic_message(&panic));
    }
    init_signal.set();

    while !handle.abort.load(Ordering::Acquire) {
        let Ok(message) = receiver.recv() else {
            break;
        };
        match message {
            Message::Task(task) => {
                if let Err(panic) = catch_unwind(AssertUnwindSafe(|| task(&handle))) {
                    error!("Run loop task panicked: {}", panic_message(&panic));
                }
            }
            Message::Quit => break,
        }
    }

    let discarded = receiver.try_iter().count();
    if discarded > 0 {
        debug!(discarded, "Run loop discarded queued tasks on exit");
    }
}

fn join_loop_thread(thread: Option<JoinHandle<()>>) {
    let Some(thread) = thread else {
        return;
    };
    if thread.thread().id() == thread::current().id() {
        // Dropping our own handle detaches us; we are about to exit anyway.
        return;
    }
    if thread.join().is_err() {
        warn!("Run loop thread terminated with a panic");
    }
}

pub(crate) fn panic_message(panic: &Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
