//! Timer chain: many logical deadlines on one live tokio timer.
//!
//! Pending tasks sit in a task table keyed by id and in a min-heap of
//! `(deadline, id)`. Exactly one spawned sleep (the impending timer) is
//! armed at a time, always for the earliest live task. Scheduling an
//! earlier task aborts the impending timer and arms a new one; when a timer
//! fires, its task leaves the table and the next head is armed.
//!
//! Heap entries whose id is no longer in the table are discarded lazily
//! when they reach the head. Callbacks run after the chain's lock has been
//! released, so they may schedule further tasks.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tokio::time::Instant;
use worklet_types::error::WorkflowError;

type TimerCallback = Box<dyn FnOnce() + Send + 'static>;

struct PendingTask {
    deadline: Instant,
    callback: TimerCallback,
}

struct Impending {
    id: u64,
    deadline: Instant,
    timer: AbortHandle,
}

#[derive(Default)]
struct ChainState {
    next_id: u64,
    tasks: HashMap<u64, PendingTask>,
    queue: BinaryHeap<Reverse<(Instant, u64)>>,
    impending: Option<Impending>,
}

/// Process-wide deadline multiplexer. Cloning shares the same chain.
#[derive(Clone)]
pub struct TimerChain {
    state: Arc<Mutex<ChainState>>,
    runtime: Handle,
}

impl TimerChain {
    /// Create a chain on the current tokio runtime.
    pub fn new() -> Result<Self, WorkflowError> {
        let runtime = Handle::try_current()
            .map_err(|e| WorkflowError::wrap("timer chain requires a tokio runtime", e))?;
        Ok(Self::with_handle(runtime))
    }

    pub fn with_handle(runtime: Handle) -> Self {
        Self {
            state: Arc::new(Mutex::new(ChainState::default())),
            runtime,
        }
    }

    /// Run `callback` once `delay` has elapsed. Returns the task id.
    pub fn schedule<F>(&self, delay: Duration, callback: F) -> u64
    where
        F: FnOnce() + Send + 'static,
    {
        self.schedule_at(Instant::now() + delay, callback)
    }

    /// Run `callback` at `deadline`. Returns the task id.
    pub fn schedule_at<F>(&self, deadline: Instant, callback: F) -> u64
    where
        F: FnOnce() + Send + 'static,
    {
        let mut guard = self.state.lock().expect("timer chain lock poisoned");
        let chain = &mut *guard;

        let id = chain.next_id;
        chain.next_id += 1;
        chain.tasks.insert(
            id,
            PendingTask {
                deadline,
                callback: Box::new(callback),
            },
        );
        chain.queue.push(Reverse((deadline, id)));

        let earlier = chain
            .impending
            .as_ref()
            .is_none_or(|impending| deadline < impending.deadline);
        if earlier {
            if let Some(previous) = chain.impending.take() {
                previous.timer.abort();
                tracing::trace!(superseded = previous.id, task = id, "timer rescheduled");
            }
            let timer = arm(Arc::downgrade(&self.state), &self.runtime, id, deadline);
            chain.impending = Some(Impending { id, deadline, timer });
        }
        id
    }

    /// Number of tasks that have not fired yet.
    pub fn pending(&self) -> usize {
        self.state.lock().expect("timer chain lock poisoned").tasks.len()
    }

    /// Deadline of the task the live timer is armed for.
    pub fn impending_deadline(&self) -> Option<Instant> {
        self.state
            .lock()
            .expect("timer chain lock poisoned")
            .impending
            .as_ref()
            .map(|impending| impending.deadline)
    }
}

impl fmt::Debug for TimerChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerChain")
            .field("pending", &self.pending())
            .field("impending_deadline", &self.impending_deadline())
            .finish()
    }
}

fn arm(state: Weak<Mutex<ChainState>>, runtime: &Handle, id: u64, deadline: Instant) -> AbortHandle {
    let handle = runtime.clone();
    runtime
        .spawn(async move {
            tokio::time::sleep_until(deadline).await;
            if let Some(state) = state.upgrade() {
                fire(&state, &handle, id);
            }
        })
        .abort_handle()
}

fn fire(state: &Arc<Mutex<ChainState>>, runtime: &Handle, id: u64) {
    let callback = {
        let mut guard = state.lock().expect("timer chain lock poisoned");
        let chain = &mut *guard;

        let Some(task) = chain.tasks.remove(&id) else {
            return;
        };

        // A task that lost a race with a reschedule only runs its callback;
        // the chain already armed its successor.
        if chain.impending.as_ref().is_some_and(|impending| impending.id == id) {
            chain.impending = None;
            while let Some(Reverse((deadline, head))) = chain.queue.peek().copied() {
                if !chain.tasks.contains_key(&head) {
                    chain.queue.pop();
                    continue;
                }
                let timer = arm(Arc::downgrade(state), runtime, head, deadline);
                chain.impending = Some(Impending {
                    id: head,
                    deadline,
                    timer,
                });
                break;
            }
        }
        tracing::trace!(task = id, lateness_ms = task.deadline.elapsed().as_millis() as u64, "timer fired");
        task.callback
    };
    callback();
}
