use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;

/// A unit of work, run exactly once by one worker.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

pub(crate) enum Message {
    Run(Task),
    /// Tells the worker that pops it to exit.
    Terminate,
}

struct State {
    messages: VecDeque<Message>,
    closed: bool,
}

/// Blocking FIFO shared by the pool's workers.
pub struct TaskQueue {
    state: Mutex<State>,
    available: Condvar,
}

impl TaskQueue {
    pub fn new() -> Self {
        TaskQueue {
            state: Mutex::new(State {
                messages: VecDeque::with_capacity(64),
                closed: false,
            }),
            available: Condvar::new(),
        }
    }

    /// Appends a task and wakes one worker. Returns `false` once closed.
    pub fn push(&self, task: Task) -> bool {
        {
            let mut state = self.state.lock();
            if state.closed {
                return false;
            }
            state.messages.push_back(Message::Run(task));
        }
        self.available.notify_one();
        true
    }

    /// Closes the queue and appends one terminate message per worker, behind
    /// everything already queued. Returns `false` if it was already closed.
    pub(crate) fn close(&self, workers: usize) -> bool {
        {
            let mut state = self.state.lock();
            if state.closed {
                return false;
            }
            state.closed = true;
            state
                .messages
                .extend(std::iter::repeat_with(|| Message::Terminate).take(workers));
        }
        self.available.notify_all();
        true
    }

    /// Blocks until a message is available.
    pub(crate) fn pop(&self) -> Message {
        let mut state = self.state.lock();
        loop {
            if let Some(message) = state.messages.pop_front() {
                return message;
            }
            self.available.wait(&mut state);
        }
    }

    /// Tasks waiting to run.
    pub fn len(&self) -> usize {
        self.state
            .lock()
            .messages
            .iter()
            .filter(|m| matches!(m, Message::Run(_)))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}
