use std::collections::VecDeque;

/// Identity of a queued render task. Ids are handed out in enqueue order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TaskId(u64);

impl TaskId {
    pub fn get(self) -> u64 {
        self.0
    }
}

/// FIFO of render tasks with supersession tokens.
///
/// Only the newest task that was enqueued after the last [`RenderQueue::supersede_all`] is
/// current. Older tasks still run to their next checkpoint, in order, but must not commit.
#[derive(Debug)]
pub(crate) struct RenderQueue<T> {
    next_id: u64,
    floor: u64,
    pending: VecDeque<(TaskId, T)>,
    running: Option<TaskId>,
    driving: bool,
}

impl<T> RenderQueue<T> {
    pub(crate) fn new() -> Self {
        Self {
            next_id: 0,
            floor: 0,
            pending: VecDeque::new(),
            running: None,
            driving: false,
        }
    }

    /// Enqueues a task. Returns its id, and whether the caller must start a driver because
    /// none is active.
    pub(crate) fn push(&mut self, task: T) -> (TaskId, bool) {
        let id = TaskId(self.next_id);
        self.next_id += 1;
        self.pending.push_back((id, task));
        let start_driver = !self.driving;
        self.driving = true;
        vtrace!(id = id.0, pending = self.pending.len(), "RenderQueue::push");
        (id, start_driver)
    }

    /// Pops the next task for the driver and marks it running. When the queue is empty the
    /// driver must stop; `None` is returned.
    pub(crate) fn start_next(&mut self) -> Option<(TaskId, T)> {
        let next = self.pending.pop_front();
        self.running = next.as_ref().map(|(id, _)| *id);
        if next.is_none() {
            self.driving = false;
        }
        next
    }

    pub(crate) fn is_current(&self, id: TaskId) -> bool {
        id.0 >= self.floor && id.0 + 1 == self.next_id
    }

    /// Invalidates every task enqueued so far.
    pub(crate) fn supersede_all(&mut self) {
        if self.floor != self.next_id {
            vdebug!(floor = self.next_id, "RenderQueue::supersede_all");
        }
        self.floor = self.next_id;
    }

    pub(crate) fn running(&self) -> Option<TaskId> {
        self.running
    }

    /// Tasks waiting behind the running one.
    pub(crate) fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub(crate) fn is_idle(&self) -> bool {
        !self.driving
    }
}
