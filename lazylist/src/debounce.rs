/// A trailing-edge debouncer driven by the host clock.
///
/// `call(now_ms)` (re)arms the deadline; `poll(now_ms)` reports once that the deadline has
/// passed. There are no timers: the host is expected to call [`crate::LazyRepeat::tick`] on
/// every frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Debouncer {
    wait_ms: u64,
    deadline: Option<u64>,
}

impl Debouncer {
    pub fn new(wait_ms: u64) -> Self {
        Self {
            wait_ms,
            deadline: None,
        }
    }

    pub fn wait_ms(&self) -> u64 {
        self.wait_ms
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Records a call at `now_ms`.
    ///
    /// Returns `true` when a previously armed deadline had already elapsed (the host missed a
    /// tick), in which case the caller should fire the coalesced call before re-arming.
    pub fn call(&mut self, now_ms: u64) -> bool {
        let overdue = self.deadline.is_some_and(|d| now_ms >= d);
        self.deadline = Some(now_ms.saturating_add(self.wait_ms));
        overdue
    }

    /// Returns `true` exactly once per armed deadline, when `now_ms` has reached it.
    pub fn poll(&mut self, now_ms: u64) -> bool {
        match self.deadline {
            Some(d) if now_ms >= d => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }
}
