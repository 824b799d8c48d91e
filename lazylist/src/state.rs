/// A point-in-time view of the engine's render state.
///
/// With `feature = "serde"`, this type implements `Serialize`/`Deserialize`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RenderSnapshot {
    /// Reserved leading space, in pixels.
    pub padding: u64,
    /// Materialized indices in ascending order.
    pub materialized: Vec<usize>,
    /// Addressable entries of the offset table (sentinel included).
    pub offsets_len: usize,
    pub is_refreshing: bool,
    /// Id of the forward render task currently running, if any.
    pub running_task: Option<u64>,
    /// Forward render tasks queued behind the running one.
    pub pending_tasks: usize,
}

impl RenderSnapshot {
    pub fn first_materialized(&self) -> Option<usize> {
        self.materialized.first().copied()
    }

    pub fn last_materialized(&self) -> Option<usize> {
        self.materialized.last().copied()
    }
}
