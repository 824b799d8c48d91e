/// An item visual produced by the content delegate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Item<V> {
    pub element: V,
}

impl<V> Item<V> {
    pub fn new(element: V) -> Self {
        Self { element }
    }
}

/// A materialized item, keyed by index inside the engine.
#[derive(Clone, Debug)]
pub(crate) struct RenderedItem<V> {
    pub(crate) item: Item<V>,
    pub(crate) is_refreshing: bool,
}

impl<V> RenderedItem<V> {
    pub(crate) fn new(item: Item<V>) -> Self {
        Self {
            item,
            is_refreshing: false,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ScrollDirection {
    Forward,
    Backward,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum HostEventKind {
    Scroll,
    TouchMove,
    TouchEnd,
    Resize,
}

/// A host notification. `now_ms` is the host clock used for debouncing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HostEvent {
    pub kind: HostEventKind,
    pub now_ms: u64,
}

impl HostEvent {
    pub fn new(kind: HostEventKind, now_ms: u64) -> Self {
        Self { kind, now_ms }
    }
}
