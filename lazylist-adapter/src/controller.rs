use futures::executor::LocalPool;
use lazylist::{
    ContentDelegate, DelegateAdapter, HostEvent, HostEventKind, LazyRepeat, LazyRepeatOptions,
    Pending, RenderSnapshot, Result,
};

use crate::{Block, MemorySurface};

/// A framework-neutral driver for a [`LazyRepeat`] mounted on a [`MemorySurface`].
///
/// Owns the single-threaded executor the engine spawns its work on, and a clock for the
/// debounced event bridge. Adapters drive it by calling:
/// - `scroll_to` / `touch_move` / `touch_end` / `resize` when UI events occur
/// - `tick(now_ms)` each frame, which fires debounced renders and pumps the executor
///
/// Every driving call runs the executor until it stalls.
pub struct Controller<D>
where
    D: ContentDelegate<Visual = Block> + 'static,
{
    pool: LocalPool,
    list: LazyRepeat<MemorySurface, D>,
    surface: MemorySurface,
    now_ms: u64,
}

impl<D> Controller<D>
where
    D: ContentDelegate<Visual = Block> + 'static,
{
    /// Mounts `delegate` on `surface` and runs the initial render pass.
    pub fn new(surface: MemorySurface, delegate: D, options: LazyRepeatOptions) -> Result<Self> {
        Self::with_adapter(surface, DelegateAdapter::new(delegate), options)
    }

    pub fn with_adapter(
        surface: MemorySurface,
        adapter: DelegateAdapter<D>,
        options: LazyRepeatOptions,
    ) -> Result<Self> {
        let mut pool = LocalPool::new();
        let list = LazyRepeat::new(surface.clone(), adapter, options, pool.spawner())?;
        pool.run_until_stalled();
        Ok(Self {
            pool,
            list,
            surface,
            now_ms: 0,
        })
    }

    pub fn list(&self) -> &LazyRepeat<MemorySurface, D> {
        &self.list
    }

    pub fn surface(&self) -> &MemorySurface {
        &self.surface
    }

    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    pub fn snapshot(&self) -> RenderSnapshot {
        self.list.snapshot()
    }

    /// Runs every spawned task until none can make progress.
    pub fn pump(&mut self) {
        self.pool.run_until_stalled();
    }

    /// Advances the clock, fires due debounced renders and pumps.
    pub fn tick(&mut self, now_ms: u64) {
        self.now_ms = self.now_ms.max(now_ms);
        self.list.tick(self.now_ms);
        self.pump();
    }

    pub fn scroll_to(&mut self, scroll_top: i64) {
        self.surface.scroll_to(scroll_top, self.now_ms);
        self.pump();
    }

    pub fn touch_move(&mut self, scroll_top: i64) {
        self.surface.set_scroll_top(scroll_top);
        self.emit(HostEventKind::TouchMove);
    }

    pub fn touch_end(&mut self) {
        self.emit(HostEventKind::TouchEnd);
    }

    pub fn resize(&mut self, viewport: u32) {
        self.surface.resize(viewport, self.now_ms);
        self.pump();
    }

    fn emit(&mut self, kind: HostEventKind) {
        self.surface.emit(HostEvent::new(kind, self.now_ms));
        self.pump();
    }

    /// Pumps, then takes the result of `pending` if it has settled.
    pub fn resolve<T>(&mut self, mut pending: Pending<T>) -> Option<Result<T>> {
        self.pump();
        pending.try_take()
    }

    pub fn destroy(&mut self) {
        self.list.destroy();
        self.pump();
    }
}

impl<D> std::fmt::Debug for Controller<D>
where
    D: ContentDelegate<Visual = Block> + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("list", &self.list)
            .field("surface", &self.surface)
            .field("now_ms", &self.now_ms)
            .finish_non_exhaustive()
    }
}
