use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::future::Future;
use std::ops::Range;
use std::rc::Rc;

use futures::channel::oneshot;
use futures::future::{FutureExt, Shared};
use futures::task::{LocalSpawn, LocalSpawnExt};

use crate::debounce::Debouncer;
use crate::delegate::{ContentDelegate, DelegateAdapter};
use crate::host::{HostSurface, Listener, ScrollContainer, Subscription};
use crate::offsets::OffsetTable;
use crate::pending::{LoadDone, Pending};
use crate::queue::{RenderQueue, TaskId};
use crate::types::RenderedItem;
use crate::{
    Error, HostEvent, HostEventKind, Item, LazyRepeatOptions, RenderSnapshot, Result,
    ScrollDirection,
};

type Completion<H, D> = Box<dyn FnOnce(&mut Inner<H, D>, Result<()>)>;

/// A lazy list renderer.
///
/// Keeps only the items near the viewport materialized in the host's display tree. Everything
/// above the first materialized item is represented by the padding placeholder, everything
/// below it is simply not rendered yet.
///
/// The engine is single-threaded. All deferred work (event handling, forward render tasks,
/// asynchronous item loads, layout settling) is spawned on the `LocalSpawn` passed to
/// [`LazyRepeat::new`]; the host pumps the matching executor.
pub struct LazyRepeat<H, D>
where
    H: HostSurface,
    D: ContentDelegate<Visual = H::Node>,
{
    core: Rc<Core<H, D>>,
    ready: Shared<Pending<()>>,
}

struct Core<H, D>
where
    H: HostSurface,
    D: ContentDelegate<Visual = H::Node>,
{
    state: RefCell<Inner<H, D>>,
    spawner: Rc<dyn LocalSpawn>,
}

struct Inner<H, D>
where
    H: HostSurface,
    D: ContentDelegate<Visual = H::Node>,
{
    host: H,
    scroller: H::Scroller,
    delegate: DelegateAdapter<D>,
    options: LazyRepeatOptions,
    offsets: OffsetTable,
    rendered: BTreeMap<usize, RenderedItem<H::Node>>,
    loading: BTreeSet<usize>,
    /// Indices loading for the backward path, all tagged with `backward_epoch`.
    backward_loads: BTreeSet<usize>,
    backward_epoch: u64,
    queue: RenderQueue<ForwardPass<H, D>>,
    is_refreshing: bool,
    last_scroll_top: i64,
    scroll_debounce: Debouncer,
    touch_end_refire: Debouncer,
    subscriptions: Vec<Subscription>,
    destroyed: bool,
}

struct RenderRequest<H, D>
where
    H: HostSurface,
    D: ContentDelegate<Visual = H::Node>,
{
    force_forward: bool,
    force_start: Option<usize>,
    on_complete: Option<Completion<H, D>>,
}

impl<H, D> RenderRequest<H, D>
where
    H: HostSurface,
    D: ContentDelegate<Visual = H::Node>,
{
    fn on_change() -> Self {
        Self {
            force_forward: false,
            force_start: None,
            on_complete: None,
        }
    }

    fn forced(force_start: Option<usize>, on_complete: Completion<H, D>) -> Self {
        Self {
            force_forward: true,
            force_start,
            on_complete: Some(on_complete),
        }
    }
}

/// A queued "render forward" unit of work.
struct ForwardPass<H, D>
where
    H: HostSurface,
    D: ContentDelegate<Visual = H::Node>,
{
    force_start: Option<usize>,
    limit: i64,
    container_top: i64,
    on_complete: Option<Completion<H, D>>,
}

enum PassError {
    /// The task lost its token, or the engine went away. Never surfaced.
    Superseded,
    Failed(Error),
}

impl From<Error> for PassError {
    fn from(err: Error) -> Self {
        Self::Failed(err)
    }
}

impl<H, D> LazyRepeat<H, D>
where
    H: HostSurface + 'static,
    D: ContentDelegate<Visual = H::Node> + 'static,
{
    /// Mounts the engine on `host` and starts the first render pass.
    ///
    /// Fails with [`Error::Setup`] when the host has no scrolling container. The first pass
    /// completes asynchronously; see [`LazyRepeat::ready`].
    pub fn new(
        mut host: H,
        delegate: DelegateAdapter<D>,
        options: LazyRepeatOptions,
        spawner: impl LocalSpawn + 'static,
    ) -> Result<Self> {
        let Some(scroller) = host.find_scroll_container() else {
            vwarn!("LazyRepeat::new: no scrolling container");
            return Err(Error::Setup(
                "a lazy list must be a descendant of a scrolling container".into(),
            ));
        };
        host.prepare_placeholder();
        host.set_placeholder_height(0);
        let last_scroll_top = scroller.scroll_top();
        vdebug!(
            overrender_factor = options.overrender_factor,
            touch_events = options.touch_events,
            "LazyRepeat::new"
        );

        let inner = Inner {
            host,
            scroller,
            delegate,
            offsets: OffsetTable::new(options.offset_growth),
            rendered: BTreeMap::new(),
            loading: BTreeSet::new(),
            backward_loads: BTreeSet::new(),
            backward_epoch: 0,
            queue: RenderQueue::new(),
            is_refreshing: false,
            last_scroll_top,
            scroll_debounce: Debouncer::new(options.scroll_debounce_ms),
            touch_end_refire: Debouncer::new(options.touch_end_refire_ms),
            subscriptions: Vec::new(),
            destroyed: false,
            options,
        };
        let core = Rc::new(Core {
            state: RefCell::new(inner),
            spawner: Rc::new(spawner),
        });
        Core::bridge_events(&core);
        let ready = Core::setup(&core).shared();
        Ok(Self { core, ready })
    }

    /// Resolves when the first render pass has completed.
    pub fn ready(&self) -> Shared<Pending<()>> {
        self.ready.clone()
    }

    /// Resets the list and re-renders from the top.
    ///
    /// Rejects with [`Error::State`] while a setup or full refresh is running.
    pub fn setup(&self) -> Pending<()> {
        Core::setup(&self.core)
    }

    /// Pixels of reserved leading space standing in for the items above the first
    /// materialized one.
    pub fn padding(&self) -> u64 {
        self.core.state.borrow().host.placeholder_height()
    }

    pub fn set_padding(&self, padding: u64) {
        self.core
            .state
            .borrow_mut()
            .host
            .set_placeholder_height(padding);
    }

    /// Refreshes one materialized item, or the whole list when `index` is `None`.
    ///
    /// Fails immediately only where [`LazyRepeat::refresh_all`] does.
    pub fn refresh(&self, index: Option<usize>) -> Result<Pending<Option<H::Node>>> {
        let (resolver, pending) = Pending::channel();
        match index {
            Some(index) => {
                let inner = Core::refresh_item(&self.core, index);
                self.core.spawn(async move {
                    resolver.resolve(inner.await.map(Some));
                });
            }
            None => {
                let inner = Core::refresh_all(&self.core)?;
                self.core.spawn(async move {
                    resolver.resolve(inner.await.map(|()| None));
                });
            }
        }
        Ok(pending)
    }

    /// Reloads the visual of a materialized item and swaps it in place.
    ///
    /// Rejects with [`Error::State`] when `index` is not materialized or is already being
    /// refreshed. Resolves with the new visual once its height has been recorded.
    pub fn refresh_item(&self, index: usize) -> Pending<H::Node> {
        Core::refresh_item(&self.core, index)
    }

    /// Tears down every materialized item and renders again from the first one.
    ///
    /// The container height is pinned for the duration so the scroll position survives.
    ///
    /// A delegate count that violates its contract fails the call itself. Overlapping
    /// refreshes and calls after [`LazyRepeat::destroy`] reject the returned [`Pending`] with
    /// [`Error::State`].
    pub fn refresh_all(&self) -> Result<Pending<()>> {
        Core::refresh_all(&self.core)
    }

    /// Runs a render pass for the current scroll position, as a scroll event would.
    pub fn render(&self) {
        Core::on_change(&self.core);
    }

    /// Feeds a host event through the event bridge (debouncing included).
    ///
    /// Events delivered through the scroll container's subscriptions end up here as well.
    pub fn handle_event(&self, event: HostEvent) {
        Core::handle_event(&self.core, event);
    }

    /// Fires debounced renders whose deadline has passed. Call this once per frame.
    pub fn tick(&self, now_ms: u64) {
        let fire = {
            let mut st = self.core.state.borrow_mut();
            if st.destroyed {
                return;
            }
            let scroll = st.scroll_debounce.poll(now_ms);
            let touch_end = st.touch_end_refire.poll(now_ms);
            scroll || touch_end
        };
        if fire {
            vtrace!(now_ms, "LazyRepeat::tick: debounced render");
            Core::on_change(&self.core);
        }
    }

    /// Removes every materialized item, tears down the delegate and releases the host
    /// subscriptions. Calling it again is a no-op.
    pub fn destroy(&self) {
        let subscriptions = {
            let mut st = self.core.state.borrow_mut();
            if st.destroyed {
                return;
            }
            vdebug!(materialized = st.rendered.len(), "LazyRepeat::destroy");
            st.destroyed = true;
            st.remove_all();
            st.delegate.destroy();
            st.queue.supersede_all();
            st.loading.clear();
            st.scroll_debounce.cancel();
            st.touch_end_refire.cancel();
            std::mem::take(&mut st.subscriptions)
        };
        // Released outside the borrow: a host may call back while unsubscribing.
        drop(subscriptions);
    }

    pub fn is_destroyed(&self) -> bool {
        self.core.state.borrow().destroyed
    }

    pub fn is_refreshing(&self) -> bool {
        self.core.state.borrow().is_refreshing
    }

    pub fn count_items(&self) -> Result<usize> {
        self.core.state.borrow().delegate.count_items()
    }

    pub fn has_render_function(&self) -> bool {
        self.core.state.borrow().delegate.has_render_function()
    }

    /// Materialized indices in ascending order.
    pub fn materialized(&self) -> Vec<usize> {
        self.core.state.borrow().rendered.keys().copied().collect()
    }

    pub fn is_materialized(&self, index: usize) -> bool {
        self.core.state.borrow().rendered.contains_key(&index)
    }

    /// The visual of a materialized item.
    pub fn element(&self, index: usize) -> Option<H::Node> {
        self.core
            .state
            .borrow()
            .rendered
            .get(&index)
            .map(|r| r.item.element.clone())
    }

    /// The recorded top offset of `index` in container coordinates.
    pub fn item_top(&self, index: usize) -> Option<u64> {
        self.core.state.borrow().offsets.top(index)
    }

    /// The recorded height of `index`, when both of its offsets are known.
    pub fn item_height(&self, index: usize) -> Option<u64> {
        self.core.state.borrow().offsets.height(index)
    }

    pub fn snapshot(&self) -> RenderSnapshot {
        let st = self.core.state.borrow();
        RenderSnapshot {
            padding: st.host.placeholder_height(),
            materialized: st.rendered.keys().copied().collect(),
            offsets_len: st.offsets.len(),
            is_refreshing: st.is_refreshing,
            running_task: st.queue.running().map(TaskId::get),
            pending_tasks: st.queue.pending_len(),
        }
    }

    /// Whether no render task is running or queued.
    pub fn is_idle(&self) -> bool {
        let st = self.core.state.borrow();
        st.queue.is_idle() && st.loading.is_empty()
    }
}

impl<H, D> fmt::Debug for LazyRepeat<H, D>
where
    H: HostSurface,
    D: ContentDelegate<Visual = H::Node>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.core.state.try_borrow() {
            Ok(st) => f
                .debug_struct("LazyRepeat")
                .field("materialized", &st.rendered.len())
                .field("is_refreshing", &st.is_refreshing)
                .field("destroyed", &st.destroyed)
                .field("options", &st.options)
                .finish_non_exhaustive(),
            Err(_) => f.write_str("LazyRepeat { <busy> }"),
        }
    }
}

impl<H, D> Core<H, D>
where
    H: HostSurface + 'static,
    D: ContentDelegate<Visual = H::Node> + 'static,
{
    fn spawn(&self, future: impl Future<Output = ()> + 'static) {
        if let Err(err) = self.spawner.spawn_local(future) {
            vwarn!(%err, "LazyRepeat: executor is gone, dropping continuation");
        }
    }

    fn bridge_events(this: &Rc<Self>) {
        let weak = Rc::downgrade(this);
        let listener: Listener = Rc::new(move |event: HostEvent| {
            let Some(core) = weak.upgrade() else {
                return;
            };
            let target = Rc::clone(&core);
            core.spawn(async move { Self::handle_event(&target, event) });
        });

        let mut st = this.state.borrow_mut();
        let mut subscriptions = Vec::with_capacity(4);
        subscriptions.push(st.scroller.on_scroll(Rc::clone(&listener)));
        if st.options.touch_events {
            subscriptions.push(st.scroller.on_touch_move(Rc::clone(&listener)));
            subscriptions.push(st.scroller.on_touch_end(Rc::clone(&listener)));
        }
        subscriptions.push(st.scroller.on_resize(listener));
        st.subscriptions = subscriptions;
    }

    fn handle_event(this: &Rc<Self>, event: HostEvent) {
        let render_now = {
            let mut st = this.state.borrow_mut();
            if st.destroyed {
                return;
            }
            vtrace!(kind = ?event.kind, now_ms = event.now_ms, "LazyRepeat::handle_event");
            if !st.options.touch_events {
                true
            } else if event.kind == HostEventKind::TouchEnd {
                st.touch_end_refire.call(event.now_ms);
                true
            } else {
                st.scroll_debounce.call(event.now_ms)
            }
        };
        if render_now {
            Self::on_change(this);
        }
    }

    fn on_change(this: &Rc<Self>) {
        let mut st = this.state.borrow_mut();
        if st.destroyed || st.is_refreshing {
            return;
        }
        if let Err(err) = st.render(this, RenderRequest::on_change()) {
            vwarn!(%err, "LazyRepeat: render pass aborted");
        }
    }

    fn setup(this: &Rc<Self>) -> Pending<()> {
        let mut st = this.state.borrow_mut();
        if st.destroyed {
            return Pending::resolved(Err(Error::state("the lazy list has been destroyed")));
        }
        if st.is_refreshing {
            return Pending::resolved(Err(Error::state("already refreshing")));
        }
        vdebug!("LazyRepeat::setup");
        st.is_refreshing = true;
        st.remove_all();
        st.host.set_placeholder_height(0);

        let (resolver, pending) = Pending::channel();
        let on_complete: Completion<H, D> = Box::new(move |st, result| {
            st.is_refreshing = false;
            resolver.resolve(result);
        });
        // Failures are routed through `on_complete`.
        let _ = st.render(this, RenderRequest::forced(None, on_complete));
        pending
    }

    fn refresh_all(this: &Rc<Self>) -> Result<Pending<()>> {
        let mut guard = this.state.borrow_mut();
        let st = &mut *guard;
        if st.destroyed {
            return Ok(Pending::resolved(Err(Error::state(
                "the lazy list has been destroyed",
            ))));
        }
        if st.is_refreshing {
            return Ok(Pending::resolved(Err(Error::state("already refreshing"))));
        }
        if st.delegate.count_items()? == 0 {
            return Ok(Pending::resolved(Ok(())));
        }

        st.is_refreshing = true;
        let first = st.first_rendered().unwrap_or(0);
        let frozen = st.offsets.top(first).unwrap_or(0) + st.rendered_height();
        vdebug!(first, frozen, "LazyRepeat::refresh_all");
        st.host.set_fixed_height(Some(frozen));
        st.remove_all();

        let (resolver, pending) = Pending::channel();
        let on_complete: Completion<H, D> = Box::new(move |st, result| {
            st.host.set_fixed_height(None);
            st.is_refreshing = false;
            resolver.resolve(result);
        });
        let _ = st.render(this, RenderRequest::forced(Some(first), on_complete));
        Ok(pending)
    }

    fn refresh_item(this: &Rc<Self>, index: usize) -> Pending<H::Node> {
        let mut guard = this.state.borrow_mut();
        let st = &mut *guard;
        if st.destroyed {
            return Pending::resolved(Err(Error::state("the lazy list has been destroyed")));
        }
        match st.rendered.get_mut(&index) {
            None => {
                return Pending::resolved(Err(Error::state(format!(
                    "item {index} is not rendered"
                ))));
            }
            Some(entry) if entry.is_refreshing => {
                return Pending::resolved(Err(Error::state(format!(
                    "item {index} is already refreshing"
                ))));
            }
            Some(entry) => entry.is_refreshing = true,
        }

        let (done, rx) = LoadDone::channel();
        if let Err(err) = st.delegate.load_item_element(index, done) {
            st.clear_refreshing(index);
            return Pending::resolved(Err(err));
        }
        vtrace!(index, "LazyRepeat::refresh_item");

        let (resolver, pending) = Pending::channel();
        let core = Rc::clone(this);
        this.spawn(async move {
            let result = Self::finish_refresh(&core, index, rx).await;
            resolver.resolve(result);
        });
        pending
    }

    async fn finish_refresh(
        this: &Rc<Self>,
        index: usize,
        rx: oneshot::Receiver<Item<H::Node>>,
    ) -> Result<H::Node> {
        let Ok(item) = rx.await else {
            this.state.borrow_mut().clear_refreshing(index);
            return Err(dropped_completion(index));
        };
        let element = item.element.clone();

        let settle = {
            let mut guard = this.state.borrow_mut();
            let st = &mut *guard;
            if st.destroyed {
                return Err(Error::state("the lazy list has been destroyed"));
            }
            let Some(entry) = st.rendered.get_mut(&index).filter(|e| e.is_refreshing) else {
                st.delegate.destroy_item(index, &item);
                return Err(removed_while_refreshing(index));
            };
            let old = std::mem::replace(&mut entry.item, item);
            st.host.insert_before(element.clone(), Some(&old.element));
            st.delegate.destroy_item(index, &old);
            st.host.remove(&old.element);
            st.host.after_layout()
        };
        settle.await;

        let mut guard = this.state.borrow_mut();
        let st = &mut *guard;
        match st.rendered.get_mut(&index) {
            Some(entry) if entry.is_refreshing && entry.item.element == element => {
                entry.is_refreshing = false;
                let height = st.host.measure(&element);
                st.offsets.set_span(index, u64::from(height));
                st.sync_padding();
                Ok(element)
            }
            _ => Err(removed_while_refreshing(index)),
        }
    }

    /// Drives the render queue until it is empty. At most one driver runs at a time.
    async fn drive_queue(this: Rc<Self>) {
        loop {
            let next = this.state.borrow_mut().queue.start_next();
            let Some((id, pass)) = next else {
                return;
            };
            Self::run_forward(&this, id, pass).await;
        }
    }

    async fn run_forward(this: &Rc<Self>, id: TaskId, mut pass: ForwardPass<H, D>) {
        let result = Self::render_forward(this, id, pass.force_start, pass.limit).await;

        let mut st = this.state.borrow_mut();
        let outcome = match result {
            Ok((reached, count)) => {
                st.trim_forward(pass.container_top, reached, count);
                Ok(())
            }
            Err(PassError::Superseded) => {
                vtrace!(id = id.get(), "LazyRepeat: forward task superseded");
                Ok(())
            }
            Err(PassError::Failed(err)) => {
                vwarn!(id = id.get(), %err, "LazyRepeat: forward task failed");
                Err(err)
            }
        };
        if let Some(on_complete) = pass.on_complete.take() {
            on_complete(&mut *st, outcome);
        }
    }

    /// Renders one item at a time from the start index until `limit` is passed or items run
    /// out. Returns the reached index and the item count used.
    async fn render_forward(
        this: &Rc<Self>,
        id: TaskId,
        force_start: Option<usize>,
        limit: i64,
    ) -> std::result::Result<(usize, usize), PassError> {
        let (mut index, count) = {
            let st = this.state.borrow();
            if st.destroyed || !st.queue.is_current(id) {
                return Err(PassError::Superseded);
            }
            let last = st.last_rendered().unwrap_or(0);
            let start = force_start.map_or(last, |forced| forced.max(last));
            (start, st.delegate.count_items()?)
        };
        vtrace!(id = id.get(), start = index, count, limit, "LazyRepeat: forward task");

        while index < count {
            let bottom = Self::render_element_async(this, index, id).await?;
            if as_signed(bottom) > limit {
                return Ok((index, count));
            }
            index += 1;
        }
        Ok((index, count))
    }

    /// Materializes `index` at its position and waits for layout before committing its
    /// height. Returns the item's bottom offset.
    async fn render_element_async(
        this: &Rc<Self>,
        index: usize,
        id: TaskId,
    ) -> std::result::Result<u64, PassError> {
        let rx = {
            let mut guard = this.state.borrow_mut();
            let st = &mut *guard;
            if st.destroyed || !st.queue.is_current(id) {
                return Err(PassError::Superseded);
            }
            if let Some(entry) = st.rendered.get(&index) {
                st.delegate.update_item(index, &entry.item);
                let bottom = st.offsets.top(index + 1).or_else(|| st.offsets.top(index));
                return Ok(bottom.unwrap_or(0));
            }
            if st.loading.contains(&index) {
                vdebug!(index, "LazyRepeat: item is already loading, ending forward task");
                return Err(PassError::Superseded);
            }
            st.offsets.ensure(index + 1);
            let (done, rx) = LoadDone::channel();
            st.delegate.load_item_element(index, done)?;
            st.loading.insert(index);
            rx
        };

        let item = match rx.await {
            Ok(item) => item,
            Err(oneshot::Canceled) => {
                this.state.borrow_mut().loading.remove(&index);
                return Err(PassError::Failed(dropped_completion(index)));
            }
        };

        let settle = {
            let mut guard = this.state.borrow_mut();
            let st = &mut *guard;
            st.loading.remove(&index);
            if st.destroyed {
                return Err(PassError::Superseded);
            }
            let reference = st.node_after(index);
            st.host
                .insert_before(item.element.clone(), reference.as_ref());
            st.host.after_layout()
        };
        settle.await;

        let mut guard = this.state.borrow_mut();
        let st = &mut *guard;
        if st.destroyed || !st.queue.is_current(id) || st.rendered.contains_key(&index) {
            vtrace!(index, id = id.get(), "LazyRepeat: discarding speculative item");
            st.delegate.destroy_item(index, &item);
            st.host.remove(&item.element);
            return Err(PassError::Superseded);
        }
        let height = st.host.measure(&item.element);
        let bottom = st.offsets.set_span(index, u64::from(height));
        st.rendered.insert(index, RenderedItem::new(item));
        st.sync_padding();
        Ok(bottom.unwrap_or(u64::MAX))
    }

    /// Completes a backward-path load that did not finish synchronously.
    ///
    /// A load whose window was replaced in the meantime (a later backward pass, a forward
    /// trim, a reset) is dropped instead of attached.
    async fn finish_backward_load(
        this: Rc<Self>,
        index: usize,
        epoch: u64,
        rx: oneshot::Receiver<Item<H::Node>>,
    ) {
        let result = rx.await;
        let mut guard = this.state.borrow_mut();
        let st = &mut *guard;
        let current = st.backward_epoch == epoch;
        if current {
            st.loading.remove(&index);
            st.backward_loads.remove(&index);
        }
        let item = match result {
            Ok(item) => item,
            Err(oneshot::Canceled) => {
                vwarn!(index, "LazyRepeat: item load dropped without completion");
                return;
            }
        };
        if st.destroyed || !current || st.rendered.contains_key(&index) {
            vtrace!(index, epoch, current, "LazyRepeat: dropping stale backward load");
            st.delegate.destroy_item(index, &item);
            return;
        }
        st.attach(&this, index, item);
    }

    /// Re-measures a backward-rendered item once layout has settled.
    async fn remeasure(this: Rc<Self>, index: usize, element: H::Node) {
        let settle = this.state.borrow().host.after_layout();
        settle.await;
        let mut guard = this.state.borrow_mut();
        let st = &mut *guard;
        let current = st
            .rendered
            .get(&index)
            .is_some_and(|e| !e.is_refreshing && e.item.element == element);
        if !current {
            return;
        }
        let height = st.host.measure(&element);
        st.offsets.set_span(index, u64::from(height));
        st.sync_padding();
    }
}

impl<H, D> Inner<H, D>
where
    H: HostSurface + 'static,
    D: ContentDelegate<Visual = H::Node> + 'static,
{
    /// One pass of the render/derender algorithm.
    fn render(&mut self, core: &Rc<Core<H, D>>, mut request: RenderRequest<H, D>) -> Result<()> {
        let count = match self.delegate.count_items() {
            Ok(count) => count,
            Err(err) => {
                if let Some(on_complete) = request.on_complete.take() {
                    on_complete(self, Err(err.clone()));
                }
                return Err(err);
            }
        };
        let container_top = self.host.container_top();
        let limit = self
            .options
            .render_limit(self.scroller.viewport_height(), container_top);

        let scroll_top = self.scroller.scroll_top();
        let direction = if !request.force_forward && self.last_scroll_top > scroll_top {
            ScrollDirection::Backward
        } else {
            ScrollDirection::Forward
        };
        self.last_scroll_top = scroll_top;
        vtrace!(?direction, container_top, limit, count, "LazyRepeat::render");

        match direction {
            ScrollDirection::Backward => {
                let result = self.render_backward(core, container_top, limit, count);
                if let Some(on_complete) = request.on_complete.take() {
                    on_complete(self, result.clone());
                }
                result
            }
            ScrollDirection::Forward => {
                let pass = ForwardPass {
                    force_start: request.force_start,
                    limit,
                    container_top,
                    on_complete: request.on_complete.take(),
                };
                let (id, start_driver) = self.queue.push(pass);
                if start_driver {
                    core.spawn(Core::drive_queue(Rc::clone(core)));
                }
                vtrace!(id = id.get(), start_driver, "LazyRepeat: forward task queued");
                Ok(())
            }
        }
    }

    /// The synchronous scroll-up path.
    fn render_backward(
        &mut self,
        core: &Rc<Core<H, D>>,
        container_top: i64,
        limit: i64,
        count: usize,
    ) -> Result<()> {
        self.retire_backward_loads();
        let first = self
            .offsets
            .find_start_index(container_top, count)
            .saturating_sub(self.options.start_backoff);
        let last = self.last_rendered().unwrap_or(0);
        let mut end = first;
        while end <= last && end < count && self.offsets.starts_before(end, limit) {
            end += 1;
        }
        let window = first..end;

        for index in window.clone().rev() {
            self.render_element(core, index)?;
        }

        let doomed = self.rendered_outside(&window);
        vtrace!(
            first,
            end,
            removed = doomed.len(),
            "LazyRepeat: backward window"
        );
        for index in doomed {
            self.remove_element(index, ScrollDirection::Backward);
        }
        self.queue.supersede_all();
        self.sync_padding();
        Ok(())
    }

    /// Materializes `index` for the backward path, reusing it when already rendered.
    fn render_element(&mut self, core: &Rc<Core<H, D>>, index: usize) -> Result<()> {
        if let Some(entry) = self.rendered.get(&index) {
            self.delegate.update_item(index, &entry.item);
            return Ok(());
        }
        if self.loading.contains(&index) {
            return Ok(());
        }
        let (done, mut rx) = LoadDone::channel();
        self.delegate.load_item_element(index, done)?;
        match rx.try_recv() {
            Ok(Some(item)) => {
                self.attach(core, index, item);
                Ok(())
            }
            Ok(None) => {
                self.loading.insert(index);
                self.backward_loads.insert(index);
                let epoch = self.backward_epoch;
                core.spawn(Core::finish_backward_load(Rc::clone(core), index, epoch, rx));
                Ok(())
            }
            Err(oneshot::Canceled) => Err(dropped_completion(index)),
        }
    }

    /// Inserts a backward-path item in index order and schedules its measurement.
    fn attach(&mut self, core: &Rc<Core<H, D>>, index: usize, item: Item<H::Node>) {
        let reference = self.node_after(index);
        let element = item.element.clone();
        self.host.insert_before(element.clone(), reference.as_ref());
        self.rendered.insert(index, RenderedItem::new(item));
        self.sync_padding();
        core.spawn(Core::remeasure(Rc::clone(core), index, element));
    }

    /// Drops everything outside `[start_index - backoff, reached]` after a forward task.
    fn trim_forward(&mut self, container_top: i64, reached: usize, count: usize) {
        self.retire_backward_loads();
        let first = self
            .offsets
            .find_start_index(container_top, count)
            .saturating_sub(self.options.start_backoff);
        let doomed = self.rendered_outside(&(first..reached.saturating_add(1)));
        vtrace!(first, reached, removed = doomed.len(), "LazyRepeat: forward trim");
        for index in doomed {
            self.remove_element(index, ScrollDirection::Forward);
        }
        self.sync_padding();
    }

    fn rendered_outside(&self, window: &Range<usize>) -> Vec<usize> {
        self.rendered
            .keys()
            .copied()
            .filter(|index| !window.contains(index))
            .collect()
    }

    /// Tears down one materialized item. On the forward path its height is re-measured first
    /// so later layout changes are reflected in the padding.
    fn remove_element(&mut self, index: usize, direction: ScrollDirection) {
        let Some(entry) = self.rendered.remove(&index) else {
            return;
        };
        if direction == ScrollDirection::Forward {
            let height = self.host.measure(&entry.item.element);
            self.offsets.set_span(index, u64::from(height));
        }
        self.delegate.destroy_item(index, &entry.item);
        self.host.remove(&entry.item.element);
    }

    fn remove_all(&mut self) {
        self.retire_backward_loads();
        let indices: Vec<usize> = self.rendered.keys().copied().collect();
        for index in indices {
            self.remove_element(index, ScrollDirection::Backward);
        }
    }

    /// Invalidates every pending backward load; their items are destroyed when they land.
    fn retire_backward_loads(&mut self) {
        self.backward_epoch += 1;
        for index in std::mem::take(&mut self.backward_loads) {
            self.loading.remove(&index);
        }
    }

    fn clear_refreshing(&mut self, index: usize) {
        if let Some(entry) = self.rendered.get_mut(&index) {
            entry.is_refreshing = false;
        }
    }

    /// Keeps `padding == offsets[first materialized]`.
    fn sync_padding(&mut self) {
        let Some(first) = self.first_rendered() else {
            return;
        };
        if let Some(top) = self.offsets.top(first) {
            if self.host.placeholder_height() != top {
                self.host.set_placeholder_height(top);
            }
        }
    }

    fn first_rendered(&self) -> Option<usize> {
        self.rendered.keys().next().copied()
    }

    fn last_rendered(&self) -> Option<usize> {
        self.rendered.keys().next_back().copied()
    }

    /// The node of the nearest materialized item after `index`.
    fn node_after(&self, index: usize) -> Option<H::Node> {
        self.rendered
            .range(index + 1..)
            .next()
            .map(|(_, entry)| entry.item.element.clone())
    }

    fn rendered_height(&self) -> u64 {
        self.rendered
            .values()
            .map(|entry| u64::from(self.host.measure(&entry.item.element)))
            .sum()
    }
}

fn dropped_completion(index: usize) -> Error {
    Error::contract(format!(
        "loadItemElement({index}) dropped its completion without delivering an item"
    ))
}

fn removed_while_refreshing(index: usize) -> Error {
    Error::state(format!("item {index} was removed while refreshing"))
}

fn as_signed(v: u64) -> i64 {
    i64::try_from(v).unwrap_or(i64::MAX)
}
