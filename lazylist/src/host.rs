use std::fmt;
use std::rc::Rc;

use futures::future::{FutureExt, LocalBoxFuture};

use crate::{HostEvent, HostEventKind};

/// A host event listener. The engine never runs its own logic inside the host's call; it
/// defers to the executor.
pub type Listener = Rc<dyn Fn(HostEvent)>;

/// The display tree the list lives in.
///
/// The engine owns its host value, so implementations backed by a real UI are usually cheap
/// handles into it.
pub trait HostSurface {
    /// A visual node; equality is node identity.
    type Node: Clone + PartialEq + 'static;
    type Scroller: ScrollContainer;

    /// Locates the scrolling ancestor of the list container.
    fn find_scroll_container(&self) -> Option<Self::Scroller>;

    /// Inserts (or reuses) the zero-height leading node that realizes the padding.
    fn prepare_placeholder(&mut self);

    fn placeholder_height(&self) -> u64;

    fn set_placeholder_height(&mut self, height: u64);

    /// Top of the list container relative to the viewport top. Negative once scrolled past.
    fn container_top(&self) -> i64;

    /// Inserts `node` before `reference`, or appends it when `reference` is `None`.
    fn insert_before(&mut self, node: Self::Node, reference: Option<&Self::Node>);

    fn remove(&mut self, node: &Self::Node);

    /// Current laid-out height of `node`.
    fn measure(&self, node: &Self::Node) -> u32;

    /// Pins the container height (`Some`) or restores natural sizing (`None`).
    fn set_fixed_height(&mut self, height: Option<u64>);

    /// Resolves once measurements of freshly attached nodes are authoritative.
    fn after_layout(&self) -> LocalBoxFuture<'static, ()> {
        yield_now().boxed_local()
    }
}

/// The scrollable viewport around the list.
pub trait ScrollContainer {
    fn scroll_top(&self) -> i64;

    fn viewport_height(&self) -> u32;

    fn subscribe(&mut self, kind: HostEventKind, listener: Listener) -> Subscription;

    fn on_scroll(&mut self, listener: Listener) -> Subscription {
        self.subscribe(HostEventKind::Scroll, listener)
    }

    fn on_touch_move(&mut self, listener: Listener) -> Subscription {
        self.subscribe(HostEventKind::TouchMove, listener)
    }

    fn on_touch_end(&mut self, listener: Listener) -> Subscription {
        self.subscribe(HostEventKind::TouchEnd, listener)
    }

    fn on_resize(&mut self, listener: Listener) -> Subscription {
        self.subscribe(HostEventKind::Resize, listener)
    }
}

/// An unsubscribe handle. The listener is released on [`Subscription::unsubscribe`] or drop.
#[must_use = "dropping a Subscription unsubscribes the listener"]
pub struct Subscription {
    release: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub fn new(release: impl FnOnce() + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// A handle with nothing to release.
    pub fn detached() -> Self {
        Self { release: None }
    }

    pub fn unsubscribe(mut self) {
        self.release_now();
    }

    fn release_now(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release_now();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.release.is_some())
            .finish()
    }
}

/// Yields to the executor once.
pub fn yield_now() -> YieldNow {
    YieldNow { yielded: false }
}

#[derive(Debug)]
#[must_use = "futures do nothing unless awaited"]
pub struct YieldNow {
    yielded: bool,
}

impl std::future::Future for YieldNow {
    type Output = ();

    fn poll(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<()> {
        if self.yielded {
            return std::task::Poll::Ready(());
        }
        self.yielded = true;
        cx.waker().wake_by_ref();
        std::task::Poll::Pending
    }
}
