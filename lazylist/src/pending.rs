use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::channel::oneshot;

use crate::{Error, Item, Result};

/// The eventual result of an engine operation (setup, refresh).
///
/// `Pending` is a future; hosts that do not `.await` can poll it with [`Pending::try_take`]
/// after pumping the executor.
#[must_use = "a Pending does nothing unless awaited or polled"]
pub struct Pending<T> {
    rx: oneshot::Receiver<Result<T>>,
}

impl<T> Pending<T> {
    pub(crate) fn channel() -> (Resolver<T>, Self) {
        let (tx, rx) = oneshot::channel();
        (Resolver { tx }, Self { rx })
    }

    pub(crate) fn resolved(value: Result<T>) -> Self {
        let (resolver, pending) = Self::channel();
        resolver.resolve(value);
        pending
    }

    /// Returns the result if it is available, without blocking.
    ///
    /// `None` means the operation is still running.
    pub fn try_take(&mut self) -> Option<Result<T>> {
        match self.rx.try_recv() {
            Ok(v) => v,
            Err(oneshot::Canceled) => Some(Err(dropped())),
        }
    }
}

impl<T> Future for Pending<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(v)) => Poll::Ready(v),
            Poll::Ready(Err(oneshot::Canceled)) => Poll::Ready(Err(dropped())),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<T> fmt::Debug for Pending<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pending").finish_non_exhaustive()
    }
}

fn dropped() -> Error {
    Error::state("the engine was torn down before the operation finished")
}

pub(crate) struct Resolver<T> {
    tx: oneshot::Sender<Result<T>>,
}

impl<T> Resolver<T> {
    pub(crate) fn resolve(self, value: Result<T>) {
        // The receiver may already be gone; nobody is waiting then.
        let _ = self.tx.send(value);
    }
}

/// Completion handle handed to [`crate::ContentDelegate::load_item_element`].
///
/// A delegate calls [`LoadDone::complete`] exactly once, either before returning from
/// `load_item_element` or at any later point. Dropping the handle without completing it is a
/// contract violation.
pub struct LoadDone<V> {
    tx: oneshot::Sender<Item<V>>,
}

impl<V> LoadDone<V> {
    pub(crate) fn channel() -> (Self, oneshot::Receiver<Item<V>>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx }, rx)
    }

    pub fn complete(self, item: Item<V>) {
        // The engine may have been torn down in the meantime.
        let _ = self.tx.send(item);
    }

    pub fn complete_with(self, element: V) {
        self.complete(Item::new(element));
    }

    /// Whether the engine still waits for this item.
    pub fn is_wanted(&self) -> bool {
        !self.tx.is_canceled()
    }
}

impl<V> fmt::Debug for LoadDone<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadDone")
            .field("wanted", &self.is_wanted())
            .finish()
    }
}
