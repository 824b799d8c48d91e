//! A lazy list renderer for scrollable containers.
//!
//! Only the items near the viewport are materialized in the host's display tree. The engine
//! keeps a running table of measured item offsets, so every item above the first materialized
//! one is represented by a single padding placeholder and scroll height and position stay
//! correct.
//!
//! The crate is UI-agnostic. A host layer is expected to provide:
//! - a [`HostSurface`] (the list container: insert/remove/measure nodes, a padding placeholder)
//! - a [`ScrollContainer`] (scroll position, viewport height, event subscriptions)
//! - a [`ContentDelegate`] (item count and item visuals)
//!
//! All deferred work runs on a single-threaded executor (`futures::executor::LocalPool` or any
//! other `LocalSpawn`), pumped by the host.
//!
//! For a headless host surface and a driving controller, see the `lazylist-adapter` crate.
#![forbid(unsafe_code)]

#[macro_use]
mod macros;

mod debounce;
mod delegate;
mod error;
mod host;
mod lazy_repeat;
mod offsets;
mod options;
mod pending;
mod queue;
mod state;
mod types;


pub use debounce::Debouncer;
pub use delegate::{ContentDelegate, DelegateAdapter};
pub use error::{Error, Result};
pub use host::{HostSurface, Listener, ScrollContainer, Subscription, YieldNow, yield_now};
pub use lazy_repeat::LazyRepeat;
pub use options::LazyRepeatOptions;
pub use pending::{LoadDone, Pending};
pub use queue::TaskId;
pub use state::RenderSnapshot;
pub use types::{HostEvent, HostEventKind, Item, ScrollDirection};
