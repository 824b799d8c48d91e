use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use lazylist::{HostEvent, HostEventKind, HostSurface, Listener, ScrollContainer, Subscription};

/// A node of a [`MemorySurface`]. Equality is identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Block(u64);

impl Block {
    pub fn id(self) -> u64 {
        self.0
    }
}

#[derive(Default)]
struct SurfaceState {
    next_block: u64,
    heights: HashMap<Block, u32>,
    children: Vec<Block>,
    placeholder: Option<u64>,
    fixed_height: Option<u64>,
    scroll_top: i64,
    viewport: u32,
    content_offset: i64,
    scrollable: bool,
    next_listener: u64,
    listeners: Vec<(u64, HostEventKind, Listener)>,
}

/// An in-memory list container inside a scrollable viewport.
///
/// Blocks have a fixed height that can be changed at any time; layout is the placeholder
/// followed by the children in order. `MemorySurface` is a cheap handle: clones share the
/// same tree, so a delegate can create blocks on the surface the engine owns.
#[derive(Clone, Default)]
pub struct MemorySurface {
    state: Rc<RefCell<SurfaceState>>,
}

impl MemorySurface {
    pub fn new(viewport: u32) -> Self {
        let surface = Self::default();
        {
            let mut st = surface.state.borrow_mut();
            st.viewport = viewport;
            st.scrollable = true;
        }
        surface
    }

    /// A surface without a scrolling ancestor.
    pub fn detached() -> Self {
        Self::default()
    }

    /// Offsets the list container by `offset` pixels from the top of the scroll content.
    pub fn with_content_offset(self, offset: i64) -> Self {
        self.state.borrow_mut().content_offset = offset;
        self
    }

    pub fn create_block(&self, height: u32) -> Block {
        let mut st = self.state.borrow_mut();
        let block = Block(st.next_block);
        st.next_block += 1;
        st.heights.insert(block, height);
        block
    }

    pub fn set_block_height(&self, block: Block, height: u32) {
        self.state.borrow_mut().heights.insert(block, height);
    }

    pub fn block_height(&self, block: Block) -> Option<u32> {
        self.state.borrow().heights.get(&block).copied()
    }

    /// Number of blocks ever created.
    pub fn blocks_created(&self) -> u64 {
        self.state.borrow().next_block
    }

    /// Attached blocks in document order (the placeholder excluded).
    pub fn children(&self) -> Vec<Block> {
        self.state.borrow().children.clone()
    }

    pub fn contains(&self, block: Block) -> bool {
        self.state.borrow().children.contains(&block)
    }

    pub fn has_placeholder(&self) -> bool {
        self.state.borrow().placeholder.is_some()
    }

    pub fn fixed_height(&self) -> Option<u64> {
        self.state.borrow().fixed_height
    }

    /// Height of the list container: pinned, or the placeholder plus every attached block.
    pub fn content_height(&self) -> u64 {
        let st = self.state.borrow();
        st.fixed_height.unwrap_or_else(|| {
            st.placeholder.unwrap_or(0)
                + st
                    .children
                    .iter()
                    .map(|b| u64::from(st.heights.get(b).copied().unwrap_or(0)))
                    .sum::<u64>()
        })
    }

    pub fn scroll_top(&self) -> i64 {
        self.state.borrow().scroll_top
    }

    /// Moves the viewport without notifying anyone.
    pub fn set_scroll_top(&self, scroll_top: i64) {
        self.state.borrow_mut().scroll_top = scroll_top;
    }

    pub fn viewport(&self) -> u32 {
        self.state.borrow().viewport
    }

    pub fn set_viewport(&self, viewport: u32) {
        self.state.borrow_mut().viewport = viewport;
    }

    pub fn listener_count(&self) -> usize {
        self.state.borrow().listeners.len()
    }

    /// Delivers `event` to every listener subscribed to its kind.
    pub fn emit(&self, event: HostEvent) {
        let listeners: Vec<Listener> = self
            .state
            .borrow()
            .listeners
            .iter()
            .filter(|(_, kind, _)| *kind == event.kind)
            .map(|(_, _, l)| Rc::clone(l))
            .collect();
        for listener in listeners {
            listener(event);
        }
    }

    pub fn scroll_to(&self, scroll_top: i64, now_ms: u64) {
        self.set_scroll_top(scroll_top);
        self.emit(HostEvent::new(HostEventKind::Scroll, now_ms));
    }

    pub fn resize(&self, viewport: u32, now_ms: u64) {
        self.set_viewport(viewport);
        self.emit(HostEvent::new(HostEventKind::Resize, now_ms));
    }
}

impl HostSurface for MemorySurface {
    type Node = Block;
    type Scroller = MemoryScroller;

    fn find_scroll_container(&self) -> Option<MemoryScroller> {
        self.state.borrow().scrollable.then(|| MemoryScroller {
            state: Rc::clone(&self.state),
        })
    }

    fn prepare_placeholder(&mut self) {
        let mut st = self.state.borrow_mut();
        if st.placeholder.is_none() {
            st.placeholder = Some(0);
        }
    }

    fn placeholder_height(&self) -> u64 {
        self.state.borrow().placeholder.unwrap_or(0)
    }

    fn set_placeholder_height(&mut self, height: u64) {
        self.state.borrow_mut().placeholder = Some(height);
    }

    fn container_top(&self) -> i64 {
        let st = self.state.borrow();
        st.content_offset - st.scroll_top
    }

    fn insert_before(&mut self, node: Block, reference: Option<&Block>) {
        let mut st = self.state.borrow_mut();
        st.children.retain(|c| *c != node);
        let at = reference
            .and_then(|r| st.children.iter().position(|c| c == r))
            .unwrap_or(st.children.len());
        st.children.insert(at, node);
    }

    fn remove(&mut self, node: &Block) {
        self.state.borrow_mut().children.retain(|c| c != node);
    }

    fn measure(&self, node: &Block) -> u32 {
        let st = self.state.borrow();
        if !st.children.contains(node) {
            return 0;
        }
        st.heights.get(node).copied().unwrap_or(0)
    }

    fn set_fixed_height(&mut self, height: Option<u64>) {
        self.state.borrow_mut().fixed_height = height;
    }
}

impl std::fmt::Debug for MemorySurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let st = self.state.borrow();
        f.debug_struct("MemorySurface")
            .field("children", &st.children.len())
            .field("placeholder", &st.placeholder)
            .field("scroll_top", &st.scroll_top)
            .field("viewport", &st.viewport)
            .finish_non_exhaustive()
    }
}

/// The viewport of a [`MemorySurface`].
pub struct MemoryScroller {
    state: Rc<RefCell<SurfaceState>>,
}

impl ScrollContainer for MemoryScroller {
    fn scroll_top(&self) -> i64 {
        self.state.borrow().scroll_top
    }

    fn viewport_height(&self) -> u32 {
        self.state.borrow().viewport
    }

    fn subscribe(&mut self, kind: HostEventKind, listener: Listener) -> Subscription {
        let id = {
            let mut st = self.state.borrow_mut();
            let id = st.next_listener;
            st.next_listener += 1;
            st.listeners.push((id, kind, listener));
            id
        };
        let state = Rc::downgrade(&self.state);
        Subscription::new(move || {
            if let Some(state) = state.upgrade() {
                state.borrow_mut().listeners.retain(|(l, _, _)| *l != id);
            }
        })
    }
}

impl std::fmt::Debug for MemoryScroller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryScroller").finish_non_exhaustive()
    }
}
