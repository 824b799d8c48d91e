use lazylist::{ContentDelegate, Item, LoadDone};

type Count = Box<dyn Fn() -> i64>;
type ItemHook<V> = Box<dyn FnMut(usize, &Item<V>)>;
type RenderHook<V> = Box<dyn FnMut(&[Item<V>], u64)>;

enum Source<V> {
    Loader(Box<dyn FnMut(usize, LoadDone<V>)>),
    Factory(Box<dyn FnMut(usize, Option<&V>) -> Option<V>>),
}

/// A [`ContentDelegate`] assembled from closures.
///
/// Pick the visual source with [`FnDelegate::with_loader`] or [`FnDelegate::with_factory`],
/// then attach the optional hooks.
pub struct FnDelegate<V> {
    count: Count,
    source: Source<V>,
    update: Option<ItemHook<V>>,
    destroy_item: Option<ItemHook<V>>,
    destroy: Option<Box<dyn FnOnce()>>,
    render: Option<RenderHook<V>>,
}

impl<V> FnDelegate<V> {
    fn from_source(count: impl Fn() -> i64 + 'static, source: Source<V>) -> Self {
        Self {
            count: Box::new(count),
            source,
            update: None,
            destroy_item: None,
            destroy: None,
            render: None,
        }
    }

    /// A delegate that completes item loads itself, now or later.
    pub fn with_loader(
        count: impl Fn() -> i64 + 'static,
        loader: impl FnMut(usize, LoadDone<V>) + 'static,
    ) -> Self {
        Self::from_source(count, Source::Loader(Box::new(loader)))
    }

    /// A delegate that creates item visuals synchronously. The second argument is the
    /// adapter's template hint.
    pub fn with_factory(
        count: impl Fn() -> i64 + 'static,
        factory: impl FnMut(usize, Option<&V>) -> Option<V> + 'static,
    ) -> Self {
        Self::from_source(count, Source::Factory(Box::new(factory)))
    }

    pub fn on_update(mut self, hook: impl FnMut(usize, &Item<V>) + 'static) -> Self {
        self.update = Some(Box::new(hook));
        self
    }

    pub fn on_destroy_item(mut self, hook: impl FnMut(usize, &Item<V>) + 'static) -> Self {
        self.destroy_item = Some(Box::new(hook));
        self
    }

    pub fn on_destroy(mut self, hook: impl FnOnce() + 'static) -> Self {
        self.destroy = Some(Box::new(hook));
        self
    }

    pub fn with_render(mut self, hook: impl FnMut(&[Item<V>], u64) + 'static) -> Self {
        self.render = Some(Box::new(hook));
        self
    }

    pub fn is_loader(&self) -> bool {
        matches!(self.source, Source::Loader(_))
    }
}

impl<V: Clone + PartialEq + 'static> ContentDelegate for FnDelegate<V> {
    type Visual = V;

    fn count_items(&self) -> i64 {
        (self.count)()
    }

    fn load_item_element(&mut self, index: usize, done: LoadDone<V>) -> Result<(), LoadDone<V>> {
        match &mut self.source {
            Source::Loader(load) => {
                load(index, done);
                Ok(())
            }
            Source::Factory(_) => Err(done),
        }
    }

    fn create_item_content(&mut self, index: usize, template: Option<&V>) -> Option<V> {
        match &mut self.source {
            Source::Factory(create) => create(index, template),
            Source::Loader(_) => None,
        }
    }

    fn update_item_content(&mut self, index: usize, item: &Item<V>) {
        if let Some(hook) = self.update.as_mut() {
            hook(index, item);
        }
    }

    fn destroy_item(&mut self, index: usize, item: &Item<V>) {
        if let Some(hook) = self.destroy_item.as_mut() {
            hook(index, item);
        }
    }

    fn destroy(&mut self) {
        if let Some(hook) = self.destroy.take() {
            hook();
        }
    }

    fn has_render_function(&self) -> bool {
        self.render.is_some()
    }

    fn render(&mut self, items: &[Item<V>], height: u64) {
        if let Some(hook) = self.render.as_mut() {
            hook(items, height);
        }
    }
}

impl<V> std::fmt::Debug for FnDelegate<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnDelegate")
            .field("loader", &self.is_loader())
            .field("has_render", &self.render.is_some())
            .finish_non_exhaustive()
    }
}
