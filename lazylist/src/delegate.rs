use crate::pending::LoadDone;
use crate::{Error, Item, Result};

/// The content provider of a lazy list.
///
/// Only [`ContentDelegate::count_items`] is required. Item visuals come from one of two
/// capabilities:
///
/// - a direct loader: override [`ContentDelegate::load_item_element`] and complete the
///   [`LoadDone`] yourself, synchronously or later;
/// - a content factory: override [`ContentDelegate::create_item_content`] and return the
///   visual synchronously.
///
/// The remaining hooks are optional and default to no-ops.
pub trait ContentDelegate {
    type Visual: Clone + PartialEq + 'static;

    /// Number of items. Negative counts are contract violations.
    fn count_items(&self) -> i64;

    /// Loads the visual for `index`.
    ///
    /// Return `Err(done)` to hand the completion back when this delegate has no direct
    /// loader; the adapter then falls back to [`ContentDelegate::create_item_content`].
    fn load_item_element(
        &mut self,
        index: usize,
        done: LoadDone<Self::Visual>,
    ) -> std::result::Result<(), LoadDone<Self::Visual>> {
        let _ = index;
        Err(done)
    }

    /// Creates the visual for `index`. `template` is the hint the adapter was built with.
    /// Returning `None` is a contract violation.
    fn create_item_content(
        &mut self,
        index: usize,
        template: Option<&Self::Visual>,
    ) -> Option<Self::Visual> {
        let _ = (index, template);
        None
    }

    fn update_item_content(&mut self, index: usize, item: &Item<Self::Visual>) {
        let _ = (index, item);
    }

    fn destroy_item(&mut self, index: usize, item: &Item<Self::Visual>) {
        let _ = (index, item);
    }

    fn destroy(&mut self) {}

    /// Whether [`ContentDelegate::render`] is implemented.
    fn has_render_function(&self) -> bool {
        false
    }

    /// Bulk repaint hook for hosts that draw every item themselves.
    fn render(&mut self, items: &[Item<Self::Visual>], height: u64) {
        let _ = (items, height);
    }
}

/// Normalizes a [`ContentDelegate`] and validates its answers at every call.
///
/// After [`DelegateAdapter::destroy`] the adapter releases the delegate and every further call
/// fails with a state error.
pub struct DelegateAdapter<D: ContentDelegate> {
    delegate: Option<D>,
    template: Option<D::Visual>,
}

impl<D: ContentDelegate> DelegateAdapter<D> {
    pub fn new(delegate: D) -> Self {
        Self {
            delegate: Some(delegate),
            template: None,
        }
    }

    pub fn with_template(mut self, template: Option<D::Visual>) -> Self {
        self.template = template;
        self
    }

    pub fn is_destroyed(&self) -> bool {
        self.delegate.is_none()
    }

    pub fn delegate(&self) -> Option<&D> {
        self.delegate.as_ref()
    }

    fn live(&self) -> Result<&D> {
        self.delegate
            .as_ref()
            .ok_or_else(|| Error::state("the delegate has been destroyed"))
    }

    fn live_mut(&mut self) -> Result<&mut D> {
        self.delegate
            .as_mut()
            .ok_or_else(|| Error::state("the delegate has been destroyed"))
    }

    pub fn count_items(&self) -> Result<usize> {
        let count = self.live()?.count_items();
        usize::try_from(count).map_err(|_| {
            vwarn!(count, "countItems() returned a negative count");
            Error::contract(format!(
                "countItems() must return a non-negative number, got {count}"
            ))
        })
    }

    pub fn has_render_function(&self) -> bool {
        self.delegate
            .as_ref()
            .is_some_and(ContentDelegate::has_render_function)
    }

    pub fn render(&mut self, items: &[Item<D::Visual>], height: u64) -> Result<()> {
        let delegate = self.live_mut()?;
        if !delegate.has_render_function() {
            return Err(Error::contract("the delegate has no render function"));
        }
        delegate.render(items, height);
        Ok(())
    }

    /// Loads the visual for `index` through the loader or the factory capability.
    ///
    /// With a factory the completion fires before this returns.
    pub fn load_item_element(&mut self, index: usize, done: LoadDone<D::Visual>) -> Result<()> {
        let delegate = self
            .delegate
            .as_mut()
            .ok_or_else(|| Error::state("the delegate has been destroyed"))?;
        let done = match delegate.load_item_element(index, done) {
            Ok(()) => return Ok(()),
            Err(done) => done,
        };
        match delegate.create_item_content(index, self.template.as_ref()) {
            Some(element) => {
                done.complete(Item::new(element));
                Ok(())
            }
            None => {
                vwarn!(index, "createItemContent() returned no visual");
                Err(Error::contract(format!(
                    "createItemContent({index}) must return a visual"
                )))
            }
        }
    }

    pub fn update_item(&mut self, index: usize, item: &Item<D::Visual>) {
        if let Some(delegate) = self.delegate.as_mut() {
            delegate.update_item_content(index, item);
        }
    }

    pub fn destroy_item(&mut self, index: usize, item: &Item<D::Visual>) {
        if let Some(delegate) = self.delegate.as_mut() {
            delegate.destroy_item(index, item);
        }
    }

    /// Runs the delegate's teardown and releases it together with the template.
    pub fn destroy(&mut self) {
        if let Some(mut delegate) = self.delegate.take() {
            delegate.destroy();
        }
        self.template = None;
    }
}

impl<D: ContentDelegate> std::fmt::Debug for DelegateAdapter<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelegateAdapter")
            .field("destroyed", &self.is_destroyed())
            .field("has_template", &self.template.is_some())
            .finish_non_exhaustive()
    }
}
