/// Configuration for [`crate::LazyRepeat`].
///
/// All fields are plain data, so the options can be cloned, compared, and (with
/// `feature = "serde"`) loaded from a config file.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct LazyRepeatOptions {
    /// Items are rendered until their top passes `overrender_factor * viewport_height` below
    /// the container's top.
    pub overrender_factor: u32,
    /// How many indices a render window starts above the item straddling the viewport top.
    pub start_backoff: usize,
    /// Enables the touch-capable event bridge: debounced scroll/resize/touch-move plus a
    /// trailing re-render after touch-end.
    pub touch_events: bool,
    /// Trailing debounce window for scroll, touch-move and resize on touch hosts.
    pub scroll_debounce_ms: u64,
    /// Delay of the second render fired after a touch-end.
    pub touch_end_refire_ms: u64,
    /// Amortized growth chunk of the offset table.
    pub offset_growth: usize,
}

impl Default for LazyRepeatOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl LazyRepeatOptions {
    pub fn new() -> Self {
        Self {
            overrender_factor: 4,
            start_backoff: 30,
            touch_events: false,
            scroll_debounce_ms: 30,
            touch_end_refire_ms: 100,
            offset_growth: 100,
        }
    }

    pub fn with_overrender_factor(mut self, factor: u32) -> Self {
        self.overrender_factor = factor;
        self
    }

    pub fn with_start_backoff(mut self, backoff: usize) -> Self {
        self.start_backoff = backoff;
        self
    }

    pub fn with_touch_events(mut self, touch_events: bool) -> Self {
        self.touch_events = touch_events;
        self
    }

    pub fn with_scroll_debounce_ms(mut self, delay_ms: u64) -> Self {
        self.scroll_debounce_ms = delay_ms;
        self
    }

    pub fn with_touch_end_refire_ms(mut self, delay_ms: u64) -> Self {
        self.touch_end_refire_ms = delay_ms;
        self
    }

    pub fn with_offset_growth(mut self, growth: usize) -> Self {
        self.offset_growth = growth.max(1);
        self
    }

    /// The render limit in container coordinates for the given geometry.
    pub(crate) fn render_limit(&self, viewport_height: u32, container_top: i64) -> i64 {
        i64::from(self.overrender_factor)
            .saturating_mul(i64::from(viewport_height))
            .saturating_sub(container_top)
    }
}
