/// Cumulative top offsets of items, in container coordinates.
///
/// `tops[0]` is a sentinel (always `0`) and `tops[i + 1] - tops[i]` is the measured height of
/// item `i`. Entries past the last measured item are `None` until an item is rendered there.
/// Known entries are kept monotonically non-decreasing: re-measuring an item shifts every
/// known entry after it by the same delta.
#[derive(Clone, Debug)]
pub(crate) struct OffsetTable {
    tops: Vec<Option<u64>>,
    growth: usize,
}

impl OffsetTable {
    pub(crate) fn new(growth: usize) -> Self {
        let mut tops = Vec::with_capacity(growth.max(1));
        tops.push(Some(0));
        Self {
            tops,
            growth: growth.max(1),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.tops.len()
    }

    pub(crate) fn top(&self, index: usize) -> Option<u64> {
        self.tops.get(index).copied().flatten()
    }

    pub(crate) fn height(&self, index: usize) -> Option<u64> {
        let top = self.top(index)?;
        let next = self.top(index + 1)?;
        next.checked_sub(top)
    }

    /// Whether item `index` is known to start above `limit`.
    pub(crate) fn starts_before(&self, index: usize, limit: i64) -> bool {
        self.top(index).is_some_and(|top| as_signed(top) < limit)
    }

    /// Makes `index` addressable, growing in chunks of `growth` entries.
    pub(crate) fn ensure(&mut self, index: usize) {
        if index < self.tops.len() {
            return;
        }
        let additional = index + 1 - self.tops.len();
        if self.tops.capacity() < index + 1 {
            self.tops.reserve(additional.max(self.growth));
        }
        self.tops.resize(index + 1, None);
    }

    /// Records the measured height of item `index` and returns its new bottom offset.
    ///
    /// Returns `None` when the item's top is not known yet.
    pub(crate) fn set_span(&mut self, index: usize, height: u64) -> Option<u64> {
        self.ensure(index + 1);
        let Some(top) = self.tops[index] else {
            vwarn!(index, height, "OffsetTable: span recorded before its top is known");
            return None;
        };
        let bottom = top.saturating_add(height);
        let prev = self.tops[index + 1].replace(bottom);
        match prev {
            Some(prev) if prev != bottom => {
                let delta = as_signed(bottom) - as_signed(prev);
                for t in self.tops[index + 2..].iter_mut().flatten() {
                    *t = (as_signed(*t) + delta).max(0) as u64;
                }
                vtrace!(index, height, delta, "OffsetTable: span changed");
            }
            _ => {}
        }
        Some(bottom)
    }

    /// Binary search for the item straddling the viewport top.
    ///
    /// `container_top` is the container's top relative to the viewport top (negative once the
    /// container has scrolled past it). Returns the first index whose span crosses zero, or `0`
    /// when the search runs off the table. Unknown entries steer the search towards lower
    /// indices, so a partially measured table degrades to `0` instead of a bogus index.
    pub(crate) fn find_start_index(&self, container_top: i64, count: usize) -> usize {
        if count == 0 {
            return 0;
        }
        let mut start = 0usize;
        let mut end = count - 1;
        loop {
            if end < start {
                return 0;
            }
            let middle = start + (end - start) / 2;
            let value = self.top(middle).map(|top| container_top + as_signed(top));
            match value {
                Some(v)
                    if v <= 0
                        && self
                            .height(middle)
                            .is_some_and(|h| v + as_signed(h) > 0) =>
                {
                    return middle;
                }
                Some(v) if v < 0 => start = middle + 1,
                _ => {
                    if middle == 0 {
                        return 0;
                    }
                    end = middle - 1;
                }
            }
        }
    }
}

fn as_signed(v: u64) -> i64 {
    i64::try_from(v).unwrap_or(i64::MAX)
}
