/// Fixed-size slicing of the ranked leaderboard.
///
/// Page numbers are 1-based. Requests past the last page clamp to it rather
/// than erroring; an empty ranking has zero pages and serves an empty page.
#[derive(Debug, Clone, Copy)]
pub struct Pager {
    page_size: usize,
}

impl Pager {
    /// A `page_size` below 1 is clamped up to 1.
    pub fn new(page_size: usize) -> Self {
        Pager {
            page_size: page_size.max(1),
        }
    }

    pub const fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn total_pages(&self, len: usize) -> usize {
        len.div_ceil(self.page_size)
    }

    /// Slice out the requested page. Returns the slice and the page number
    /// actually served after clamping.
    pub fn page<'a, T>(&self, items: &'a [T], requested: usize) -> (&'a [T], usize) {
        let total = self.total_pages(items.len());
        if total == 0 {
            return (&[], 1);
        }
        let page = requested.clamp(1, total);
        let start = (page - 1) * self.page_size;
        let end = (start + self.page_size).min(items.len());
        (&items[start..end], page)
    }
}

#[cfg(test)]
mod tests {
    use super::Pager;

    #[test]
    fn concatenated_pages_reproduce_full_sequence() {
        let items: Vec<u32> = (0..23).collect();
        let pager = Pager::new(5);
        assert_eq!(pager.total_pages(items.len()), 5);

        let mut rebuilt = Vec::new();
        for page in 1..=pager.total_pages(items.len()) {
            let (slice, served) = pager.page(&items, page);
            assert_eq!(served, page);
            rebuilt.extend_from_slice(slice);
        }
        assert_eq!(rebuilt, items);
    }

    #[test]
    fn last_page_holds_the_remainder() {
        let items: Vec<u32> = (0..23).collect();
        let (slice, _) = Pager::new(5).page(&items, 5);
        assert_eq!(slice, &[20, 21, 22]);
    }

    #[test]
    fn page_beyond_total_clamps_to_last() {
        let items: Vec<u32> = (0..23).collect();
        let (slice, served) = Pager::new(5).page(&items, 99);
        assert_eq!(served, 5);
        assert_eq!(slice, &[20, 21, 22]);
    }

    #[test]
    fn page_zero_clamps_to_first() {
        let items: Vec<u32> = (0..10).collect();
        let (slice, served) = Pager::new(4).page(&items, 0);
        assert_eq!(served, 1);
        assert_eq!(slice, &[0, 1, 2, 3]);
    }

    #[test]
    fn empty_input_yields_zero_pages_without_error() {
        let items: Vec<u32> = Vec::new();
        let pager = Pager::new(25);
        assert_eq!(pager.total_pages(items.len()), 0);
        let (slice, served) = pager.page(&items, 3);
        assert!(slice.is_empty());
        assert_eq!(served, 1);
    }

    #[test]
    fn zero_page_size_is_clamped_to_one() {
        let pager = Pager::new(0);
        assert_eq!(pager.page_size(), 1);
        assert_eq!(pager.total_pages(3), 3);
    }
}
