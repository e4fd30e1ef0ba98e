// Paging of the filtered contact list and records-per-page auto-sizing

use log::debug;

pub const MIN_RECORDS_PER_PAGE: usize = 6;
pub const MAX_RECORDS_PER_PAGE: usize = 12;

/// One page of an ordered list
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// 1-based
    pub current_page: usize,
    pub total_pages: usize,
    pub total_records: usize,
}

impl<T> Page<T> {
    pub fn has_next(&self) -> bool {
        self.current_page < self.total_pages
    }

    pub fn has_prev(&self) -> bool {
        self.current_page > 1
    }

    /// 1-based range of records shown, e.g. (11, 20); (0, 0) when empty
    pub fn record_range(&self, records_per_page: usize) -> (usize, usize) {
        if self.items.is_empty() {
            return (0, 0);
        }
        let start = (self.current_page - 1) * records_per_page + 1;
        (start, start + self.items.len() - 1)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageOutcome<T> {
    pub page: Page<T>,
    /// The requested page no longer existed and the paginator went back to page 1
    pub reset: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paginator {
    current_page: usize,
    records_per_page: usize,
}

impl Default for Paginator {
    fn default() -> Self {
        Paginator::new(MIN_RECORDS_PER_PAGE)
    }
}

impl Paginator {
    pub fn new(records_per_page: usize) -> Self {
        Paginator {
            current_page: 1,
            records_per_page: records_per_page.max(1),
        }
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn records_per_page(&self) -> usize {
        self.records_per_page
    }

    pub fn total_pages(&self, total_records: usize) -> usize {
        total_records.div_ceil(self.records_per_page).max(1)
    }

    /// Set the requested page without clamping; `paginate` resolves out-of-range pages
    pub fn set_current_page(&mut self, page: usize) {
        self.current_page = page.max(1);
    }

    /// Move to `page`, clamped into `1..=total_pages`
    pub fn go_to(&mut self, page: usize, total_records: usize) -> usize {
        self.current_page = page.clamp(1, self.total_pages(total_records));
        self.current_page
    }

    pub fn next_page(&mut self, total_records: usize) -> bool {
        if self.current_page < self.total_pages(total_records) {
            self.current_page += 1;
            true
        } else {
            false
        }
    }

    pub fn prev_page(&mut self) -> bool {
        if self.current_page > 1 {
            self.current_page -= 1;
            true
        } else {
            false
        }
    }

    pub fn reset(&mut self) {
        self.current_page = 1;
    }

    /// Change the page size. Zero is ignored. Returns whether the size changed.
    pub fn set_records_per_page(&mut self, records_per_page: usize) -> bool {
        if records_per_page == 0 || records_per_page == self.records_per_page {
            return false;
        }
        self.records_per_page = records_per_page;
        true
    }

    /// Slice `items` into the current page.
    ///
    /// When the list shrank below the current page, the paginator resets to page 1
    /// and reports it instead of handing back an empty page.
    pub fn paginate<T: Clone>(&mut self, items: &[T]) -> PageOutcome<T> {
        let total_records = items.len();
        let total_pages = self.total_pages(total_records);

        let reset = self.current_page > total_pages;
        if reset {
            debug!(
                "Page {} out of range ({} pages, {} records), resetting to page 1",
                self.current_page, total_pages, total_records
            );
            self.current_page = 1;
        }

        let start = (self.current_page - 1) * self.records_per_page;
        let end = start.saturating_add(self.records_per_page).min(total_records);
        let page_items = if start < end {
            items[start..end].to_vec()
        } else {
            Vec::new()
        };

        PageOutcome {
            page: Page {
                items: page_items,
                current_page: self.current_page,
                total_pages,
                total_records,
            },
            reset,
        }
    }
}

/// Derives records-per-page from the height of the list container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutoSizer {
    /// Height taken by headers, search box and pager
    pub chrome_height: u32,
    pub row_height: u32,
    pub row_spacing: u32,
}

impl Default for AutoSizer {
    fn default() -> Self {
        AutoSizer {
            chrome_height: 240,
            row_height: 64,
            row_spacing: 8,
        }
    }
}

impl AutoSizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_chrome_height(mut self, chrome_height: u32) -> Self {
        self.chrome_height = chrome_height;
        self
    }

    pub fn with_row_height(mut self, row_height: u32) -> Self {
        self.row_height = row_height;
        self
    }

    pub fn with_row_spacing(mut self, row_spacing: u32) -> Self {
        self.row_spacing = row_spacing;
        self
    }

    /// Records that fit in a container of the given height, clamped to [6, 12]
    pub fn records_for_height(&self, container_height: u32) -> usize {
        let pitch = self.row_height.saturating_add(self.row_spacing);
        if pitch == 0 {
            return MIN_RECORDS_PER_PAGE;
        }
        let usable = container_height.saturating_sub(self.chrome_height);
        ((usable / pitch) as usize).clamp(MIN_RECORDS_PER_PAGE, MAX_RECORDS_PER_PAGE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_pages() {
        let paginator = Paginator::new(10);
        assert_eq!(paginator.total_pages(0), 1);
        assert_eq!(paginator.total_pages(10), 1);
        assert_eq!(paginator.total_pages(11), 2);
        assert_eq!(paginator.total_pages(25), 3);
    }

    #[test]
    fn test_huge_page_size() {
        let mut paginator = Paginator::new(usize::MAX);
        assert_eq!(paginator.total_pages(usize::MAX), 1);

        let outcome = paginator.paginate(&[1, 2, 3]);
        assert_eq!(outcome.page.items, vec![1, 2, 3]);
        assert_eq!(outcome.page.total_pages, 1);
        assert!(!paginator.next_page(3));
    }

    #[test]
    fn test_last_page_is_partial() {
        let items: Vec<u32> = (1..=25).collect();
        let mut paginator = Paginator::new(10);
        paginator.set_current_page(3);

        let outcome = paginator.paginate(&items);
        assert!(!outcome.reset);
        assert_eq!(outcome.page.items, vec![21, 22, 23, 24, 25]);
        assert_eq!(outcome.page.record_range(10), (21, 25));
        assert!(!outcome.page.has_next());
        assert!(outcome.page.has_prev());
    }

    #[test]
    fn test_empty_list_yields_single_empty_page() {
        let items: Vec<u32> = Vec::new();
        let mut paginator = Paginator::new(6);
        let outcome = paginator.paginate(&items);
        assert_eq!(outcome.page.total_pages, 1);
        assert_eq!(outcome.page.total_records, 0);
        assert!(outcome.page.items.is_empty());
        assert_eq!(outcome.page.record_range(6), (0, 0));
        assert!(!outcome.reset);
    }

    #[test]
    fn test_navigation_is_clamped() {
        let mut paginator = Paginator::new(10);
        assert_eq!(paginator.go_to(9, 25), 3);
        assert!(!paginator.next_page(25));
        assert!(paginator.prev_page());
        assert!(paginator.prev_page());
        assert!(!paginator.prev_page());
        assert_eq!(paginator.go_to(0, 25), 1);
    }

    #[test]
    fn test_zero_page_size_is_ignored() {
        let mut paginator = Paginator::new(8);
        assert!(!paginator.set_records_per_page(0));
        assert_eq!(paginator.records_per_page(), 8);
        assert!(paginator.set_records_per_page(12));
        assert_eq!(Paginator::new(0).records_per_page(), 1);
    }

    #[test]
    fn test_auto_sizer_examples() {
        let sizer = AutoSizer::new()
            .with_chrome_height(200)
            .with_row_height(60)
            .with_row_spacing(10);

        assert_eq!(sizer.records_for_height(0), 6);
        assert_eq!(sizer.records_for_height(200 + 70 * 8), 8);
        assert_eq!(sizer.records_for_height(200 + 70 * 8 + 69), 8);
        assert_eq!(sizer.records_for_height(5000), 12);
        assert_eq!(AutoSizer::new().with_row_height(0).with_row_spacing(0).records_for_height(900), 6);
    }
}
