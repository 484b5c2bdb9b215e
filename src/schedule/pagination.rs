use serde::Serialize;

/// Number of slots revealed per page unless configured otherwise
pub const DEFAULT_PAGE_SIZE: usize = 5;

/// Incremental reveal position over a sorted list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cursor {
    pub revealed: usize,
}

impl Cursor {
    /// Resumes from an offset handed back by a client
    pub fn at(revealed: usize) -> Self {
        Cursor { revealed }
    }

    /// Returns the next page and moves past it
    pub fn reveal<'a, T>(&mut self, items: &'a [T], page_size: usize) -> &'a [T] {
        let start = self.revealed.min(items.len());
        let end = start.saturating_add(page_size).min(items.len());
        self.revealed = end;
        &items[start..end]
    }

    /// Back to the first page, used whenever the underlying list is recomputed
    pub fn reset(&mut self) {
        self.revealed = 0;
    }

    pub fn has_more<T>(&self, items: &[T]) -> bool {
        self.revealed < items.len()
    }
}

/// One revealed page, shaped for the browser
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub revealed: usize,
    pub total: usize,
    pub has_more: bool,
}

impl<T: Clone> Page<T> {
    /// Reveals the page following `offset`
    pub fn after(items: &[T], offset: usize, page_size: usize) -> Self {
        let mut cursor = Cursor::at(offset);
        let page = cursor.reveal(items, page_size).to_vec();
        Page {
            items: page,
            revealed: cursor.revealed,
            total: items.len(),
            has_more: cursor.has_more(items),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reveals_in_fixed_pages_until_exhausted() {
        let items: Vec<u32> = (0..12).collect();
        let mut cursor = Cursor::default();

        assert_eq!(cursor.reveal(&items, 5), &[0, 1, 2, 3, 4]);
        assert!(cursor.has_more(&items));
        assert_eq!(cursor.reveal(&items, 5), &[5, 6, 7, 8, 9]);
        assert_eq!(cursor.reveal(&items, 5), &[10, 11]);
        assert_eq!(cursor.revealed, 12);
        assert!(!cursor.has_more(&items));
        assert!(cursor.reveal(&items, 5).is_empty());
        assert_eq!(cursor.revealed, 12);
    }

    #[test]
    fn reset_starts_over() {
        let items = vec!['a', 'b', 'c'];
        let mut cursor = Cursor::default();
        cursor.reveal(&items, 2);
        cursor.reset();
        assert_eq!(cursor.revealed, 0);
        assert_eq!(cursor.reveal(&items, 2), &['a', 'b']);
    }

    #[test]
    fn offset_past_the_end_is_clamped() {
        let items = vec![1, 2, 3];
        let page = Page::after(&items, 10, 5);
        assert!(page.items.is_empty());
        assert_eq!(page.revealed, 3);
        assert!(!page.has_more);
    }

    #[test]
    fn page_reports_progress() {
        let items: Vec<u32> = (0..7).collect();
        let first = Page::after(&items, 0, 5);
        assert_eq!(first.items.len(), 5);
        assert_eq!(first.revealed, 5);
        assert_eq!(first.total, 7);
        assert!(first.has_more);

        let second = Page::after(&items, first.revealed, 5);
        assert_eq!(second.items, vec![5, 6]);
        assert!(!second.has_more);
    }
}
