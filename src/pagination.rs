use serde::Serialize;

/// Page size for the image list.
pub const IMAGES_PER_PAGE: i64 = 8;

/// A resolved page window over a known total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page {
    pub number: i64,
    pub num_pages: i64,
    pub per_page: i64,
    pub total: i64,
    pub has_previous: bool,
    pub has_next: bool,
}

impl Page {
    pub fn offset(&self) -> i64 {
        (self.number - 1) * self.per_page
    }

    pub fn limit(&self) -> i64 {
        self.per_page
    }
}

/// Outcome of resolving a raw `page` query parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSelection {
    pub page: Page,
    /// The requested number pointed past the last page (or before the
    /// first); `page` has been clamped to the last page.
    pub out_of_range: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct Paginator {
    total: i64,
    per_page: i64,
}

impl Paginator {
    pub fn new(total: i64, per_page: i64) -> Self {
        Self {
            total,
            per_page: per_page.max(1),
        }
    }

    /// An empty collection still has one (empty) page.
    pub fn num_pages(&self) -> i64 {
        if self.total <= 0 {
            1
        } else {
            (self.total + self.per_page - 1) / self.per_page
        }
    }

    /// Resolve a raw `page` parameter with the listing fallback rules:
    /// a missing or non-integer value selects page 1, and an in-bounds
    /// integer selects that page. An out-of-range integer clamps to the
    /// last page and is reported as such, so fragment requests can answer
    /// with an empty body instead.
    pub fn select(&self, raw_page: Option<&str>) -> PageSelection {
        let num_pages = self.num_pages();

        let (number, out_of_range) = match raw_page.map(str::trim).and_then(|p| p.parse::<i64>().ok())
        {
            None => (1, false),
            Some(n) if n < 1 => (num_pages, true),
            Some(n) if n > num_pages => (num_pages, true),
            Some(n) => (n, false),
        };

        PageSelection {
            page: Page {
                number,
                num_pages,
                per_page: self.per_page,
                total: self.total,
                has_previous: number > 1,
                has_next: number < num_pages,
            },
            out_of_range,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn select(total: i64, raw: Option<&str>) -> PageSelection {
        Paginator::new(total, IMAGES_PER_PAGE).select(raw)
    }

    #[test]
    fn missing_page_selects_first() {
        let sel = select(20, None);
        assert_eq!(sel.page.number, 1);
        assert!(!sel.out_of_range);
    }

    #[test]
    fn non_integer_selects_first() {
        let sel = select(20, Some("abc"));
        assert_eq!(sel.page.number, 1);
        assert!(!sel.out_of_range);
        assert_eq!(select(20, Some("2.5")).page.number, 1);
    }

    #[test]
    fn in_range_page_is_kept() {
        let sel = select(20, Some("2"));
        assert_eq!(sel.page.number, 2);
        assert_eq!(sel.page.offset(), 8);
        assert!(sel.page.has_previous);
        assert!(sel.page.has_next);
    }

    #[test]
    fn past_the_end_clamps_to_last() {
        let sel = select(20, Some("99"));
        assert_eq!(sel.page.number, 3);
        assert!(sel.out_of_range);
        assert!(!sel.page.has_next);
    }

    #[test]
    fn zero_and_negative_are_out_of_range() {
        assert!(select(20, Some("0")).out_of_range);
        assert!(select(20, Some("-3")).out_of_range);
    }

    #[test]
    fn empty_collection_has_one_page() {
        let sel = select(0, None);
        assert_eq!(sel.page.num_pages, 1);
        assert_eq!(sel.page.number, 1);
        assert!(!sel.page.has_next);
    }

    #[test]
    fn exact_multiple_of_page_size() {
        let p = Paginator::new(16, IMAGES_PER_PAGE);
        assert_eq!(p.num_pages(), 2);
        assert!(!p.select(Some("2")).out_of_range);
        assert!(p.select(Some("3")).out_of_range);
    }
}
