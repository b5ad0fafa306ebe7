use std::collections::BTreeSet;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TableDetection {
    #[default]
    Lattice,
    Stream,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ZeroAmountPolicy {
    #[default]
    Drop,
    Keep,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSelection {
    pages: BTreeSet<u32>,
}

impl PageSelection {
    #[must_use]
    pub fn single(page: u32) -> Self {
        Self {
            pages: BTreeSet::from([page]),
        }
    }

    #[must_use]
    pub fn contains(&self, page: u32) -> bool {
        self.pages.contains(&page)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

impl FromStr for PageSelection {
    type Err = String;

    fn from_str(selection: &str) -> Result<Self, Self::Err> {
        let mut pages = BTreeSet::new();
        for token in selection.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            if let Some((start, end)) = token.split_once('-') {
                let start: u32 = start
                    .trim()
                    .parse()
                    .map_err(|_| format!("invalid page range start: '{start}'"))?;
                let end: u32 = end
                    .trim()
                    .parse()
                    .map_err(|_| format!("invalid page range end: '{end}'"))?;
                if start == 0 || end == 0 {
                    return Err("pages are 1-based".to_string());
                }
                if end < start {
                    return Err(format!(
                        "invalid range '{token}': end is smaller than start"
                    ));
                }
                pages.extend(start..=end);
            } else {
                let page: u32 = token
                    .parse()
                    .map_err(|_| format!("invalid page number: '{token}'"))?;
                if page == 0 {
                    return Err("pages are 1-based".to_string());
                }
                pages.insert(page);
            }
        }

        if pages.is_empty() {
            return Err("page selection cannot be empty".to_string());
        }

        Ok(Self { pages })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadOptions {
    pub pages: Option<PageSelection>,
    pub multiple_tables: bool,
    pub detection: TableDetection,
    pub first_row_is_header: bool,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            pages: None,
            multiple_tables: true,
            detection: TableDetection::Lattice,
            first_row_is_header: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CleanOptions {
    pub zero_amount: ZeroAmountPolicy,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExtractOptions {
    pub read: ReadOptions,
    pub clean: CleanOptions,
}

#[cfg(test)]
mod tests {
    use super::{ExtractOptions, PageSelection, TableDetection, ZeroAmountPolicy};
    use std::str::FromStr;

    #[test]
    fn parse_page_selection_range_and_single() {
        let selection = PageSelection::from_str("1-3,5").expect("selection should parse");
        assert!(selection.contains(1));
        assert!(selection.contains(2));
        assert!(selection.contains(3));
        assert!(selection.contains(5));
        assert!(!selection.contains(4));
    }

    #[test]
    fn reject_invalid_page_selection() {
        let err = PageSelection::from_str("3-1").expect_err("invalid range should fail");
        assert!(err.contains("invalid range"));

        let err = PageSelection::from_str("0").expect_err("page zero should fail");
        assert_eq!(err, "pages are 1-based");
    }

    #[test]
    fn single_page_selection() {
        let selection = PageSelection::single(1);
        assert!(selection.contains(1));
        assert!(!selection.contains(2));
        assert_eq!(selection, PageSelection::from_str("1").expect("selection should parse"));
    }

    #[test]
    fn defaults_match_the_fpk_request() {
        let options = ExtractOptions::default();
        assert!(options.read.pages.is_none());
        assert!(options.read.multiple_tables);
        assert_eq!(options.read.detection, TableDetection::Lattice);
        assert!(!options.read.first_row_is_header);
        assert_eq!(options.clean.zero_amount, ZeroAmountPolicy::Drop);
    }
}
