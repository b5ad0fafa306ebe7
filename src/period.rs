use std::fmt::{Display, Formatter};
use std::sync::LazyLock;

use chrono::Month;
use regex::Regex;

const MONTH_NAMES: [&str; 12] = [
    "Januari",
    "Februari",
    "Maret",
    "April",
    "Mei",
    "Juni",
    "Juli",
    "Agustus",
    "September",
    "Oktober",
    "November",
    "Desember",
];

static MONTH_YEAR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?P<month>januari|februari|maret|april|mei|juni|juli|agustus|september|oktober|november|desember)\s+(?P<year>(?:19|20)\d{2})\b",
    )
    .expect("month/year pattern should compile")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Period {
    pub month: Month,
    pub year: i32,
}

impl Period {
    #[must_use]
    pub fn month_name(&self) -> &'static str {
        MONTH_NAMES[self.month.number_from_month() as usize - 1]
    }

    #[must_use]
    pub fn file_stem(&self) -> String {
        format!("FPK_{}_{}", self.month_name(), self.year)
    }
}

impl Display for Period {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.month_name(), self.year)
    }
}

fn month_from_name(name: &str) -> Option<Month> {
    let index = MONTH_NAMES
        .iter()
        .position(|candidate| candidate.eq_ignore_ascii_case(name))?;
    Month::try_from(u8::try_from(index + 1).ok()?).ok()
}

#[must_use]
pub fn detect_period(text: &str) -> Option<Period> {
    MONTH_YEAR_RE.captures_iter(text).find_map(|capture| {
        let month = month_from_name(capture.name("month")?.as_str())?;
        let year = capture.name("year")?.as_str().parse().ok()?;
        Some(Period { month, year })
    })
}
