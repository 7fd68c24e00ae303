use fancy_regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

const MAX_DATES: usize = 10;
const MAX_MONETARY_VALUES: usize = 20;
const MAX_PERCENTAGES: usize = 20;
const MAX_EMAILS: usize = 10;
const MAX_PHONE_NUMBERS: usize = 10;

static DATE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"\d{1,2}[/-]\d{1,2}[/-]\d{2,4}").expect("valid regex"),
        Regex::new(r"\d{4}[/-]\d{1,2}[/-]\d{1,2}").expect("valid regex"),
        Regex::new(r"(?i)(?:Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec)[a-z]*\s+\d{1,2},?\s+\d{4}")
            .expect("valid regex"),
    ]
});

static MONEY_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\$\s*\d+(?:,\d{3})*(?:\.\d{2})?(?:\s*(?:million|M|billion|B|thousand|K))?")
        .expect("valid regex")
});

static PERCENTAGE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+(?:\.\d+)?%").expect("valid regex"));

static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Z|a-z]{2,}\b").expect("valid regex")
});

static PHONE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:\+\d{1,3}[-.\s]?)?\(?\d{2,4}\)?[-.\s]?\d{3,4}[-.\s]?\d{3,4}")
        .expect("valid regex")
});

/// Facts pulled out of document text for display next to search results
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct KeyInfo {
    pub dates: Vec<String>,
    pub monetary_values: Vec<String>,
    pub percentages: Vec<String>,
    pub emails: Vec<String>,
    pub phone_numbers: Vec<String>,
}

/// Scan `text` for dates, money amounts, percentages, emails and phone numbers
#[inline]
pub fn extract_key_info(text: &str) -> KeyInfo {
    let mut dates: Vec<String> = Vec::new();
    for pattern in DATE_PATTERNS.iter() {
        for found in find_all(pattern, text) {
            if !dates.contains(&found) {
                dates.push(found);
            }
        }
    }
    dates.truncate(MAX_DATES);

    KeyInfo {
        dates,
        monetary_values: first_matches(&MONEY_REGEX, text, MAX_MONETARY_VALUES),
        percentages: first_matches(&PERCENTAGE_REGEX, text, MAX_PERCENTAGES),
        emails: first_matches(&EMAIL_REGEX, text, MAX_EMAILS),
        phone_numbers: first_matches(&PHONE_REGEX, text, MAX_PHONE_NUMBERS),
    }
}

fn find_all<'t>(regex: &'t Regex, text: &'t str) -> impl Iterator<Item = String> + 't {
    regex
        .find_iter(text)
        .filter_map(Result::ok)
        .map(|found| found.as_str().to_string())
}

fn first_matches(regex: &Regex, text: &str, limit: usize) -> Vec<String> {
    find_all(regex, text).take(limit).collect()
}
