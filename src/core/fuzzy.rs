use crate::models::Membership;
use regex::Regex;
use std::sync::LazyLock;

/// Trailing plan-type word dropped before comparing names
static PLAN_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\s+(premium|pro|plus|standard|basic|tier|plan|subscription|membership)$")
        .expect("valid plan suffix pattern")
});

static DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b\d{1,2}[/.\-]\d{1,2}(?:[/.\-]\d{2,4})?\b").expect("valid date pattern")
});

/// Day and month name with an optional year, e.g. "14 MAR 2024"
static MONTH_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?i)\b\d{1,2}\s+",
        r"(?:jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?",
        r"|sep(?:t(?:ember)?)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?)\b",
        r"(?:\s+\d{2,4}\b)?",
    ))
    .expect("valid month date pattern")
});

/// Processor reference glued on with a star, e.g. "PRIME*2K4LR9TZ5"
static STAR_REFERENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*[A-Za-z]*\d[A-Za-z0-9]*").expect("valid star reference pattern"));

static REFERENCE_TAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bref\b\.?\s*\S*").expect("valid reference pattern"));

static SEPARATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[—–|*#:]+|\s-\s").expect("valid separator pattern"));

static PAYMENT_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:card payment to|payment to|payment|direct debit|standing order|dd|so)\s+")
        .expect("valid payment prefix pattern")
});

static PAYMENT_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:direct debit|standing order|dd)\b").expect("valid marker pattern")
});

static WEB_TLD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\.(?:com|co\.uk|net|org|io|tv)\b").expect("valid tld pattern")
});

static COMPANY_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\s+(?:ltd|limited|inc|llc|uk|gb|com)$").expect("valid company suffix pattern")
});

static NUMBERS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d+\b").expect("valid number pattern"));

/// Default minimum score (0-100) for linking a name to a catalog entry
pub const DEFAULT_FUZZY_THRESHOLD: f64 = 80.0;

/// Normalize a membership or merchant name for comparison
pub fn normalize_name(name: &str) -> String {
    let trimmed = name.trim();
    PLAN_SUFFIX.replace(trimmed, "").trim().to_lowercase()
}

/// Reduce a raw bank-statement line to the merchant name
///
/// "NETFLIX.COM — DD 01/12" becomes "NETFLIX", as does "DD NETFLIX.COM REF 9F3K2".
pub fn clean_statement_descriptor(line: &str) -> String {
    let text = STAR_REFERENCE.replace_all(line, " ");
    let text = SEPARATORS.replace_all(&text, " ");
    let text = DATE.replace_all(&text, " ");
    let text = MONTH_DATE.replace_all(&text, " ");
    let text = collapse_whitespace(&text);
    let text = PAYMENT_PREFIX.replace(&text, "");
    let text = PAYMENT_MARKER.replace_all(&text, " ");
    let text = REFERENCE_TAIL.replace_all(&text, " ");
    let text = WEB_TLD.replace_all(&text, " ");
    let text = NUMBERS.replace_all(&text, " ");
    let mut text = collapse_whitespace(&text);

    loop {
        let stripped = COMPANY_SUFFIX.replace(&text, "").trim().to_string();
        let stripped = strip_trailing_reference(&stripped);
        if stripped == text {
            break;
        }
        text = stripped;
    }

    text
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Drop a last token mixing letters and digits, such as a mandate id; short ones like "O2" stay
fn strip_trailing_reference(text: &str) -> String {
    match text.rsplit_once(' ') {
        Some((head, last)) if is_reference_token(last) => head.trim_end().to_string(),
        _ => text.to_string(),
    }
}

fn is_reference_token(token: &str) -> bool {
    token.len() >= 4
        && token.chars().all(|c| c.is_ascii_alphanumeric())
        && token.chars().any(|c| c.is_ascii_digit())
        && token.chars().any(|c| c.is_ascii_alphabetic())
}

/// Bigram similarity on a 0-100 scale; symmetric and deterministic
#[inline]
pub fn similarity_score(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    strsim::sorensen_dice(a, b) * 100.0
}

/// A catalog membership linked to a free-text name
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FuzzyMatch<'a> {
    pub membership: &'a Membership,
    pub score: f64,
}

/// Score one membership against a normalized query: best of name, provider and slug
pub fn score_membership(normalized_query: &str, membership: &Membership) -> f64 {
    let slug = membership
        .provider_slug
        .as_deref()
        .map(|s| s.replace(['-', '_'], " "));

    [
        Some(membership.name.as_str()),
        membership.provider_name.as_deref(),
        slug.as_deref(),
    ]
    .into_iter()
    .flatten()
    .map(|field| similarity_score(normalized_query, &normalize_name(field)))
    .fold(0.0, f64::max)
}

/// Best-scoring candidate at or above `threshold`; first seen wins ties
pub fn best_match<'a>(
    query_name: &str,
    candidates: &'a [Membership],
    threshold: f64,
) -> Option<FuzzyMatch<'a>> {
    let query = normalize_name(query_name);
    if query.is_empty() {
        return None;
    }

    let mut best: Option<FuzzyMatch<'a>> = None;
    for membership in candidates {
        let score = score_membership(&query, membership);
        if best.map_or(true, |b| score > b.score) {
            best = Some(FuzzyMatch { membership, score });
        }
    }

    let best = best.filter(|b| b.score >= threshold);
    match &best {
        Some(m) => tracing::debug!(
            query = %query,
            membership_id = m.membership.id,
            score = m.score,
            "Fuzzy name match"
        ),
        None => tracing::debug!(query = %query, threshold, "No fuzzy name match"),
    }
    best
}

/// Links free-text names to catalog memberships with a configured threshold
#[derive(Debug, Clone, Copy)]
pub struct FuzzyNameMatcher {
    threshold: f64,
}

impl FuzzyNameMatcher {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn best_match<'a>(&self, query_name: &str, candidates: &'a [Membership]) -> Option<FuzzyMatch<'a>> {
        best_match(query_name, candidates, self.threshold)
    }
}

impl Default for FuzzyNameMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_FUZZY_THRESHOLD)
    }
}
