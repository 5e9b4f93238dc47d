use crate::results::ProductRecord;
use regex::Regex;
use serde::{Serialize, Serializer};
use std::fmt;
use std::sync::LazyLock;

/// Title fragments that mark a product as solving a specific problem
pub const SOLUTION_KEYWORDS: &[&str] = &[
    "ayuda",
    "solución",
    "solucion",
    "alivio",
    "remedio",
    "repara",
    "corrector",
    "quitamanchas",
    "antimanchas",
    "relief",
    "remedy",
    "repair",
    "solution",
];

static NON_DIGITS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\D").expect("digit pattern is valid"));

/// Report section a product is listed under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    SpecialSolutions,
    TopSellers,
    Trending,
    Popular,
    Other,
}

impl Category {
    pub fn label(&self) -> &'static str {
        match self {
            Category::SpecialSolutions => "Special Solutions",
            Category::TopSellers => "Top Sellers",
            Category::Trending => "Trending",
            Category::Popular => "Popular",
            Category::Other => "Other",
        }
    }
}

impl Serialize for Category {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Review count: the digits of `reviews`, 0 when there are none
///
/// Counts too large for `u64` saturate, so they still rank as huge.
pub fn review_count(reviews: &str) -> u64 {
    let digits = NON_DIGITS.replace_all(reviews, "");
    if digits.is_empty() {
        return 0;
    }
    // Only digits remain, so a parse failure is an overflow
    digits.parse().unwrap_or(u64::MAX)
}

/// Rating: the number before the first space of `rating`, 0 when unparsable
pub fn rating_value(rating: &str) -> f64 {
    let head = rating.split(' ').next().unwrap_or_default();
    match head.parse::<f64>() {
        Ok(value) if value.is_finite() => value,
        _ => 0.0,
    }
}

/// Numbers derived from a record's review and rating strings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Signals {
    pub review_count: u64,
    pub rating: f64,
}

impl Signals {
    pub fn of(record: &ProductRecord) -> Self {
        Self {
            review_count: review_count(&record.reviews),
            rating: rating_value(&record.rating),
        }
    }
}

type Predicate = Box<dyn Fn(&ProductRecord, &Signals) -> bool + Send + Sync>;

/// A category and the condition a record must meet to fall into it
pub struct Rule {
    category: Category,
    predicate: Predicate,
}

impl Rule {
    pub fn new<F>(category: Category, predicate: F) -> Self
    where
        F: Fn(&ProductRecord, &Signals) -> bool + Send + Sync + 'static,
    {
        Self {
            category,
            predicate: Box::new(predicate),
        }
    }

    /// Records whose title contains any of `keywords`, ignoring case
    pub fn title_contains(category: Category, keywords: &[&str]) -> Self {
        let keywords: Vec<String> = keywords.iter().map(|k| k.to_lowercase()).collect();
        Self::new(category, move |record, _| {
            let title = record.title.to_lowercase();
            keywords.iter().any(|k| title.contains(k.as_str()))
        })
    }

    /// More than `reviews` reviews and a rating of at least `rating`
    pub fn threshold(category: Category, reviews: u64, rating: f64) -> Self {
        Self::new(category, move |_, signals| {
            signals.review_count > reviews && signals.rating >= rating
        })
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn matches(&self, record: &ProductRecord, signals: &Signals) -> bool {
        (self.predicate)(record, signals)
    }
}

/// First-match-wins classification over an ordered rule list
pub struct Categorizer {
    rules: Vec<Rule>,
}

impl Categorizer {
    /// Rules are evaluated in order; records matching none are `Other`
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn categorize(&self, record: &ProductRecord) -> Category {
        let signals = Signals::of(record);
        self.rules
            .iter()
            .find(|rule| rule.matches(record, &signals))
            .map_or(Category::Other, Rule::category)
    }
}

impl Default for Categorizer {
    fn default() -> Self {
        Self::new(vec![
            Rule::title_contains(Category::SpecialSolutions, SOLUTION_KEYWORDS),
            Rule::threshold(Category::TopSellers, 100_000, 4.8),
            Rule::threshold(Category::Trending, 50_000, 4.5),
            Rule::threshold(Category::Popular, 10_000, 4.0),
            Rule::new(Category::Other, |_, _| true),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(title: &str, rating: &str, reviews: &str) -> ProductRecord {
        ProductRecord {
            title: title.to_string(),
            rating: rating.to_string(),
            reviews: reviews.to_string(),
            ..ProductRecord::unresolved("shop")
        }
    }

    #[test]
    fn test_review_count_parsing() {
        assert_eq!(review_count("12,345 valoraciones"), 12345);
        assert_eq!(review_count("12.345"), 12345);
        assert_eq!(review_count(""), 0);
        assert_eq!(review_count("N/A"), 0);
        assert_eq!(review_count("99999999999999999999999"), u64::MAX);
    }

    #[test]
    fn test_overflowing_review_count_still_ranks() {
        let categorizer = Categorizer::default();
        let r = record("Auriculares", "4.9 de 5", "99.999.999.999.999.999.999.999");
        assert_eq!(categorizer.categorize(&r), Category::TopSellers);
    }

    #[test]
    fn test_rating_value_parsing() {
        assert_eq!(rating_value("4.5 de 5 estrellas"), 4.5);
        assert_eq!(rating_value("4.8"), 4.8);
        assert_eq!(rating_value("N/A"), 0.0);
        assert_eq!(rating_value(""), 0.0);
        // Only the text before the first space is considered
        assert_eq!(rating_value("4,5 de 5 estrellas"), 0.0);
        assert_eq!(rating_value("NaN stars"), 0.0);
    }

    #[test]
    fn test_keyword_rule_has_priority() {
        let categorizer = Categorizer::default();
        let r = record("Spray de AYUDA para planchar", "4.9 de 5", "200000");
        assert_eq!(categorizer.categorize(&r), Category::SpecialSolutions);
    }

    #[test]
    fn test_threshold_rules_in_order() {
        let categorizer = Categorizer::default();
        let cases = [
            ("200,000", "4.9 de 5", Category::TopSellers),
            ("200,000", "4.7 de 5", Category::Trending),
            ("60,000", "4.5 de 5", Category::Trending),
            ("60,000", "4.4 de 5", Category::Popular),
            ("10,001", "4.0 de 5", Category::Popular),
            ("10,000", "5.0 de 5", Category::Other),
            ("500", "3.2 de 5", Category::Other),
        ];
        for (reviews, rating, expected) in cases {
            let r = record("Auriculares inalámbricos", rating, reviews);
            assert_eq!(categorizer.categorize(&r), expected, "{} / {}", reviews, rating);
        }
    }

    #[test]
    fn test_unresolved_record_is_other() {
        let categorizer = Categorizer::default();
        assert_eq!(
            categorizer.categorize(&ProductRecord::unresolved("shop")),
            Category::Other
        );
    }

    #[test]
    fn test_empty_rule_list_falls_back_to_other() {
        let categorizer = Categorizer::new(Vec::new());
        let r = record("ayuda", "5.0", "1000000");
        assert_eq!(categorizer.categorize(&r), Category::Other);
    }

    #[test]
    fn test_custom_rules_are_swappable() {
        let categorizer = Categorizer::new(vec![Rule::threshold(Category::Popular, 0, 0.0)]);
        let r = record("x", "1.0", "1");
        assert_eq!(categorizer.categorize(&r), Category::Popular);
        assert_eq!(categorizer.rules().len(), 1);
    }
}
