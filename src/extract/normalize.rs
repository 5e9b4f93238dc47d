use regex::Regex;
use std::sync::LazyLock;

/// Anything that is not part of a numeric price
static PRICE_NOISE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^0-9.,]").expect("price pattern is valid"));

/// Collapses runs of whitespace and newlines into single spaces and trims the ends
pub fn sanitize_text(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Keeps only digits and the `.` / `,` separators
///
/// `"1.234,56 €"` becomes `"1.234,56"`; the separators are left as found
/// since their meaning depends on the shop's locale.
pub fn normalize_price(raw: &str) -> String {
    PRICE_NOISE.replace_all(raw, "").into_owned()
}
