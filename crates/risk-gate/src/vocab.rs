use once_cell::sync::Lazy;
use regex::Regex;

/// Irreversible money movement. A match is always `Critical`.
pub(crate) const FINANCIAL_TERMS: &[&str] = &[
    "purchase",
    "buy",
    "pay",
    "payment",
    "checkout",
    "order",
    "transfer",
    "wire",
    "subscribe",
    "donate",
];

/// Destructive or outward-facing data changes. A match is `High`.
pub(crate) const DESTRUCTIVE_TERMS: &[&str] = &[
    "delete",
    "remove",
    "erase",
    "password",
    "publish",
    "send",
    "post",
    "submit",
    "unsubscribe",
    "deactivate",
];

/// Keywords that mark a value payload as sensitive on their own.
pub(crate) const SENSITIVE_TERMS: &[&str] = &[
    "password",
    "passcode",
    "passphrase",
    "cvv",
    "cvc",
    "pin",
    "ssn",
    "social security",
    "card number",
    "iban",
    "routing number",
];

/// 13-16 digit runs with optional space/dash separators (payment cards).
pub(crate) static CARD_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:\d[ -]?){13,16}\b").expect("card number pattern"));

/// US social security number shape.
pub(crate) static SSN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").expect("ssn pattern"));

pub(crate) fn contains_term(haystack: &str, terms: &[&str]) -> bool {
    let lower = haystack.to_ascii_lowercase();
    terms.iter().any(|term| lower.contains(term))
}
