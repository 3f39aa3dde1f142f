//! Text normalization for search-safe ticket text.
//!
//! Strips customer/site/project identifiers, contact details, timestamps
//! and long machine identifiers from raw SR text while preserving short
//! technical tokens (activity codes, error terms). Pure and deterministic:
//! `normalize(normalize(x)) == normalize(x)`.

use once_cell::sync::Lazy;
use regex::Regex;

/// Inputs longer than this that clean down to under [`MIN_CLEANED_LEN`]
/// chars trigger the light-pass fallback.
const FALLBACK_INPUT_LEN: usize = 30;
const MIN_CLEANED_LEN: usize = 10;

/// Customer/project/plan/site labels with a delimited value, up to the
/// next separator.
static LABEL_VALUE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:customer|client|cust|account|project|proj|plan|site|location)\s*(?:name|id|no|number|code)?\s*[:=#]\s*[^,;|\n]*",
    )
    .expect("label pattern")
});

static EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").expect("email pattern")
});

/// Separator-delimited phone number forms; long bare digit runs are
/// handled by the identifier token filter.
static PHONE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?:\+?\d{1,3}[\s.-])?(?:\(\d{1,4}\)[\s.-]?)?\d{3,4}[\s.-]\d{3,4}(?:[\s.-]\d{3,4})?",
    )
    .expect("phone pattern")
});

static ISO_TIMESTAMP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b\d{4}-\d{2}-\d{2}(?:[T ]\d{2}:\d{2}(?::\d{2}(?:\.\d+)?)?(?:Z|[+-]\d{2}:?\d{2})?)?\b",
    )
    .expect("iso timestamp pattern")
});

static REGIONAL_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d{1,2}[/.]\d{1,2}[/.]\d{2,4}\b").expect("regional date pattern"));

static CLOCK_TIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b\d{1,2}:\d{2}(?::\d{2})?\s*(?:[AaPp][Mm])?\b").expect("clock time pattern")
});

/// `Activity: <CODE>` reference, 2-8 uppercase-alnum chars.
static ACTIVITY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i:activity)\s*(?i:code)?\s*[:#]?\s*([A-Z0-9]{2,8})\b").expect("activity pattern")
});

static PUNCT_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([.,;:!?])[\s.,;:!?]*[.,;:!?]").expect("punct run pattern"));

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace pattern"));

/// Normalize raw ticket text into search-safe text.
///
/// Falls back to a light pass (label removal only) when full cleaning
/// reduces a non-trivial input to near-empty text, so over-aggressive
/// stripping never destroys searchable signal.
pub fn normalize(raw: &str) -> String {
    let input = raw.trim();
    if input.is_empty() {
        return String::new();
    }

    let activity_code = extract_activity_code(input);

    let mut cleaned = full_pass(input);
    if input.chars().count() > FALLBACK_INPUT_LEN && cleaned.chars().count() < MIN_CLEANED_LEN {
        tracing::debug!(
            input_len = input.len(),
            cleaned_len = cleaned.len(),
            "Full cleaning pass left near-empty text, using light pass"
        );
        cleaned = light_pass(input);
    }

    match activity_code {
        Some(code) if !cleaned.contains(&code) => {
            if cleaned.is_empty() {
                format!("Activity: {}", code)
            } else {
                format!("Activity: {} {}", code, cleaned)
            }
        }
        _ => cleaned,
    }
}

/// Extract the first `Activity: <CODE>` reference, if any.
pub fn extract_activity_code(text: &str) -> Option<String> {
    ACTIVITY
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

fn full_pass(input: &str) -> String {
    let text = LABEL_VALUE.replace_all(input, " ");
    let text = EMAIL.replace_all(&text, " ");
    let text = ISO_TIMESTAMP.replace_all(&text, " ");
    let text = REGIONAL_DATE.replace_all(&text, " ");
    let text = CLOCK_TIME.replace_all(&text, " ");
    let text = PHONE.replace_all(&text, " ");

    let text = filter_long_identifiers(&text);
    collapse(&text)
}

fn light_pass(input: &str) -> String {
    let text = LABEL_VALUE.replace_all(input, " ");
    collapse(&text)
}

/// Drop free-standing long alphanumeric identifiers and orphaned
/// separator tokens while keeping short technical codes and ordinary
/// words.
fn filter_long_identifiers(text: &str) -> String {
    text.split_whitespace()
        .filter(|token| {
            let core = trim_punctuation(token);
            !core.is_empty() && keep_token(core)
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn trim_punctuation(token: &str) -> &str {
    token.trim_matches(|c: char| !c.is_ascii_alphanumeric())
}

fn keep_token(core: &str) -> bool {
    if core.len() < 8 {
        return true;
    }

    let identifier_shaped = core
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !identifier_shaped {
        return true;
    }

    // Plain words (no digits) are never identifiers
    if !core.chars().any(|c| c.is_ascii_digit()) {
        return true;
    }

    // An 8-char all-uppercase token still reads as a technical code
    core.len() == 8
        && core.chars().any(|c| c.is_ascii_uppercase())
        && core
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
}

/// Collapse duplicate punctuation and whitespace, trim stray separators.
fn collapse(text: &str) -> String {
    let text = PUNCT_RUN.replace_all(text, "$1");
    let text = WHITESPACE.replace_all(&text, " ");
    text.trim()
        .trim_start_matches(|c: char| c.is_ascii_punctuation() || c.is_whitespace())
        .trim_end_matches(|c: char| c == ',' || c == ';' || c == '|')
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   \t\n"), "");
    }

    #[test]
    fn test_label_value_removal() {
        let cleaned = normalize("Customer: Acme Telecom; login failure on portal");
        assert!(!cleaned.contains("Acme"));
        assert!(cleaned.contains("login failure"));

        let cleaned = normalize("Project ID: PX-2291-A | fiber cut between exchanges");
        assert!(!cleaned.contains("PX-2291-A"));
        assert!(cleaned.contains("fiber cut"));
    }

    #[test]
    fn test_email_and_phone_removal() {
        let cleaned = normalize("user john.doe@telco.example reported outage, call 0151-555-2368");
        assert!(!cleaned.contains("@"));
        assert!(!cleaned.contains("555"));
        assert!(cleaned.contains("reported outage"));
    }

    #[test]
    fn test_timestamp_removal() {
        let cleaned =
            normalize("alarm raised 2024-03-15T09:30:00Z and again 16/03/2024 at 10:15 on node");
        assert!(!cleaned.contains("2024"));
        assert!(!cleaned.contains("10:15"));
        assert!(cleaned.contains("alarm raised"));
    }

    #[test]
    fn test_long_identifier_removal_preserves_short_codes() {
        let cleaned = normalize("MW4217 degraded, correlation id a8f3c2d94b7e11ee is attached");
        assert!(cleaned.contains("MW4217"));
        assert!(!cleaned.contains("a8f3c2d94b7e11ee"));
        assert!(cleaned.contains("degraded"));

        // Plain long words are not identifiers
        let cleaned = normalize("interconnect handover unresponsive after maintenance window");
        assert!(cleaned.contains("unresponsive"));
        assert!(cleaned.contains("maintenance"));
    }

    #[test]
    fn test_activity_code_reinserted_at_front() {
        let cleaned = normalize("Customer: Acme; degraded throughput, activity code MW12 logged");
        assert!(cleaned.starts_with("Activity: MW12") || cleaned.contains("MW12"));

        // Code mentioned only inside a stripped section must be re-inserted
        let cleaned = normalize("Activity: BT07 | customer: Globex Industries; billing mismatch");
        assert!(cleaned.contains("BT07"));
        assert!(cleaned.contains("billing mismatch"));
    }

    #[test]
    fn test_light_pass_fallback_keeps_signal() {
        // Everything except the label is strippable noise, so the full pass
        // would leave near-empty text
        let input = "customer: Acme; 2024-03-15 0151-555-2368 a8f3c2d94b7e11ee 9f3312acdd8741aa";
        let cleaned = normalize(input);
        assert!(cleaned.chars().count() >= MIN_CLEANED_LEN);
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let samples = [
            "Customer: Acme Telecom; login failure on portal",
            "Activity: BT07 | customer: Globex; billing mismatch",
            "alarm raised 2024-03-15T09:30:00Z on node MW4217, call 0151-555-2368",
            "customer: Acme; 2024-03-15 0151-555-2368 a8f3c2d94b7e11ee 9f3312acdd8741aa",
            "plain text with no identifiers at all",
            "",
        ];

        for sample in samples {
            let once = normalize(sample);
            let twice = normalize(&once);
            assert_eq!(once, twice, "not idempotent for {:?}", sample);
        }
    }

    #[test]
    fn test_punctuation_collapse() {
        let cleaned = normalize("link down,, , retransmission errors;; escalated!!");
        assert!(!cleaned.contains(",,"));
        assert!(!cleaned.contains(";;"));
        assert!(cleaned.contains("link down"));
    }

    #[test]
    fn test_short_input_untouched_by_fallback_guard() {
        // Under the 30-char threshold the full pass result stands even if short
        let cleaned = normalize("cust: X; ok");
        assert!(cleaned.len() < MIN_CLEANED_LEN);
    }
}
