//! Contact-information patterns shared by the preparer, generator, and sanitizer.
//!
//! All matching here is best-effort and regex based. The source scrub removes
//! contact details before anything is embedded; the redaction pass replaces
//! anything that still looks like an email or phone number in generated text;
//! the request check lets the generator refuse before a model ever runs.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;

/// Replacement text for redacted contact details.
pub const REDACTION_PLACEHOLDER: &str = "[REDACTED]";

/// Any whitespace-free token containing `@`. Deliberately broad: used only
/// to scrub the source document.
static EMAIL_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\S+@\S+").expect("unreachable error: failed to compile email token pattern")
});

/// An email-shaped substring.
static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)[a-z0-9._%+-]+@[a-z0-9-]+(?:\.[a-z0-9-]+)*\.[a-z]{2,}")
        .expect("unreachable error: failed to compile email pattern")
});

static URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:https?://|www\.)\S+")
        .expect("unreachable error: failed to compile url pattern")
});

/// Profile links usually written without a scheme on resumes.
static PROFILE_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:linkedin|github)\.com\S*")
        .expect("unreachable error: failed to compile profile link pattern")
});

/// `(412) 499-6900`, `412-499-6900`, `412.499.6900`, `+1 412 499 6900`,
/// `+14124996900`, ... A bare run of digits only matches from a word
/// boundary, so longer numbers are left alone.
static PHONE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?:\+\d{1,3}[-.\s]?\(?|\b1[-.\s]?\(?|\(\b|\b)\d{3}\)?[-.\s]?\d{3}[-.\s]?\d{4}\b",
    )
    .expect("unreachable error: failed to compile phone pattern")
});

/// Questions asking for private contact details.
///
/// Broad nouns such as `phone` or `email` only count when they are owned by
/// someone, asked for outright, or part of a contact compound, so questions
/// about phone apps or email marketing pass.
static PII_REQUEST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?ix)
        \b(?:your|her|his|their)\s+(?:(?:personal|private|work|direct|best)\s+)?
            (?:phone|telephone|cell|mobile|number|e-?mail|mail\s*id|gmail|contact
                |whats\s*app|address)\b
        | \b(?:phone|telephone|cell|mobile)\s*(?:number|no\b)
        | \bcontact\s+(?:number|details|info(?:rmation)?)\b
        | \be-?mail\s+(?:address|id)\b
        | \bmail\s*id\b
        | \bwhats\s*app\b
        | \b(?:home|mailing|street|postal)\s+address\b
        | \b(?:get|give|share|send|provide|need|find|what['’]?s|what\s+is)\b[^?.!]*?
            \b(?:phone|cell|mobile|e-?mail|gmail|contact|address)\s*(?:[?.!]|$)
        | \b(?:call|text|phone|e-?mail|reach|contact)\s+(?:her|him|them|you)\b
        | \bhow\s+(?:can|do|could|should)\s+i\s+(?:reach|contact|call|text|e-?mail)\b
        ",
    )
    .expect("unreachable error: failed to compile pii request pattern")
});

static SPACE_RUN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[ \t]{2,}").expect("unreachable error: failed to compile space run pattern")
});

static TRAILING_SPACE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)[ \t]+$").expect("unreachable error: failed to compile trailing space pattern")
});

/// Remove contact details (emails, links, profile URLs, phone numbers) from
/// source text, collapsing the gaps they leave behind. Newlines are kept.
pub fn scrub_source(text: &str) -> String {
    let text = EMAIL_TOKEN.replace_all(text, "");
    let text = URL.replace_all(&text, "");
    let text = PROFILE_LINK.replace_all(&text, "");
    let text = PHONE.replace_all(&text, "");
    let text = SPACE_RUN.replace_all(&text, " ");
    TRAILING_SPACE.replace_all(&text, "").trim().to_string()
}

/// Replace every email-shaped and phone-shaped substring with `placeholder`.
pub fn redact<'a>(text: &'a str, placeholder: &str) -> Cow<'a, str> {
    match EMAIL.replace_all(text, placeholder) {
        Cow::Borrowed(unchanged) => PHONE.replace_all(unchanged, placeholder),
        Cow::Owned(owned) => Cow::Owned(PHONE.replace_all(&owned, placeholder).into_owned()),
    }
}

/// Whether `text` contains anything email- or phone-shaped.
pub fn contains_contact_details(text: &str) -> bool {
    EMAIL.is_match(text) || PHONE.is_match(text)
}

/// Whether a question asks for private contact details.
pub fn is_pii_request(question: &str) -> bool {
    PII_REQUEST.is_match(question)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "JANE DOE Software Engineer jane.doe@example.com | (412) 499-6900 | \
        linkedin.com/in/jane-doe-123 | github.com/janedoe SUMMARY Backend engineer.";

    #[test]
    fn scrub_removes_contact_header() {
        let cleaned = scrub_source(HEADER);
        assert!(!cleaned.contains('@'));
        assert!(!cleaned.contains("499"));
        assert!(!cleaned.contains("linkedin"));
        assert!(!cleaned.contains("github"));
        assert!(cleaned.starts_with("JANE DOE Software Engineer"));
        assert!(cleaned.ends_with("SUMMARY Backend engineer."));
        assert!(!cleaned.contains("  "));
    }

    #[test]
    fn scrub_removes_urls_and_keeps_lines() {
        let cleaned = scrub_source("Portfolio: https://jane.dev/work\nSkills: Rust");
        assert_eq!(cleaned, "Portfolio:\nSkills: Rust");
    }

    #[test]
    fn scrub_keeps_ordinary_numbers() {
        let text = "Scaled from 700 to 1300 stores, 500,000+ events/second, July 2020 - June 2022.";
        assert_eq!(scrub_source(text), text);
    }

    #[test]
    fn redacts_email_and_phone_shapes() {
        let out = redact("Mail me at a.b@corp.io or call 555-123-4567.", REDACTION_PLACEHOLDER);
        assert_eq!(out, "Mail me at [REDACTED] or call [REDACTED].");
    }

    #[test]
    fn redaction_borrows_clean_text() {
        let out = redact("Four years of Kafka experience.", REDACTION_PLACEHOLDER);
        assert!(matches!(out, Cow::Borrowed(_)));
    }

    #[test]
    fn phone_variants_are_detected() {
        for phone in [
            "(412) 499-6900",
            "(412)499-6900",
            "412.499.6900",
            "+1 412 499 6900",
            "+1 (412) 499-6900",
            "1-412-499-6900",
            "4124996900",
            "+14124996900",
            "14124996900",
        ] {
            assert!(contains_contact_details(phone), "{phone} not detected");
        }
        assert!(!contains_contact_details("Top 4 – Hackathon (2021)"));
        assert!(!contains_contact_details("order 123456789012"));
    }

    #[test]
    fn country_code_runs_are_redacted_whole() {
        let out = redact("Call +14124996900 or 14124996900.", REDACTION_PLACEHOLDER);
        assert_eq!(out, "Call [REDACTED] or [REDACTED].");
        assert_eq!(scrub_source("Jane +14124996900 Engineer"), "Jane Engineer");
    }

    #[test]
    fn detects_contact_requests() {
        for question in [
            "what's your phone number?",
            "Can I get their email?",
            "What is the contact number?",
            "share your cell phone",
            "How can I reach Jane?",
            "What's the home address?",
            "What's her number?",
            "Can I get your cell?",
            "What is their mail id?",
            "Give me his gmail",
            "Can I call them?",
            "What is the email?",
        ] {
            assert!(is_pii_request(question), "{question:?} not flagged");
        }
    }

    #[test]
    fn ordinary_questions_pass_precheck() {
        for question in [
            "Tell me about your experience",
            "What projects have you worked on?",
            "Did you build mobile apps?",
            "How did you address scalability issues?",
            "Did they build phone apps?",
            "What email marketing tools have they used?",
            "What is the total number of services migrated?",
            "Find the address of the first bug report.",
        ] {
            assert!(!is_pii_request(question), "{question:?} wrongly flagged");
        }
    }
}
