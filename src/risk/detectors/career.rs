//! Best-effort extraction of prior-employer names from free-text career
//! entries.
//!
//! Disclosures mix Korean and English, use inconsistent separators and
//! decorate company names with legal-form markers. The parser is lossy:
//! it can miss employers and can produce fragments that are not company
//! names. Callers must treat its output as a hint.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;

use crate::risk::{CareerMatch, MatchConfidence};

/// Shorter side of a partial match must have at least this many characters.
pub const MIN_PARTIAL_MATCH_CHARS: usize = 3;

fn separator_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[,;/|·\n→]+|\s+및\s+").expect("valid separator regex"))
}

fn current_marker_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*(?:[\(\[]\s*(?:현|現)\s*[\)\]]|現|(?i:current(?:ly)?\b|present\b))")
            .expect("valid current marker regex")
    })
}

fn past_marker_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*(?:[\(\[]\s*(?:전|前)\s*[\)\]]|前|(?i:former\b|formerly\b|previously\b|ex-))\s*")
            .expect("valid past marker regex")
    })
}

fn period_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\d{4}(?:[.\-/]\d{1,2})?(?:\s*[~\-–]\s*(?:\d{4}(?:[.\-/]\d{1,2})?)?)?")
            .expect("valid period regex")
    })
}

fn legal_form_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\(\s*(?:주|유|사)\s*\)|㈜|주식회사|유한회사|\bco\.?\s*,?\s*ltd\b\.?|\binc\b\.?|\bcorp(?:oration)?\b\.?|\bltd\b\.?|\bllc\b\.?",
        )
        .expect("valid legal form regex")
    })
}

fn role_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)(?:대표이사|대표|부회장|회장|부사장|사장|전무|상무|사외이사|이사|감사|본부장|부장|팀장|고문|의장|\bceo|\bcfo|\bcoo|\bcto|\bpresident|\bvice\b|\bdirector|\bchairman|\bauditor|\bmanager|\bexecutive|\bofficer|\bhead\b|\bpartner)\b",
        )
        .expect("valid role regex")
    })
}

/// Canonical form used for comparison: legal-form markers removed,
/// lowercased, whitespace and punctuation dropped.
pub fn normalize_company_name(name: &str) -> String {
    legal_form_regex()
        .replace_all(name, " ")
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Candidate prior-employer names in one career entry.
///
/// Fragments marked as current positions are skipped.
pub fn extract_prior_employers(text: &str) -> Vec<String> {
    let mut names = Vec::new();
    for fragment in separator_regex().split(text) {
        if current_marker_regex().is_match(fragment) {
            continue;
        }
        let fragment = past_marker_regex().replace(fragment, "");
        let fragment = period_regex().replace_all(&fragment, " ");
        let head = match role_regex().find(&fragment) {
            Some(m) => &fragment[..m.start()],
            None => &fragment[..],
        };
        let name = head
            .trim_matches(|c: char| c.is_whitespace() || "-:()[]".contains(c))
            .to_string();
        if normalize_company_name(&name).chars().count() >= 2 && !names.contains(&name) {
            names.push(name);
        }
    }
    names
}

fn compare(extracted: &str, candidate: &str) -> Option<MatchConfidence> {
    if extracted.is_empty() || candidate.is_empty() {
        return None;
    }
    if extracted == candidate {
        return Some(MatchConfidence::Exact);
    }
    let (shorter, longer) = if extracted.chars().count() <= candidate.chars().count() {
        (extracted, candidate)
    } else {
        (candidate, extracted)
    };
    (shorter.chars().count() >= MIN_PARTIAL_MATCH_CHARS && longer.contains(shorter))
        .then_some(MatchConfidence::Partial)
}

/// Match one career entry against the high-risk name set.
///
/// Each high-risk company is matched at most once per entry; `exclude`
/// (normally the analysed company's own name) never matches.
pub fn match_career_entry(
    text: &str,
    high_risk_names: &BTreeSet<String>,
    exclude: &str,
) -> Vec<CareerMatch> {
    let excluded = normalize_company_name(exclude);
    let mut matched: BTreeSet<&str> = BTreeSet::new();
    let mut matches = Vec::new();

    for extracted in extract_prior_employers(text) {
        let normalized = normalize_company_name(&extracted);
        for candidate in high_risk_names {
            if matched.contains(candidate.as_str()) {
                continue;
            }
            let candidate_normalized = normalize_company_name(candidate);
            if candidate_normalized == excluded {
                continue;
            }
            if let Some(confidence) = compare(&normalized, &candidate_normalized) {
                matched.insert(candidate.as_str());
                matches.push(CareerMatch {
                    career_text: text.to_string(),
                    extracted_name: extracted.clone(),
                    matched_company: candidate.clone(),
                    confidence,
                    heuristic: true,
                });
            }
        }
    }
    matches
}
