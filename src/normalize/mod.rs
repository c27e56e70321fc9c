// src/normalize/mod.rs - Text canonicalization shared by raw rows and master data
//!
//! Every comparison in the matcher runs on the output of [`NameNormalizer::normalize`],
//! applied identically to both sides. The function is pure and idempotent.

use log::warn;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeSet, HashMap};

pub const MIN_TOKEN_LENGTH: usize = 2;

static RE_INITIALISM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[A-Z]\.(?:\s*[A-Z]\.)+").expect("invalid RE_INITIALISM"));
static RE_TRAILING_PAREN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.*?)\s*\(([^()]*)\)\s*$").expect("invalid RE_TRAILING_PAREN"));

const DEFAULT_ABBREVIATIONS: [(&str, &str); 28] = [
    ("GOVT", "GOVERNMENT"),
    ("GOV", "GOVERNMENT"),
    ("MED", "MEDICAL"),
    ("MEDL", "MEDICAL"),
    ("COL", "COLLEGE"),
    ("COLL", "COLLEGE"),
    ("CLG", "COLLEGE"),
    ("INST", "INSTITUTE"),
    ("INSTT", "INSTITUTE"),
    ("UNIV", "UNIVERSITY"),
    ("HOSP", "HOSPITAL"),
    ("HOSPL", "HOSPITAL"),
    ("SCI", "SCIENCES"),
    ("RES", "RESEARCH"),
    ("EDU", "EDUCATION"),
    ("DIST", "DISTRICT"),
    ("GEN", "GENERAL"),
    ("PVT", "PRIVATE"),
    ("LTD", "LIMITED"),
    ("DENT", "DENTAL"),
    ("MEM", "MEMORIAL"),
    ("NATL", "NATIONAL"),
    ("POSTGRAD", "POSTGRADUATE"),
    ("CHAR", "CHARITABLE"),
    ("AIIMS", "ALL INDIA INSTITUTE OF MEDICAL SCIENCES"),
    ("JIPMER", "JAWAHARLAL INSTITUTE OF POSTGRADUATE MEDICAL EDUCATION AND RESEARCH"),
    ("PGIMER", "POSTGRADUATE INSTITUTE OF MEDICAL EDUCATION AND RESEARCH"),
    ("NIMHANS", "NATIONAL INSTITUTE OF MENTAL HEALTH AND NEURO SCIENCES"),
];

const LEGAL_SUFFIXES: [&[&str]; 8] = [
    &["PRIVATE", "LIMITED"],
    &["LIMITED"],
    &["TRUST"],
    &["CHARITABLE"],
    &["SOCIETY"],
    &["INCORPORATED"],
    &["LLP"],
    &["REGD"],
];

/// Function words dropped before token overlap. Content words like COLLEGE stay;
/// the index weights them down by frequency instead.
pub const FUNCTION_WORDS: [&str; 8] = ["OF", "AND", "THE", "FOR", "IN", "AT", "TO", "ON"];

#[derive(Debug, Clone)]
pub struct NameNormalizer {
    abbreviations: HashMap<String, String>,
    legal_suffixes: Vec<Vec<String>>,
    basic: bool,
}

impl Default for NameNormalizer {
    fn default() -> Self {
        Self {
            abbreviations: DEFAULT_ABBREVIATIONS
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            legal_suffixes: LEGAL_SUFFIXES
                .iter()
                .map(|s| s.iter().map(|t| t.to_string()).collect())
                .collect(),
            basic: false,
        }
    }
}

static DEFAULT_NORMALIZER: Lazy<NameNormalizer> = Lazy::new(NameNormalizer::default);

/// Normalizes with the built-in abbreviation table.
pub fn normalize(text: &str) -> String {
    DEFAULT_NORMALIZER.normalize(text)
}

impl NameNormalizer {
    /// Uppercase and whitespace collapse only, for runs with normalization switched off.
    pub fn basic() -> Self {
        Self {
            basic: true,
            ..Self::default()
        }
    }

    pub fn is_basic(&self) -> bool {
        self.basic
    }

    /// Adds abbreviation entries. An entry is refused when it would make expansion
    /// non-idempotent (its expansion contains a key, or its key appears in an expansion).
    pub fn with_abbreviations<I, K, V>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, expansion) in entries {
            let key = basic_clean(key.as_ref());
            let expansion = basic_clean(expansion.as_ref());
            if key.is_empty() || expansion.is_empty() || key.contains(' ') {
                warn!("Ignoring malformed abbreviation entry '{}' -> '{}'", key, expansion);
                continue;
            }
            let expansion_has_key = expansion
                .split_whitespace()
                .any(|t| t == key || self.abbreviations.contains_key(t));
            let key_in_expansion = self
                .abbreviations
                .values()
                .any(|v| v.split_whitespace().any(|t| t == key));
            if expansion_has_key || key_in_expansion {
                warn!(
                    "Ignoring abbreviation '{}' -> '{}': it would re-expand on a second pass",
                    key, expansion
                );
                continue;
            }
            self.abbreviations.insert(key, expansion);
        }
        self
    }

    pub fn abbreviation_count(&self) -> usize {
        self.abbreviations.len()
    }

    pub fn normalize(&self, text: &str) -> String {
        if self.basic {
            return basic_clean(text);
        }
        let upper = text.to_uppercase();
        let collapsed = RE_INITIALISM.replace_all(&upper, |caps: &regex::Captures| {
            caps[0].chars().filter(|c| c.is_alphanumeric()).collect::<String>()
        });
        let spaced = collapsed.replace('&', " AND ").replace('\'', "");
        let cleaned: String = spaced
            .chars()
            .map(|c| if c.is_alphanumeric() || c.is_whitespace() { c } else { ' ' })
            .collect();

        let mut tokens: Vec<String> = Vec::new();
        for word in cleaned.split_whitespace() {
            match self.abbreviations.get(word) {
                Some(expansion) => tokens.extend(expansion.split_whitespace().map(str::to_string)),
                None => tokens.push(word.to_string()),
            }
        }

        self.strip_legal_suffixes(&mut tokens);
        tokens.join(" ")
    }

    fn strip_legal_suffixes(&self, tokens: &mut Vec<String>) {
        loop {
            let before = tokens.len();
            for suffix in &self.legal_suffixes {
                if tokens.len() > suffix.len() && tokens.ends_with(suffix) {
                    tokens.truncate(tokens.len() - suffix.len());
                }
            }
            if tokens.len() == before {
                break;
            }
        }
    }

    /// Location text: normalized, without 6-digit pincodes or the state's own name.
    pub fn normalize_location(&self, text: &str, state_name: Option<&str>) -> String {
        let normalized = self.normalize(text);
        let mut tokens: Vec<&str> = normalized
            .split_whitespace()
            .filter(|t| !(t.len() == 6 && t.chars().all(|c| c.is_ascii_digit())))
            .collect();

        if let Some(state) = state_name {
            let state_norm = self.normalize(state);
            let state_tokens: Vec<&str> = state_norm.split_whitespace().collect();
            if !state_tokens.is_empty() {
                let mut i = 0;
                while i + state_tokens.len() <= tokens.len() {
                    if tokens[i..i + state_tokens.len()] == state_tokens[..] {
                        tokens.drain(i..i + state_tokens.len());
                    } else {
                        i += 1;
                    }
                }
            }
        }
        tokens.join(" ")
    }
}

/// Uppercase and whitespace collapse only. Used when full normalization is disabled.
pub fn basic_clean(text: &str) -> String {
    text.to_uppercase().split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Significant tokens of an already-normalized string.
pub fn tokens(normalized: &str) -> BTreeSet<String> {
    normalized
        .split_whitespace()
        .filter(|t| t.chars().count() >= MIN_TOKEN_LENGTH && !FUNCTION_WORDS.contains(t))
        .map(str::to_string)
        .collect()
}

/// Splits "NAME, CITY, STATE" or "NAME (CITY)" into a name part and a location part.
pub fn split_institution_text(text: &str) -> (String, Option<String>) {
    let trimmed = text.trim();
    if let Some((name, rest)) = trimmed.split_once(',') {
        let rest = rest.trim().trim_matches(',').trim();
        let location = if rest.is_empty() { None } else { Some(rest.to_string()) };
        return (name.trim().to_string(), location);
    }
    if let Some(caps) = RE_TRAILING_PAREN.captures(trimmed) {
        let name = caps[1].trim();
        let inner = caps[2].trim();
        if !name.is_empty() && !inner.is_empty() {
            return (name.to_string(), Some(inner.to_string()));
        }
    }
    (trimmed.to_string(), None)
}

/// Canonical round label: "ROUND 1", "R-1", "1st" style inputs become "1".
pub fn normalize_round(text: &str) -> String {
    let cleaned: String = text
        .to_uppercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    let cleaned = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    let core: Vec<&str> = cleaned
        .split_whitespace()
        .filter(|t| !matches!(*t, "ROUND" | "RND" | "R"))
        .collect();

    if core.len() == 1 {
        if let Some(n) = round_number(core[0]) {
            return n.to_string();
        }
    }
    match core.join(" ").as_str() {
        "MOP UP" | "MOPUP" => "MOP UP".to_string(),
        "STRAY" | "STRAY VACANCY" => "STRAY VACANCY".to_string(),
        _ => cleaned,
    }
}

fn round_number(token: &str) -> Option<u32> {
    match token {
        "FIRST" => return Some(1),
        "SECOND" => return Some(2),
        "THIRD" => return Some(3),
        "FOURTH" => return Some(4),
        _ => {}
    }
    let mut token = token;
    for prefix in ["ROUND", "RND", "R"] {
        if let Some(rest) = token.strip_prefix(prefix) {
            if rest.starts_with(|c: char| c.is_ascii_digit()) {
                token = rest;
                break;
            }
        }
    }
    let digits = token.trim_end_matches(|c: char| c.is_ascii_alphabetic());
    match &token[digits.len()..] {
        "" | "ST" | "ND" | "RD" | "TH" => digits.parse().ok(),
        _ => None,
    }
}
