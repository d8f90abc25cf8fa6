//! Mutation rules applied to dictionary words.

use core::{
    fmt::{self, Display},
    mem,
    str::FromStr,
};

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::error::{AuditError, AuditResult};

/// Suffixes appended by [`Rule::NumericSuffix`].
pub const NUMERIC_SUFFIXES: &[&str] = &["1", "12", "123", "1234", "2023", "2024", "2025"];

/// Prefixes prepended by [`Rule::NumericPrefix`].
pub const NUMERIC_PREFIXES: &[&str] = &["1", "12", "123"];

/// Suffixes appended by [`Rule::SymbolSuffix`].
pub const SYMBOL_SUFFIXES: &[char] = &['!', '@', '#', '$', '%', '&', '*'];

/// The leetspeak substitutions, in application order.
pub const LEET_MAP: &[(char, char)] = &[
    ('a', '@'),
    ('e', '3'),
    ('i', '1'),
    ('o', '0'),
    ('s', '$'),
    ('t', '7'),
    ('l', '1'),
    ('g', '9'),
    ('b', '8'),
    ('z', '2'),
];

/// A mutation rule.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    Identity,
    Lowercase,
    Uppercase,
    TitleCase,
    Capitalize,
    NumericSuffix,
    NumericPrefix,
    Leetspeak,
    SymbolSuffix,
    Reverse,
    Duplicate,
    ToggleCase,
}

impl Rule {
    /// The rules enabled by default, in application order.
    pub const DEFAULT: [Rule; 9] = [
        Rule::Identity,
        Rule::Lowercase,
        Rule::Uppercase,
        Rule::TitleCase,
        Rule::Capitalize,
        Rule::NumericSuffix,
        Rule::NumericPrefix,
        Rule::Leetspeak,
        Rule::SymbolSuffix,
    ];

    /// Additional rules that have to be opted in.
    pub const EXTENDED: [Rule; 3] = [Rule::Reverse, Rule::Duplicate, Rule::ToggleCase];

    pub fn name(&self) -> &'static str {
        match self {
            Rule::Identity => "identity",
            Rule::Lowercase => "lowercase",
            Rule::Uppercase => "uppercase",
            Rule::TitleCase => "title_case",
            Rule::Capitalize => "capitalize",
            Rule::NumericSuffix => "numeric_suffix",
            Rule::NumericPrefix => "numeric_prefix",
            Rule::Leetspeak => "leetspeak",
            Rule::SymbolSuffix => "symbol_suffix",
            Rule::Reverse => "reverse",
            Rule::Duplicate => "duplicate",
            Rule::ToggleCase => "toggle_case",
        }
    }

    /// An upper bound of the number of variants produced for a single word.
    pub fn max_variants(&self) -> usize {
        match self {
            Rule::NumericSuffix => NUMERIC_SUFFIXES.len(),
            Rule::NumericPrefix => NUMERIC_PREFIXES.len(),
            Rule::Leetspeak => LEET_MAP.len() + 1,
            Rule::SymbolSuffix => SYMBOL_SUFFIXES.len(),
            _ => 1,
        }
    }

    /// Pushes the variants of `word` to `out`.
    pub fn apply(&self, word: &str, out: &mut Vec<String>) {
        match self {
            Rule::Identity => out.push(word.to_owned()),
            Rule::Lowercase => out.push(word.to_lowercase()),
            Rule::Uppercase => out.push(word.to_uppercase()),
            Rule::TitleCase => out.push(title_case(word)),
            Rule::Capitalize => out.push(capitalize(word)),
            Rule::NumericSuffix => {
                out.extend(NUMERIC_SUFFIXES.iter().map(|suffix| format!("{word}{suffix}")))
            }
            Rule::NumericPrefix => {
                out.extend(NUMERIC_PREFIXES.iter().map(|prefix| format!("{prefix}{word}")))
            }
            Rule::Leetspeak => leetspeak(word, out),
            Rule::SymbolSuffix => {
                out.extend(SYMBOL_SUFFIXES.iter().map(|symbol| format!("{word}{symbol}")))
            }
            Rule::Reverse => {
                let reversed = word.chars().rev().collect::<String>();
                if reversed != word {
                    out.push(reversed);
                }
            }
            Rule::Duplicate => out.push(word.repeat(2)),
            Rule::ToggleCase => {
                let toggled = word.chars().map(toggle_char).collect::<String>();
                if toggled != word {
                    out.push(toggled);
                }
            }
        }
    }
}

impl FromStr for Rule {
    type Err = AuditError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Rule::DEFAULT
            .iter()
            .chain(&Rule::EXTENDED)
            .find(|rule| rule.name() == s)
            .copied()
            .ok_or_else(|| AuditError::Config(format!("unknown mutation rule {s}")))
    }
}

impl Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Uppercases the first letter of every run of letters and lowercases the others.
fn title_case(word: &str) -> String {
    let mut title = String::with_capacity(word.len());
    let mut in_word = false;

    for c in word.chars() {
        if in_word {
            title.extend(c.to_lowercase());
        } else {
            title.extend(c.to_uppercase());
        }
        in_word = c.is_alphabetic();
    }

    title
}

/// Uppercases the first character and lowercases the rest.
fn capitalize(word: &str) -> String {
    let mut chars = word.chars();

    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

fn toggle_char(c: char) -> char {
    if c.is_ascii_lowercase() {
        c.to_ascii_uppercase()
    } else if c.is_ascii_uppercase() {
        c.to_ascii_lowercase()
    } else {
        c
    }
}

/// Substitutes a single leet key, case-insensitively.
fn substitute(word: &str, from: char, to: char) -> String {
    word.chars()
        .map(|c| if c.to_ascii_lowercase() == from { to } else { c })
        .collect()
}

/// Full substitution first, then one substitution per key present in the word.
fn leetspeak(word: &str, out: &mut Vec<String>) {
    let full = word
        .chars()
        .map(|c| {
            let lower = c.to_ascii_lowercase();
            LEET_MAP
                .iter()
                .find(|(from, _)| *from == lower)
                .map_or(c, |(_, to)| *to)
        })
        .collect::<String>();

    if full == word {
        return;
    }
    out.push(full);

    for (from, to) in LEET_MAP {
        if word.chars().any(|c| c.to_ascii_lowercase() == *from) {
            out.push(substitute(word, *from, *to));
        }
    }
}

/// Applies an ordered list of rules to words.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleEngine {
    rules: Vec<Rule>,
    dedup: bool,
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self {
            rules: Rule::DEFAULT.to_vec(),
            dedup: false,
        }
    }
}

impl RuleEngine {
    /// Creates a rule engine applying the given rules in order.
    pub fn new(rules: Vec<Rule>) -> AuditResult<Self> {
        if rules.is_empty() {
            return Err(AuditError::Config(
                "at least one mutation rule is required".to_owned(),
            ));
        }

        Ok(Self {
            rules,
            dedup: false,
        })
    }

    /// Creates a rule engine from rule names.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> AuditResult<Self> {
        let rules = names
            .iter()
            .map(|name| name.as_ref().parse())
            .collect::<AuditResult<Vec<_>>>()?;

        Self::new(rules)
    }

    /// Creates a rule engine with both the default and the extended rules.
    pub fn extended() -> Self {
        Self {
            rules: Rule::DEFAULT.iter().chain(&Rule::EXTENDED).copied().collect(),
            dedup: false,
        }
    }

    /// Removes duplicate variants of a word, keeping the first occurrence.
    pub fn dedup(mut self, dedup: bool) -> Self {
        self.dedup = dedup;

        self
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// An upper bound of the number of variants produced for a single word.
    pub fn max_variants(&self) -> usize {
        self.rules.iter().map(Rule::max_variants).sum()
    }

    /// Replaces the content of `out` with the variants of `word`.
    pub fn variants_into(&self, word: &str, out: &mut Vec<String>) {
        out.clear();

        for rule in &self.rules {
            rule.apply(word, out);
        }

        if self.dedup {
            *out = mem::take(out).into_iter().unique().collect();
        }
    }

    /// Returns the variants of `word`.
    pub fn variants(&self, word: &str) -> Vec<String> {
        let mut out = Vec::with_capacity(self.max_variants());
        self.variants_into(word, &mut out);

        out
    }
}

#[cfg(test)]
mod tests {
    use itertools::Itertools;

    use super::{Rule, RuleEngine};
    use crate::error::AuditError;

    #[test]
    fn test_password_variants() {
        let variants = RuleEngine::default().variants("password");

        let expected = [
            "password",
            "password",
            "PASSWORD",
            "Password",
            "Password",
            "password1",
            "password12",
            "password123",
            "password1234",
            "password2023",
            "password2024",
            "password2025",
            "1password",
            "12password",
            "123password",
            "p@$$w0rd",
            "p@ssword",
            "passw0rd",
            "pa$$word",
            "password!",
            "password@",
            "password#",
            "password$",
            "password%",
            "password&",
            "password*",
        ];

        assert_eq!(expected.to_vec(), variants);
    }

    #[test]
    fn test_variants_are_reproducible() {
        let engine = RuleEngine::extended();

        assert_eq!(engine.variants("Summer"), engine.variants("Summer"));
    }

    #[test]
    fn test_dedup() {
        let variants = RuleEngine::default().dedup(true).variants("password");

        assert_eq!(24, variants.len());
        assert!(variants.iter().all_unique());
        assert_eq!(["password", "PASSWORD", "Password"], variants[..3]);
    }

    #[test]
    fn test_leetspeak_skips_unchanged() {
        let mut out = Vec::new();
        Rule::Leetspeak.apply("xyz", &mut out);
        assert_eq!(vec!["xy2", "xy2"], out);

        out.clear();
        Rule::Leetspeak.apply("123", &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn test_case_rules() {
        let mut out = Vec::new();
        for rule in [Rule::TitleCase, Rule::Capitalize, Rule::ToggleCase] {
            rule.apply("hELLO wORLD2you", &mut out);
        }

        assert_eq!(
            vec!["Hello World2You", "Hello world2you", "Hello World2YOU"],
            out
        );
    }

    #[test]
    fn test_extended_rules() {
        let mut out = Vec::new();
        for rule in Rule::EXTENDED {
            rule.apply("abc", &mut out);
        }
        assert_eq!(vec!["cba", "abcabc", "ABC"], out);

        // palindromes are not reversed
        out.clear();
        Rule::Reverse.apply("kayak", &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn test_from_names() {
        let engine = RuleEngine::from_names(&["identity", "reverse"]).unwrap();
        assert_eq!(&[Rule::Identity, Rule::Reverse], engine.rules());

        assert!(matches!(
            RuleEngine::from_names(&["identity", "rot13"]),
            Err(AuditError::Config(_))
        ));
        assert!(matches!(
            RuleEngine::from_names::<&str>(&[]),
            Err(AuditError::Config(_))
        ));
    }
}
