use aho_corasick::AhoCorasick;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

use super::{Category, Severity};

/// Distinguishes literal patterns (Aho-Corasick) from regex patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternKind {
    Keyword,
    Regex,
}

/// One entry of the built-in pattern library.
#[derive(Debug)]
pub struct PatternRule {
    pub category: Category,
    pub kind: PatternKind,
    pub pattern: &'static str,
}

/// The fixed pattern library: five categories of unsafe constructs.
/// Table order is the tie-break for matches at the same offset.
pub const PATTERN_RULES: &[PatternRule] = &[
    PatternRule {
        category: Category::BufferOverflow,
        kind: PatternKind::Regex,
        pattern: r"strcpy\s*\(",
    },
    PatternRule {
        category: Category::BufferOverflow,
        kind: PatternKind::Regex,
        pattern: r"strcat\s*\(",
    },
    PatternRule {
        category: Category::BufferOverflow,
        kind: PatternKind::Regex,
        pattern: r"sprintf\s*\(",
    },
    PatternRule {
        category: Category::BufferOverflow,
        kind: PatternKind::Regex,
        pattern: r"gets\s*\(",
    },
    PatternRule {
        category: Category::SqlInjection,
        kind: PatternKind::Regex,
        pattern: r"SELECT.*\+.*",
    },
    PatternRule {
        category: Category::SqlInjection,
        kind: PatternKind::Regex,
        pattern: r"INSERT.*\+.*",
    },
    PatternRule {
        category: Category::SqlInjection,
        kind: PatternKind::Regex,
        pattern: r"UPDATE.*\+.*",
    },
    PatternRule {
        category: Category::SqlInjection,
        kind: PatternKind::Regex,
        pattern: r"DELETE.*\+.*",
    },
    PatternRule {
        category: Category::PathTraversal,
        kind: PatternKind::Keyword,
        pattern: "../",
    },
    PatternRule {
        category: Category::PathTraversal,
        kind: PatternKind::Keyword,
        pattern: r"..\",
    },
    PatternRule {
        category: Category::HardcodedSecrets,
        kind: PatternKind::Regex,
        pattern: r#"password\s*=\s*["'][^"']+["']"#,
    },
    PatternRule {
        category: Category::HardcodedSecrets,
        kind: PatternKind::Regex,
        pattern: r#"api_key\s*=\s*["'][^"']+["']"#,
    },
    PatternRule {
        category: Category::HardcodedSecrets,
        kind: PatternKind::Regex,
        pattern: r#"secret\s*=\s*["'][^"']+["']"#,
    },
    PatternRule {
        category: Category::WeakCrypto,
        kind: PatternKind::Keyword,
        pattern: "MD5",
    },
    PatternRule {
        category: Category::WeakCrypto,
        kind: PatternKind::Keyword,
        pattern: "SHA1",
    },
    PatternRule {
        category: Category::WeakCrypto,
        kind: PatternKind::Keyword,
        pattern: "DES",
    },
    PatternRule {
        category: Category::WeakCrypto,
        kind: PatternKind::Keyword,
        pattern: "RC4",
    },
];

/// Severity policy for pattern categories: unbounded copies and SQL string
/// concatenation are high, everything else medium.
pub fn severity_for(category: &Category) -> Severity {
    match category {
        Category::BufferOverflow | Category::SqlInjection => Severity::High,
        _ => Severity::Medium,
    }
}

/// One raw match against the pattern library, byte offsets into the file text.
#[derive(Debug, Clone, Copy)]
pub struct PatternMatch {
    pub start: usize,
    pub end: usize,
    pub rule: &'static PatternRule,
    rule_index: usize,
}

/// Pattern library compiled for matching: one case-insensitive automaton over
/// the literal patterns plus individually compiled regexes.
pub struct CompiledPatterns {
    keyword: Option<(AhoCorasick, Vec<(usize, &'static PatternRule)>)>,
    regexes: Vec<(usize, Regex, &'static PatternRule)>,
}

impl CompiledPatterns {
    /// Compile the rule table. An unparseable pattern skips its rule with a
    /// warning; the rest of the library stays usable.
    fn compile(rules: &'static [PatternRule]) -> Self {
        let keyword_rules: Vec<(usize, &PatternRule)> = rules
            .iter()
            .enumerate()
            .filter(|(_, rule)| rule.kind == PatternKind::Keyword)
            .collect();
        let keyword = if keyword_rules.is_empty() {
            None
        } else {
            let automaton = AhoCorasick::builder()
                .ascii_case_insensitive(true)
                .build(keyword_rules.iter().map(|(_, rule)| rule.pattern));
            match automaton {
                Ok(automaton) => Some((automaton, keyword_rules)),
                Err(err) => {
                    warn!(%err, "skipping literal pattern set");
                    None
                }
            }
        };

        let mut regexes = Vec::new();
        for (index, rule) in rules
            .iter()
            .enumerate()
            .filter(|(_, rule)| rule.kind == PatternKind::Regex)
        {
            match Regex::new(&format!("(?i){}", rule.pattern)) {
                Ok(regex) => regexes.push((index, regex, rule)),
                Err(err) => {
                    warn!(category = %rule.category, %err, "skipping unparseable pattern");
                }
            }
        }

        Self { keyword, regexes }
    }

    /// All matches against `text`, ordered by match offset then rule table
    /// order. Deterministic for fixed text and a fixed library.
    pub fn matches(&self, text: &str) -> Vec<PatternMatch> {
        let mut matches = Vec::new();

        if let Some((automaton, keyword_rules)) = &self.keyword {
            for mat in automaton.find_overlapping_iter(text) {
                let (rule_index, rule) = keyword_rules[mat.pattern().as_usize()];
                matches.push(PatternMatch {
                    start: mat.start(),
                    end: mat.end(),
                    rule,
                    rule_index,
                });
            }
        }

        for (rule_index, regex, rule) in &self.regexes {
            for mat in regex.find_iter(text) {
                matches.push(PatternMatch {
                    start: mat.start(),
                    end: mat.end(),
                    rule: *rule,
                    rule_index: *rule_index,
                });
            }
        }

        matches.sort_by_key(|mat| (mat.start, mat.rule_index));
        matches
    }
}

/// Library compiled once per process; the rule table is static data.
pub static PATTERNS: Lazy<CompiledPatterns> = Lazy::new(|| CompiledPatterns::compile(PATTERN_RULES));
