//! Keyword-triggered query expansion.
//!
//! A fixed, ordered table of rules maps trigger substrings to synonym
//! phrases for common government-service topics. Matching is a
//! case-insensitive substring test on the raw query, nothing fuzzier.

/// One expansion rule: if any trigger occurs in the query, append all phrases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpansionRule {
    /// Topic label, used for logging and tests.
    pub category: &'static str,
    /// Lowercase substrings that fire the rule.
    pub triggers: &'static [&'static str],
    /// Phrases appended to the variant list when the rule fires.
    pub phrases: &'static [&'static str],
}

impl ExpansionRule {
    fn matches(&self, lowercase_query: &str) -> bool {
        self.triggers.iter().any(|trigger| lowercase_query.contains(trigger))
    }
}

/// Built-in rules, evaluated in this order.
pub const DEFAULT_RULES: &[ExpansionRule] = &[
    ExpansionRule {
        category: "residence",
        triggers: &["residence", "domicile"],
        phrases: &[
            "domicile certificate Punjab",
            "residence proof certificate",
            "address certificate",
            "residence certificate application",
            "domicile proof",
        ],
    },
    ExpansionRule {
        category: "income",
        triggers: &["income"],
        phrases: &[
            "income proof certificate",
            "income certificate application",
            "income verification",
            "income proof",
            "salary certificate",
        ],
    },
    ExpansionRule {
        category: "caste",
        triggers: &["caste", "sc", "obc", "bc"],
        phrases: &[
            "SC certificate",
            "OBC certificate",
            "BC certificate",
            "scheduled caste certificate",
            "caste proof",
            "scheduled tribe certificate",
            "ST certificate",
        ],
    },
    ExpansionRule {
        category: "senior citizen",
        triggers: &["senior", "elderly"],
        phrases: &[
            "senior citizen card",
            "elderly citizen identity",
            "senior citizen identity card",
            "old age card",
        ],
    },
    ExpansionRule {
        category: "birth",
        triggers: &["birth"],
        phrases: &[
            "birth certificate",
            "birth proof",
            "date of birth certificate",
            "birth registration",
        ],
    },
    ExpansionRule {
        category: "death",
        triggers: &["death"],
        phrases: &[
            "death certificate",
            "death proof",
            "death registration",
            "mortality certificate",
        ],
    },
    ExpansionRule {
        category: "application",
        triggers: &["apply", "application"],
        phrases: &[
            "application process",
            "how to apply",
            "application form",
            "online application",
            "application procedure",
        ],
    },
    ExpansionRule {
        category: "fees",
        triggers: &["fee", "cost", "charge"],
        phrases: &["fees", "cost", "charges", "government fee", "facilitation fee", "total fee"],
    },
    ExpansionRule {
        category: "documents",
        triggers: &["document", "requirement"],
        phrases: &[
            "required documents",
            "necessary documents",
            "document list",
            "paperwork required",
        ],
    },
];

/// Expands a user query into lexical variants using a rule table.
#[derive(Debug, Clone, Copy)]
pub struct QueryExpander {
    rules: &'static [ExpansionRule],
}

impl Default for QueryExpander {
    fn default() -> Self {
        Self { rules: DEFAULT_RULES }
    }
}

impl QueryExpander {
    /// Create an expander with the built-in rules.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an expander with a custom rule table.
    pub fn with_rules(rules: &'static [ExpansionRule]) -> Self {
        Self { rules }
    }

    /// Return the original query followed by every phrase of every firing rule.
    ///
    /// Duplicates are kept; the retriever removes duplicate hits later.
    pub fn expand(&self, query: &str) -> Vec<String> {
        let lowercase = query.to_lowercase();
        let mut variants = vec![query.to_string()];
        for rule in self.rules.iter().filter(|rule| rule.matches(&lowercase)) {
            variants.extend(rule.phrases.iter().map(|phrase| phrase.to_string()));
        }
        variants
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unmatched_query_returns_only_original() {
        assert_eq!(QueryExpander::new().expand("What are office hours?"), vec![
            "What are office hours?".to_string()
        ]);
    }

    #[test]
    fn original_query_is_always_first() {
        let variants = QueryExpander::new().expand("Residence proof needed");
        assert_eq!(variants[0], "Residence proof needed");
        assert_eq!(variants[1], "domicile certificate Punjab");
    }

    #[test]
    fn triggers_are_case_insensitive() {
        let variants = QueryExpander::new().expand("INCOME");
        assert!(variants.contains(&"salary certificate".to_string()));
    }

    #[test]
    fn multiple_rules_append_in_table_order() {
        let variants = QueryExpander::new().expand("birth certificate fee");
        let birth = variants.iter().position(|v| v == "birth registration").unwrap();
        let fee = variants.iter().position(|v| v == "facilitation fee").unwrap();
        assert!(birth < fee);
        assert_eq!(variants.len(), 1 + 4 + 6);
    }

    #[test]
    fn duplicate_phrases_are_kept() {
        // Both the fee rule phrase "cost" and the query itself.
        let variants = QueryExpander::new().expand("cost");
        assert_eq!(variants.iter().filter(|v| v.as_str() == "cost").count(), 2);
    }

    #[test]
    fn custom_rules_replace_defaults() {
        const RULES: &[ExpansionRule] = &[ExpansionRule {
            category: "ration",
            triggers: &["ration"],
            phrases: &["ration card"],
        }];
        let expander = QueryExpander::with_rules(RULES);
        assert_eq!(expander.expand("ration"), vec!["ration", "ration card"]);
        assert_eq!(expander.expand("income").len(), 1);
    }
}
