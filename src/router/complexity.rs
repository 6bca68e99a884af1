//! Prompt complexity classification.
//!
//! A pure keyword heuristic. The prompt is lower-cased and split into
//! alphanumeric words; each keyword list scores one point per distinct
//! keyword present. Multi-word keywords match consecutive words.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Prompts longer than this (in characters) are always complex.
pub const COMPLEX_LENGTH: usize = 500;

/// Prompts must be shorter than this (in characters) to be simple.
pub const SIMPLE_LENGTH: usize = 100;

const COMPLEX_KEYWORDS: &[&str] = &[
    "architecture",
    "architect",
    "design",
    "scalable",
    "scalability",
    "distributed",
    "microservice",
    "microservices",
    "security",
    "secure",
    "optimize",
    "optimization",
    "performance",
    "algorithm",
    "concurrency",
    "concurrent",
    "refactor",
    "analyze",
    "analysis",
    "comprehensive",
    "enterprise",
    "advanced",
    "integrate",
    "integration",
];

const SIMPLE_KEYWORDS: &[&str] = &[
    "hello",
    "hi",
    "simple",
    "basic",
    "quick",
    "list",
    "define",
    "definition",
    "example",
    "greet",
    "translate",
    "summarize",
    "what is",
];

/// Coarse prompt difficulty used to pick a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskComplexity {
    Simple,
    Medium,
    Complex,
}

/// Classify a prompt.
///
/// Complex when complex keywords outnumber simple ones or the prompt exceeds
/// [`COMPLEX_LENGTH`] characters; simple when any simple keyword is present
/// and the prompt is under [`SIMPLE_LENGTH`] characters; medium otherwise.
pub fn analyze_task_complexity(prompt: &str) -> TaskComplexity {
    let lower = prompt.to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    let unigrams: HashSet<&str> = words.iter().copied().collect();
    let bigrams: HashSet<String> = words.windows(2).map(|w| w.join(" ")).collect();

    let score = |keywords: &[&str]| {
        keywords
            .iter()
            .filter(|kw| {
                if kw.contains(' ') {
                    bigrams.contains(**kw)
                } else {
                    unigrams.contains(**kw)
                }
            })
            .count()
    };
    let complex = score(COMPLEX_KEYWORDS);
    let simple = score(SIMPLE_KEYWORDS);
    let length = prompt.chars().count();

    if complex > simple || length > COMPLEX_LENGTH {
        TaskComplexity::Complex
    } else if simple > 0 && length < SIMPLE_LENGTH {
        TaskComplexity::Simple
    } else {
        TaskComplexity::Medium
    }
}
