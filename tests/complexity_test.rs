//! Tests for prompt complexity classification.

use huginn::router::complexity::{COMPLEX_LENGTH, SIMPLE_LENGTH};
use huginn::{TaskComplexity, analyze_task_complexity};

#[test]
fn greeting_is_simple() {
    assert_eq!(analyze_task_complexity("Hello world"), TaskComplexity::Simple);
}

#[test]
fn architecture_request_is_complex() {
    assert_eq!(
        analyze_task_complexity(
            "Design a scalable microservices architecture with advanced security"
        ),
        TaskComplexity::Complex
    );
}

#[test]
fn neutral_prompt_is_medium() {
    assert_eq!(
        analyze_task_complexity("Tell me about the history of the printing press in Europe"),
        TaskComplexity::Medium
    );
}

#[test]
fn keywords_are_case_insensitive() {
    assert_eq!(analyze_task_complexity("HELLO THERE"), TaskComplexity::Simple);
    assert_eq!(
        analyze_task_complexity("OPTIMIZE this ALGORITHM"),
        TaskComplexity::Complex
    );
}

#[test]
fn long_prompt_is_complex_regardless_of_keywords() {
    let prompt = format!("hello {}", "word ".repeat(COMPLEX_LENGTH / 5 + 1));
    assert!(prompt.chars().count() > COMPLEX_LENGTH);
    assert_eq!(analyze_task_complexity(&prompt), TaskComplexity::Complex);
}

#[test]
fn simple_keyword_in_long_prompt_is_medium() {
    let prompt = format!("hello {}", "x".repeat(SIMPLE_LENGTH));
    assert!(prompt.chars().count() >= SIMPLE_LENGTH);
    assert!(prompt.chars().count() <= COMPLEX_LENGTH);
    assert_eq!(analyze_task_complexity(&prompt), TaskComplexity::Medium);
}

#[test]
fn tie_is_not_complex() {
    // one complex keyword, one simple keyword
    assert_eq!(
        analyze_task_complexity("hello, can you design it"),
        TaskComplexity::Simple
    );
    // more simple keywords than complex ones
    assert_eq!(
        analyze_task_complexity("a quick basic design"),
        TaskComplexity::Simple
    );
}

#[test]
fn classification_is_deterministic() {
    let prompt = "Summarize the security analysis";
    let first = analyze_task_complexity(prompt);
    for _ in 0..10 {
        assert_eq!(analyze_task_complexity(prompt), first);
    }
}
