//! Best-effort macro extraction from free-form model output.
//!
//! This is an annotation layer for display, not a source of truth. Each field is
//! the first match of a keyword followed by a number-ish run, so text that
//! mentions the same keyword several times may yield the wrong figure.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::NutritionalFacts;

static CALORIES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:calories|energy|kcal)[:\s]*([\d\s.,~-]+(?:kcal|calories)?)")
        .expect("calories pattern compiles")
});
static PROTEIN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)protein[:\s]*([\d\s.,~-]+g)")
        .expect("protein pattern compiles")
});
static CARBS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:carbohydrates|carbs)[:\s]*([\d\s.,~-]+g)")
        .expect("carbs pattern compiles")
});
static FAT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)fat[:\s]*([\d\s.,~-]+g)")
        .expect("fat pattern compiles")
});

fn find_fact(pattern: &Regex, text: &str) -> Option<String> {
    pattern
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
}

pub fn extract(text: &str) -> NutritionalFacts {
    NutritionalFacts {
        calories: find_fact(&CALORIES, text),
        protein: find_fact(&PROTEIN, text),
        carbs: find_fact(&CARBS, text),
        fat: find_fact(&FAT, text),
    }
}
