//! Property-name heuristics
//!
//! Maps a property name such as `firstName`, `user_email` or `unitPrice` to a
//! plausible generator. Names are split into lowercase words on separators and
//! camelCase boundaries before matching, so `userId` matches the id rule but
//! `valid` does not.

use chrono::Datelike;
use fake::faker::address::en::{CityName, CountryName};
use fake::faker::company::en::CompanyName;
use fake::faker::internet::en::{Password, SafeEmail};
use fake::faker::lorem::en::{Sentence, Words};
use fake::faker::name::en::{FirstName, LastName, Name};
use fake::faker::phone_number::en::PhoneNumber;
use fake::Fake;
use rand::Rng;

use crate::adapters::synthesizer::{random_uuid, DynRng};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringHeuristic {
    Email,
    FirstName,
    LastName,
    FullName,
    Password,
    Phone,
    City,
    Country,
    Company,
    Title,
    Description,
    Identifier,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberHeuristic {
    Age,
    Price,
    Year,
    Rating,
}

/// Split a property name into lowercase words
pub fn name_words(name: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;

    for c in name.chars() {
        if !c.is_alphanumeric() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            prev_lower = false;
            continue;
        }
        if c.is_uppercase() && prev_lower && !current.is_empty() {
            words.push(std::mem::take(&mut current));
        }
        prev_lower = c.is_lowercase() || c.is_ascii_digit();
        current.extend(c.to_lowercase());
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

fn has_word(words: &[String], candidates: &[&str]) -> bool {
    words.iter().any(|w| candidates.contains(&w.as_str()))
}

fn has_pair(words: &[String], first: &str, second: &str) -> bool {
    words.windows(2).any(|w| w[0] == first && w[1] == second)
}

/// First matching string rule, in a fixed priority order
pub fn classify_string(name: &str) -> Option<StringHeuristic> {
    let words = name_words(name);
    if words.is_empty() {
        return None;
    }

    if has_word(&words, &["email"]) {
        Some(StringHeuristic::Email)
    } else if has_pair(&words, "first", "name") || has_word(&words, &["firstname", "fname"]) {
        Some(StringHeuristic::FirstName)
    } else if has_pair(&words, "last", "name") || has_word(&words, &["lastname", "lname", "surname"]) {
        Some(StringHeuristic::LastName)
    } else if words == ["name"] || has_pair(&words, "full", "name") || has_word(&words, &["fullname"]) {
        Some(StringHeuristic::FullName)
    } else if has_word(&words, &["password", "passwd"]) {
        Some(StringHeuristic::Password)
    } else if has_word(&words, &["phone", "mobile", "telephone"]) {
        Some(StringHeuristic::Phone)
    } else if has_word(&words, &["city"]) {
        Some(StringHeuristic::City)
    } else if has_word(&words, &["country"]) {
        Some(StringHeuristic::Country)
    } else if has_word(&words, &["company", "organization", "organisation"]) {
        Some(StringHeuristic::Company)
    } else if has_word(&words, &["title"]) {
        Some(StringHeuristic::Title)
    } else if has_word(&words, &["description", "summary"]) {
        Some(StringHeuristic::Description)
    } else if matches!(words.last().map(String::as_str), Some("id" | "uuid" | "guid")) {
        Some(StringHeuristic::Identifier)
    } else {
        None
    }
}

pub fn classify_number(name: &str) -> Option<NumberHeuristic> {
    let words = name_words(name);
    if has_word(&words, &["age"]) {
        Some(NumberHeuristic::Age)
    } else if has_word(&words, &["price", "amount", "cost"]) {
        Some(NumberHeuristic::Price)
    } else if has_word(&words, &["year"]) {
        Some(NumberHeuristic::Year)
    } else if has_word(&words, &["rating"]) {
        Some(NumberHeuristic::Rating)
    } else {
        None
    }
}

pub fn fake_string(heuristic: StringHeuristic, rng: &mut DynRng) -> String {
    match heuristic {
        StringHeuristic::Email => SafeEmail().fake_with_rng(rng),
        StringHeuristic::FirstName => FirstName().fake_with_rng(rng),
        StringHeuristic::LastName => LastName().fake_with_rng(rng),
        StringHeuristic::FullName => Name().fake_with_rng(rng),
        StringHeuristic::Password => Password(10..17).fake_with_rng(rng),
        StringHeuristic::Phone => PhoneNumber().fake_with_rng(rng),
        StringHeuristic::City => CityName().fake_with_rng(rng),
        StringHeuristic::Country => CountryName().fake_with_rng(rng),
        StringHeuristic::Company => CompanyName().fake_with_rng(rng),
        StringHeuristic::Title => {
            let words: Vec<String> = Words(2..5).fake_with_rng(rng);
            capitalize(&words.join(" "))
        }
        StringHeuristic::Description => Sentence(6..14).fake_with_rng(rng),
        StringHeuristic::Identifier => random_uuid(rng),
    }
}

/// Raw heuristic value; the synthesizer clamps it into declared bounds
pub fn fake_number(heuristic: NumberHeuristic, integer: bool, rng: &mut DynRng) -> f64 {
    match heuristic {
        NumberHeuristic::Age => rng.gen_range(18..=80) as f64,
        NumberHeuristic::Price => {
            if integer {
                rng.gen_range(1..=1000) as f64
            } else {
                let cents = rng.gen_range(100..=100_000);
                cents as f64 / 100.0
            }
        }
        NumberHeuristic::Year => {
            let current = chrono::Utc::now().year();
            rng.gen_range(1950..=current) as f64
        }
        NumberHeuristic::Rating => {
            if integer {
                rng.gen_range(1..=5) as f64
            } else {
                let tenths = rng.gen_range(10..=50);
                tenths as f64 / 10.0
            }
        }
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
