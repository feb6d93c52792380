//! Department normalisation for free-text service phrases.
//!
//! Maps what people write ("dentist", "eye doctor", "cardio check") onto a
//! small set of canonical department labels ("Dentistry", "Ophthalmology",
//! "Cardiology").
//!
//! # Matching rules
//!
//! Matching is case-insensitive and tried in three passes, each walking the
//! table in order:
//!
//! 1. Exact: the whole phrase equals a key ("Dentist" → Dentistry)
//! 2. Word: a word of the phrase equals a key, or starts with a key of four
//!    or more letters ("dentists" → Dentistry)
//! 3. Stem: a word of four or more letters is the start of a key
//!    ("cardio" → Cardiology)
//!
//! Generic keys ("doctor", "checkup") sit at the end of the table so a
//! specialist word elsewhere in the phrase wins: "eye doctor" → Ophthalmology.
//!
//! Unmapped phrases are not rejected; they pass through as [`Department::Unknown`].

use serde::{Deserialize, Serialize};

/// Default key → label pairs. Order matters: earlier entries win.
pub const DEFAULT_DEPARTMENTS: &[(&str, &str)] = &[
    ("dentist", "Dentistry"),
    ("dental", "Dentistry"),
    ("dentistry", "Dentistry"),
    ("teeth", "Dentistry"),
    ("tooth", "Dentistry"),
    ("cardiologist", "Cardiology"),
    ("cardiology", "Cardiology"),
    ("heart", "Cardiology"),
    ("dermatologist", "Dermatology"),
    ("dermatology", "Dermatology"),
    ("skin", "Dermatology"),
    ("ophthalmologist", "Ophthalmology"),
    ("ophthalmology", "Ophthalmology"),
    ("optometrist", "Ophthalmology"),
    ("eye", "Ophthalmology"),
    ("eyes", "Ophthalmology"),
    ("orthopedic", "Orthopedics"),
    ("orthopedics", "Orthopedics"),
    ("bone", "Orthopedics"),
    ("bones", "Orthopedics"),
    ("joints", "Orthopedics"),
    // After the orthopedic keys so the "ortho" stem reads as Orthopedics.
    ("orthodontist", "Dentistry"),
    ("pediatrician", "Pediatrics"),
    ("pediatrics", "Pediatrics"),
    ("child", "Pediatrics"),
    ("children", "Pediatrics"),
    ("ent", "ENT"),
    ("ear", "ENT"),
    ("nose", "ENT"),
    ("throat", "ENT"),
    ("neurologist", "Neurology"),
    ("neurology", "Neurology"),
    ("brain", "Neurology"),
    ("nerve", "Neurology"),
    ("psychiatrist", "Psychiatry"),
    ("psychiatry", "Psychiatry"),
    ("mental", "Psychiatry"),
    ("psychological", "Psychiatry"),
    ("gynecologist", "Gynecology"),
    ("gynecology", "Gynecology"),
    ("obgyn", "Gynecology"),
    ("ob-gyn", "Gynecology"),
    // Generic terms last.
    ("doctor", "General Medicine"),
    ("physician", "General Medicine"),
    ("gp", "General Medicine"),
    ("general", "General Medicine"),
    ("checkup", "General Medicine"),
    ("check-up", "General Medicine"),
    ("consultation", "General Medicine"),
];

/// Minimum key or word length for prefix matching.
const MIN_PREFIX_LEN: usize = 4;

/// Outcome of department normalisation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "label", rename_all = "snake_case")]
pub enum Department {
    /// Matched a table entry.
    Canonical(String),
    /// Non-empty but unmapped; passed through trimmed.
    Unknown(String),
    Absent,
}

impl Department {
    /// The label to show on an appointment, if any.
    pub fn label(&self) -> Option<&str> {
        match self {
            Self::Canonical(label) | Self::Unknown(label) => Some(label),
            Self::Absent => None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct Entry {
    key: String,
    label: String,
}

/// Ordered key → canonical label table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepartmentTable {
    entries: Vec<Entry>,
}

impl Default for DepartmentTable {
    fn default() -> Self {
        Self::from_pairs(DEFAULT_DEPARTMENTS.iter().copied())
    }
}

impl DepartmentTable {
    /// Build a table from `(key, label)` pairs. Keys are lowercased.
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let entries = pairs
            .into_iter()
            .map(|(key, label)| Entry {
                key: key.trim().to_lowercase(),
                label: label.to_string(),
            })
            .filter(|e| !e.key.is_empty())
            .collect();
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Distinct canonical labels in table order.
    pub fn labels(&self) -> Vec<&str> {
        let mut labels: Vec<&str> = Vec::new();
        for entry in &self.entries {
            if !labels.contains(&entry.label.as_str()) {
                labels.push(&entry.label);
            }
        }
        labels
    }

    /// Normalise an optional department phrase.
    pub fn normalize(&self, phrase: Option<&str>) -> Department {
        let Some(phrase) = phrase.map(str::trim).filter(|p| !p.is_empty()) else {
            return Department::Absent;
        };

        match self.lookup(phrase) {
            Some(label) => Department::Canonical(label.to_string()),
            None => Department::Unknown(phrase.to_string()),
        }
    }

    fn lookup(&self, phrase: &str) -> Option<&str> {
        let lower = phrase.to_lowercase();

        if let Some(e) = self.entries.iter().find(|e| e.key == lower) {
            return Some(&e.label);
        }

        let words: Vec<&str> = lower
            .split(|c: char| !(c.is_alphanumeric() || c == '-'))
            .filter(|w| !w.is_empty())
            .collect();

        let word_match = |key: &str, word: &str| {
            word == key || (key.len() >= MIN_PREFIX_LEN && word.starts_with(key))
        };
        if let Some(e) = self
            .entries
            .iter()
            .find(|e| words.iter().any(|w| word_match(&e.key, w)))
        {
            return Some(&e.label);
        }

        self.entries
            .iter()
            .find(|e| {
                words
                    .iter()
                    .any(|w| w.len() >= MIN_PREFIX_LEN && e.key.starts_with(w))
            })
            .map(|e| e.label.as_str())
    }
}
