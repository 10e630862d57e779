//! Canonical drug descriptor (`form name strength`).
//!
//! A descriptor is produced once, when stock is received, and the ledger indexes batches
//! by its `key()`. Free text coming from prescriptions is reconciled against those keys by
//! the matcher; nothing else compares raw strings.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use clinicrx_core::{DomainError, DomainResult};

static STRENGTH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d+(\.\d+)?(mg|mcg|g|ml|iu|%|units?)(/\d*(\.\d+)?(mg|mcg|g|ml))?$")
        .expect("static strength pattern")
});

static UNIT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(mg|mcg|g|ml|iu|%|units?)(/\d*(\.\d+)?(mg|mcg|g|ml))?$")
        .expect("static unit pattern")
});

static NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+(\.\d+)?$").expect("static number pattern"));

/// Dosage-form spellings and their canonical abbreviation.
const FORMS: &[(&[&str], &str)] = &[
    (&["tab", "tabs", "tablet", "tablets"], "tab."),
    (&["cap", "caps", "capsule", "capsules"], "cap."),
    (&["syp", "syr", "syrup"], "syp."),
    (&["inj", "injection"], "inj."),
    (&["oint", "ointment"], "oint."),
    (&["susp", "suspension"], "susp."),
    (&["inh", "inhaler"], "inh."),
    (&["drop", "drops", "drp"], "drops"),
    (&["cream"], "cream"),
    (&["gel"], "gel"),
    (&["lotion"], "lotion"),
    (&["sachet", "sachets"], "sachet"),
];

/// Case-folded, whitespace-collapsed key for a name.
///
/// `"tab.  Paracetamol   500mg"` and `"Tab. Paracetamol 500mg"` share one key.
pub fn normalize(name: &str) -> String {
    name.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

fn canonical_form(token: &str) -> Option<&'static str> {
    let bare = token.trim_end_matches('.');
    FORMS
        .iter()
        .find(|(spellings, _)| spellings.contains(&bare))
        .map(|(_, canonical)| *canonical)
}

/// Canonical identity of a drug: dosage form + name + strength.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DrugDescriptor {
    form: Option<String>,
    name: String,
    strength: Option<String>,
    /// Operator-facing text, whitespace-collapsed but with original casing.
    label: String,
}

impl DrugDescriptor {
    /// Tokenize free text into form / name / strength.
    ///
    /// Recognized leading tokens become a canonical form (`Tablet` -> `tab.`); a trailing
    /// strength may be written as `500mg`, `500 mg`, `250mg/5ml` or a bare number.
    pub fn parse(text: &str) -> DomainResult<Self> {
        let label = text.split_whitespace().collect::<Vec<_>>().join(" ");
        let mut tokens: Vec<String> = label.split_whitespace().map(str::to_lowercase).collect();
        if tokens.is_empty() {
            return Err(DomainError::validation("drug descriptor cannot be empty"));
        }

        let form = canonical_form(&tokens[0]).map(str::to_string);
        if form.is_some() {
            tokens.remove(0);
        }

        let strength = take_strength(&mut tokens);

        if tokens.is_empty() {
            return Err(DomainError::validation(format!(
                "drug descriptor '{label}' has no drug name"
            )));
        }

        Ok(Self {
            form,
            name: tokens.join(" "),
            strength,
            label,
        })
    }

    pub fn form(&self) -> Option<&str> {
        self.form.as_deref()
    }

    /// Normalized drug name (without form or strength).
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn strength(&self) -> Option<&str> {
        self.strength.as_deref()
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Ledger lookup key.
    pub fn key(&self) -> String {
        let mut parts: Vec<&str> = Vec::with_capacity(3);
        if let Some(form) = &self.form {
            parts.push(form);
        }
        parts.push(&self.name);
        if let Some(strength) = &self.strength {
            parts.push(strength);
        }
        parts.join(" ")
    }

    /// Whether this (possibly partial) descriptor is compatible with a full one.
    ///
    /// Name must match; form and strength only constrain when present here.
    pub fn loosely_matches(&self, other: &DrugDescriptor) -> bool {
        if self.name != other.name {
            return false;
        }
        if let Some(form) = &self.form {
            if other.form.as_ref() != Some(form) {
                return false;
            }
        }
        if let Some(strength) = &self.strength {
            if other.strength.as_ref() != Some(strength) {
                return false;
            }
        }
        true
    }
}

impl core::fmt::Display for DrugDescriptor {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.label)
    }
}

fn take_strength(tokens: &mut Vec<String>) -> Option<String> {
    let last = tokens.last()?.clone();

    if STRENGTH.is_match(&last) {
        tokens.pop();
        return Some(last);
    }

    if UNIT.is_match(&last) && tokens.len() >= 2 && NUMBER.is_match(&tokens[tokens.len() - 2]) {
        tokens.pop();
        let amount = tokens.pop()?;
        return Some(format!("{amount}{last}"));
    }

    if NUMBER.is_match(&last) && tokens.len() >= 2 {
        tokens.pop();
        return Some(last);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_folds_case_and_collapses_whitespace() {
        assert_eq!(
            normalize("tab.  paracetamol 500mg"),
            normalize("Tab. Paracetamol 500mg")
        );
        assert_eq!(normalize("  Syp.\tCrocin  "), "syp. crocin");
    }

    #[test]
    fn parse_splits_form_name_and_strength() {
        let d = DrugDescriptor::parse("Tab. Paracetamol 500mg").unwrap();
        assert_eq!(d.form(), Some("tab."));
        assert_eq!(d.name(), "paracetamol");
        assert_eq!(d.strength(), Some("500mg"));
        assert_eq!(d.key(), "tab. paracetamol 500mg");
        assert_eq!(d.label(), "Tab. Paracetamol 500mg");
    }

    #[test]
    fn parse_canonicalizes_spelled_out_forms_and_split_units() {
        let d = DrugDescriptor::parse("Tablet  Paracetamol 500 MG").unwrap();
        assert_eq!(d.key(), "tab. paracetamol 500mg");
    }

    #[test]
    fn parse_keeps_multi_word_names_and_compound_strengths() {
        let d = DrugDescriptor::parse("Syrup Amoxicillin Clavulanate 228mg/5ml").unwrap();
        assert_eq!(d.form(), Some("syp."));
        assert_eq!(d.name(), "amoxicillin clavulanate");
        assert_eq!(d.strength(), Some("228mg/5ml"));
    }

    #[test]
    fn parse_without_form_or_strength_keeps_only_the_name() {
        let d = DrugDescriptor::parse("Cetirizine").unwrap();
        assert_eq!(d.form(), None);
        assert_eq!(d.strength(), None);
        assert_eq!(d.key(), "cetirizine");
    }

    #[test]
    fn parse_rejects_text_without_a_name() {
        assert!(DrugDescriptor::parse("   ").is_err());
        assert!(DrugDescriptor::parse("Tab. 500mg").is_err());
    }

    #[test]
    fn partial_descriptor_matches_on_given_parts_only() {
        let full = DrugDescriptor::parse("Tab. Paracetamol 500mg").unwrap();
        assert!(DrugDescriptor::parse("Paracetamol 500mg").unwrap().loosely_matches(&full));
        assert!(DrugDescriptor::parse("Tab Paracetamol").unwrap().loosely_matches(&full));
        assert!(!DrugDescriptor::parse("Paracetamol 650mg").unwrap().loosely_matches(&full));
        assert!(!DrugDescriptor::parse("Cap. Paracetamol").unwrap().loosely_matches(&full));
    }
}
