//! Field Classifier: keyword containment over a lowercased copy of one message.
//!
//! Known limitation: this is a heuristic. "I enjoy my AP Biology class" lands in
//! both `hobbies` and `classes`; "my school counselor said..." lands in
//! `colleges`. False positives and negatives are accepted, not corrected.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::models::profile::ProfileField;

/// Triggers per field. Sets may overlap, and a single message may hit several fields.
/// Multi-word or space-suffixed triggers ("ap ", "ib ") are matched verbatim.
const FIELD_TRIGGERS: &[(ProfileField, &[&str])] = &[
    (ProfileField::Major, &["major", "study", "field"]),
    (
        ProfileField::Colleges,
        &["college", "university", "school", "apply", "admission"],
    ),
    (ProfileField::EssayPrompts, &["essay", "prompt", "question"]),
    (
        ProfileField::Extracurriculars,
        &["extracurricular", "activity", "club", "volunteer", "leadership"],
    ),
    (
        ProfileField::Classes,
        &["class", "course", "ap ", "honors", "ib "],
    ),
    (
        ProfileField::Hobbies,
        &["hobby", "interest", "passion", "enjoy", "love"],
    ),
    (
        ProfileField::Awards,
        &["award", "recognition", "achievement", "honor", "prize"],
    ),
];

/// Fragments to add, keyed by field. A field is absent unless one of its triggers fired.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Classification {
    fields: BTreeMap<ProfileField, Vec<String>>,
}

impl Classification {
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    #[cfg(test)]
    pub fn get(&self, field: ProfileField) -> Option<&[String]> {
        self.fields.get(&field).map(Vec::as_slice)
    }

    pub fn fields(&self) -> impl Iterator<Item = ProfileField> + '_ {
        self.fields.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ProfileField, &[String])> + '_ {
        self.fields.iter().map(|(f, v)| (*f, v.as_slice()))
    }

    fn insert(&mut self, field: ProfileField, fragment: String) {
        self.fields.entry(field).or_default().push(fragment);
    }
}

/// Classifies one message. The whole original text is the fragment for every
/// field that fires; no sub-span extraction is attempted.
pub fn classify(text: &str) -> Classification {
    let mut classification = Classification::default();
    if text.trim().is_empty() {
        return classification;
    }

    let lowered = text.to_lowercase();
    for (field, triggers) in FIELD_TRIGGERS {
        if triggers.iter().any(|t| lowered.contains(t)) {
            classification.insert(*field, text.to_string());
        }
    }
    classification
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_keywords_yields_nothing() {
        assert!(classify("Hi there, how are you today?").is_empty());
    }

    #[test]
    fn test_empty_and_whitespace_yield_nothing() {
        assert!(classify("").is_empty());
        assert!(classify("   \n\t ").is_empty());
    }

    #[test]
    fn test_major_and_college_scenario() {
        let text = "I'm majoring in computer science and applying to MIT";
        let c = classify(text);
        let fields: Vec<_> = c.fields().collect();
        assert_eq!(fields, vec![ProfileField::Major, ProfileField::Colleges]);
        assert_eq!(c.get(ProfileField::Major), Some(&[text.to_string()][..]));
    }

    #[test]
    fn test_one_message_can_populate_several_fields() {
        let c = classify("I love coding and won an award");
        assert!(c.get(ProfileField::Hobbies).is_some());
        assert!(c.get(ProfileField::Awards).is_some());
    }

    #[test]
    fn test_matching_is_case_insensitive_and_keeps_original_text() {
        let text = "Our ROBOTICS CLUB went to nationals";
        let c = classify(text);
        assert_eq!(
            c.get(ProfileField::Extracurriculars),
            Some(&[text.to_string()][..])
        );
    }

    #[test]
    fn test_space_suffixed_triggers() {
        assert!(classify("I took AP Chemistry").get(ProfileField::Classes).is_some());
        assert!(classify("I'm in the IB program").get(ProfileField::Classes).is_some());
        // "ap" inside a word without the trailing space does not fire
        assert!(classify("Happy to chat").get(ProfileField::Classes).is_none());
    }

    #[test]
    fn test_honors_hits_classes_and_awards() {
        let c = classify("Graduated with honors");
        assert!(c.get(ProfileField::Classes).is_some());
        assert!(c.get(ProfileField::Awards).is_some());
    }

    #[test]
    fn test_essay_prompt_detection() {
        let c = classify("The essay prompt asks about a challenge I overcame");
        assert_eq!(c.fields().collect::<Vec<_>>(), vec![ProfileField::EssayPrompts]);
    }

    #[test]
    fn test_classification_serializes_as_map() {
        let c = classify("I volunteer at the food bank");
        let json = serde_json::to_value(&c).unwrap();
        assert!(json.get("extracurriculars").is_some());
    }
}
