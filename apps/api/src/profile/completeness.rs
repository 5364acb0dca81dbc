use serde::{Deserialize, Serialize};

use crate::models::profile::{Profile, ProfileField};

const FIELD_COUNT: usize = ProfileField::ALL.len();

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum FieldStatus {
    Populated,
    Missing,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldHealth {
    pub field: ProfileField,
    pub fragment_count: usize,
    pub status: FieldStatus,
    pub recommendation: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletenessReport {
    pub completeness: u8,
    pub populated_count: usize,
    pub fields: Vec<FieldHealth>,
    pub missing_fields: Vec<ProfileField>,
}

/// Completeness for a number of populated fields, rounded half-up:
/// `round(100 * populated / 7)` in integer arithmetic.
///
/// 0..=7 maps to 0, 14, 29, 43, 57, 71, 86, 100.
pub fn completeness_for(populated: usize) -> u8 {
    let populated = populated.min(FIELD_COUNT);
    ((200 * populated + FIELD_COUNT) / (2 * FIELD_COUNT)) as u8
}

pub fn missing_fields(profile: &Profile) -> Vec<ProfileField> {
    ProfileField::ALL
        .into_iter()
        .filter(|f| !profile.is_populated(*f))
        .collect()
}

pub fn compute_completeness_report(profile: &Profile) -> CompletenessReport {
    let fields = ProfileField::ALL
        .into_iter()
        .map(|field| {
            let fragment_count = profile.fragments(field).len();
            if profile.is_populated(field) {
                FieldHealth {
                    field,
                    fragment_count,
                    status: FieldStatus::Populated,
                    recommendation: None,
                }
            } else {
                FieldHealth {
                    field,
                    fragment_count,
                    status: FieldStatus::Missing,
                    recommendation: Some(format!(
                        "Tell me about your {} to strengthen your profile",
                        field.label().to_lowercase()
                    )),
                }
            }
        })
        .collect();

    CompletenessReport {
        completeness: profile.completeness(),
        populated_count: profile.populated_count(),
        fields,
        missing_fields: missing_fields(profile),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::classifier::classify;
    use crate::profile::store::merge;

    #[test]
    fn test_completeness_for_every_count() {
        let expected = [0, 14, 29, 43, 57, 71, 86, 100];
        for (count, want) in expected.iter().enumerate() {
            assert_eq!(completeness_for(count), *want, "count {count}");
        }
    }

    #[test]
    fn test_completeness_matches_float_rounding() {
        for count in 0..=FIELD_COUNT {
            let float = (100.0 * count as f64 / FIELD_COUNT as f64).round() as u8;
            assert_eq!(completeness_for(count), float);
        }
    }

    #[test]
    fn test_completeness_saturates_above_field_count() {
        assert_eq!(completeness_for(12), 100);
    }

    #[test]
    fn test_report_for_empty_profile() {
        let report = compute_completeness_report(&Profile::new());
        assert_eq!(report.completeness, 0);
        assert_eq!(report.missing_fields.len(), 7);
        assert!(report
            .fields
            .iter()
            .all(|f| f.status == FieldStatus::Missing && f.recommendation.is_some()));
    }

    #[test]
    fn test_report_lists_missing_fields_in_order() {
        let profile = merge(Profile::new(), &classify("I want to study biology"));
        let report = compute_completeness_report(&profile);
        assert_eq!(report.completeness, 14);
        assert_eq!(report.populated_count, 1);
        assert_eq!(report.missing_fields[0], ProfileField::Colleges);
        assert!(!report.missing_fields.contains(&ProfileField::Major));
        let major = &report.fields[0];
        assert_eq!(major.status, FieldStatus::Populated);
        assert_eq!(major.fragment_count, 1);
    }
}
