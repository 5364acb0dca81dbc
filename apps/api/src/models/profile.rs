use serde::{Deserialize, Serialize};

use crate::profile::completeness::completeness_for;

/// One of the seven applicant profile fields.
///
/// Declaration order is the order fields are classified, rendered and reported in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileField {
    Major,
    Colleges,
    EssayPrompts,
    Extracurriculars,
    Classes,
    Hobbies,
    Awards,
}

impl ProfileField {
    pub const ALL: [ProfileField; 7] = [
        ProfileField::Major,
        ProfileField::Colleges,
        ProfileField::EssayPrompts,
        ProfileField::Extracurriculars,
        ProfileField::Classes,
        ProfileField::Hobbies,
        ProfileField::Awards,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            ProfileField::Major => "major",
            ProfileField::Colleges => "colleges",
            ProfileField::EssayPrompts => "essay_prompts",
            ProfileField::Extracurriculars => "extracurriculars",
            ProfileField::Classes => "classes",
            ProfileField::Hobbies => "hobbies",
            ProfileField::Awards => "awards",
        }
    }

    /// Human-readable label used in prompts.
    pub fn label(&self) -> &'static str {
        match self {
            ProfileField::Major => "Intended major",
            ProfileField::Colleges => "Target colleges",
            ProfileField::EssayPrompts => "Essay prompts",
            ProfileField::Extracurriculars => "Extracurricular activities",
            ProfileField::Classes => "Classes and coursework",
            ProfileField::Hobbies => "Hobbies and interests",
            ProfileField::Awards => "Awards and recognition",
        }
    }

    /// `major` is last-write-wins; every other field is an append-only sequence.
    pub fn is_multi_valued(&self) -> bool {
        !matches!(self, ProfileField::Major)
    }
}

/// The accumulating applicant record for one conversation.
///
/// Fields are private so `completeness` can only ever be produced by
/// `refresh_completeness`; all mutation goes through `profile::store::merge`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Profile {
    major: Option<String>,
    colleges: Vec<String>,
    essay_prompts: Vec<String>,
    extracurriculars: Vec<String>,
    classes: Vec<String>,
    hobbies: Vec<String>,
    awards: Vec<String>,
    completeness: u8,
}

impl Profile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fragments held by a field. `major` yields zero or one element.
    pub fn fragments(&self, field: ProfileField) -> &[String] {
        match field {
            ProfileField::Major => self.major.as_slice(),
            ProfileField::Colleges => &self.colleges,
            ProfileField::EssayPrompts => &self.essay_prompts,
            ProfileField::Extracurriculars => &self.extracurriculars,
            ProfileField::Classes => &self.classes,
            ProfileField::Hobbies => &self.hobbies,
            ProfileField::Awards => &self.awards,
        }
    }

    pub fn is_populated(&self, field: ProfileField) -> bool {
        match field {
            ProfileField::Major => self.major.as_deref().is_some_and(|m| !m.is_empty()),
            other => !self.fragments(other).is_empty(),
        }
    }

    pub fn populated_count(&self) -> usize {
        ProfileField::ALL
            .iter()
            .filter(|f| self.is_populated(**f))
            .count()
    }

    pub fn completeness(&self) -> u8 {
        self.completeness
    }

    pub(crate) fn set_major(&mut self, fragment: String) {
        self.major = Some(fragment);
    }

    pub(crate) fn append_fragments(&mut self, field: ProfileField, fragments: &[String]) {
        let target = match field {
            ProfileField::Major => return,
            ProfileField::Colleges => &mut self.colleges,
            ProfileField::EssayPrompts => &mut self.essay_prompts,
            ProfileField::Extracurriculars => &mut self.extracurriculars,
            ProfileField::Classes => &mut self.classes,
            ProfileField::Hobbies => &mut self.hobbies,
            ProfileField::Awards => &mut self.awards,
        };
        target.extend(fragments.iter().cloned());
    }

    pub(crate) fn refresh_completeness(&mut self) {
        self.completeness = completeness_for(self.populated_count());
    }
}
