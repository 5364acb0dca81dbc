//! Profile Store: folds one classification into the running profile.

use tracing::debug;

use crate::models::profile::{Profile, ProfileField};
use crate::profile::classifier::Classification;

/// Merges classifier output into an owned profile and returns it.
///
/// `major` is replaced by the newest fragment (no history kept); every other field
/// appends without dedup or cap. Completeness is recomputed on every call, and can
/// never decrease because nothing is cleared.
pub fn merge(mut profile: Profile, classification: &Classification) -> Profile {
    if classification.is_empty() {
        debug!("Profile merge skipped: no fields matched");
        return profile;
    }

    for (field, fragments) in classification.iter() {
        match field {
            ProfileField::Major => {
                if let Some(latest) = fragments.last() {
                    profile.set_major(latest.clone());
                }
            }
            multi => profile.append_fragments(multi, fragments),
        }
    }

    let before = profile.completeness();
    profile.refresh_completeness();
    debug!(
        "Profile merged: fields={:?} completeness {}% -> {}%",
        classification.fields().map(|f| f.key()).collect::<Vec<_>>(),
        before,
        profile.completeness()
    );
    profile
}
