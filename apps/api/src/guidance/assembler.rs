//! Prompt Assembler: one text payload per turn, branching by stage.

use crate::guidance::attachments::{render_attachment_context, ResolvedAttachment};
use crate::guidance::prompts::{
    COLLECTION_INSTRUCTIONS, GENERATION_INSTRUCTIONS, GENERATION_SECTIONS,
    GUIDANCE_PROMPT_TEMPLATE, NOT_SPECIFIED, NO_PREVIOUS_GUIDANCE, REFINEMENT_INSTRUCTIONS,
};
use crate::llm_client::prompts::{render_template, UNTRUSTED_CONTENT_INSTRUCTION};
use crate::models::profile::{Profile, ProfileField};
use crate::models::user::Identity;
use crate::profile::completeness::missing_fields;
use crate::profile::stage::Stage;

/// Everything the prompt is built from. The profile must already include
/// this turn's merge, and attachments must be fully resolved.
#[derive(Debug, Clone, Copy)]
pub struct PromptInput<'a> {
    pub identity: &'a Identity,
    pub profile: &'a Profile,
    pub stage: Stage,
    pub message: &'a str,
    pub attachments: &'a [ResolvedAttachment],
    pub previous_guidance: Option<&'a str>,
}

pub fn build_prompt(input: &PromptInput<'_>) -> String {
    let completeness = input.profile.completeness().to_string();
    let profile_snapshot = render_profile_snapshot(input.profile);
    let attachment_context = render_attachment_context(input.attachments);
    let stage_instructions = stage_instructions(input);

    render_template(
        GUIDANCE_PROMPT_TEMPLATE,
        &[
            ("untrusted_instruction", UNTRUSTED_CONTENT_INSTRUCTION.trim()),
            ("applicant", input.identity.preferred_name()),
            ("stage", input.stage.as_str()),
            ("completeness", completeness.as_str()),
            ("profile_snapshot", profile_snapshot.as_str()),
            ("attachment_context", attachment_context.as_str()),
            ("user_message", input.message),
            ("stage_instructions", stage_instructions.as_str()),
        ],
    )
}

/// Every field on its own line, or "Not specified" when empty.
pub fn render_profile_snapshot(profile: &Profile) -> String {
    ProfileField::ALL
        .iter()
        .map(|field| {
            let fragments = profile.fragments(*field);
            match fragments {
                [] => format!("{}: {}", field.label(), NOT_SPECIFIED),
                [only] if !field.is_multi_valued() => format!("{}: {}", field.label(), only),
                many => format!("{}:\n{}", field.label(), bullet_list(many)),
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn stage_instructions(input: &PromptInput<'_>) -> String {
    match input.stage {
        Stage::Collection => {
            let missing = label_list(&missing_fields(input.profile));
            let populated: Vec<_> = ProfileField::ALL
                .into_iter()
                .filter(|f| input.profile.is_populated(*f))
                .collect();
            let populated = if populated.is_empty() {
                "nothing yet".to_string()
            } else {
                label_list(&populated)
            };
            render_template(
                COLLECTION_INSTRUCTIONS,
                &[
                    ("missing_fields", missing.as_str()),
                    ("populated_fields", populated.as_str()),
                ],
            )
        }
        Stage::Generation => {
            let sections = GENERATION_SECTIONS
                .iter()
                .enumerate()
                .map(|(i, (name, description))| format!("{}. {} - {}", i + 1, name, description))
                .collect::<Vec<_>>()
                .join("\n");
            let colleges = targets(input.profile.fragments(ProfileField::Colleges));
            let essays = targets(input.profile.fragments(ProfileField::EssayPrompts));
            render_template(
                GENERATION_INSTRUCTIONS,
                &[
                    ("sections", sections.as_str()),
                    ("college_targets", colleges.as_str()),
                    ("essay_targets", essays.as_str()),
                ],
            )
        }
        Stage::Refinement => render_template(
            REFINEMENT_INSTRUCTIONS,
            &[(
                "previous_guidance",
                input.previous_guidance.unwrap_or(NO_PREVIOUS_GUIDANCE),
            )],
        ),
    }
}

fn bullet_list(items: &[String]) -> String {
    items
        .iter()
        .map(|item| format!("  - {item}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn targets(fragments: &[String]) -> String {
    if fragments.is_empty() {
        format!("  {NOT_SPECIFIED}: suggest what the applicant should find out")
    } else {
        bullet_list(fragments)
    }
}

fn label_list(fields: &[ProfileField]) -> String {
    if fields.is_empty() {
        return "nothing".to_string();
    }
    fields
        .iter()
        .map(|f| f.label())
        .collect::<Vec<_>>()
        .join(", ")
}
