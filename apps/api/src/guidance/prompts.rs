// All LLM prompt constants for the guidance pipeline.
// Reuses cross-cutting fragments from llm_client::prompts.

/// Literal printed for an empty profile field.
pub const NOT_SPECIFIED: &str = "Not specified";

/// Sections every generation-stage reply must contain, in order.
pub const GENERATION_SECTIONS: &[(&str, &str)] = &[
    (
        "Narrative Themes",
        "2-3 themes that tie the applicant's interests, activities and goals into one story",
    ),
    (
        "Cross-Field Connections",
        "specific links between their major, classes, activities, hobbies and awards",
    ),
    (
        "College Strategy",
        "for EACH target college, how to position the applicant there",
    ),
    (
        "Essay Prompt Roadmap",
        "for EACH essay prompt, an angle, the profile facts to use and a paragraph outline",
    ),
    (
        "Brainstorming Ideas",
        "concrete anecdotes and moments worth exploring in drafts",
    ),
    (
        "Action Plan",
        "a short, ordered checklist of next steps with rough timing",
    ),
];

/// Main prompt template.
/// Replace: {untrusted_instruction}, {applicant}, {completeness}, {stage},
///          {profile_snapshot}, {stage_instructions}, {attachment_context}, {user_message}
pub const GUIDANCE_PROMPT_TEMPLATE: &str = r#"{untrusted_instruction}

APPLICANT: {applicant}
CONVERSATION STAGE: {stage}
PROFILE COMPLETENESS: {completeness}%

PROFILE:
{profile_snapshot}

ATTACHED DOCUMENTS:
{attachment_context}

LATEST MESSAGE:
{user_message}

{stage_instructions}"#;

/// Collection stage: gather the missing facts.
/// Replace: {populated_fields}, {missing_fields}
pub const COLLECTION_INSTRUCTIONS: &str = r#"YOUR TASK (information gathering):
The profile is not complete enough for a full roadmap yet.
1. Briefly acknowledge what the applicant just shared, referring to specifics.
2. Name the information still missing: {missing_fields}.
3. Ask 2-3 targeted follow-up questions that would fill the most important gaps.
   Questions must be concrete (e.g. "Which colleges are on your list?"), not generic.
4. Do NOT write essay roadmaps or application strategy yet.

Already known: {populated_fields}."#;

/// Generation stage: full roadmap with fixed sections.
/// Replace: {sections}, {college_targets}, {essay_targets}
pub const GENERATION_INSTRUCTIONS: &str = r#"YOUR TASK (guidance generation):
The profile is complete enough for full guidance. Produce ALL of the following sections,
in this order, each as a markdown heading with exactly this name:
{sections}

Target colleges as the applicant described them (cover each one in College Strategy):
{college_targets}

Essay prompts as the applicant described them (cover each one in Essay Prompt Roadmap):
{essay_targets}

HARD RULES:
1. Use ONLY facts from the profile, attached documents and latest message
2. Never skip a section; if information is thin, say what to find out
3. Keep each section specific to this applicant, no boilerplate advice"#;

/// Refinement stage: revise the previous guidance.
/// Replace: {previous_guidance}
pub const REFINEMENT_INSTRUCTIONS: &str = r#"YOUR TASK (revision):
You already gave this applicant guidance, shown below. Revise it based on the LATEST MESSAGE,
using the same profile. Keep what still applies, change what the applicant asked to change,
and clearly mark which parts were updated. Keep the same section headings.

PREVIOUS GUIDANCE:
{previous_guidance}"#;

/// Placeholder used when a refinement has nothing to revise.
pub const NO_PREVIOUS_GUIDANCE: &str = "(previous guidance unavailable: write fresh guidance)";
