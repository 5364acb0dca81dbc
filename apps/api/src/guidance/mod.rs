// Guidance pipeline: attachments → classify → merge → stage → prompt → stream.
// All LLM calls go through llm_client; no direct Anthropic calls here.

pub mod assembler;
pub mod attachments;
pub mod handlers;
pub mod prompts;
pub mod streamer;
pub mod turn;
