// Shared prompt constants and prompt-building utilities.
// Each service that needs LLM calls defines its own prompts.rs alongside it.
// This file contains cross-cutting prompt fragments.

/// Appended to prompts whose answers must cite stored records.
pub const GROUNDING_INSTRUCTION: &str = "\
    CRITICAL: Only refer to people and skills that appear in the data you were given \
    or that a tool returned. Do NOT invent resource ids, names, or skills. \
    If the data does not support a statement, leave it out.";

/// Appended to prompts for tool-enabled calls.
pub const TOOL_USE_INSTRUCTION: &str = "\
    You may call the provided tools to look up resources before answering. \
    Call them as often as you need, then reply with the final JSON object only.";
