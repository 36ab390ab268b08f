// Test-case generation: prompt assembly, the streaming relay, and the SSE
// endpoints. All LLM calls go through llm_client — no direct API calls here.

pub mod handlers;
pub mod prompts;
pub mod relay;
