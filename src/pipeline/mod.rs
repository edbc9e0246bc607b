//! Remediation Pipeline Module
//!
//! Connects drift detection to the text-generation backend:
//!
//! 1. **Gateway**: boundary trait over the external generator
//! 2. **Remediation**: per-column prompts and failure isolation
//! 3. **Orchestrator**: one detect-then-remediate pass

pub mod gateway;
pub mod orchestrator;
pub mod remediation;

// Re-export main types for convenient access
pub use gateway::{GatewayHandle, GenerationOptions, GroqGateway, RecommendationGateway};
pub use orchestrator::{AgentOrchestrator, AgentOutcome, AgentPhase, RemediationReport};
pub use remediation::{is_failure, RecommendationMap, RemediationPlanner, LLM_ERROR_MARKER};
