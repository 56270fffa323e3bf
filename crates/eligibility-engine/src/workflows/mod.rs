pub mod audit;
pub mod eligibility;
pub mod enrollment;
pub mod orchestrator;
pub mod verification;
