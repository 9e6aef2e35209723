pub mod error;
pub mod looping;
pub mod risk_control;
pub mod swap;
pub mod vault;

pub use error::{EngineError, Result, RouterError};
pub use looping::{plan_loop, plan_unloop, LeverageRequest, LoopContext, LoopPlan, LoopStep, UnloopRequest};
pub use risk_control::{RiskLevel, RiskMetrics};
pub use swap::{OracleSwapRouter, SwapQuote, SwapRouter};
pub use vault::{summarize, InitialSnapshot, PendingEdits, SummaryInputs, SummaryState, VaultSummary};
