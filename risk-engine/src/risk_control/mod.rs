pub mod risk_state;
pub mod risk_calculator;
pub mod ratio_allocator;

pub use risk_state::{classify, RiskLevel};
pub use risk_calculator::{AssetValue, RiskMetrics};
pub use ratio_allocator::{allocate, asset_ratios, isolate_stable, AssetRatio, StableSkip};
