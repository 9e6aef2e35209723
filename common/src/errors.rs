use rust_decimal::Decimal;
use thiserror::Error;

/// 配置校验错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("slippage must be within [0, 100), got {0}")]
    InvalidSlippage(Decimal),

    #[error("credit decimals must be <= 18, got {0}")]
    InvalidDecimals(u32),

    #[error("collateral {denom} decimals must be <= 18, got {decimals}")]
    InvalidAssetDecimals { denom: String, decimals: u32 },

    #[error("max_loops must be at least 1")]
    ZeroLoops,

    #[error("signer_batch_ceiling must be at least 1")]
    ZeroBatchCeiling,

    #[error("dust threshold and minimum debt floor must not be negative")]
    NegativeThreshold,
}
