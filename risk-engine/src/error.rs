use thiserror::Error;

use common::errors::ConfigError;

/// 兑换路由错误
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RouterError {
    #[error("no usable price for {0}")]
    PriceUnavailable(String),

    #[error("cannot swap {0} into itself")]
    SameDenom(String),

    #[error("no route from {from} to {to}")]
    NoRoute { from: String, to: String },
}

/// 规划引擎错误
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("swap quote failed: {0}")]
    Router(#[from] RouterError),

    #[error("invalid engine config: {0}")]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, EngineError>;
