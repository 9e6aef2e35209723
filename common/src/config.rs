use std::fs;
use std::path::Path;
use anyhow::{Context, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;
use crate::types::{MAX_DECIMALS, MICRO_DECIMALS};

/// 引擎参数 - 协议/UX调优常量全部显式化
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    /// 信用资产（债务代币）精度
    pub credit_decimals: u32,
    /// 兑换滑点（百分比，0-100）
    pub slippage_pct: Decimal,
    /// 粉尘阈值，信用资产最小单位
    pub dust_threshold: Decimal,
    /// 最小债务（信用资产显示单位）
    pub min_debt_floor: Decimal,
    pub max_loops: usize,
    /// 硬件签名设备单笔交易可承载的消息组数
    pub signer_batch_ceiling: usize,
    pub stable_symbols: Vec<String>,
    pub skip_stable_when_paired: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            credit_decimals: MICRO_DECIMALS,
            slippage_pct: dec!(1),
            dust_threshold: dec!(1_000_000),
            min_debt_floor: dec!(100),
            max_loops: 5,
            signer_batch_ceiling: 3,
            stable_symbols: vec!["USDC".to_string(), "USDT".to_string()],
            skip_stable_when_paired: false,
        }
    }
}

impl EngineConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read engine config: {:?}", path))?;
        let config = Self::from_toml(&content)
            .with_context(|| format!("Invalid engine config: {:?}", path))?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).context("Failed to parse engine config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.slippage_pct < Decimal::ZERO || self.slippage_pct >= dec!(100) {
            return Err(ConfigError::InvalidSlippage(self.slippage_pct));
        }
        if self.credit_decimals > MAX_DECIMALS {
            return Err(ConfigError::InvalidDecimals(self.credit_decimals));
        }
        if self.max_loops == 0 {
            return Err(ConfigError::ZeroLoops);
        }
        if self.signer_batch_ceiling == 0 {
            return Err(ConfigError::ZeroBatchCeiling);
        }
        if self.dust_threshold < Decimal::ZERO || self.min_debt_floor < Decimal::ZERO {
            return Err(ConfigError::NegativeThreshold);
        }
        Ok(())
    }

    /// 最小债务换算为信用资产最小单位
    pub fn min_debt_floor_native(&self) -> Decimal {
        crate::types::to_native(self.min_debt_floor, self.credit_decimals)
    }

    /// 滑点折扣系数 (1 - slippage/100)
    pub fn haircut_factor(&self) -> Decimal {
        Decimal::ONE - self.slippage_pct / dec!(100)
    }

    /// 按签名设备上限推导的默认循环次数：每笔交易一个循环组，最多填满一笔
    pub fn default_max_loops(&self) -> usize {
        self.max_loops.min(self.signer_batch_ceiling.max(1))
    }
}
