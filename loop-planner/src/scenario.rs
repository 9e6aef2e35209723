use std::fs;
use std::path::Path;
use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use common::types::{Basket, Position, PriceBook};
use risk_engine::PendingEdits;

/// 请求的规划动作
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    /// 只计算预览
    #[default]
    Summary,
    Loop {
        target_ltv: Decimal,
        #[serde(default)]
        max_loops: Option<usize>,
    },
    Unloop {
        #[serde(default)]
        desired_withdrawal: Option<Decimal>,
        #[serde(default)]
        max_loops: Option<usize>,
    },
}

/// 规划场景：链上状态快照 + 用户意图
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub basket: Basket,
    pub position: Position,
    pub prices: PriceBook,
    /// 钱包中的信用资产（最小单位）
    #[serde(default)]
    pub wallet_balance: Decimal,
    #[serde(default)]
    pub edits: PendingEdits,
    #[serde(default)]
    pub action: Action,
}

impl Scenario {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario: {:?}", path))?;
        let scenario: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse scenario: {:?}", path))?;
        scenario
            .basket
            .validate()
            .with_context(|| format!("Invalid basket in scenario: {:?}", path))?;
        Ok(scenario)
    }
}
