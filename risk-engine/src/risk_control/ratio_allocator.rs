use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use common::config::EngineConfig;
use common::types::BasketIndex;
use crate::risk_control::risk_calculator::AssetValue;

/// 资产价值占比
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRatio {
    pub denom: String,
    pub usd_value: Decimal,
    pub ratio: Decimal,
}

/// 稳定币隔离规则：双资产仓位中若有一个稳定币，则稳定币占比记为1
#[derive(Debug, Clone, Copy)]
pub struct StableSkip<'a> {
    pub enabled: bool,
    pub stable_symbols: &'a [String],
}

impl<'a> StableSkip<'a> {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            stable_symbols: &[],
        }
    }

    /// 按引擎配置启用
    pub fn from_config(config: &'a EngineConfig) -> Self {
        Self {
            enabled: config.skip_stable_when_paired,
            stable_symbols: &config.stable_symbols,
        }
    }

    fn is_stable(&self, index: &BasketIndex<'_>, denom: &str) -> bool {
        index
            .symbol(denom)
            .map(|symbol| self.stable_symbols.iter().any(|s| s.eq_ignore_ascii_case(symbol)))
            .unwrap_or(false)
    }
}

/// 计算各资产价值占比，tvl为0时返回None
pub fn asset_ratios(
    values: &[AssetValue],
    tvl: Decimal,
    skip: StableSkip<'_>,
    index: &BasketIndex<'_>,
) -> Option<Vec<AssetRatio>> {
    if tvl <= Decimal::ZERO {
        return None;
    }

    let ratios = values
        .iter()
        .map(|v| AssetRatio {
            denom: v.denom.clone(),
            usd_value: v.usd_value,
            ratio: v.usd_value / tvl,
        })
        .collect();

    Some(isolate_stable(ratios, skip, index))
}

/// 双资产且恰有一个稳定币时，稳定币占比记为1，另一资产记为0
pub fn isolate_stable(
    ratios: Vec<AssetRatio>,
    skip: StableSkip<'_>,
    index: &BasketIndex<'_>,
) -> Vec<AssetRatio> {
    if !skip.enabled || ratios.len() != 2 {
        return ratios;
    }

    let stable: Vec<bool> = ratios.iter().map(|r| skip.is_stable(index, &r.denom)).collect();
    if stable[0] == stable[1] {
        return ratios;
    }

    debug!("Stable asset paired, isolating its ratio");
    ratios
        .into_iter()
        .zip(stable)
        .map(|(r, is_stable)| AssetRatio {
            ratio: if is_stable { Decimal::ONE } else { Decimal::ZERO },
            ..r
        })
        .collect()
}

/// 按占比切分整数数量（每份向下取整，丢弃零份额），结果按denom排序
pub fn allocate(amount: Decimal, ratios: &[AssetRatio]) -> Vec<(String, Decimal)> {
    let mut shares: Vec<(String, Decimal)> = ratios
        .iter()
        .map(|r| (r.denom.clone(), (amount * r.ratio).floor()))
        .filter(|(_, share)| *share > Decimal::ZERO)
        .collect();

    shares.sort_by(|a, b| a.0.cmp(&b.0));
    shares
}
