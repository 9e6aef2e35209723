use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::debug;

use common::config::EngineConfig;
use common::types::{to_display, Asset, Basket, BasketIndex, Position, PriceOracle};
use crate::risk_control::ratio_allocator::{asset_ratios, AssetRatio, StableSkip};
use crate::risk_control::risk_state::{classify, RiskLevel};

const HUNDRED: Decimal = dec!(100);

/// 单个资产估值
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetValue {
    pub denom: String,
    pub amount: Decimal,     // 原生最小单位
    pub usd_value: Decimal,  // 美元价值
}

/// 资产估值：amount / 10^decimals * price，缺失价格按0计
pub fn value_assets<O: PriceOracle>(
    assets: &[Asset],
    index: &BasketIndex<'_>,
    prices: &O,
) -> Vec<AssetValue> {
    assets
        .iter()
        .map(|asset| {
            let decimals = index.decimals(&asset.denom);
            let price = prices.price_or_zero(&asset.denom);
            AssetValue {
                denom: asset.denom.clone(),
                amount: asset.amount,
                usd_value: to_display(asset.amount, decimals) * price,
            }
        })
        .collect()
}

/// 总锁仓价值
pub fn tvl(values: &[AssetValue]) -> Decimal {
    values.iter().map(|v| v.usd_value).sum()
}

/// 债务价值（显示单位）
pub fn debt_value(debt_native: Decimal, credit_price: Decimal, credit_decimals: u32) -> Decimal {
    to_display(debt_native, credit_decimals) * credit_price
}

/// LTV百分比；无债务或tvl为0时为0
pub fn ltv(tvl: Decimal, debt_value: Decimal) -> Decimal {
    if debt_value.is_zero() || tvl <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    debt_value / tvl * HUNDRED
}

/// 加权可借LTV（百分比），篮子中不存在的资产贡献0
pub fn borrow_ltv(ratios: &[AssetRatio], index: &BasketIndex<'_>) -> Decimal {
    weighted(ratios, index, |c| c.max_borrow_ltv) * HUNDRED
}

/// 加权清算LTV（百分比）
pub fn liquidation_ltv(ratios: &[AssetRatio], index: &BasketIndex<'_>) -> Decimal {
    weighted(ratios, index, |c| c.max_ltv) * HUNDRED
}

/// 加权利率成本
pub fn weighted_cost(ratios: &[AssetRatio], index: &BasketIndex<'_>) -> Decimal {
    weighted(ratios, index, |c| c.interest_rate)
}

fn weighted<F>(ratios: &[AssetRatio], index: &BasketIndex<'_>, field: F) -> Decimal
where
    F: Fn(&common::types::CollateralType) -> Option<Decimal>,
{
    ratios
        .iter()
        .map(|r| {
            let weight = index.get(&r.denom).and_then(&field).unwrap_or(Decimal::ZERO);
            r.ratio * weight
        })
        .sum()
}

/// 最大可铸造数量（信用资产显示单位），credit_price下限为1
pub fn max_mint(tvl: Decimal, borrow_ltv: Decimal, credit_price: Decimal) -> Decimal {
    tvl * (borrow_ltv / HUNDRED) / credit_price.max(Decimal::ONE)
}

/// 清算价值：抵押品价值跌至此值时触发清算；超额还款时债务按0计
pub fn liquidation_value(
    debt: Decimal,
    mint: Decimal,
    repay: Decimal,
    credit_price: Decimal,
    liquidation_ltv: Decimal,
) -> Decimal {
    if liquidation_ltv <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    let debt_after = (debt + mint - repay).max(Decimal::ZERO);
    debt_after * credit_price / (liquidation_ltv / HUNDRED)
}

/// 仓位风险指标
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskMetrics {
    pub tvl: Decimal,
    pub debt_value: Decimal,
    pub ltv: Decimal,
    pub borrow_ltv: Decimal,
    pub liquidation_ltv: Decimal,
    pub max_mint: Decimal,
    pub liquidation_value: Decimal,
    pub cost: Decimal,
    pub risk_level: RiskLevel,
    pub ratios: Vec<AssetRatio>,
}

impl RiskMetrics {
    pub fn new() -> Self {
        Self {
            tvl: Decimal::ZERO,
            debt_value: Decimal::ZERO,
            ltv: Decimal::ZERO,
            borrow_ltv: Decimal::ZERO,
            liquidation_ltv: Decimal::ZERO,
            max_mint: Decimal::ZERO,
            liquidation_value: Decimal::ZERO,
            cost: Decimal::ZERO,
            risk_level: RiskLevel::Low,
            ratios: Vec::new(),
        }
    }

    /// 计算仓位当前的全部风险指标
    pub fn evaluate<O: PriceOracle>(
        position: &Position,
        basket: &Basket,
        prices: &O,
        config: &EngineConfig,
    ) -> Self {
        let index = basket.index();
        let values = value_assets(&position.collateral_assets, &index, prices);
        let total = tvl(&values);

        let Some(ratios) = asset_ratios(&values, total, StableSkip::disabled(), &index) else {
            debug!("Position {} has no collateral value", position.position_id);
            return Self::new();
        };

        let cost_ratios = asset_ratios(&values, total, StableSkip::from_config(config), &index)
            .unwrap_or_default();

        let debt = to_display(position.debt_amount, config.credit_decimals);
        let debt_val = debt * basket.credit_price;
        let current_ltv = ltv(total, debt_val);
        let borrow = borrow_ltv(&ratios, &index);
        let liquidation = liquidation_ltv(&ratios, &index);

        Self {
            tvl: total,
            debt_value: debt_val,
            ltv: current_ltv,
            borrow_ltv: borrow,
            liquidation_ltv: liquidation,
            max_mint: max_mint(total, borrow, basket.credit_price),
            liquidation_value: liquidation_value(
                debt,
                Decimal::ZERO,
                Decimal::ZERO,
                basket.credit_price,
                liquidation,
            ),
            cost: weighted_cost(&cost_ratios, &index),
            risk_level: classify(current_ltv, borrow, liquidation),
            ratios,
        }
    }
}

impl Default for RiskMetrics {
    fn default() -> Self {
        Self::new()
    }
}
