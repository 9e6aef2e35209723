use std::collections::BTreeMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use common::config::EngineConfig;
use common::types::{to_display, Asset, Basket, BasketIndex, Position, PriceOracle};
use crate::risk_control::risk_calculator::{
    self, borrow_ltv, liquidation_ltv, value_assets, weighted_cost, RiskMetrics,
};
use crate::risk_control::ratio_allocator::{asset_ratios, AssetRatio, StableSkip};
use crate::risk_control::risk_state::{classify, RiskLevel};

/// 仓位加载时捕获一次的基线
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitialSnapshot {
    pub initial_tvl: Decimal,
    pub initial_ltv: Decimal,
    pub initial_borrow_ltv: Decimal,
}

impl InitialSnapshot {
    pub fn capture<O: PriceOracle>(
        position: &Position,
        basket: &Basket,
        prices: &O,
        config: &EngineConfig,
    ) -> Self {
        let metrics = RiskMetrics::evaluate(position, basket, prices, config);
        Self {
            initial_tvl: metrics.tvl,
            initial_ltv: metrics.ltv,
            initial_borrow_ltv: metrics.borrow_ltv,
        }
    }
}

/// 用户尚未提交的编辑
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PendingEdits {
    /// 每个资产的数量变化（原生最小单位，可为负）
    pub asset_deltas: Vec<Asset>,
    /// 待铸造（信用资产最小单位）
    pub mint: Decimal,
    /// 待偿还（信用资产最小单位）
    pub repay: Decimal,
}

/// 超过供应上限的资产
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapBreach {
    pub denom: String,
    pub ratio: Decimal,
    pub supply_cap_ratio: Decimal,
}

/// 实时预览，所有金额为显示单位
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultSummary {
    pub tvl: Decimal,
    pub ltv: Decimal,
    pub borrow_ltv: Decimal,
    pub liquidation_ltv: Decimal,
    pub max_mint: Decimal,
    /// 还可铸造的数量
    pub mintable: Decimal,
    pub liquidation_value: Decimal,
    pub cost: Decimal,
    pub debt_amount: Decimal,
    pub new_debt_amount: Decimal,
    pub ratios: Vec<AssetRatio>,
    pub cap_breaches: Vec<CapBreach>,
    pub risk_level: RiskLevel,
}

impl VaultSummary {
    /// 兼容旧UI的全零结果
    pub fn zeroed() -> Self {
        Self {
            tvl: Decimal::ZERO,
            ltv: Decimal::ZERO,
            borrow_ltv: Decimal::ZERO,
            liquidation_ltv: Decimal::ZERO,
            max_mint: Decimal::ZERO,
            mintable: Decimal::ZERO,
            liquidation_value: Decimal::ZERO,
            cost: Decimal::ZERO,
            debt_amount: Decimal::ZERO,
            new_debt_amount: Decimal::ZERO,
            ratios: Vec::new(),
            cap_breaches: Vec::new(),
            risk_level: RiskLevel::Low,
        }
    }
}

/// 缺失的必要输入
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MissingInput {
    Basket,
    Position,
    Prices,
    Snapshot,
}

/// 聚合结果：未就绪与计算得零可以区分
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SummaryState {
    Ready(VaultSummary),
    NotReady(MissingInput),
}

impl SummaryState {
    pub fn ready(&self) -> Option<&VaultSummary> {
        match self {
            SummaryState::Ready(summary) => Some(summary),
            SummaryState::NotReady(_) => None,
        }
    }

    /// 未就绪时退化为全零结果
    pub fn zeroed_or(self) -> VaultSummary {
        match self {
            SummaryState::Ready(summary) => summary,
            SummaryState::NotReady(_) => VaultSummary::zeroed(),
        }
    }
}

/// 聚合所需输入，任一必要输入缺失时结果为NotReady
pub struct SummaryInputs<'a, O: PriceOracle> {
    pub basket: Option<&'a Basket>,
    pub position: Option<&'a Position>,
    pub prices: Option<&'a O>,
    pub snapshot: Option<&'a InitialSnapshot>,
    pub edits: &'a PendingEdits,
}

impl<'a, O: PriceOracle> Clone for SummaryInputs<'a, O> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'a, O: PriceOracle> Copy for SummaryInputs<'a, O> {}

/// 合并待提交编辑与基线状态，生成实时预览
pub fn summarize<O: PriceOracle>(inputs: SummaryInputs<'_, O>, config: &EngineConfig) -> SummaryState {
    let Some(basket) = inputs.basket else {
        return SummaryState::NotReady(MissingInput::Basket);
    };
    let Some(position) = inputs.position else {
        return SummaryState::NotReady(MissingInput::Position);
    };
    let Some(prices) = inputs.prices else {
        return SummaryState::NotReady(MissingInput::Prices);
    };
    let Some(snapshot) = inputs.snapshot else {
        return SummaryState::NotReady(MissingInput::Snapshot);
    };

    let edits = inputs.edits;
    let index = basket.index();

    let merged = merge_assets(&position.collateral_assets, &edits.asset_deltas);
    let values = value_assets(&merged, &index, prices);
    // 超出持仓的取出按持仓量计
    let applied = applied_deltas(&position.collateral_assets, &merged);
    let delta_value: Decimal = value_assets(&applied, &index, prices)
        .iter()
        .map(|v| v.usd_value)
        .sum();
    let tvl = (snapshot.initial_tvl + delta_value).max(Decimal::ZERO);

    // 占比基于合并后的估值，保证总和为1
    let valued_total = risk_calculator::tvl(&values);
    let ratios = asset_ratios(&values, valued_total, StableSkip::disabled(), &index)
        .unwrap_or_default();
    let cost_ratios = asset_ratios(&values, valued_total, StableSkip::from_config(config), &index)
        .unwrap_or_default();

    let debt = to_display(position.debt_amount, config.credit_decimals);
    let mint = to_display(edits.mint, config.credit_decimals);
    let repay = to_display(edits.repay, config.credit_decimals);
    let new_debt = (debt + mint - repay).max(Decimal::ZERO);

    let ltv = risk_calculator::ltv(tvl, new_debt * basket.credit_price);
    let borrow = borrow_ltv(&ratios, &index);
    let liquidation = liquidation_ltv(&ratios, &index);
    let max_mint = risk_calculator::max_mint(tvl, borrow, basket.credit_price);

    let summary = VaultSummary {
        tvl,
        ltv,
        borrow_ltv: borrow,
        liquidation_ltv: liquidation,
        max_mint,
        mintable: (max_mint - new_debt).max(Decimal::ZERO),
        liquidation_value: risk_calculator::liquidation_value(
            debt,
            mint,
            repay,
            basket.credit_price,
            liquidation,
        ),
        cost: weighted_cost(&cost_ratios, &index),
        debt_amount: debt,
        new_debt_amount: new_debt,
        cap_breaches: cap_breaches(&ratios, &index),
        risk_level: classify(ltv, borrow, liquidation),
        ratios,
    };

    debug!(
        "Vault {} preview: tvl={}, ltv={}, borrow_ltv={}",
        position.position_id, summary.tvl, summary.ltv, summary.borrow_ltv
    );

    SummaryState::Ready(summary)
}

/// 按denom累加数量变化，结果不低于0
fn merge_assets(base: &[Asset], deltas: &[Asset]) -> Vec<Asset> {
    let mut merged: BTreeMap<&str, Decimal> = BTreeMap::new();
    for asset in base.iter().chain(deltas) {
        *merged.entry(asset.denom.as_str()).or_insert(Decimal::ZERO) += asset.amount;
    }

    merged
        .into_iter()
        .map(|(denom, amount)| Asset::new(denom, amount.max(Decimal::ZERO)))
        .collect()
}

/// 合并后相对基线的实际变化量
fn applied_deltas(base: &[Asset], merged: &[Asset]) -> Vec<Asset> {
    let mut held: BTreeMap<&str, Decimal> = BTreeMap::new();
    for asset in base {
        *held.entry(asset.denom.as_str()).or_insert(Decimal::ZERO) += asset.amount;
    }

    merged
        .iter()
        .filter_map(|asset| {
            let before = held.get(asset.denom.as_str()).copied().unwrap_or(Decimal::ZERO);
            let delta = asset.amount - before;
            (!delta.is_zero()).then(|| Asset::new(asset.denom.clone(), delta))
        })
        .collect()
}

fn cap_breaches(ratios: &[AssetRatio], index: &BasketIndex<'_>) -> Vec<CapBreach> {
    ratios
        .iter()
        .filter_map(|r| {
            let cap = index.supply_cap(&r.denom)?;
            if r.ratio > cap.supply_cap_ratio {
                warn!(
                    "Supply cap ratio for {} is over the limit ({} > {})",
                    r.denom, r.ratio, cap.supply_cap_ratio
                );
                Some(CapBreach {
                    denom: r.denom.clone(),
                    ratio: r.ratio,
                    supply_cap_ratio: cap.supply_cap_ratio,
                })
            } else {
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::types::{CollateralType, PriceBook, SupplyCap};
    use rust_decimal_macros::dec;

    fn basket() -> Basket {
        Basket {
            credit_denom: "ucdt".to_string(),
            credit_price: dec!(1),
            collateral_types: vec![
                CollateralType {
                    denom: "uatom".to_string(),
                    symbol: "ATOM".to_string(),
                    decimals: 6,
                    max_ltv: Some(dec!(0.8)),
                    max_borrow_ltv: Some(dec!(0.6)),
                    interest_rate: Some(dec!(0.04)),
                    rate_index: dec!(1),
                },
                CollateralType {
                    denom: "uusdc".to_string(),
                    symbol: "USDC".to_string(),
                    decimals: 6,
                    max_ltv: Some(dec!(0.9)),
                    max_borrow_ltv: Some(dec!(0.8)),
                    interest_rate: Some(dec!(0.01)),
                    rate_index: dec!(1),
                },
            ],
            supply_caps: vec![SupplyCap {
                denom: "uatom".to_string(),
                current_supply: Decimal::ZERO,
                supply_cap_ratio: dec!(0.9),
            }],
        }
    }

    fn position() -> Position {
        Position {
            position_id: 3,
            collateral_assets: vec![
                Asset::new("uatom", dec!(50_000_000)),
                Asset::new("uusdc", dec!(500_000_000)),
            ],
            debt_amount: dec!(200_000_000),
        }
    }

    fn prices() -> PriceBook {
        PriceBook::new()
            .with_price("uatom", dec!(10))
            .with_price("uusdc", dec!(1))
    }

    #[test]
    fn test_summary_without_edits_matches_baseline() {
        let (basket, position, prices) = (basket(), position(), prices());
        let config = EngineConfig::default();
        let snapshot = InitialSnapshot::capture(&position, &basket, &prices, &config);
        let edits = PendingEdits::default();

        let state = summarize(
            SummaryInputs {
                basket: Some(&basket),
                position: Some(&position),
                prices: Some(&prices),
                snapshot: Some(&snapshot),
                edits: &edits,
            },
            &config,
        );

        let summary = state.ready().unwrap();
        assert_eq!(summary.tvl, dec!(1000));
        assert_eq!(summary.ltv, dec!(20));
        assert_eq!(summary.borrow_ltv, dec!(70));
        assert_eq!(summary.liquidation_ltv, dec!(85));
        assert_eq!(summary.max_mint, dec!(700));
        assert_eq!(summary.mintable, dec!(500));
        assert_eq!(summary.cost, dec!(0.025));
        assert_eq!(summary.new_debt_amount, dec!(200));
        assert!(summary.cap_breaches.is_empty());
    }

    #[test]
    fn test_summary_applies_edits() {
        let (basket, position, prices) = (basket(), position(), prices());
        let config = EngineConfig::default();
        let snapshot = InitialSnapshot::capture(&position, &basket, &prices, &config);
        let edits = PendingEdits {
            asset_deltas: vec![Asset::new("uusdc", dec!(-500_000_000))],
            mint: dec!(50_000_000),
            repay: dec!(10_000_000),
        };

        let summary = summarize(
            SummaryInputs {
                basket: Some(&basket),
                position: Some(&position),
                prices: Some(&prices),
                snapshot: Some(&snapshot),
                edits: &edits,
            },
            &config,
        )
        .zeroed_or();

        assert_eq!(summary.tvl, dec!(500));
        assert_eq!(summary.new_debt_amount, dec!(240));
        assert_eq!(summary.ltv, dec!(48));
        assert_eq!(summary.borrow_ltv, dec!(60));
        // (200 + 50 - 10) / 0.8
        assert_eq!(summary.liquidation_value, dec!(300));
        // 全部为ATOM，超过0.9的供应上限
        assert_eq!(summary.cap_breaches.len(), 1);
        assert_eq!(summary.cap_breaches[0].denom, "uatom");
    }

    #[test]
    fn test_summary_not_ready_without_prices() {
        let (basket, position) = (basket(), position());
        let snapshot = InitialSnapshot {
            initial_tvl: dec!(1000),
            initial_ltv: dec!(20),
            initial_borrow_ltv: dec!(70),
        };
        let edits = PendingEdits::default();

        let state = summarize::<PriceBook>(
            SummaryInputs {
                basket: Some(&basket),
                position: Some(&position),
                prices: None,
                snapshot: Some(&snapshot),
                edits: &edits,
            },
            &EngineConfig::default(),
        );

        assert_eq!(state, SummaryState::NotReady(MissingInput::Prices));
        assert_eq!(state.zeroed_or(), VaultSummary::zeroed());
    }

    #[test]
    fn test_summary_over_repay_keeps_debt_at_zero() {
        let basket = basket();
        let prices = prices();
        let position = Position {
            position_id: 4,
            collateral_assets: vec![Asset::new("uatom", dec!(50_000_000))],
            debt_amount: dec!(100_000_000),
        };
        let config = EngineConfig::default();
        let snapshot = InitialSnapshot::capture(&position, &basket, &prices, &config);
        let edits = PendingEdits {
            repay: dec!(150_000_000),
            ..PendingEdits::default()
        };

        let summary = summarize(
            SummaryInputs {
                basket: Some(&basket),
                position: Some(&position),
                prices: Some(&prices),
                snapshot: Some(&snapshot),
                edits: &edits,
            },
            &config,
        )
        .zeroed_or();

        assert_eq!(summary.tvl, dec!(500));
        assert_eq!(summary.new_debt_amount, Decimal::ZERO);
        assert_eq!(summary.ltv, Decimal::ZERO);
        assert_eq!(summary.liquidation_value, Decimal::ZERO);
    }

    #[test]
    fn test_summary_withdrawal_capped_at_holdings() {
        let (basket, position, prices) = (basket(), position(), prices());
        let config = EngineConfig::default();
        let snapshot = InitialSnapshot::capture(&position, &basket, &prices, &config);
        // 持有500 USDC，编辑取出600
        let edits = PendingEdits {
            asset_deltas: vec![Asset::new("uusdc", dec!(-600_000_000))],
            ..PendingEdits::default()
        };

        let summary = summarize(
            SummaryInputs {
                basket: Some(&basket),
                position: Some(&position),
                prices: Some(&prices),
                snapshot: Some(&snapshot),
                edits: &edits,
            },
            &config,
        )
        .zeroed_or();

        assert_eq!(summary.tvl, dec!(500));
        assert_eq!(summary.ltv, dec!(40));
        assert_eq!(summary.ratios[0].ratio, Decimal::ONE);
    }

    #[test]
    fn test_summary_is_deterministic() {
        let (basket, position, prices) = (basket(), position(), prices());
        let config = EngineConfig::default();
        let snapshot = InitialSnapshot::capture(&position, &basket, &prices, &config);
        let edits = PendingEdits {
            asset_deltas: vec![Asset::new("uatom", dec!(1_234_567))],
            mint: dec!(3_000_000),
            repay: Decimal::ZERO,
        };
        let inputs = SummaryInputs {
            basket: Some(&basket),
            position: Some(&position),
            prices: Some(&prices),
            snapshot: Some(&snapshot),
            edits: &edits,
        };

        assert_eq!(summarize(inputs, &config), summarize(inputs, &config));
    }
}
