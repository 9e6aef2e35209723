use std::collections::BTreeMap;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use common::types::{to_native, Asset, Operation, PriceOracle};
use crate::error::Result;
use crate::looping::plan::{LoopPlan, LoopStep};
use crate::looping::LoopContext;
use crate::risk_control::ratio_allocator::{allocate, isolate_stable, AssetRatio, StableSkip};
use crate::swap::SwapRouter;
use crate::vault::VaultSummary;

/// 加杠杆请求
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeverageRequest {
    /// 当前抵押品价值（美元）
    pub value: Decimal,
    /// 当前债务（信用资产最小单位）
    pub debt: Decimal,
    pub ratios: Vec<AssetRatio>,
    pub target_ltv: Decimal,
    pub borrow_ltv: Decimal,
    pub max_loops: usize,
}

impl LeverageRequest {
    /// 以含待提交编辑的预览为起点，debt为信用资产最小单位
    pub fn from_summary(summary: &VaultSummary, debt: Decimal, target_ltv: Decimal, max_loops: usize) -> Self {
        Self {
            value: summary.tvl,
            debt,
            ratios: summary.ratios.clone(),
            target_ltv,
            borrow_ltv: summary.borrow_ltv,
            max_loops,
        }
    }
}

/// 单次迭代的结果
struct MintStep {
    step: LoopStep,
    minted: Decimal,
}

/// 规划 mint -> swap -> deposit 循环，把仓位推向目标LTV
pub fn plan_loop<O, R>(ctx: &LoopContext<'_, O, R>, request: &LeverageRequest) -> Result<LoopPlan>
where
    O: PriceOracle,
    R: SwapRouter,
{
    let target = request.target_ltv.min(request.borrow_ltv);
    let current = ctx.ltv_of(request.value, request.debt);

    // 不能向下加杠杆
    if target <= current {
        warn!(
            "Loop target {} is not above current LTV {}, nothing to do",
            target, current
        );
        return Ok(LoopPlan::aborted());
    }

    let ratios = isolate_stable(
        request.ratios.clone(),
        StableSkip::from_config(ctx.config),
        &ctx.index,
    );

    let mut plan = LoopPlan::start(request.value, request.debt, current);
    while plan.iterations() < request.max_loops {
        let Some(MintStep { step, minted }) =
            mint_step(ctx, &plan, target, request.borrow_ltv, &ratios)?
        else {
            break;
        };

        plan = plan.advance(step);
        if minted <= ctx.config.dust_threshold {
            debug!("Mint amount {} at dust threshold, stopping", minted);
            break;
        }
    }

    info!(
        "Loop plan: {} iterations, value={}, ltv={} (target {})",
        plan.iterations(),
        plan.value,
        plan.ltv,
        target
    );
    Ok(plan)
}

fn mint_step<O, R>(
    ctx: &LoopContext<'_, O, R>,
    plan: &LoopPlan,
    target: Decimal,
    borrow_ltv: Decimal,
    ratios: &[AssetRatio],
) -> Result<Option<MintStep>>
where
    O: PriceOracle,
    R: SwapRouter,
{
    let range = (target - plan.ltv).min(borrow_ltv - plan.ltv);
    let credit_price = ctx.credit_price();
    if range <= Decimal::ZERO || credit_price <= Decimal::ZERO {
        return Ok(None);
    }

    let mint_value = plan.value * range / dec!(100);
    let mint_amount = to_native(mint_value / credit_price, ctx.config.credit_decimals);
    if mint_amount.is_zero() {
        debug!("Borrow headroom exhausted at ltv {}", plan.ltv);
        return Ok(None);
    }

    let credit_denom = ctx.credit_denom();
    let mut operations = vec![Operation::Mint { amount: mint_amount }];
    let mut outputs: BTreeMap<String, Decimal> = BTreeMap::new();

    for (denom, share) in allocate(mint_amount, ratios) {
        if denom == credit_denom {
            // 信用资产本身作为抵押品时无需兑换
            *outputs.entry(denom).or_insert(Decimal::ZERO) += share;
            continue;
        }

        let quote = ctx
            .router
            .quote_swap(credit_denom, &denom, share, ctx.config.slippage_pct)?;
        if quote.min_amount_out.is_zero() {
            debug!("Swap of {} into {} rounds to zero, dropped", share, denom);
            continue;
        }

        operations.push(quote.operation);
        *outputs.entry(denom).or_insert(Decimal::ZERO) += quote.min_amount_out;
    }

    if outputs.is_empty() {
        debug!("No collateral could be bought with {} minted", mint_amount);
        return Ok(None);
    }

    operations.push(Operation::Deposit {
        assets: outputs
            .into_iter()
            .map(|(denom, amount)| Asset::new(denom, amount))
            .collect(),
    });

    let value = plan.value + mint_value * ctx.config.haircut_factor();
    let debt = plan.debt + mint_amount;
    let ltv = ctx.ltv_of(value, debt);

    debug!(
        "Loop step {}: minted {}, value {} -> {}, ltv {} -> {}",
        plan.iterations() + 1,
        mint_amount,
        plan.value,
        value,
        plan.ltv,
        ltv
    );

    Ok(Some(MintStep {
        step: LoopStep {
            operations,
            value,
            debt,
            ltv,
            withdrawn: Decimal::ZERO,
        },
        minted: mint_amount,
    }))
}
