use std::collections::BTreeMap;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use common::types::{Asset, Operation, PriceOracle};
use crate::error::Result;
use crate::looping::plan::{LoopPlan, LoopStep};
use crate::looping::LoopContext;
use crate::risk_control::ratio_allocator::AssetRatio;
use crate::swap::SwapRouter;
use crate::vault::VaultSummary;

/// 去杠杆请求
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnloopRequest {
    /// 当前抵押品价值（美元）
    pub value: Decimal,
    /// 当前债务（信用资产最小单位）
    pub debt: Decimal,
    pub ratios: Vec<AssetRatio>,
    pub borrow_ltv: Decimal,
    /// 期望取出的美元价值，None表示完全平仓
    pub desired_withdrawal: Option<Decimal>,
    /// 钱包中可用的信用资产（最小单位）
    pub wallet_balance: Decimal,
    pub max_loops: usize,
}

impl UnloopRequest {
    pub fn from_summary(
        summary: &VaultSummary,
        debt: Decimal,
        desired_withdrawal: Option<Decimal>,
        wallet_balance: Decimal,
        max_loops: usize,
    ) -> Self {
        Self {
            value: summary.tvl,
            debt,
            ratios: summary.ratios.clone(),
            borrow_ltv: summary.borrow_ltv,
            desired_withdrawal,
            wallet_balance,
            max_loops,
        }
    }

    fn remaining(&self, withdrawn: Decimal) -> Option<Decimal> {
        self.desired_withdrawal.map(|target| (target - withdrawn).max(Decimal::ZERO))
    }
}

/// 规划 withdraw -> swap -> repay 循环，释放抵押品并偿还债务
pub fn plan_unloop<O, R>(ctx: &LoopContext<'_, O, R>, request: &UnloopRequest) -> Result<LoopPlan>
where
    O: PriceOracle,
    R: SwapRouter,
{
    let current = ctx.ltv_of(request.value, request.debt);

    // 超过可借上限的仓位需要先恢复健康
    if current > request.borrow_ltv {
        warn!(
            "Current LTV {} above borrow LTV {}, refusing to unloop",
            current, request.borrow_ltv
        );
        return Ok(LoopPlan::aborted());
    }

    let mut plan = LoopPlan::start(request.value, request.debt, current);
    while plan.iterations() < request.max_loops && should_continue(&plan, request) {
        let outcome = unloop_step(ctx, &plan, request)?;
        let Some(step) = outcome.step else {
            break;
        };

        plan = plan.advance(step);
        if outcome.last {
            break;
        }
    }

    info!(
        "Unloop plan: {} iterations, value={}, debt={}, ltv={}, withdrawn={}",
        plan.iterations(),
        plan.value,
        plan.debt,
        plan.ltv,
        plan.withdrawn
    );
    Ok(plan)
}

fn should_continue(plan: &LoopPlan, request: &UnloopRequest) -> bool {
    match request.remaining(plan.withdrawn) {
        Some(remaining) => remaining > Decimal::ZERO,
        None => plan.is_empty() || plan.debt > Decimal::ZERO,
    }
}

struct StepOutcome {
    step: Option<LoopStep>,
    last: bool,
}

impl StepOutcome {
    fn stop() -> Self {
        Self { step: None, last: true }
    }

    fn next(step: LoopStep) -> Self {
        Self { step: Some(step), last: false }
    }

    fn last(step: LoopStep) -> Self {
        Self { step: Some(step), last: true }
    }
}

fn unloop_step<O, R>(
    ctx: &LoopContext<'_, O, R>,
    plan: &LoopPlan,
    request: &UnloopRequest,
) -> Result<StepOutcome>
where
    O: PriceOracle,
    R: SwapRouter,
{
    let remaining = request.remaining(plan.withdrawn);

    // 已无债务，剩余目标直接取出
    if plan.debt <= Decimal::ZERO {
        return Ok(match remaining {
            Some(remaining) => bare_withdraw(ctx, plan, &request.ratios, remaining.min(plan.value))
                .map(StepOutcome::last)
                .unwrap_or_else(StepOutcome::stop),
            None => StepOutcome::stop(),
        });
    }

    let range = (request.borrow_ltv - plan.ltv).min(plan.ltv);
    if range <= Decimal::ZERO {
        return Ok(StepOutcome::stop());
    }
    let full_payoff = range == plan.ltv;
    let withdraw_value = plan.value * range / dec!(100);

    // range <= borrow - ltv，取出不超过本步额度时LTV仍在可借上限内
    if let Some(remaining) = remaining {
        if withdraw_value >= remaining {
            debug!("Final increment {} withdrawn without repay", remaining);
            return Ok(bare_withdraw(ctx, plan, &request.ratios, remaining)
                .map(StepOutcome::last)
                .unwrap_or_else(StepOutcome::stop));
        }
    }

    let assets = withdraw_assets(ctx, &request.ratios, withdraw_value);
    if assets.is_empty() {
        debug!("Withdrawal of {} rounds to nothing", withdraw_value);
        return Ok(StepOutcome::stop());
    }

    let credit_denom = ctx.credit_denom();
    let mut operations = vec![Operation::Withdraw { assets: assets.clone() }];
    let mut total_out = Decimal::ZERO;

    for asset in &assets {
        if asset.denom == credit_denom {
            total_out += asset.amount;
            continue;
        }

        let quote = ctx
            .router
            .quote_swap(&asset.denom, credit_denom, asset.amount, ctx.config.slippage_pct)?;
        if quote.min_amount_out.is_zero() {
            debug!("Swap of {} rounds to zero, dropped", asset);
            continue;
        }

        total_out += quote.min_amount_out;
        operations.push(quote.operation);
    }

    if total_out.is_zero() {
        return Ok(StepOutcome::stop());
    }

    let Some((repay, debt)) = size_repay(ctx, plan.debt, total_out, request.wallet_balance, full_payoff) else {
        debug!("No repay keeps debt off the floor band, stopping");
        return Ok(StepOutcome::stop());
    };
    operations.push(Operation::Repay { amount: repay });

    let value = (plan.value - withdraw_value).max(Decimal::ZERO);
    let ltv = ctx.ltv_of(value, debt);

    debug!(
        "Unloop step {}: withdrew {}, repaid {}, debt {} -> {}, ltv {} -> {}",
        plan.iterations() + 1,
        withdraw_value,
        repay,
        plan.debt,
        debt,
        plan.ltv,
        ltv
    );

    let step = LoopStep {
        operations,
        value,
        debt,
        ltv,
        withdrawn: withdraw_value,
    };
    Ok(StepOutcome::next(step))
}

/// 计算还款额与剩余债务，剩余债务不会落在(0, floor)区间
fn size_repay<O, R>(
    ctx: &LoopContext<'_, O, R>,
    debt: Decimal,
    total_out: Decimal,
    wallet_balance: Decimal,
    full_payoff: bool,
) -> Option<(Decimal, Decimal)>
where
    O: PriceOracle,
    R: SwapRouter,
{
    let payoff = || {
        let repay = total_out + wallet_balance;
        if repay < debt {
            warn!(
                "Full payoff repay {} (swap {} + wallet {}) below debt {}",
                repay, total_out, wallet_balance, debt
            );
        }
        (repay, Decimal::ZERO)
    };

    if full_payoff {
        return Some(payoff());
    }

    let repay = total_out.min(debt);
    let left = debt - repay;
    let floor = ctx.config.min_debt_floor_native();
    if left.is_zero() || left >= floor {
        return Some((repay, left));
    }

    let clamped = debt - floor;
    if clamped > Decimal::ZERO {
        debug!("Repay {} clamped to {} to keep debt at floor", repay, clamped);
        return Some((clamped, floor));
    }

    // 债务已在下限，只能一次还清
    if total_out + wallet_balance >= debt {
        return Some(payoff());
    }
    None
}

/// 按占比把美元价值换算成各资产原生数量，丢弃零数量，按denom排序
fn withdraw_assets<O, R>(
    ctx: &LoopContext<'_, O, R>,
    ratios: &[AssetRatio],
    usd_value: Decimal,
) -> Vec<Asset>
where
    O: PriceOracle,
    R: SwapRouter,
{
    let amounts: BTreeMap<String, Decimal> = ratios
        .iter()
        .filter_map(|r| {
            let amount = ctx.native_amount(&r.denom, usd_value * r.ratio)?;
            (amount > Decimal::ZERO).then(|| (r.denom.clone(), amount))
        })
        .collect();

    amounts
        .into_iter()
        .map(|(denom, amount)| Asset::new(denom, amount))
        .collect()
}

fn bare_withdraw<O, R>(
    ctx: &LoopContext<'_, O, R>,
    plan: &LoopPlan,
    ratios: &[AssetRatio],
    usd_value: Decimal,
) -> Option<LoopStep>
where
    O: PriceOracle,
    R: SwapRouter,
{
    if usd_value <= Decimal::ZERO {
        return None;
    }
    let assets = withdraw_assets(ctx, ratios, usd_value);
    if assets.is_empty() {
        return None;
    }

    let value = (plan.value - usd_value).max(Decimal::ZERO);
    Some(LoopStep {
        operations: vec![Operation::Withdraw { assets }],
        value,
        debt: plan.debt,
        ltv: ctx.ltv_of(value, plan.debt),
        withdrawn: usd_value,
    })
}
