use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use common::config::EngineConfig;
use common::types::{to_native, Operation};
use risk_engine::{
    plan_loop, plan_unloop, summarize, InitialSnapshot, LeverageRequest, LoopContext, LoopPlan,
    OracleSwapRouter, RiskMetrics, SummaryInputs, SummaryState, UnloopRequest,
};

use crate::scenario::{Action, Scenario};

/// 规划输出
#[derive(Debug, Serialize)]
pub struct Report {
    pub metrics: RiskMetrics,
    pub summary: SummaryState,
    pub plan: Option<LoopPlan>,
    /// 按签名上限分组后的交易
    pub transactions: Vec<Vec<Operation>>,
}

pub fn run(config: &EngineConfig, scenario: &Scenario) -> Result<Report> {
    let basket = &scenario.basket;
    let position = &scenario.position;
    let prices = &scenario.prices;
    basket.validate().context("Invalid basket")?;

    let metrics = RiskMetrics::evaluate(position, basket, prices, config);
    let snapshot = InitialSnapshot::capture(position, basket, prices, config);
    let summary = summarize(
        SummaryInputs {
            basket: Some(basket),
            position: Some(position),
            prices: Some(prices),
            snapshot: Some(&snapshot),
            edits: &scenario.edits,
        },
        config,
    );

    info!(
        "Position {}: tvl={}, ltv={}, borrow_ltv={}, level={:?}",
        position.position_id, metrics.tvl, metrics.ltv, metrics.borrow_ltv, metrics.risk_level
    );

    let router = OracleSwapRouter::new(prices, basket, config.credit_decimals);
    let ctx = LoopContext::checked(basket, prices, &router, config)?;

    // 规划从含待提交编辑的状态开始
    let preview = summary.ready().context("Vault summary not ready")?;
    let debt = to_native(preview.new_debt_amount, config.credit_decimals);

    let plan = match &scenario.action {
        Action::Summary => None,
        Action::Loop { target_ltv, max_loops } => {
            let request = LeverageRequest::from_summary(
                preview,
                debt,
                *target_ltv,
                max_loops.unwrap_or_else(|| config.default_max_loops()),
            );
            Some(plan_loop(&ctx, &request).context("Failed to plan loop")?)
        }
        Action::Unloop { desired_withdrawal, max_loops } => {
            let request = UnloopRequest::from_summary(
                preview,
                debt,
                *desired_withdrawal,
                scenario.wallet_balance,
                max_loops.unwrap_or_else(|| config.default_max_loops()),
            );
            Some(plan_unloop(&ctx, &request).context("Failed to plan unloop")?)
        }
    };

    let transactions = plan
        .as_ref()
        .map(|plan| plan.batches(config.signer_batch_ceiling))
        .unwrap_or_default();

    Ok(Report {
        metrics,
        summary,
        plan,
        transactions,
    })
}
