use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use common::types::{Operation, OperationKind};

/// 一次迭代：一个消息组及其后的投影状态
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopStep {
    pub operations: Vec<Operation>,
    pub value: Decimal,     // 迭代后的抵押品价值
    pub debt: Decimal,      // 迭代后的债务（最小单位）
    pub ltv: Decimal,       // 迭代后的LTV
    pub withdrawn: Decimal, // 本次取出的价值（滑点前）
}

/// 循环规划结果，同时作为迭代的累加器
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopPlan {
    pub steps: Vec<LoopStep>,
    pub value: Decimal,
    pub debt: Decimal,
    pub ltv: Decimal,
    /// 累计取出的价值（滑点前）
    pub withdrawn: Decimal,
}

impl LoopPlan {
    pub fn start(value: Decimal, debt: Decimal, ltv: Decimal) -> Self {
        Self {
            steps: Vec::new(),
            value,
            debt,
            ltv,
            withdrawn: Decimal::ZERO,
        }
    }

    /// 约束不满足时的空结果
    pub fn aborted() -> Self {
        Self::start(Decimal::ZERO, Decimal::ZERO, Decimal::ZERO)
    }

    /// 吸收一次迭代，返回新的累加状态
    pub fn advance(mut self, step: LoopStep) -> Self {
        self.value = step.value;
        self.debt = step.debt;
        self.ltv = step.ltv;
        self.withdrawn += step.withdrawn;
        self.steps.push(step);
        self
    }

    pub fn iterations(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn operations(&self) -> impl Iterator<Item = &Operation> {
        self.steps.iter().flat_map(|s| s.operations.iter())
    }

    pub fn into_operations(self) -> Vec<Operation> {
        self.steps.into_iter().flat_map(|s| s.operations).collect()
    }

    pub fn count(&self, kind: OperationKind) -> usize {
        self.operations().filter(|op| op.kind() == kind).count()
    }

    /// 按签名设备上限把迭代分组成交易，每笔最多ceiling个消息组
    pub fn batches(&self, ceiling: usize) -> Vec<Vec<Operation>> {
        self.steps
            .chunks(ceiling.max(1))
            .map(|chunk| {
                chunk
                    .iter()
                    .flat_map(|s| s.operations.iter().cloned())
                    .collect()
            })
            .collect()
    }
}
