use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// 借款上限的预警比例（达到可借LTV的90%即为中等风险）
const WARNING_BAND: Decimal = dec!(0.9);

/// 仓位健康等级
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,      // 远离可借上限
    Medium,   // 接近可借上限
    High,     // 超过可借LTV，不能再借也不能取出
    Critical, // 达到清算LTV
}

/// 按当前LTV相对可借/清算LTV划分风险等级
pub fn classify(ltv: Decimal, borrow_ltv: Decimal, liquidation_ltv: Decimal) -> RiskLevel {
    if ltv.is_zero() {
        return RiskLevel::Low;
    }

    let level = if liquidation_ltv > Decimal::ZERO && ltv >= liquidation_ltv {
        RiskLevel::Critical
    } else if ltv > borrow_ltv {
        RiskLevel::High
    } else if ltv >= borrow_ltv * WARNING_BAND {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    };

    if level >= RiskLevel::High {
        warn!(
            "Position health {:?}: ltv={}, borrow_ltv={}, liquidation_ltv={}",
            level, ltv, borrow_ltv, liquidation_ltv
        );
    }

    level
}
