pub mod plan;
pub mod leverage;
pub mod deleverage;


pub use plan::{LoopPlan, LoopStep};
pub use leverage::{plan_loop, LeverageRequest};
pub use deleverage::{plan_unloop, UnloopRequest};

use rust_decimal::Decimal;

use common::config::EngineConfig;
use common::types::{to_native, Basket, BasketIndex, PriceOracle};
use crate::error::Result;
use crate::risk_control::risk_calculator::{debt_value, ltv};
use crate::swap::SwapRouter;

/// 循环规划所需的只读上下文
pub struct LoopContext<'a, O: PriceOracle, R: SwapRouter> {
    pub index: BasketIndex<'a>,
    pub prices: &'a O,
    pub router: &'a R,
    pub config: &'a EngineConfig,
}

impl<'a, O: PriceOracle, R: SwapRouter> LoopContext<'a, O, R> {
    pub fn new(basket: &'a Basket, prices: &'a O, router: &'a R, config: &'a EngineConfig) -> Self {
        Self {
            index: basket.index(),
            prices,
            router,
            config,
        }
    }

    /// 先校验配置与篮子精度，避免以非法参数规划
    pub fn checked(
        basket: &'a Basket,
        prices: &'a O,
        router: &'a R,
        config: &'a EngineConfig,
    ) -> Result<Self> {
        config.validate()?;
        basket.validate()?;
        Ok(Self::new(basket, prices, router, config))
    }

    pub fn credit_denom(&self) -> &'a str {
        self.index.credit_denom()
    }

    pub fn credit_price(&self) -> Decimal {
        self.index.credit_price()
    }

    /// 当前LTV百分比（debt为信用资产最小单位）
    pub fn ltv_of(&self, value: Decimal, debt: Decimal) -> Decimal {
        ltv(
            value,
            debt_value(debt, self.credit_price(), self.config.credit_decimals),
        )
    }

    /// 美元价值 -> 资产原生数量；无价格时为None
    pub fn native_amount(&self, denom: &str, usd_value: Decimal) -> Option<Decimal> {
        let price = self.prices.price_of(denom)?.price;
        if price <= Decimal::ZERO {
            return None;
        }
        Some(to_native(usd_value / price, self.index.decimals(denom)))
    }
}
