use std::collections::HashMap;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::debug;

use common::types::{scale_factor, Basket, Operation, PriceOracle, MICRO_DECIMALS};
use crate::error::RouterError;

/// 兑换报价：待执行的操作以及保证的最小输出
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapQuote {
    pub operation: Operation,
    pub min_amount_out: Decimal,
}

/// 兑换路由 - 外部协作方，引擎只通过它拿到最小输出
pub trait SwapRouter {
    fn quote_swap(
        &self,
        from: &str,
        to: &str,
        amount_in: Decimal,
        slippage_pct: Decimal,
    ) -> Result<SwapQuote, RouterError>;
}

impl<R: SwapRouter + ?Sized> SwapRouter for &R {
    fn quote_swap(
        &self,
        from: &str,
        to: &str,
        amount_in: Decimal,
        slippage_pct: Decimal,
    ) -> Result<SwapQuote, RouterError> {
        (**self).quote_swap(from, to, amount_in, slippage_pct)
    }
}

/// 基于预言机价格的参考路由，只报价与信用资产之间的兑换
pub struct OracleSwapRouter<'a, O: PriceOracle> {
    prices: &'a O,
    credit_denom: String,
    credit_price: Decimal,
    decimals: HashMap<String, u32>,
}

impl<'a, O: PriceOracle> OracleSwapRouter<'a, O> {
    pub fn new(prices: &'a O, basket: &Basket, credit_decimals: u32) -> Self {
        let mut decimals: HashMap<String, u32> = basket
            .collateral_types
            .iter()
            .map(|c| (c.denom.clone(), c.decimals))
            .collect();
        decimals.insert(basket.credit_denom.clone(), credit_decimals);

        Self {
            prices,
            credit_denom: basket.credit_denom.clone(),
            credit_price: basket.credit_price,
            decimals,
        }
    }

    fn price(&self, denom: &str) -> Result<Decimal, RouterError> {
        let price = if denom == self.credit_denom {
            self.credit_price
        } else {
            self.prices.price_or_zero(denom)
        };

        if price <= Decimal::ZERO {
            return Err(RouterError::PriceUnavailable(denom.to_string()));
        }
        Ok(price)
    }

    fn decimals(&self, denom: &str) -> u32 {
        self.decimals.get(denom).copied().unwrap_or(MICRO_DECIMALS)
    }
}

impl<'a, O: PriceOracle> SwapRouter for OracleSwapRouter<'a, O> {
    fn quote_swap(
        &self,
        from: &str,
        to: &str,
        amount_in: Decimal,
        slippage_pct: Decimal,
    ) -> Result<SwapQuote, RouterError> {
        if from == to {
            return Err(RouterError::SameDenom(from.to_string()));
        }
        if from != self.credit_denom && to != self.credit_denom {
            return Err(RouterError::NoRoute {
                from: from.to_string(),
                to: to.to_string(),
            });
        }

        let value_in = amount_in / scale_factor(self.decimals(from)) * self.price(from)?;
        let expected_out = value_in / self.price(to)? * scale_factor(self.decimals(to));
        let min_amount_out = (expected_out * (Decimal::ONE - slippage_pct / dec!(100))).floor();

        debug!(
            "Quoted {} {} -> {} (min out {})",
            amount_in, from, to, min_amount_out
        );

        Ok(SwapQuote {
            operation: Operation::Swap {
                from: from.to_string(),
                to: to.to_string(),
                amount_in,
                min_out: min_amount_out,
            },
            min_amount_out,
        })
    }
}
