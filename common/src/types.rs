use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::errors::ConfigError;

/// 协议默认的最小单位精度（micro-units）
pub const MICRO_DECIMALS: u32 = 6;

/// 允许的最大资产精度，Decimal最多28位小数
pub const MAX_DECIMALS: u32 = 18;

/// 10^decimals，用于原生单位与显示单位之间的换算；decimals不超过MAX_DECIMALS
pub fn scale_factor(decimals: u32) -> Decimal {
    Decimal::from_i128_with_scale(10i128.pow(decimals), 0)
}

/// 原生最小单位 -> 显示单位
pub fn to_display(amount: Decimal, decimals: u32) -> Decimal {
    amount / scale_factor(decimals)
}

/// 显示单位 -> 原生最小单位（向下取整）
pub fn to_native(amount: Decimal, decimals: u32) -> Decimal {
    (amount * scale_factor(decimals)).floor()
}

/// 资产数量，amount 为原生最小单位
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub denom: String,
    pub amount: Decimal,
}

impl Asset {
    pub fn new(denom: impl Into<String>, amount: Decimal) -> Self {
        Self {
            denom: denom.into(),
            amount,
        }
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.denom)
    }
}

/// 抵押品类型配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollateralType {
    pub denom: String,
    #[serde(default)]
    pub symbol: String,
    #[serde(default = "default_decimals")]
    pub decimals: u32,
    /// 清算LTV（比例，0.7 = 70%），缺失视为0
    #[serde(default)]
    pub max_ltv: Option<Decimal>,
    /// 可借LTV（比例），缺失视为0
    #[serde(default)]
    pub max_borrow_ltv: Option<Decimal>,
    /// 年化利率（比例）
    #[serde(default)]
    pub interest_rate: Option<Decimal>,
    #[serde(default = "default_rate_index")]
    pub rate_index: Decimal,
}

fn default_decimals() -> u32 {
    MICRO_DECIMALS
}

fn default_rate_index() -> Decimal {
    Decimal::ONE
}

/// 单资产供应上限
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupplyCap {
    pub denom: String,
    #[serde(default)]
    pub current_supply: Decimal,
    /// 资产在篮子TVL中的最大占比
    pub supply_cap_ratio: Decimal,
}

/// 协议篮子配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Basket {
    pub credit_denom: String,
    pub credit_price: Decimal,
    pub collateral_types: Vec<CollateralType>,
    #[serde(default)]
    pub supply_caps: Vec<SupplyCap>,
}

impl Basket {
    /// 构建 denom -> 抵押品配置 的索引
    pub fn index(&self) -> BasketIndex<'_> {
        BasketIndex::new(self)
    }

    /// 校验抵押品精度，避免换算溢出
    pub fn validate(&self) -> Result<(), ConfigError> {
        for collateral in &self.collateral_types {
            if collateral.decimals > MAX_DECIMALS {
                return Err(ConfigError::InvalidAssetDecimals {
                    denom: collateral.denom.clone(),
                    decimals: collateral.decimals,
                });
            }
        }
        Ok(())
    }
}

/// 篮子索引，按denom O(1)查找
#[derive(Debug, Clone)]
pub struct BasketIndex<'a> {
    basket: &'a Basket,
    assets: HashMap<&'a str, &'a CollateralType>,
    caps: HashMap<&'a str, &'a SupplyCap>,
}

impl<'a> BasketIndex<'a> {
    pub fn new(basket: &'a Basket) -> Self {
        let assets = basket
            .collateral_types
            .iter()
            .map(|c| (c.denom.as_str(), c))
            .collect();
        let caps = basket
            .supply_caps
            .iter()
            .map(|c| (c.denom.as_str(), c))
            .collect();

        Self { basket, assets, caps }
    }

    pub fn credit_price(&self) -> Decimal {
        self.basket.credit_price
    }

    pub fn credit_denom(&self) -> &'a str {
        &self.basket.credit_denom
    }

    pub fn get(&self, denom: &str) -> Option<&'a CollateralType> {
        self.assets.get(denom).copied()
    }

    pub fn supply_cap(&self, denom: &str) -> Option<&'a SupplyCap> {
        self.caps.get(denom).copied()
    }

    /// 未登记的资产按协议默认精度处理
    pub fn decimals(&self, denom: &str) -> u32 {
        self.get(denom).map(|c| c.decimals).unwrap_or(MICRO_DECIMALS)
    }

    pub fn symbol(&self, denom: &str) -> Option<&'a str> {
        self.get(denom).map(|c| c.symbol.as_str())
    }
}

/// 用户仓位快照
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub position_id: u64,
    pub collateral_assets: Vec<Asset>,
    /// 债务，信用资产最小单位
    #[serde(default)]
    pub debt_amount: Decimal,
}

/// 预言机报价
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub denom: String,
    pub price: Decimal,
}

/// 价格来源
pub trait PriceOracle {
    fn price_of(&self, denom: &str) -> Option<PriceQuote>;

    /// 缺失价格视为0
    fn price_or_zero(&self, denom: &str) -> Decimal {
        self.price_of(denom)
            .map(|q| q.price)
            .unwrap_or(Decimal::ZERO)
    }
}

/// 内存价格表
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PriceBook {
    prices: BTreeMap<String, Decimal>,
}

impl PriceBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_price(mut self, denom: impl Into<String>, price: Decimal) -> Self {
        self.insert(denom, price);
        self
    }

    pub fn insert(&mut self, denom: impl Into<String>, price: Decimal) {
        self.prices.insert(denom.into(), price);
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}

impl PriceOracle for PriceBook {
    fn price_of(&self, denom: &str) -> Option<PriceQuote> {
        self.prices.get(denom).map(|price| PriceQuote {
            denom: denom.to_string(),
            price: *price,
        })
    }
}

/// 与链上编码无关的仓位操作
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Operation {
    Mint {
        amount: Decimal,
    },
    Swap {
        from: String,
        to: String,
        amount_in: Decimal,
        min_out: Decimal,
    },
    Deposit {
        assets: Vec<Asset>,
    },
    Withdraw {
        assets: Vec<Asset>,
    },
    Repay {
        amount: Decimal,
    },
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::Mint { .. } => OperationKind::Mint,
            Operation::Swap { .. } => OperationKind::Swap,
            Operation::Deposit { .. } => OperationKind::Deposit,
            Operation::Withdraw { .. } => OperationKind::Withdraw,
            Operation::Repay { .. } => OperationKind::Repay,
        }
    }

    /// 是否包含零数量（链上会拒绝）
    pub fn has_zero_amount(&self) -> bool {
        match self {
            Operation::Mint { amount } | Operation::Repay { amount } => amount.is_zero(),
            Operation::Swap { amount_in, .. } => amount_in.is_zero(),
            Operation::Deposit { assets } | Operation::Withdraw { assets } => {
                assets.is_empty() || assets.iter().any(|a| a.amount.is_zero())
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    Mint,
    Swap,
    Deposit,
    Withdraw,
    Repay,
}
