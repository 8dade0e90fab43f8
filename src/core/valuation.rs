//! Profit/loss valuation of a portfolio against current prices.
use crate::core::decimal::{DecimalError, RawNumber, to_decimal};
use crate::core::price::CurrentPriceMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValuationError {
    #[error("Division by zero while computing percent change for {0}")]
    DivisionByZero(String),
    #[error("Arithmetic overflow while valuing {0}")]
    Overflow(String),
    #[error("Invalid number for {symbol}: {source}")]
    InvalidNumber {
        symbol: String,
        #[source]
        source: DecimalError,
    },
}

/// A held position as it comes off the wire, before normalization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionInput {
    pub symbol: String,
    #[serde(default)]
    pub quantity: RawNumber,
    #[serde(default)]
    pub price_per_unit_bought: RawNumber,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortfolioPosition {
    pub symbol: String,
    pub quantity: Decimal,
    pub price_per_unit_bought: Decimal,
}

impl TryFrom<&PositionInput> for PortfolioPosition {
    type Error = ValuationError;

    fn try_from(input: &PositionInput) -> Result<Self, Self::Error> {
        let convert = |raw: &RawNumber| {
            to_decimal(raw).map_err(|source| ValuationError::InvalidNumber {
                symbol: input.symbol.clone(),
                source,
            })
        };
        Ok(PortfolioPosition {
            symbol: input.symbol.clone(),
            quantity: convert(&input.quantity)?,
            price_per_unit_bought: convert(&input.price_per_unit_bought)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PositionValuation {
    pub symbol: String,
    pub quantity: Decimal,
    pub price_per_unit_bought: Decimal,
    pub current_price: Decimal,
    pub current_value: Decimal,
    pub bought_value: Decimal,
    pub profit_loss: Decimal,
    pub percent_change: Decimal,
    /// False when the symbol had no current price and was valued at zero.
    pub price_available: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortfolioSummary {
    pub positions: Vec<PositionValuation>,
    pub total_profit_loss: Decimal,
    pub total_current_value: Decimal,
    pub total_bought_value: Decimal,
    /// `None` only for an empty portfolio.
    pub overall_percent_change: Option<Decimal>,
}

/// Change of the portfolio's total value since the previous valuation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValueDelta {
    pub delta: Decimal,
    pub delta_percent: Option<Decimal>,
}

impl ValueDelta {
    /// `None` when the difference itself overflows.
    pub fn between(previous: Decimal, current: Decimal) -> Option<Self> {
        let delta = current.checked_sub(previous)?;
        let delta_percent = delta
            .checked_div(previous)
            .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED));
        Some(ValueDelta {
            delta,
            delta_percent,
        })
    }
}

pub fn normalize_positions(
    inputs: &[PositionInput],
) -> Result<Vec<PortfolioPosition>, ValuationError> {
    inputs.iter().map(PortfolioPosition::try_from).collect()
}

pub fn normalize_prices(
    raw: &HashMap<String, RawNumber>,
) -> Result<CurrentPriceMap, ValuationError> {
    raw.iter()
        .map(|(symbol, value)| {
            to_decimal(value)
                .map(|price| (symbol.clone(), price))
                .map_err(|source| ValuationError::InvalidNumber {
                    symbol: symbol.clone(),
                    source,
                })
        })
        .collect()
}

fn percent_change(from: Decimal, to: Decimal, symbol: &str) -> Result<Decimal, ValuationError> {
    if from.is_zero() {
        return Err(ValuationError::DivisionByZero(symbol.to_string()));
    }
    let overflow = || ValuationError::Overflow(symbol.to_string());
    to.checked_sub(from)
        .ok_or_else(overflow)?
        .checked_div(from)
        .ok_or_else(overflow)?
        .checked_mul(Decimal::ONE_HUNDRED)
        .ok_or_else(overflow)
}

/// Values a single position. A symbol missing from `prices` is valued at zero.
pub fn value_position(
    position: &PortfolioPosition,
    prices: &CurrentPriceMap,
) -> Result<PositionValuation, ValuationError> {
    let symbol = position.symbol.as_str();
    let overflow = || ValuationError::Overflow(symbol.to_string());

    let (current_price, price_available) = match prices.get(symbol) {
        Some(price) => (*price, true),
        None => (Decimal::ZERO, false),
    };

    let current_value = position
        .quantity
        .checked_mul(current_price)
        .ok_or_else(overflow)?;
    let bought_value = position
        .quantity
        .checked_mul(position.price_per_unit_bought)
        .ok_or_else(overflow)?;
    let profit_loss = current_value
        .checked_sub(bought_value)
        .ok_or_else(overflow)?;
    let percent_change = percent_change(position.price_per_unit_bought, current_price, symbol)?;

    Ok(PositionValuation {
        symbol: position.symbol.clone(),
        quantity: position.quantity,
        price_per_unit_bought: position.price_per_unit_bought,
        current_price,
        current_value,
        bought_value,
        profit_loss,
        percent_change,
        price_available,
    })
}

/// Values every position and aggregates the totals.
///
/// Pure: the same positions and prices always produce the same summary.
/// A zero purchase price, or a zero total bought value for a non-empty
/// portfolio, is reported as [`ValuationError::DivisionByZero`].
pub fn value_portfolio(
    positions: &[PortfolioPosition],
    prices: &CurrentPriceMap,
) -> Result<PortfolioSummary, ValuationError> {
    let valuations = positions
        .iter()
        .map(|p| value_position(p, prices))
        .collect::<Result<Vec<_>, _>>()?;

    let overflow = || ValuationError::Overflow("portfolio totals".to_string());
    let mut total_profit_loss = Decimal::ZERO;
    let mut total_current_value = Decimal::ZERO;
    let mut total_bought_value = Decimal::ZERO;
    for v in &valuations {
        total_profit_loss = total_profit_loss
            .checked_add(v.profit_loss)
            .ok_or_else(overflow)?;
        total_current_value = total_current_value
            .checked_add(v.current_value)
            .ok_or_else(overflow)?;
        total_bought_value = total_bought_value
            .checked_add(v.bought_value)
            .ok_or_else(overflow)?;
    }

    let overall_percent_change = if valuations.is_empty() {
        None
    } else {
        Some(percent_change(
            total_bought_value,
            total_current_value,
            "portfolio total",
        )?)
    };

    Ok(PortfolioSummary {
        positions: valuations,
        total_profit_loss,
        total_current_value,
        total_bought_value,
        overall_percent_change,
    })
}
