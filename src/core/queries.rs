//! Typed warehouse queries used by the dashboard.
use crate::core::config::{WarehouseConfig, is_valid_symbol};
use crate::core::decimal::{RawNumber, to_decimal};
use crate::core::news::Headline;
use crate::core::price::{CurrentPriceMap, PricePoint};
use crate::core::valuation::PositionInput;
use crate::core::warehouse::{Binding, Row, Warehouse};
use anyhow::{Context, Result, anyhow, bail};
use chrono::{DateTime, Utc};
use tracing::debug;

/// Price observations for `symbol` within the last `lookback_minutes`,
/// newest first.
pub async fn recent_prices(
    warehouse: &dyn Warehouse,
    config: &WarehouseConfig,
    symbol: &str,
    lookback_minutes: i64,
) -> Result<Vec<PricePoint>> {
    if !is_valid_symbol(symbol) {
        bail!("Invalid symbol {symbol:?}");
    }
    let view = config.qualify(&format!("{}_TRADING_VIEW", symbol.to_uppercase()));
    let statement = format!(
        "SELECT TRADE_TIME, AVG_PRICE FROM {view} \
         WHERE TRADE_TIME > DATEADD(minutes, -?, CURRENT_TIMESTAMP()) \
         ORDER BY TRADE_TIME DESC"
    );
    let rows = warehouse
        .query(&statement, &[Binding::Fixed(lookback_minutes)])
        .await?;
    debug!(symbol, rows = rows.len(), "Fetched recent prices");

    rows.iter()
        .map(|row| -> Result<PricePoint> {
            Ok(PricePoint {
                symbol: symbol.to_string(),
                trade_time: parse_trade_time(row)?,
                avg_price: decimal_column(row, "AVG_PRICE")
                    .with_context(|| format!("Bad AVG_PRICE for {symbol}"))?,
            })
        })
        .collect()
}

/// Latest price per symbol from the current-price view.
pub async fn current_prices(
    warehouse: &dyn Warehouse,
    config: &WarehouseConfig,
) -> Result<CurrentPriceMap> {
    let statement = format!(
        "SELECT SYMBOL, AVG_PRICE FROM {}",
        config.qualify(&config.tables.current_prices)
    );
    let rows = warehouse.query(&statement, &[]).await?;

    let mut prices = CurrentPriceMap::new();
    for row in &rows {
        let symbol = row
            .text("SYMBOL")
            .ok_or_else(|| anyhow!("Current price row without SYMBOL"))?;
        let price =
            decimal_column(row, "AVG_PRICE").with_context(|| format!("Bad price for {symbol}"))?;
        prices.insert(symbol, price);
    }
    Ok(prices)
}

/// Held positions, left un-normalized so valuation owns the conversion.
pub async fn positions(
    warehouse: &dyn Warehouse,
    config: &WarehouseConfig,
) -> Result<Vec<PositionInput>> {
    let statement = format!(
        "SELECT SYMBOL, QUANTITY, PRICE_PER_UNIT_BOUGHT FROM {}",
        config.qualify(&config.tables.portfolio)
    );
    let rows = warehouse.query(&statement, &[]).await?;

    rows.iter()
        .map(|row| -> Result<PositionInput> {
            let symbol = row
                .text("SYMBOL")
                .ok_or_else(|| anyhow!("Portfolio row without SYMBOL"))?;
            Ok(PositionInput {
                quantity: RawNumber::from_json(row.get("QUANTITY"))?,
                price_per_unit_bought: RawNumber::from_json(row.get("PRICE_PER_UNIT_BOUGHT"))?,
                symbol,
            })
        })
        .collect()
}

pub async fn headlines(
    warehouse: &dyn Warehouse,
    config: &WarehouseConfig,
    limit: i64,
) -> Result<Vec<Headline>> {
    let statement = format!(
        "SELECT SOURCE, HEADLINE, URL FROM {} LIMIT ?",
        config.qualify(&config.tables.news)
    );
    let rows = warehouse.query(&statement, &[Binding::Fixed(limit)]).await?;

    Ok(rows
        .iter()
        .filter_map(|row| {
            Some(Headline {
                headline: row.text("HEADLINE")?,
                source: row.text("SOURCE").unwrap_or_default(),
                url: row.text("URL").unwrap_or_default(),
            })
        })
        .collect())
}

fn decimal_column(row: &Row, column: &str) -> Result<rust_decimal::Decimal> {
    Ok(to_decimal(&RawNumber::from_json(row.get(column))?)?)
}

fn parse_trade_time(row: &Row) -> Result<DateTime<Utc>> {
    let raw = row
        .text("TRADE_TIME")
        .ok_or_else(|| anyhow!("Row without TRADE_TIME"))?;
    parse_timestamp(&raw)
}

/// Accepts epoch seconds with an optional fraction and optional trailing
/// offset token (`1700000000.123000000 1440`), or RFC 3339.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    let trimmed = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }

    let epoch = trimmed
        .split_whitespace()
        .next()
        .ok_or_else(|| anyhow!("Empty timestamp"))?;
    let (secs, frac) = epoch.split_once('.').unwrap_or((epoch, ""));
    let secs: i64 = secs
        .parse()
        .with_context(|| format!("Invalid timestamp: {raw}"))?;
    let nanos: u32 = if frac.is_empty() {
        0
    } else {
        let digits: String = frac.chars().chain(std::iter::repeat('0')).take(9).collect();
        digits
            .parse()
            .with_context(|| format!("Invalid timestamp fraction: {raw}"))?
    };
    DateTime::from_timestamp(secs, nanos).ok_or_else(|| anyhow!("Timestamp out of range: {raw}"))
}
