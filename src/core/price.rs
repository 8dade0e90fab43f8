//! Price observations and the current-price lookup

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Latest known price per symbol.
pub type CurrentPriceMap = HashMap<String, Decimal>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricePoint {
    pub symbol: String,
    pub trade_time: DateTime<Utc>,
    pub avg_price: Decimal,
}
