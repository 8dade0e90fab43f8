pub mod finnhub;
pub mod snowflake;
