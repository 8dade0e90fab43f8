//! The live dashboard: a poll-and-render loop over the warehouse.
//!
//! Every tick re-queries the chart data. Current prices and headlines are
//! refreshed on a coarser interval, and the portfolio on a coarser one
//! still. All timers live in [`DashboardState`], which is handed into
//! each tick and handed back out, so a tick is deterministic given its
//! inputs and the loop itself holds no hidden state.

use super::chart::{self, Chart};
use super::ui;
use crate::core::config::AppConfig;
use crate::core::valuation::{self, PortfolioSummary, ValueDelta};
use crate::core::{CurrentPriceMap, Headline, Warehouse, queries};
use anyhow::Result;
use chrono::{DateTime, Local};
use rust_decimal::Decimal;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

const CHART_HEIGHT: usize = 10;

#[derive(Debug, Clone, Default)]
pub struct DashboardState {
    pub last_price_refresh: Option<Instant>,
    pub last_portfolio_refresh: Option<Instant>,
    pub current_prices: CurrentPriceMap,
    pub headlines: Vec<Headline>,
    pub portfolio: Option<PortfolioPanel>,
    pub previous_total_value: Option<Decimal>,
}

impl DashboardState {
    /// Records a fresh total and returns the change since the last one.
    fn record_total(&mut self, total: Decimal) -> Option<ValueDelta> {
        let delta = self
            .previous_total_value
            .and_then(|previous| ValueDelta::between(previous, total));
        self.previous_total_value = Some(total);
        delta
    }
}

fn is_due(last: Option<Instant>, now: Instant, interval: Duration) -> bool {
    match last {
        None => true,
        Some(last) => now.saturating_duration_since(last) >= interval,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioPanel {
    pub summary: PortfolioSummary,
    pub delta: Option<ValueDelta>,
    pub updated_at: DateTime<Local>,
}

/// Everything shown on screen for one tick.
#[derive(Debug, Clone)]
pub struct Frame {
    pub charts: Vec<Chart>,
    pub portfolio: Option<PortfolioPanel>,
    pub headlines: Vec<Headline>,
    pub errors: Vec<String>,
    pub rendered_at: DateTime<Local>,
}

impl Frame {
    pub fn render(&self, width: usize) -> String {
        let mut sections = vec![format!(
            "{}  {}",
            ui::style_text("Live Crypto Price Trends", ui::StyleType::Title),
            ui::style_text(
                &self.rendered_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                ui::StyleType::Subtle
            )
        )];

        for error in &self.errors {
            sections.push(ui::style_text(error, ui::StyleType::Error));
        }

        let plot_width = width.saturating_sub(16).max(20);
        for chart in &self.charts {
            sections.push(chart.render(plot_width, CHART_HEIGHT));
        }

        if let Some(panel) = &self.portfolio {
            let mut text = panel.summary.display_as_table();
            if let Some(delta) = &panel.delta {
                text.push('\n');
                text.push_str(&delta.display());
            }
            text.push('\n');
            text.push_str(&ui::style_text(
                &format!("Updated {}", panel.updated_at.format("%H:%M:%S")),
                ui::StyleType::Subtle,
            ));
            sections.push(text);
        }

        if !self.headlines.is_empty() {
            let mut table = ui::new_styled_table();
            table.set_header(vec![
                ui::header_cell("Source"),
                ui::header_cell("Headline"),
                ui::header_cell("Link"),
            ]);
            for item in &self.headlines {
                table.add_row(vec![&item.source, &item.headline, &item.url]);
            }
            sections.push(format!(
                "{}\n{}",
                ui::style_text("Latest News", ui::StyleType::Title),
                table
            ));
        }

        let divider = format!("\n{}\n", "─".repeat(width));
        sections.join(divider.as_str())
    }
}

pub struct Dashboard<'a> {
    config: &'a AppConfig,
    warehouse: &'a dyn Warehouse,
}

impl<'a> Dashboard<'a> {
    pub fn new(config: &'a AppConfig, warehouse: &'a dyn Warehouse) -> Self {
        Dashboard { config, warehouse }
    }

    /// Runs a single refresh cycle. Query failures end up as inline errors
    /// on the frame and never abort the cycle.
    pub async fn tick(&self, mut state: DashboardState, now: Instant) -> (DashboardState, Frame) {
        let refresh = &self.config.refresh;
        let warehouse_config = &self.config.warehouse;
        let mut errors = Vec::new();

        let mut charts = Vec::with_capacity(self.config.symbols.len());
        for symbol in &self.config.symbols {
            let points = match queries::recent_prices(
                self.warehouse,
                warehouse_config,
                symbol,
                refresh.lookback_minutes,
            )
            .await
            {
                Ok(points) => points,
                Err(e) => {
                    warn!("Price query failed for {}: {:#}", symbol, e);
                    errors.push(format!("Error fetching {symbol} data: {e:#}"));
                    Vec::new()
                }
            };
            charts.push(chart::build_chart(&points, &format!("{symbol} Price Trend")));
        }

        if is_due(
            state.last_price_refresh,
            now,
            Duration::from_secs(refresh.price_interval_secs),
        ) {
            debug!("Refreshing current prices and headlines");
            let mut refreshed = true;
            match queries::current_prices(self.warehouse, warehouse_config).await {
                Ok(prices) => state.current_prices = prices,
                Err(e) => {
                    warn!("Current price query failed: {:#}", e);
                    errors.push(format!("Error fetching current prices: {e:#}"));
                    refreshed = false;
                }
            }
            match queries::headlines(
                self.warehouse,
                warehouse_config,
                self.config.news.headline_limit,
            )
            .await
            {
                Ok(headlines) => state.headlines = headlines,
                Err(e) => {
                    warn!("Headline query failed: {:#}", e);
                    errors.push(format!("Error fetching news: {e:#}"));
                    state.headlines.clear();
                }
            }
            if refreshed {
                state.last_price_refresh = Some(now);
            }
        }

        // Without a price snapshot every position would read as a full loss
        let prices_loaded = state.last_price_refresh.is_some();
        if prices_loaded
            && is_due(
                state.last_portfolio_refresh,
                now,
                Duration::from_secs(refresh.portfolio_interval_secs),
            )
        {
            debug!("Refreshing portfolio valuation");
            match self.value_portfolio(&state.current_prices).await {
                Ok(summary) => {
                    let delta = state.record_total(summary.total_current_value);
                    state.portfolio = Some(PortfolioPanel {
                        summary,
                        delta,
                        updated_at: Local::now(),
                    });
                    state.last_portfolio_refresh = Some(now);
                }
                Err(e) => {
                    warn!("Portfolio valuation failed: {:#}", e);
                    errors.push(format!("Error valuing portfolio: {e:#}"));
                }
            }
        }

        let frame = Frame {
            charts,
            portfolio: state.portfolio.clone(),
            headlines: state.headlines.clone(),
            errors,
            rendered_at: Local::now(),
        };
        (state, frame)
    }

    async fn value_portfolio(&self, prices: &CurrentPriceMap) -> Result<PortfolioSummary> {
        let inputs = queries::positions(self.warehouse, &self.config.warehouse).await?;
        let positions = valuation::normalize_positions(&inputs)?;
        Ok(valuation::value_portfolio(&positions, prices)?)
    }

    /// Repaints every `interval` until `shutdown` flips to true or its
    /// sender goes away.
    pub async fn run(&self, interval: Duration, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        info!("Dashboard starting with a {:?} refresh interval", interval);
        let term = console::Term::stdout();
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut state = DashboardState::default();

        // A dropped sender counts as a stop request
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.wait_for(|stop| *stop) => break,
            }

            // A stop request abandons a tick that is still waiting on queries
            let (next, frame) = tokio::select! {
                refreshed = self.tick(state, Instant::now()) => refreshed,
                _ = shutdown.wait_for(|stop| *stop) => break,
            };
            state = next;
            term.clear_screen()?;
            term.write_line(&frame.render(ui::term_width()))?;
        }

        info!("Dashboard stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::warehouse::{Binding, Row};
    use anyhow::anyhow;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use serde_json::json;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Serves canned rows by table name and counts statements per table.
    struct FakeWarehouse {
        btc_rows: Vec<Row>,
        current_prices: Mutex<Vec<Row>>,
        portfolio: Vec<Row>,
        fail_eth: bool,
        fail_prices: AtomicBool,
        portfolio_queries: AtomicUsize,
        price_queries: AtomicUsize,
    }

    impl FakeWarehouse {
        fn new() -> Self {
            Self {
                btc_rows: vec![
                    Row::new([
                        ("TRADE_TIME", json!("1700000060")),
                        ("AVG_PRICE", json!("25010")),
                    ]),
                    Row::new([
                        ("TRADE_TIME", json!("1700000000")),
                        ("AVG_PRICE", json!("25000")),
                    ]),
                ],
                current_prices: Mutex::new(vec![
                    Row::new([("SYMBOL", json!("BTC")), ("AVG_PRICE", json!("25000"))]),
                    Row::new([("SYMBOL", json!("ETH")), ("AVG_PRICE", json!("1800"))]),
                ]),
                portfolio: vec![
                    Row::new([
                        ("SYMBOL", json!("BTC")),
                        ("QUANTITY", json!("0.5")),
                        ("PRICE_PER_UNIT_BOUGHT", json!("20000")),
                    ]),
                    Row::new([
                        ("SYMBOL", json!("ETH")),
                        ("QUANTITY", json!(2)),
                        ("PRICE_PER_UNIT_BOUGHT", json!(1500.0)),
                    ]),
                ],
                fail_eth: true,
                fail_prices: AtomicBool::new(false),
                portfolio_queries: AtomicUsize::new(0),
                price_queries: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Warehouse for FakeWarehouse {
        async fn query(&self, statement: &str, _bindings: &[Binding]) -> Result<Vec<Row>> {
            if statement.contains("BTC_TRADING_VIEW") {
                Ok(self.btc_rows.clone())
            } else if statement.contains("ETH_TRADING_VIEW") {
                if self.fail_eth {
                    Err(anyhow!("view does not exist"))
                } else {
                    Ok(Vec::new())
                }
            } else if statement.contains("CURRENT_PRICE_VIEW") {
                self.price_queries.fetch_add(1, Ordering::SeqCst);
                if self.fail_prices.load(Ordering::SeqCst) {
                    return Err(anyhow!("warehouse suspended"));
                }
                Ok(self.current_prices.lock().unwrap().clone())
            } else if statement.contains("PORTFOLIO") {
                self.portfolio_queries.fetch_add(1, Ordering::SeqCst);
                Ok(self.portfolio.clone())
            } else if statement.contains("CRYPTO_NEWS") {
                Ok(vec![Row::new([
                    ("SOURCE", json!("CoinDesk")),
                    ("HEADLINE", json!("Bitcoin steady")),
                    ("URL", json!("https://example.com/a")),
                ])])
            } else {
                Err(anyhow!("unexpected statement: {statement}"))
            }
        }
    }

    fn config() -> AppConfig {
        serde_yaml::from_str(
            r#"
warehouse:
  base_url: "http://localhost"
  database: DB
  schema: S
"#,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_first_tick_renders_everything_and_reports_errors_inline() {
        let config = config();
        let warehouse = FakeWarehouse::new();
        let dashboard = Dashboard::new(&config, &warehouse);

        let (state, frame) = dashboard
            .tick(DashboardState::default(), Instant::now())
            .await;

        assert_eq!(frame.charts.len(), 2);
        assert!(matches!(frame.charts[0], Chart::Line { .. }));
        assert_eq!(
            frame.charts[1],
            Chart::Empty {
                title: "ETH Price Trend".to_string(),
                message: "No data available for ETH Price Trend".to_string(),
            }
        );
        assert_eq!(frame.errors.len(), 1);
        assert!(frame.errors[0].starts_with("Error fetching ETH data"));

        let panel = frame.portfolio.as_ref().expect("portfolio panel");
        assert_eq!(panel.summary.total_current_value, dec!(16100));
        assert_eq!(panel.summary.total_profit_loss, dec!(3100));
        assert!(panel.delta.is_none());
        assert_eq!(frame.headlines.len(), 1);

        assert_eq!(state.previous_total_value, Some(dec!(16100)));
        assert!(state.last_price_refresh.is_some());
        assert!(state.last_portfolio_refresh.is_some());

        let rendered = frame.render(100);
        assert!(rendered.contains("BTC Price Trend"));
        assert!(rendered.contains("No data available for ETH Price Trend"));
        assert!(rendered.contains("Bitcoin steady"));
    }

    #[tokio::test]
    async fn test_coarse_refreshes_are_gated_by_elapsed_time() {
        let config = config();
        let warehouse = FakeWarehouse::new();
        let dashboard = Dashboard::new(&config, &warehouse);
        let start = Instant::now();

        let (state, _) = dashboard.tick(DashboardState::default(), start).await;
        let (state, frame) = dashboard
            .tick(state, start + Duration::from_secs(5))
            .await;
        assert_eq!(warehouse.price_queries.load(Ordering::SeqCst), 1);
        assert_eq!(warehouse.portfolio_queries.load(Ordering::SeqCst), 1);
        // The previous panel stays on screen between refreshes
        assert!(frame.portfolio.is_some());

        *warehouse.current_prices.lock().unwrap() = vec![
            Row::new([("SYMBOL", json!("BTC")), ("AVG_PRICE", json!("26000"))]),
            Row::new([("SYMBOL", json!("ETH")), ("AVG_PRICE", json!("1800"))]),
        ];
        let (state, _) = dashboard
            .tick(state, start + Duration::from_secs(60))
            .await;
        assert_eq!(warehouse.price_queries.load(Ordering::SeqCst), 2);
        assert_eq!(warehouse.portfolio_queries.load(Ordering::SeqCst), 1);
        assert_eq!(state.current_prices["BTC"], dec!(26000));

        let (state, frame) = dashboard
            .tick(state, start + Duration::from_secs(900))
            .await;
        assert_eq!(warehouse.portfolio_queries.load(Ordering::SeqCst), 2);
        let panel = frame.portfolio.unwrap();
        assert_eq!(panel.summary.total_current_value, dec!(16600));
        let delta = panel.delta.unwrap();
        assert_eq!(delta.delta, dec!(500));
        assert_eq!(state.previous_total_value, Some(dec!(16600)));
    }

    #[tokio::test]
    async fn test_valuation_error_is_inline_and_keeps_previous_panel() {
        let config = config();
        let mut warehouse = FakeWarehouse::new();
        warehouse.fail_eth = false;
        let start = Instant::now();

        let (state, _) = Dashboard::new(&config, &warehouse)
            .tick(DashboardState::default(), start)
            .await;
        assert!(state.portfolio.is_some());

        warehouse.portfolio = vec![Row::new([
            ("SYMBOL", json!("DOGE")),
            ("QUANTITY", json!("100")),
            ("PRICE_PER_UNIT_BOUGHT", json!("0")),
        ])];
        let (state, frame) = Dashboard::new(&config, &warehouse)
            .tick(state, start + Duration::from_secs(900))
            .await;

        assert_eq!(frame.errors.len(), 1);
        assert!(frame.errors[0].contains("Division by zero"));
        assert_eq!(
            frame.portfolio.unwrap().summary.total_current_value,
            dec!(16100)
        );
        assert_eq!(state.previous_total_value, Some(dec!(16100)));
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown_signal() {
        let config = config();
        let warehouse = FakeWarehouse::new();
        let dashboard = Dashboard::new(&config, &warehouse);
        let (tx, rx) = watch::channel(false);

        let stopper = async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            tx.send(true).unwrap();
        };
        let (result, _) = tokio::join!(dashboard.run(Duration::from_millis(10), rx), stopper);
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_portfolio_waits_for_first_price_snapshot() {
        let config = config();
        let warehouse = FakeWarehouse::new();
        warehouse.fail_prices.store(true, Ordering::SeqCst);
        let dashboard = Dashboard::new(&config, &warehouse);
        let start = Instant::now();

        let (state, frame) = dashboard.tick(DashboardState::default(), start).await;
        assert!(frame.portfolio.is_none());
        assert!(
            frame
                .errors
                .iter()
                .any(|e| e.starts_with("Error fetching current prices"))
        );
        assert_eq!(warehouse.portfolio_queries.load(Ordering::SeqCst), 0);
        assert!(state.last_portfolio_refresh.is_none());
        assert!(state.previous_total_value.is_none());

        warehouse.fail_prices.store(false, Ordering::SeqCst);
        let (state, frame) = dashboard
            .tick(state, start + Duration::from_secs(5))
            .await;
        assert_eq!(warehouse.portfolio_queries.load(Ordering::SeqCst), 1);
        assert_eq!(
            frame.portfolio.unwrap().summary.total_current_value,
            dec!(16100)
        );
        assert_eq!(state.previous_total_value, Some(dec!(16100)));
    }

    /// Warehouse whose statements never complete.
    struct StalledWarehouse;

    #[async_trait]
    impl Warehouse for StalledWarehouse {
        async fn query(&self, _statement: &str, _bindings: &[Binding]) -> Result<Vec<Row>> {
            std::future::pending::<()>().await;
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_run_stops_while_a_query_is_stalled() {
        let config = config();
        let warehouse = StalledWarehouse;
        let dashboard = Dashboard::new(&config, &warehouse);
        let (tx, rx) = watch::channel(false);

        let stopper = async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            tx.send(true).unwrap();
            // Hold the sender so only the stop value ends the loop
            tokio::time::sleep(Duration::from_secs(5)).await;
        };
        let run = tokio::time::timeout(
            Duration::from_secs(2),
            dashboard.run(Duration::from_millis(10), rx),
        );
        let (result, _) = tokio::join!(run, stopper);
        assert!(
            matches!(result, Ok(Ok(()))),
            "dashboard did not stop within 2s of the stop signal"
        );
    }

    #[test]
    fn test_is_due() {
        let now = Instant::now();
        let interval = Duration::from_secs(60);
        assert!(is_due(None, now, interval));
        assert!(!is_due(Some(now), now + Duration::from_secs(59), interval));
        assert!(is_due(Some(now), now + Duration::from_secs(60), interval));
    }
}
