//! Line charts of recent prices, drawn as text.
use super::ui;
use crate::core::price::PricePoint;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

/// Price axis bounds: the observed range padded by 10% on both ends.
/// Falls back to the unpadded range when padding would overflow.
pub fn padded_domain(points: &[PricePoint]) -> Option<(Decimal, Decimal)> {
    let min = points.iter().map(|p| p.avg_price).min()?;
    let max = points.iter().map(|p| p.avg_price).max()?;
    let padded = max
        .checked_sub(min)
        .and_then(|range| range.checked_mul(Decimal::new(1, 1)))
        .and_then(|pad| Some((min.checked_sub(pad)?, max.checked_add(pad)?)));
    Some(padded.unwrap_or((min, max)))
}

#[derive(Debug, Clone, PartialEq)]
pub enum Chart {
    Empty {
        title: String,
        message: String,
    },
    Line {
        title: String,
        /// Oldest first.
        points: Vec<(DateTime<Utc>, Decimal)>,
        domain: (Decimal, Decimal),
    },
}

pub fn build_chart(points: &[PricePoint], title: &str) -> Chart {
    let Some(domain) = padded_domain(points) else {
        return Chart::Empty {
            title: title.to_string(),
            message: format!("No data available for {title}"),
        };
    };

    let mut series: Vec<(DateTime<Utc>, Decimal)> = points
        .iter()
        .map(|p| (p.trade_time, p.avg_price))
        .collect();
    series.sort_by_key(|(time, _)| *time);

    Chart::Line {
        title: title.to_string(),
        points: series,
        domain,
    }
}

impl Chart {
    pub fn title(&self) -> &str {
        match self {
            Chart::Empty { title, .. } | Chart::Line { title, .. } => title,
        }
    }

    /// Renders the chart into `height` plot rows of `width` columns, plus
    /// a title line and an x-axis line.
    pub fn render(&self, width: usize, height: usize) -> String {
        let (points, domain) = match self {
            Chart::Empty { message, .. } => {
                return format!(
                    "{}\n{}",
                    ui::style_text(self.title(), ui::StyleType::Title),
                    ui::style_text(message, ui::StyleType::Subtle)
                );
            }
            Chart::Line { points, domain, .. } => (points, *domain),
        };

        let width = width.max(2);
        let height = height.max(2);
        let (low, high) = domain;
        let top_label = ui::format_amount(high);
        let bottom_label = ui::format_amount(low);
        let label_width = top_label.len().max(bottom_label.len());

        let mut grid = vec![vec![' '; width]; height];
        let span = (high - low).to_f64().unwrap_or(0.0);
        let low_f = low.to_f64().unwrap_or(0.0);
        for (col, price) in sample_columns(points, width) {
            let row = if span > 0.0 {
                let ratio = (price.to_f64().unwrap_or(low_f) - low_f) / span;
                ((1.0 - ratio) * (height - 1) as f64).round() as usize
            } else {
                height / 2
            };
            grid[row.min(height - 1)][col] = '•';
        }

        let mut lines = vec![ui::style_text(self.title(), ui::StyleType::Title)];
        for (i, row) in grid.iter().enumerate() {
            let label = if i == 0 {
                top_label.as_str()
            } else if i == height - 1 {
                bottom_label.as_str()
            } else {
                ""
            };
            let plot: String = row.iter().collect();
            lines.push(format!("{label:>label_width$} │{plot}"));
        }

        if let (Some((first, _)), Some((last, _))) = (points.first(), points.last()) {
            let start = first.format("%H:%M:%S").to_string();
            let end = last.format("%H:%M:%S").to_string();
            let gap = width.saturating_sub(start.len() + end.len()).max(1);
            lines.push(format!(
                "{:label_width$} └{start}{}{end}",
                "",
                " ".repeat(gap)
            ));
        }
        lines.join("\n")
    }
}

/// Maps the series onto plot columns, keeping the latest price per column.
fn sample_columns(points: &[(DateTime<Utc>, Decimal)], width: usize) -> Vec<(usize, Decimal)> {
    if points.len() == 1 {
        return vec![(0, points[0].1)];
    }
    let last_index = points.len() - 1;
    let mut columns: Vec<Option<Decimal>> = vec![None; width];
    for (i, (_, price)) in points.iter().enumerate() {
        let col = i * (width - 1) / last_index;
        columns[col] = Some(*price);
    }
    columns
        .into_iter()
        .enumerate()
        .filter_map(|(col, price)| price.map(|p| (col, p)))
        .collect()
}
