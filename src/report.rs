//! Table rendering of a pipeline report for stdout.

use comfy_table::{presets::UTF8_FULL, Attribute, Cell, CellAlignment, Color, Table};

use crate::analysis::Exploration;
use crate::domain::ForecastResult;
use crate::pipeline::{ModelRun, PipelineReport};

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

fn header(labels: impl IntoIterator<Item = String>) -> Vec<Cell> {
    labels
        .into_iter()
        .map(|l| Cell::new(l).add_attribute(Attribute::Bold))
        .collect()
}

fn number(value: f64, decimals: usize) -> Cell {
    Cell::new(format!("{value:.decimals$}")).set_alignment(CellAlignment::Right)
}

fn optional(value: Option<f64>) -> Cell {
    match value {
        Some(v) => number(v, 1),
        None => Cell::new("-").set_alignment(CellAlignment::Right),
    }
}

pub fn render(report: &PipelineReport) -> String {
    let mut out = format!(
        "Loaded {} months starting {}\n",
        report.observations, report.start
    );
    for s in report.imputation.iter().filter(|s| s.filled > 0) {
        out.push_str(&format!("  imputed {} value(s) in {}\n", s.filled, s.column));
    }
    out.push('\n');
    out.push_str(&render_exploration(&report.exploration));
    for run in &report.runs {
        out.push('\n');
        out.push_str(&render_run(run));
    }
    out
}

/// Year-by-month table with the monthly means as the last row
pub fn render_exploration(exploration: &Exploration) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(header(
        std::iter::once("year".to_string()).chain(MONTHS.iter().map(|m| m.to_string())),
    ));
    for (year, cells) in exploration.table.years.iter().zip(&exploration.table.cells) {
        let mut row = vec![Cell::new(year)];
        row.extend(cells.iter().map(|c| optional(*c)));
        table.add_row(row);
    }
    let mut means = vec![Cell::new("mean").add_attribute(Attribute::Bold)];
    means.extend(exploration.subseries.iter().map(|s| optional(s.mean)));
    table.add_row(means);

    let mut out = format!("Seasonal table: {}\n", exploration.series);
    out.push_str(&table.to_string());
    out.push('\n');
    out.push_str(&format!(
        "STL strength: trend {:.3}, seasonal {:.3}\n",
        exploration.trend_strength, exploration.seasonal_strength
    ));
    out
}

pub fn render_run(run: &ModelRun) -> String {
    let marker = if run.chosen { " [final]" } else { "" };
    let mut out = format!("{} on {}{}\n", run.result.model, run.result.series, marker);
    out.push_str(&render_forecast(&run.result));
    if let Some(acc) = &run.result.accuracy {
        out.push_str(&format!("in-sample: {acc}\n"));
    }
    out
}

/// One row per forecast month: point forecast then `lo`/`hi` per level
pub fn render_forecast(result: &ForecastResult) -> String {
    let levels = result.levels();
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(header(
        ["period".to_string(), "forecast".to_string()].into_iter().chain(
            levels
                .iter()
                .flat_map(|l| [format!("lo {l}"), format!("hi {l}")]),
        ),
    ));
    for row in &result.rows {
        let mut cells = vec![
            Cell::new(row.period),
            number(row.point, 2).fg(Color::Green),
        ];
        for bound in &row.intervals {
            cells.push(number(bound.lower, 2));
            cells.push(number(bound.upper, 2));
        }
        table.add_row(cells);
    }
    let mut out = table.to_string();
    out.push('\n');
    out
}
