//! End-to-end runs over generated monthly CSV files.

use std::f64::consts::PI;
use std::io::Write;

use rstest::rstest;
use solar_forecast::config::{
    ArimaConfig, Config, NnarConfig, DEFAULT_BALANCE_FORECAST,
};
use solar_forecast::data::{derive, impute_table, Loader};
use solar_forecast::domain::{Measurement, YearMonth};
use solar_forecast::forecast::{AutoArima, Forecaster, HoltWinters, HoltWintersVariant};
use solar_forecast::pipeline::Pipeline;
use solar_forecast::{report, ForecastError};
use tempfile::{NamedTempFile, TempDir};

const HEADER: &str = "Data;Produkcja1;Produkcja2;Zakup;Sprzedaz";

/// Summer-peaking production, winter-peaking purchases.
fn month_row(year: i32, month: u32, i: usize) -> [f64; 4] {
    let phase = 2.0 * PI * (month as f64 - 4.0) / 12.0;
    let wobble = ((i * 7) % 5) as f64;
    let inv1 = 320.0 + 260.0 * phase.sin() + 2.0 * (year - 2016) as f64 + wobble;
    let inv2 = 150.0 + 120.0 * phase.sin() + wobble * 0.5;
    let bought = 420.0 - 180.0 * phase.sin() + ((i * 3) % 4) as f64;
    let sold = 210.0 + 200.0 * phase.sin() + wobble;
    [inv1, inv2, bought, sold]
}

fn csv_text(start_year: i32, months: usize, blanks: &[(usize, usize)]) -> String {
    let mut text = String::from(HEADER);
    text.push('\n');
    let start = YearMonth::new(start_year, 1).unwrap();
    for i in 0..months {
        let period = start.add_months(i as i64);
        let values = month_row(period.year(), period.month(), i);
        let cells: Vec<String> = values
            .iter()
            .enumerate()
            .map(|(col, v)| {
                if blanks.contains(&(i, col)) {
                    "NA".to_string()
                } else {
                    format!("{v:.2}").replace('.', ",")
                }
            })
            .collect();
        text.push_str(&format!(
            "{}-{:02}-01;{}\n",
            period.year(),
            period.month(),
            cells.join(";")
        ));
    }
    text
}

fn write_csv(text: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(text.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn quick_config(data: &NamedTempFile) -> Config {
    let mut cfg = Config::default();
    cfg.data.path = data.path().to_path_buf();
    cfg.arima = ArimaConfig {
        max_p: 2,
        max_q: 2,
        max_seasonal_p: 1,
        max_seasonal_q: 1,
        max_order: 3,
        ..ArimaConfig::default()
    };
    cfg.nnar = NnarConfig {
        repeats: 3,
        epochs: 200,
        simulation_paths: 100,
        ..NnarConfig::default()
    };
    cfg
}

#[test]
fn test_full_run_produces_six_forecasts() {
    let data = write_csv(&csv_text(2016, 48, &[(5, 0), (30, 3)]));
    let out = TempDir::new().unwrap();
    let mut cfg = quick_config(&data);
    cfg.output.json = Some(out.path().join("forecasts.json"));
    cfg.output.decomposition_csv = Some(out.path().join("stl.csv"));

    let report = Pipeline::new(cfg).run().unwrap();

    assert_eq!(report.observations, 48);
    let filled: Vec<(Measurement, usize)> = report
        .imputation
        .iter()
        .map(|s| (s.column, s.filled))
        .collect();
    assert!(filled.contains(&(Measurement::ProductionInverter1, 1)));
    assert!(filled.contains(&(Measurement::EnergySold, 1)));
    assert!(filled.contains(&(Measurement::EnergyBought, 0)));

    assert_eq!(report.runs.len(), 6);
    for run in &report.runs {
        assert_eq!(run.result.len(), 12, "{}", run.result.model);
        assert!(run.result.bounds_are_ordered(), "{}", run.result.model);
        assert_eq!(run.result.rows[0].period, YearMonth::new(2020, 1).unwrap());
        assert_eq!(run.result.rows[11].period, YearMonth::new(2020, 12).unwrap());
        assert_eq!(run.result.levels(), vec![80.0, 95.0]);
    }

    let chosen: Vec<_> = report.runs.iter().filter(|r| r.chosen).collect();
    assert_eq!(chosen.len(), 1);
    assert!(chosen[0].result.model.contains("ETS(M,Ad,M)"));
    assert_eq!(report.runs_for("holt_winters").count(), 3);
    assert_eq!(report.runs_for("auto_arima").count(), 2);

    let nnar = report.runs_for("nnar").next().unwrap();
    assert!(nnar.result.model.ends_with("with regressor balance"));
    assert_eq!(nnar.result.len(), DEFAULT_BALANCE_FORECAST.len());
    assert_eq!(report.runs[5].result.series, "balance");

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(out.path().join("forecasts.json")).unwrap())
            .unwrap();
    assert_eq!(json["runs"].as_array().unwrap().len(), 6);

    let stl = std::fs::read_to_string(out.path().join("stl.csv")).unwrap();
    let lines: Vec<&str> = stl.lines().collect();
    assert_eq!(lines.len(), 49);
    assert_eq!(lines[0], "period;observed;trend;seasonal;remainder");
    assert!(lines[1].starts_with("2016-01;"));

    let text = report::render(&report);
    assert!(text.contains("[final]"));
    assert!(text.contains("STL strength"));
}

#[test]
fn test_twelve_months_auto_arima() {
    let data = write_csv(&csv_text(2021, 12, &[]));
    let cfg = Config::default();
    let table = Loader::new(&cfg.data).load_from_path(data.path()).unwrap();
    let derived = derive(&impute_table(&table).unwrap());

    let mut model = AutoArima::new(cfg.arima.clone());
    model.fit(&derived.total_production).unwrap();
    let result = model.forecast(12, &[80.0, 95.0]).unwrap();

    assert_eq!(result.len(), 12);
    let expected: Vec<YearMonth> = (0..12)
        .map(|i| YearMonth::new(2022, 1).unwrap().add_months(i))
        .collect();
    assert_eq!(result.periods(), expected);
    for row in &result.rows {
        for bound in &row.intervals {
            assert!(bound.lower <= row.point && row.point <= bound.upper);
        }
    }
}

#[rstest]
#[case(HoltWintersVariant::Additive)]
#[case(HoltWintersVariant::Multiplicative)]
#[case(HoltWintersVariant::DampedMultiplicative)]
fn test_holt_winters_needs_two_years(#[case] variant: HoltWintersVariant) {
    let data = write_csv(&csv_text(2021, 12, &[]));
    let cfg = Config::default();
    let table = Loader::new(&cfg.data).load_from_path(data.path()).unwrap();
    let derived = derive(&impute_table(&table).unwrap());

    let mut hw = HoltWinters::new(variant);
    assert!(matches!(
        hw.fit(&derived.total_production),
        Err(ForecastError::InsufficientData { .. })
    ));
}

#[test]
fn test_complete_file_is_not_altered() {
    let data = write_csv(&csv_text(2018, 30, &[]));
    let cfg = Config::default();
    let table = Loader::new(&cfg.data).load_from_path(data.path()).unwrap();
    let imputed = impute_table(&table).unwrap();

    for column in [
        Measurement::ProductionInverter1,
        Measurement::ProductionInverter2,
        Measurement::EnergyBought,
        Measurement::EnergySold,
    ] {
        let raw: Vec<f64> = table.column(column).into_iter().map(|v| v.unwrap()).collect();
        assert_eq!(imputed.get(column).values, raw);
    }

    let derived = derive(&imputed);
    for (i, row) in table.rows().iter().enumerate() {
        let inv1 = row.production_inverter_1.unwrap();
        let inv2 = row.production_inverter_2.unwrap();
        assert_eq!(derived.total_production.values[i], inv1 + inv2);
        assert_eq!(
            derived.balance.values[i],
            row.energy_sold.unwrap() - row.energy_bought.unwrap()
        );
    }
}

#[test]
fn test_short_file_aborts_run() {
    let data = write_csv(&csv_text(2021, 12, &[]));
    let cfg = quick_config(&data);
    let err = Pipeline::new(cfg).run().unwrap_err();
    assert!(matches!(err, ForecastError::InsufficientData { .. }));
}

#[test]
fn test_regressor_shorter_than_horizon_aborts_run() {
    let data = write_csv(&csv_text(2016, 36, &[]));
    let mut cfg = quick_config(&data);
    cfg.nnar.regressor_future.truncate(6);
    let err = Pipeline::new(cfg).run().unwrap_err();
    assert!(matches!(err, ForecastError::InvalidInput(_)));
}

#[test]
fn test_gap_in_file_is_a_parse_error() {
    let mut text = csv_text(2016, 30, &[]);
    // Drop 2016-06
    text = text
        .lines()
        .filter(|l| !l.starts_with("2016-06-01"))
        .collect::<Vec<_>>()
        .join("\n");
    let data = write_csv(&text);
    let cfg = quick_config(&data);
    let err = Pipeline::new(cfg).run().unwrap_err();
    match err {
        ForecastError::Parse { message, .. } => assert!(message.contains("gap")),
        other => panic!("unexpected error: {other}"),
    }
}
