use crate::config::Config;
use crate::db;
use crate::error::Result;
use crate::types::{DailyMetric, MetricKind, TrendForecast, TrendingItem};
use crate::utils::{log_step, log_success};
use chrono::{Duration, NaiveDate, Utc};

const DEFAULT_TRAILING_WINDOW: i64 = 7;
const STD_FLOOR: f64 = 1.0;
const FORECAST_HORIZON_DAYS: i32 = 7;
const FORECAST_TOP_N: usize = 10;

/// §4.6: for each of the last `days` days, one upsert per (metric_date,
/// kind, key) across all five `MetricKind`s. Hand-rolled counts, same as
/// the teacher's analytics module — no stats crate.
pub fn aggregate_daily_metrics(config: &Config, days: i64) -> Result<usize> {
    let today = Utc::now().date_naive();
    let mut written = 0;

    for offset in 0..days {
        let date = today - Duration::days(offset);
        log_step("📊", &format!("Aggregating daily metrics for {date}..."));

        for kind in MetricKind::all() {
            let counts = db::fetch_daily_counts_by_kind(config, kind, date)?;
            for (key, count, sum_score) in counts {
                db::upsert_daily_metric(
                    config,
                    &DailyMetric {
                        metric_date: date,
                        kind,
                        key,
                        count,
                        sum_score,
                    },
                )?;
                written += 1;
            }
        }
    }

    log_success(&format!("Daily metric aggregation complete: {written} row(s) written."));
    Ok(written)
}

/// §4.6: `zscore = (current - mean) / max(std, 1.0)`, `score = current - mean`,
/// against a trailing `window` (default 7) days up to but excluding `date`.
pub fn compute_trending(config: &Config, days: i64, window: i64) -> Result<usize> {
    let today = Utc::now().date_naive();
    let window = if window <= 0 { DEFAULT_TRAILING_WINDOW } else { window };
    let mut written = 0;

    for offset in 0..days {
        let date = today - Duration::days(offset);
        let trailing_from = date - Duration::days(window);

        for kind in MetricKind::all() {
            let trailing = db::fetch_trailing_daily_metrics(config, kind, trailing_from, date)?;
            let today_counts = db::fetch_daily_counts_by_kind(config, kind, date)?;

            for (key, current, _) in today_counts {
                let history: Vec<i64> = trailing
                    .get(&key)
                    .map(|series| series.iter().map(|(_, n)| *n).collect())
                    .unwrap_or_default();
                let (mean, std) = mean_and_std(&history);
                let effective_std = std.max(STD_FLOOR);
                let zscore = (current as f64 - mean) / effective_std;
                let score = current as f64 - mean;

                db::upsert_trending_item(
                    config,
                    &TrendingItem {
                        metric_date: date,
                        kind,
                        key,
                        score,
                        zscore,
                        delta: score,
                        win_size: window as i32,
                        details: serde_json::json!({
                            "current": current,
                            "mean": mean,
                            "std": std,
                        }),
                    },
                )?;
                written += 1;
            }
        }
    }

    log_success(&format!("Trending computation complete: {written} item(s) written."));
    Ok(written)
}

fn mean_and_std(values: &[i64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<i64>() as f64 / n;
    let variance = values.iter().map(|v| (*v as f64 - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

/// §4.6 baseline forecast: for the top-N keys by trailing-7-day mean,
/// `yhat = mean7` held flat across the horizon.
pub fn forecast_baseline(config: &Config, kind: MetricKind, reference_date: NaiveDate) -> Result<usize> {
    let trailing_from = reference_date - Duration::days(DEFAULT_TRAILING_WINDOW);
    let trailing = db::fetch_trailing_daily_metrics(config, kind, trailing_from, reference_date)?;

    let mut means: Vec<(String, f64)> = trailing
        .into_iter()
        .map(|(key, series)| {
            let mean = series.iter().map(|(_, n)| *n as f64).sum::<f64>() / DEFAULT_TRAILING_WINDOW as f64;
            (key, mean)
        })
        .collect();
    means.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap());
    means.truncate(FORECAST_TOP_N);

    let generated_at = Utc::now();
    let mut written = 0;
    for (key, yhat) in means {
        for horizon_day in 1..=FORECAST_HORIZON_DAYS {
            db::upsert_trend_forecast(
                config,
                &TrendForecast {
                    metric_date: reference_date,
                    kind,
                    key: key.clone(),
                    horizon_day,
                    yhat,
                    generated_at,
                },
            )?;
            written += 1;
        }
    }

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zscore_matches_documented_scenario() {
        let history = vec![2, 2, 2, 2, 2, 2, 2];
        let (mean, std) = mean_and_std(&history);
        assert_eq!(mean, 2.0);
        assert_eq!(std, 0.0);

        let current = 10.0;
        let effective_std = std.max(STD_FLOOR);
        let zscore = (current - mean) / effective_std;
        let score = current - mean;
        assert_eq!(zscore, 8.0);
        assert_eq!(score, 8.0);
    }

    #[test]
    fn mean_and_std_of_empty_history_is_zero() {
        assert_eq!(mean_and_std(&[]), (0.0, 0.0));
    }

    #[test]
    fn mean_and_std_computes_population_std() {
        let (mean, std) = mean_and_std(&[1, 2, 3, 4]);
        assert_eq!(mean, 2.5);
        assert!((std - 1.1180339887).abs() < 1e-6);
    }
}
