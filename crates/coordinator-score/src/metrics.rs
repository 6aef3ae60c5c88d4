//! Built-in and tier-3 metrics (spec §4.3 Phase D). Each metric is a pure
//! function over a [`MetricsContext`]; the [`MetricsRegistry`] resolves a
//! name from `Config.metrics` to either a built-in or a registered custom
//! function, mirroring the callable-slot resolution pattern in
//! `coordinator-config`.

use std::collections::HashMap;
use std::sync::Arc;

/// One model's aligned signal / realized-return series over the scoring
/// window, in chronological order.
#[derive(Debug, Clone, Default)]
pub struct MetricSeries {
    pub signals: Vec<f64>,
    pub realized_returns: Vec<f64>,
}

impl MetricSeries {
    pub fn len(&self) -> usize {
        self.signals.len().min(self.realized_returns.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Everything a metric function needs: this model's own series, every real
/// model's series (for cross-model metrics), the configured ensembles'
/// series, and sub-bucket boundaries for bucketed metrics like `ic_sharpe`.
pub struct MetricsContext {
    pub model_id: String,
    pub window_start: i64,
    pub window_end: i64,
    pub series: MetricSeries,
    pub all_model_series: Vec<(String, MetricSeries)>,
    pub ensemble_series: Vec<(String, MetricSeries)>,
    /// Split points (exclusive end indices) dividing `series` into
    /// sub-buckets; empty means "treat the whole window as one bucket".
    pub bucket_boundaries: Vec<usize>,
}

pub type MetricFn = dyn Fn(&MetricsContext) -> Option<f64> + Send + Sync;

/// Rank correlation of a model's prediction signal against realized
/// returns (Spearman's rho).
pub fn ic(ctx: &MetricsContext) -> Option<f64> {
    spearman(&ctx.series.signals, &ctx.series.realized_returns)
}

fn buckets(ctx: &MetricsContext) -> Vec<(usize, usize)> {
    if ctx.bucket_boundaries.is_empty() {
        return vec![(0, ctx.series.len())];
    }
    let mut spans = Vec::new();
    let mut start = 0;
    for &end in &ctx.bucket_boundaries {
        if end > start {
            spans.push((start, end.min(ctx.series.len())));
        }
        start = end;
    }
    if start < ctx.series.len() {
        spans.push((start, ctx.series.len()));
    }
    spans
}

/// `mean(IC per sub-bucket) / stddev(IC per sub-bucket)`. Undefined (`None`)
/// with fewer than 2 buckets.
pub fn ic_sharpe(ctx: &MetricsContext) -> Option<f64> {
    let spans = buckets(ctx);
    let bucket_ics: Vec<f64> = spans
        .into_iter()
        .filter_map(|(start, end)| spearman(&ctx.series.signals[start..end], &ctx.series.realized_returns[start..end]))
        .collect();

    if bucket_ics.len() < 2 {
        return None;
    }
    let mean = mean(&bucket_ics);
    let sd = stddev(&bucket_ics, mean);
    if sd == 0.0 {
        None
    } else {
        Some(mean / sd)
    }
}

/// Fraction of predictions whose sign matches the realized sign.
pub fn hit_rate(ctx: &MetricsContext) -> Option<f64> {
    if ctx.series.is_empty() {
        return None;
    }
    let n = ctx.series.len();
    let hits = (0..n).filter(|&i| ctx.series.signals[i].signum() == ctx.series.realized_returns[i].signum()).count();
    Some(hits as f64 / n as f64)
}

fn long_short_returns(series: &MetricSeries) -> Vec<f64> {
    (0..series.len()).map(|i| series.signals[i].signum() * series.realized_returns[i]).collect()
}

/// Mean realized return of a long-short portfolio built from the
/// predictions (long when the signal is positive, short when negative).
pub fn mean_return(ctx: &MetricsContext) -> Option<f64> {
    if ctx.series.is_empty() {
        return None;
    }
    Some(mean(&long_short_returns(&ctx.series)))
}

/// Worst peak-to-trough drawdown on the cumulative long-short return
/// series.
pub fn max_drawdown(ctx: &MetricsContext) -> Option<f64> {
    if ctx.series.is_empty() {
        return None;
    }
    let returns = long_short_returns(&ctx.series);
    let mut cumulative = 0.0;
    let mut peak = 0.0;
    let mut worst = 0.0;
    for r in returns {
        cumulative += r;
        peak = peak.max(cumulative);
        worst = worst.min(cumulative - peak);
    }
    Some(worst)
}

/// `mean(return) / stddev(negative returns only)`.
pub fn sortino_ratio(ctx: &MetricsContext) -> Option<f64> {
    if ctx.series.is_empty() {
        return None;
    }
    let returns = long_short_returns(&ctx.series);
    let downside: Vec<f64> = returns.iter().copied().filter(|&r| r < 0.0).collect();
    if downside.is_empty() {
        return None;
    }
    let downside_sd = stddev(&downside, mean(&downside));
    if downside_sd == 0.0 {
        None
    } else {
        Some(mean(&returns) / downside_sd)
    }
}

/// Mean absolute change in signal between consecutive predictions.
pub fn turnover(ctx: &MetricsContext) -> Option<f64> {
    if ctx.series.len() < 2 {
        return None;
    }
    let diffs: Vec<f64> = ctx.series.signals.windows(2).map(|w| (w[1] - w[0]).abs()).collect();
    Some(mean(&diffs))
}

/// Mean pairwise Spearman correlation of this model's signal against every
/// other real model's aligned signal (same-length, same-index series).
pub fn model_correlation(ctx: &MetricsContext) -> Option<f64> {
    let others: Vec<f64> = ctx
        .all_model_series
        .iter()
        .filter(|(id, _)| id != &ctx.model_id)
        .filter_map(|(_, other)| spearman(&ctx.series.signals, &other.signals))
        .collect();
    if others.is_empty() {
        None
    } else {
        Some(mean(&others))
    }
}

/// Tier-3: Spearman correlation of this model's signal against the fitted
/// neutralized consensus (approximated here as the cross-sectional mean
/// signal at each index — "meta-model" proxy for `fnc`).
pub fn fnc(ctx: &MetricsContext) -> Option<f64> {
    if ctx.all_model_series.is_empty() || ctx.series.is_empty() {
        return None;
    }
    let n = ctx.series.len();
    let consensus: Vec<f64> = (0..n)
        .map(|i| {
            let vals: Vec<f64> = ctx.all_model_series.iter().filter_map(|(_, s)| s.signals.get(i).copied()).collect();
            mean(&vals)
        })
        .collect();
    spearman(&ctx.series.signals, &consensus)
}

/// Tier-3: leave-one-out recomputation. The delta in an equal-weight
/// ensemble's IC with and without this model, i.e. this model's marginal
/// contribution to the ensemble's skill.
pub fn contribution(ctx: &MetricsContext) -> Option<f64> {
    let ensemble = ctx.ensemble_series.first()?;
    let with_model_ic = spearman(&ensemble.1.signals, &ctx.series.realized_returns)?;

    let n = ctx.series.len();
    let others: Vec<&MetricSeries> = ctx.all_model_series.iter().filter(|(id, _)| id != &ctx.model_id).map(|(_, s)| s).collect();
    if others.is_empty() {
        return None;
    }
    let without_model: Vec<f64> = (0..n)
        .map(|i| {
            let vals: Vec<f64> = others.iter().filter_map(|s| s.signals.get(i).copied()).collect();
            mean(&vals)
        })
        .collect();
    let without_model_ic = spearman(&without_model, &ctx.series.realized_returns)?;
    Some(with_model_ic - without_model_ic)
}

/// Tier-3: mean pairwise Spearman correlation of this model's signal
/// against every configured ensemble's signal.
pub fn ensemble_correlation(ctx: &MetricsContext) -> Option<f64> {
    let correlations: Vec<f64> = ctx.ensemble_series.iter().filter_map(|(_, s)| spearman(&ctx.series.signals, &s.signals)).collect();
    if correlations.is_empty() {
        None
    } else {
        Some(mean(&correlations))
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn stddev(values: &[f64], mean_value: f64) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let variance = values.iter().map(|v| (v - mean_value).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

/// Average (midpoint) ranks, ties broken by shared rank, ascending order.
fn ranks(values: &[f64]) -> Vec<f64> {
    let mut indexed: Vec<(usize, f64)> = values.iter().copied().enumerate().collect();
    indexed.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

    let mut result = vec![0.0; values.len()];
    let mut i = 0;
    while i < indexed.len() {
        let mut j = i;
        while j + 1 < indexed.len() && indexed[j + 1].1 == indexed[i].1 {
            j += 1;
        }
        let avg_rank = ((i + j) as f64 / 2.0) + 1.0;
        for k in i..=j {
            result[indexed[k].0] = avg_rank;
        }
        i = j + 1;
    }
    result
}

/// Spearman rank correlation. `None` if the series are misaligned, too
/// short, or either has zero variance (undefined correlation).
pub fn spearman(a: &[f64], b: &[f64]) -> Option<f64> {
    if a.len() != b.len() || a.len() < 2 {
        return None;
    }
    let ra = ranks(a);
    let rb = ranks(b);
    pearson(&ra, &rb)
}

fn pearson(a: &[f64], b: &[f64]) -> Option<f64> {
    let ma = mean(a);
    let mb = mean(b);
    let mut cov = 0.0;
    let mut va = 0.0;
    let mut vb = 0.0;
    for i in 0..a.len() {
        let da = a[i] - ma;
        let db = b[i] - mb;
        cov += da * db;
        va += da * da;
        vb += db * db;
    }
    if va == 0.0 || vb == 0.0 {
        None
    } else {
        Some(cov / (va.sqrt() * vb.sqrt()))
    }
}

/// Resolves metric names from `Config.metrics` to built-in or
/// custom-registered metric functions, failing fast on an unknown name at
/// startup rather than silently skipping it mid-tick.
#[derive(Clone, Default)]
pub struct MetricsRegistry {
    custom: HashMap<String, Arc<MetricFn>>,
}

#[derive(Debug, thiserror::Error)]
#[error("unknown metric '{0}': not a built-in and no custom function registered")]
pub struct UnknownMetric(pub String);

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, f: impl Fn(&MetricsContext) -> Option<f64> + Send + Sync + 'static) {
        self.custom.insert(name.into(), Arc::new(f));
    }

    pub fn resolve(&self, name: &str) -> Result<Arc<MetricFn>, UnknownMetric> {
        let builtin: Option<Arc<MetricFn>> = match name {
            "ic" => Some(Arc::new(ic)),
            "ic_sharpe" => Some(Arc::new(ic_sharpe)),
            "hit_rate" => Some(Arc::new(hit_rate)),
            "mean_return" => Some(Arc::new(mean_return)),
            "max_drawdown" => Some(Arc::new(max_drawdown)),
            "sortino_ratio" => Some(Arc::new(sortino_ratio)),
            "turnover" => Some(Arc::new(turnover)),
            "model_correlation" => Some(Arc::new(model_correlation)),
            "fnc" => Some(Arc::new(fnc)),
            "contribution" => Some(Arc::new(contribution)),
            "ensemble_correlation" => Some(Arc::new(ensemble_correlation)),
            _ => None,
        };
        builtin.or_else(|| self.custom.get(name).cloned()).ok_or_else(|| UnknownMetric(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(signals: Vec<f64>, returns: Vec<f64>) -> MetricsContext {
        MetricsContext {
            model_id: "m1".into(),
            window_start: 0,
            window_end: 0,
            series: MetricSeries { signals, realized_returns: returns },
            all_model_series: Vec::new(),
            ensemble_series: Vec::new(),
            bucket_boundaries: Vec::new(),
        }
    }

    #[test]
    fn perfectly_correlated_signal_has_ic_of_one() {
        let c = ctx(vec![1.0, 2.0, 3.0, 4.0], vec![10.0, 20.0, 30.0, 40.0]);
        assert!((ic(&c).unwrap() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn inversely_correlated_signal_has_ic_of_negative_one() {
        let c = ctx(vec![1.0, 2.0, 3.0, 4.0], vec![40.0, 30.0, 20.0, 10.0]);
        assert!((ic(&c).unwrap() + 1.0).abs() < 1e-9);
    }

    #[test]
    fn hit_rate_counts_sign_matches() {
        let c = ctx(vec![1.0, -1.0, 1.0, -1.0], vec![1.0, 1.0, 1.0, -1.0]);
        assert_eq!(hit_rate(&c), Some(0.5));
    }

    #[test]
    fn ic_sharpe_requires_at_least_two_buckets() {
        let mut c = ctx(vec![1.0, 2.0, 3.0, 4.0], vec![1.0, 2.0, 3.0, 4.0]);
        c.bucket_boundaries = vec![4];
        assert_eq!(ic_sharpe(&c), None);
    }

    #[test]
    fn turnover_is_mean_absolute_signal_change() {
        let c = ctx(vec![1.0, 3.0, 2.0], vec![0.0, 0.0, 0.0]);
        assert_eq!(turnover(&c), Some((2.0 + 1.0) / 2.0));
    }

    #[test]
    fn registry_resolves_builtins_and_rejects_unknown_names() {
        let registry = MetricsRegistry::new();
        assert!(registry.resolve("ic").is_ok());
        assert!(registry.resolve("not_a_real_metric").is_err());
    }
}
