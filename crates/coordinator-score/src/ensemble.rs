//! Ensemble weighting strategies and the `model_filter` mini-language
//! (spec §4.3 Phase E): `top_n(k)` and `min_metric(name,threshold)`.

use coordinator_config::EnsembleStrategy;

#[derive(Debug, Clone, PartialEq)]
pub enum ModelFilter {
    TopN(usize),
    MinMetric { name: String, threshold: f64 },
    All,
}

#[derive(Debug, thiserror::Error)]
#[error("invalid model_filter expression: {0}")]
pub struct ModelFilterParseError(pub String);

impl ModelFilter {
    pub fn parse(expr: Option<&str>) -> Result<Self, ModelFilterParseError> {
        let Some(expr) = expr else {
            return Ok(ModelFilter::All);
        };
        let expr = expr.trim();
        if let Some(inner) = expr.strip_prefix("top_n(").and_then(|s| s.strip_suffix(')')) {
            let n: usize = inner.trim().parse().map_err(|_| ModelFilterParseError(expr.to_string()))?;
            return Ok(ModelFilter::TopN(n));
        }
        if let Some(inner) = expr.strip_prefix("min_metric(").and_then(|s| s.strip_suffix(')')) {
            let mut parts = inner.splitn(2, ',');
            let name = parts.next().ok_or_else(|| ModelFilterParseError(expr.to_string()))?.trim().to_string();
            let threshold: f64 = parts
                .next()
                .ok_or_else(|| ModelFilterParseError(expr.to_string()))?
                .trim()
                .parse()
                .map_err(|_| ModelFilterParseError(expr.to_string()))?;
            return Ok(ModelFilter::MinMetric { name, threshold });
        }
        Err(ModelFilterParseError(expr.to_string()))
    }

    /// The metric name this filter selects candidates on. `min_metric`
    /// names its own metric; `top_n`/`all` have none of their own and the
    /// caller falls back to the aggregation's configured ranking key so
    /// `min_metric(ic,0.05)` and `min_metric(turnover,0.05)` never end up
    /// reading the same column.
    pub fn metric_name<'a>(&'a self, ranking_key_fallback: &'a str) -> &'a str {
        match self {
            ModelFilter::MinMetric { name, .. } => name,
            ModelFilter::TopN(_) | ModelFilter::All => ranking_key_fallback,
        }
    }

    /// `candidates`: `(model_id, value)` already resolved by the caller for
    /// `self.metric_name()`.
    pub fn apply(&self, candidates: &[(String, f64)]) -> Vec<String> {
        match self {
            ModelFilter::All => candidates.iter().map(|(id, _)| id.clone()).collect(),
            ModelFilter::TopN(n) => {
                let mut sorted = candidates.to_vec();
                sorted.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
                sorted.into_iter().take(*n).map(|(id, _)| id).collect()
            }
            ModelFilter::MinMetric { threshold, .. } => {
                candidates.iter().filter(|(_, v)| *v >= *threshold).map(|(id, _)| id.clone()).collect()
            }
        }
    }
}

/// Per-model variance of its prediction signal over the window, the input
/// to `inverse_variance` weighting.
pub struct ModelVariance {
    pub model_id: String,
    pub variance: f64,
}

/// Computes `{model_id -> weight}` with `Σweight = 1`.
pub fn compute_weights(strategy: EnsembleStrategy, members: &[ModelVariance]) -> Vec<(String, f64)> {
    match strategy {
        EnsembleStrategy::EqualWeight => {
            if members.is_empty() {
                return Vec::new();
            }
            let w = 1.0 / members.len() as f64;
            members.iter().map(|m| (m.model_id.clone(), w)).collect()
        }
        EnsembleStrategy::InverseVariance => {
            let inv: Vec<f64> = members.iter().map(|m| if m.variance > 0.0 { 1.0 / m.variance } else { 0.0 }).collect();
            let total: f64 = inv.iter().sum();
            if total == 0.0 {
                return compute_weights(EnsembleStrategy::EqualWeight, members);
            }
            members.iter().zip(inv).map(|(m, i)| (m.model_id.clone(), i / total)).collect()
        }
    }
}

/// Weighted average of the filtered models' numeric outputs at each
/// aligned index, producing the synthetic ensemble signal series.
pub fn weighted_average(weights: &[(String, f64)], series_by_model: &[(String, Vec<f64>)]) -> Vec<f64> {
    let len = series_by_model.iter().map(|(_, s)| s.len()).min().unwrap_or(0);
    let mut out = vec![0.0; len];
    for (model_id, weight) in weights {
        if let Some((_, series)) = series_by_model.iter().find(|(id, _)| id == model_id) {
            for (i, value) in out.iter_mut().enumerate().take(len) {
                *value += weight * series[i];
            }
        }
    }
    out
}

fn variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64
}

pub fn model_variance(model_id: impl Into<String>, signal_series: &[f64]) -> ModelVariance {
    ModelVariance { model_id: model_id.into(), variance: variance(signal_series) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_weight_splits_evenly() {
        let members = vec![
            ModelVariance { model_id: "a".into(), variance: 1.0 },
            ModelVariance { model_id: "b".into(), variance: 4.0 },
        ];
        let weights = compute_weights(EnsembleStrategy::EqualWeight, &members);
        assert_eq!(weights, vec![("a".to_string(), 0.5), ("b".to_string(), 0.5)]);
    }

    #[test]
    fn inverse_variance_favors_lower_variance_members() {
        let members = vec![
            ModelVariance { model_id: "a".into(), variance: 1.0 },
            ModelVariance { model_id: "b".into(), variance: 4.0 },
        ];
        let weights = compute_weights(EnsembleStrategy::InverseVariance, &members);
        let a_weight = weights.iter().find(|(id, _)| id == "a").unwrap().1;
        let b_weight = weights.iter().find(|(id, _)| id == "b").unwrap().1;
        assert!(a_weight > b_weight);
        assert!((a_weight + b_weight - 1.0).abs() < 1e-9);
    }

    #[test]
    fn top_n_filter_parses_and_applies() {
        let filter = ModelFilter::parse(Some("top_n(2)")).unwrap();
        let candidates = vec![("a".to_string(), 0.1), ("b".to_string(), 0.9), ("c".to_string(), 0.5)];
        assert_eq!(filter.apply(&candidates), vec!["b".to_string(), "c".to_string()]);
    }

    #[test]
    fn min_metric_filter_parses_and_applies() {
        let filter = ModelFilter::parse(Some("min_metric(ic,0.05)")).unwrap();
        let candidates = vec![("a".to_string(), 0.1), ("b".to_string(), 0.01)];
        assert_eq!(filter.apply(&candidates), vec!["a".to_string()]);
    }

    #[test]
    fn min_metric_filters_are_distinguished_by_name() {
        let ic_filter = ModelFilter::parse(Some("min_metric(ic,0.05)")).unwrap();
        let turnover_filter = ModelFilter::parse(Some("min_metric(turnover,0.05)")).unwrap();
        assert_eq!(ic_filter.metric_name("ic"), "ic");
        assert_eq!(turnover_filter.metric_name("ic"), "turnover");
    }

    #[test]
    fn top_n_and_all_fall_back_to_the_ranking_key() {
        assert_eq!(ModelFilter::TopN(3).metric_name("ic"), "ic");
        assert_eq!(ModelFilter::All.metric_name("mean_return"), "mean_return");
    }
}
