//! Bridge WASM <-> JavaScript cho dashboard vận hành.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use serde_wasm_bindgen::{from_value, to_value};
use opsboard_core::{
    compute_stats, AgeGroupScheme, AnalyticsConfig, AnalyticsError, OperationalStats,
};
use opsboard_json::DashboardBundle;
use wasm_bindgen::prelude::*;

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct JsAnalyticsConfig {
    #[serde(default)]
    trend_days: Option<usize>,
    #[serde(default)]
    trend_months: Option<usize>,
    #[serde(default)]
    top_doctors: Option<usize>,
    #[serde(default)]
    busy_doctor_threshold: Option<usize>,
    #[serde(default)]
    age_scheme: Option<AgeGroupScheme>,
}

impl From<JsAnalyticsConfig> for AnalyticsConfig {
    fn from(cfg: JsAnalyticsConfig) -> Self {
        let mut base = AnalyticsConfig::default();
        if let Some(days) = cfg.trend_days {
            base.trend_days = days;
        }
        if let Some(months) = cfg.trend_months {
            base.trend_months = months;
        }
        if let Some(top) = cfg.top_doctors {
            base.top_doctors = top;
        }
        if let Some(threshold) = cfg.busy_doctor_threshold {
            base.busy_doctor_threshold = threshold;
        }
        if let Some(scheme) = cfg.age_scheme {
            base.age_scheme = scheme;
        }
        base
    }
}

/// Tính toàn bộ thống kê từ một bundle JSON (`wards`, `activeAdmissions`, ...).
#[wasm_bindgen]
pub fn compute_dashboard(
    input_bundle: JsValue,
    config: Option<JsValue>,
    as_of: Option<String>,
) -> Result<JsValue, JsValue> {
    #[cfg(target_arch = "wasm32")]
    console_error_panic_hook::set_once();

    let bundle_value = from_value::<serde_json::Value>(input_bundle)
        .map_err(|err| JsValue::from_str(&format!("Không đọc được JSON bundle: {err}")))?;

    let cfg = match config {
        Some(js_cfg) => {
            let cfg: JsAnalyticsConfig = from_value(js_cfg)
                .map_err(|err| JsValue::from_str(&format!("Không đọc được config: {err}")))?;
            AnalyticsConfig::from(cfg)
        }
        None => AnalyticsConfig::default(),
    };

    let stats = compute_from_value(&bundle_value, &cfg, as_of.as_deref(), Utc::now())
        .map_err(|err| JsValue::from_str(&format_analytics_error(err)))?;

    to_value(&stats).map_err(|err| JsValue::from_str(&format!("Không serialize thống kê: {err}")))
}

fn compute_from_value(
    bundle: &serde_json::Value,
    config: &AnalyticsConfig,
    as_of: Option<&str>,
    now: DateTime<Utc>,
) -> Result<OperationalStats, AnalyticsError> {
    config.validate()?;
    let as_of = match as_of {
        Some(raw) => NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
            .map_err(|err| AnalyticsError::Parse(format!("as_of `{raw}`: {err}")))?,
        None => now.date_naive(),
    };
    let store = DashboardBundle::from_value(bundle)?.into_store(now);
    Ok(compute_stats(&store.view(), config, as_of, now))
}

fn format_analytics_error(err: AnalyticsError) -> String {
    format!("Analytics error: {err}")
}
