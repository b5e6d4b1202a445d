use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::calendar::parse_calendar_date;

/// One sales quote row from the warehouse export.
///
/// Rows come in loosely typed: amounts as strings, dates as plain strings or
/// BigQuery `{"value": ...}` cells, fields missing outright. Each field is
/// coerced independently, so one bad cell degrades to absent instead of
/// rejecting the row.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QuoteRecord {
    #[serde(default, deserialize_with = "de_loose_string")]
    pub quote_number: Option<String>,
    #[serde(default, deserialize_with = "de_loose_string")]
    pub client_name: Option<String>,
    #[serde(default, deserialize_with = "de_loose_string")]
    pub salesperson: Option<String>,
    #[serde(default, deserialize_with = "de_loose_string")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "de_amount")]
    pub total_dollars: Option<f64>,
    #[serde(default, deserialize_with = "de_calendar_date")]
    pub created_at: Option<NaiveDate>,
    #[serde(default, deserialize_with = "de_calendar_date")]
    pub sent_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "de_calendar_date")]
    pub converted_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "de_amount")]
    pub days_to_convert: Option<f64>,
}

impl QuoteRecord {
    /// A non-null converted date is the primary signal; a few upstream rows
    /// carry only a "converted"/"won" status.
    pub fn is_converted(&self) -> bool {
        if self.converted_date.is_some() {
            return true;
        }
        self.status.as_deref().is_some_and(|status| {
            let status = status.trim().to_ascii_lowercase();
            status == "converted" || status == "won"
        })
    }

    pub fn amount(&self) -> f64 {
        self.total_dollars.unwrap_or(0.0)
    }
}

/// One scheduled job row. Field names mirror the warehouse columns.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobRecord {
    #[serde(default, rename = "Job_Number", deserialize_with = "de_loose_string")]
    pub job_number: Option<String>,
    #[serde(default, rename = "Client_name", deserialize_with = "de_loose_string")]
    pub client_name: Option<String>,
    #[serde(default, rename = "Date", deserialize_with = "de_calendar_date")]
    pub date: Option<NaiveDate>,
    #[serde(default, rename = "Calculated_Value", deserialize_with = "de_amount")]
    pub calculated_value: Option<f64>,
    #[serde(default, rename = "Job_type", deserialize_with = "de_loose_string")]
    pub job_type: Option<String>,
    #[serde(default, rename = "SalesPerson", deserialize_with = "de_loose_string")]
    pub salesperson: Option<String>,
    #[serde(default, rename = "Date_Converted", deserialize_with = "de_calendar_date")]
    pub date_converted: Option<NaiveDate>,
}

impl JobRecord {
    pub fn is_recurring(&self) -> bool {
        self.job_type
            .as_deref()
            .is_some_and(|kind| kind.trim().eq_ignore_ascii_case("RECURRING"))
    }

    pub fn value(&self) -> f64 {
        self.calculated_value.unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub quotes: Vec<QuoteRecord>,
    pub jobs: Vec<JobRecord>,
}

/// Currency metrics carry the raw value for downstream math plus a
/// whole-dollar display string. Formatting happens only here, never
/// mid-pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurrencyValue {
    pub raw: f64,
    pub display: String,
}

impl CurrencyValue {
    pub fn from_raw(raw: f64) -> Self {
        Self {
            display: format_currency(raw),
            raw,
        }
    }
}

pub fn format_currency(raw: f64) -> String {
    let negative = raw < 0.0;
    let whole = raw.abs().round() as i64;
    let digits = whole.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if negative {
        format!("-${grouped}")
    } else {
        format!("${grouped}")
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KpiReport {
    pub date: String,
    pub week_start: String,
    pub week_end: String,
    pub quotes_sent_today: u64,
    pub converted_today: u64,
    pub converted_amount_today: CurrencyValue,
    pub quotes_this_week: u64,
    pub converted_this_week: u64,
    pub converted_amount_this_week: CurrencyValue,
    pub cvr_this_week: f64,
    pub quotes_last_30_days: u64,
    pub converted_last_30_days: u64,
    pub cvr_30_day: f64,
    #[serde(rename = "avgQPD30Day")]
    pub avg_qpd_30_day: f64,
    pub recurring_revenue_year: i32,
    pub recurring_revenue: CurrencyValue,
    #[serde(rename = "nextMonthOTB")]
    pub next_month_otb: CurrencyValue,
    pub weekly_historical: Vec<WeeklyBucket>,
    pub otb_by_month: Vec<MonthBucket>,
    pub otb_by_week: Vec<WeekOtbBucket>,
    pub monthly_projections: Vec<MonthlyProjection>,
    pub salesperson_breakdown: Vec<SalespersonStats>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyBucket {
    pub label: String,
    pub week_start: String,
    pub week_end: String,
    pub sent: u64,
    pub converted: u64,
    pub cvr: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthBucket {
    pub month: String,
    pub label: String,
    pub otb: CurrencyValue,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekOtbBucket {
    pub label: String,
    pub week_start: String,
    pub week_end: String,
    pub otb: CurrencyValue,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyProjection {
    pub month: String,
    pub label: String,
    pub projected_quotes: f64,
    pub projected_revenue: CurrencyValue,
    pub confidence: Confidence,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SalespersonStats {
    pub salesperson: String,
    pub quotes_sent: u64,
    pub converted: u64,
    pub cvr: f64,
    pub converted_value: CurrencyValue,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TodayResponse {
    pub date: String,
    pub quotes_sent_today: u64,
    pub converted_today: u64,
    pub converted_amount_today: CurrencyValue,
}

#[derive(Debug, Clone, Serialize)]
pub struct RefreshResponse {
    pub quotes: usize,
    pub jobs: usize,
}

fn de_loose_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(raw.as_ref().and_then(string_from_value))
}

fn string_from_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn de_amount<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(raw.as_ref().and_then(amount_from_value))
}

fn amount_from_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        Value::String(s) => {
            let cleaned: String = s
                .trim()
                .chars()
                .filter(|c| *c != '$' && *c != ',')
                .collect();
            cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
        }
        _ => None,
    }
}

fn de_calendar_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(raw.as_ref().and_then(date_from_value))
}

fn date_from_value(value: &Value) -> Option<NaiveDate> {
    match value {
        Value::String(s) => parse_calendar_date(s),
        // BigQuery JSON wraps DATE/DATETIME cells as {"value": "..."}
        Value::Object(map) => map.get("value").and_then(date_from_value),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn quote_row_tolerates_wrong_types_per_field() {
        let quote: QuoteRecord = serde_json::from_value(json!({
            "quote_number": 1042,
            "client_name": true,
            "salesperson": "  Christian ",
            "status": "Sent",
            "total_dollars": "$1,250.75",
            "sent_date": {"value": "2025-07-01"},
            "converted_date": "never",
            "days_to_convert": []
        }))
        .unwrap();

        assert_eq!(quote.quote_number.as_deref(), Some("1042"));
        assert_eq!(quote.client_name, None);
        assert_eq!(quote.salesperson.as_deref(), Some("Christian"));
        assert_eq!(quote.total_dollars, Some(1250.75));
        assert_eq!(
            quote.sent_date,
            Some(NaiveDate::from_ymd_opt(2025, 7, 1).unwrap())
        );
        assert_eq!(quote.converted_date, None);
        assert_eq!(quote.days_to_convert, None);
    }

    #[test]
    fn missing_fields_default_to_absent() {
        let quote: QuoteRecord = serde_json::from_value(json!({})).unwrap();
        assert_eq!(quote.sent_date, None);
        assert_eq!(quote.amount(), 0.0);
        assert!(!quote.is_converted());
    }

    #[test]
    fn converted_accepts_date_or_won_status() {
        let by_date: QuoteRecord =
            serde_json::from_value(json!({"converted_date": "2025-07-01"})).unwrap();
        let by_status: QuoteRecord = serde_json::from_value(json!({"status": " WON "})).unwrap();
        let neither: QuoteRecord = serde_json::from_value(json!({"status": "sent"})).unwrap();
        assert!(by_date.is_converted());
        assert!(by_status.is_converted());
        assert!(!neither.is_converted());
    }

    #[test]
    fn job_row_maps_warehouse_columns() {
        let job: JobRecord = serde_json::from_value(json!({
            "Job_Number": "J-88",
            "Date": "2026-03-14",
            "Calculated_Value": 980,
            "Job_type": "recurring "
        }))
        .unwrap();
        assert_eq!(job.job_number.as_deref(), Some("J-88"));
        assert!(job.is_recurring());
        assert_eq!(job.value(), 980.0);
    }

    #[test]
    fn amounts_coerce_strings_and_reject_garbage() {
        assert_eq!(amount_from_value(&json!("150.5")), Some(150.5));
        assert_eq!(amount_from_value(&json!("$2,000")), Some(2000.0));
        assert_eq!(amount_from_value(&json!(49.5)), Some(49.5));
        assert_eq!(amount_from_value(&json!("n/a")), None);
        assert_eq!(amount_from_value(&json!(null)), None);
        assert_eq!(amount_from_value(&json!({"v": 1})), None);
    }

    #[test]
    fn currency_display_is_whole_dollar_grouped() {
        assert_eq!(CurrencyValue::from_raw(0.0).display, "$0");
        assert_eq!(CurrencyValue::from_raw(200.0).display, "$200");
        assert_eq!(CurrencyValue::from_raw(1234567.89).display, "$1,234,568");
        assert_eq!(CurrencyValue::from_raw(-950.2).display, "-$950");
    }
}
