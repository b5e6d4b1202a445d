use crate::calendar::Anchor;
use crate::models::{
    Confidence, CurrencyValue, JobRecord, KpiReport, MonthBucket, MonthlyProjection, QuoteRecord,
    SalespersonStats, WeekOtbBucket, WeeklyBucket,
};
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc};
use std::collections::BTreeMap;
use std::env;

pub const WEEKLY_HISTORY_WEEKS: usize = 12;
pub const OTB_MONTHS: usize = 6;
pub const PROJECTION_MONTHS: usize = 6;

const PROJECTION_WINDOW_DAYS: i64 = 90;
// Assumed linear volume growth per month ahead; a rough forecast, not a model.
const PROJECTION_MONTHLY_GROWTH: f64 = 0.05;
const PROJECTION_SAMPLE_FLOOR: usize = 10;

#[derive(Debug, Clone)]
pub struct ReportConfig {
    pub recurring_revenue_year: i32,
    pub otb_weeks: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            recurring_revenue_year: 2026,
            otb_weeks: 6,
        }
    }
}

impl ReportConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(year) = env::var("PULSE_TARGET_YEAR")
            .ok()
            .and_then(|value| value.parse().ok())
        {
            config.recurring_revenue_year = year;
        }
        if let Some(weeks) = env::var("PULSE_OTB_WEEKS")
            .ok()
            .and_then(|value| value.parse::<usize>().ok())
        {
            config.otb_weeks = weeks.clamp(1, 26);
        }
        config
    }
}

/// Derive the full KPI report from raw quote and job rows.
///
/// Pure and deterministic: every calendar boundary comes from the explicit
/// `now`, records are never mutated, and malformed cells were already
/// degraded to absent at deserialization. Currency metrics carry raw values;
/// display strings are attached only as each output struct is built.
pub fn build_report(
    quotes: &[QuoteRecord],
    jobs: &[JobRecord],
    now: DateTime<Utc>,
    config: &ReportConfig,
) -> KpiReport {
    let anchor = Anchor::resolve(now);

    let quotes_sent_today = quotes
        .iter()
        .filter(|q| anchor.is_today(q.sent_date))
        .count() as u64;

    let converted_today: Vec<&QuoteRecord> = quotes
        .iter()
        .filter(|q| anchor.is_today(q.converted_date))
        .collect();
    let converted_amount_today: f64 = converted_today.iter().map(|q| q.amount()).sum();

    let quotes_this_week = quotes
        .iter()
        .filter(|q| anchor.is_this_week(q.sent_date))
        .count() as u64;
    let converted_this_week: Vec<&QuoteRecord> = quotes
        .iter()
        .filter(|q| anchor.is_this_week(q.converted_date))
        .collect();
    let converted_amount_this_week: f64 = converted_this_week.iter().map(|q| q.amount()).sum();

    let quotes_last_30: Vec<&QuoteRecord> = quotes
        .iter()
        .filter(|q| anchor.is_last_30_days(q.sent_date))
        .collect();
    let converted_last_30 = quotes_last_30
        .iter()
        .filter(|q| q.converted_date.is_some())
        .count() as u64;

    let recurring_revenue: f64 = jobs
        .iter()
        .filter(|job| {
            job.is_recurring()
                && job
                    .date
                    .is_some_and(|d| d.year() == config.recurring_revenue_year)
        })
        .map(|job| job.value())
        .sum();

    let (next_year, next_month) = month_add(anchor.today.year(), anchor.today.month(), 1);

    KpiReport {
        date: anchor.today.to_string(),
        week_start: anchor.week_start.to_string(),
        week_end: anchor.week_end.to_string(),
        quotes_sent_today,
        converted_today: converted_today.len() as u64,
        converted_amount_today: CurrencyValue::from_raw(converted_amount_today),
        quotes_this_week,
        converted_this_week: converted_this_week.len() as u64,
        converted_amount_this_week: CurrencyValue::from_raw(converted_amount_this_week),
        cvr_this_week: ratio_pct(converted_this_week.len() as u64, quotes_this_week),
        quotes_last_30_days: quotes_last_30.len() as u64,
        converted_last_30_days: converted_last_30,
        cvr_30_day: ratio_pct(converted_last_30, quotes_last_30.len() as u64),
        avg_qpd_30_day: round1(quotes_last_30.len() as f64 / 30.0),
        recurring_revenue_year: config.recurring_revenue_year,
        recurring_revenue: CurrencyValue::from_raw(recurring_revenue),
        next_month_otb: CurrencyValue::from_raw(month_otb(jobs, next_year, next_month)),
        weekly_historical: weekly_historical(quotes, &anchor),
        otb_by_month: otb_by_month(jobs, &anchor),
        otb_by_week: otb_by_week(jobs, &anchor, config.otb_weeks),
        monthly_projections: monthly_projections(quotes, &anchor),
        salesperson_breakdown: salesperson_breakdown(quotes, &anchor),
    }
}

/// Twelve rolling 7-day windows ending at `now`, oldest first. These are
/// anchored to the instant, not to Sunday, so the newest bucket always ends
/// "right now".
fn weekly_historical(quotes: &[QuoteRecord], anchor: &Anchor) -> Vec<WeeklyBucket> {
    let mut buckets = Vec::with_capacity(WEEKLY_HISTORY_WEEKS);
    for offset in (0..WEEKLY_HISTORY_WEEKS).rev() {
        let end = anchor.now_local - Duration::weeks(offset as i64);
        let start = end - Duration::weeks(1);

        let mut sent = 0u64;
        let mut converted = 0u64;
        for quote in quotes {
            let Some(sent_at) = quote.sent_date.map(|d| d.and_time(NaiveTime::MIN)) else {
                continue;
            };
            if sent_at < start || sent_at >= end {
                continue;
            }
            sent += 1;
            if quote.converted_date.is_some() {
                converted += 1;
            }
        }

        buckets.push(WeeklyBucket {
            label: range_label(start.date(), end.date()),
            week_start: start.date().to_string(),
            week_end: end.date().to_string(),
            sent,
            converted,
            cvr: ratio_pct(converted, sent),
        });
    }
    buckets
}

fn otb_by_month(jobs: &[JobRecord], anchor: &Anchor) -> Vec<MonthBucket> {
    (0..OTB_MONTHS)
        .map(|offset| {
            let (year, month) = month_add(anchor.today.year(), anchor.today.month(), offset as i32);
            MonthBucket {
                month: month_key(year, month),
                label: month_label(year, month),
                otb: CurrencyValue::from_raw(month_otb(jobs, year, month)),
            }
        })
        .collect()
}

fn month_otb(jobs: &[JobRecord], year: i32, month: u32) -> f64 {
    jobs.iter()
        .filter(|job| {
            job.date
                .is_some_and(|d| d.year() == year && d.month() == month)
        })
        .map(|job| job.value())
        .sum()
}

fn otb_by_week(jobs: &[JobRecord], anchor: &Anchor, weeks: usize) -> Vec<WeekOtbBucket> {
    (0..weeks)
        .map(|offset| {
            let start = anchor.week_start + Duration::weeks(offset as i64);
            let end = start + Duration::days(7);
            let total: f64 = jobs
                .iter()
                .filter(|job| job.date.is_some_and(|d| start <= d && d < end))
                .map(|job| job.value())
                .sum();
            WeekOtbBucket {
                label: range_label(start, end - Duration::days(1)),
                week_start: start.to_string(),
                week_end: end.to_string(),
                otb: CurrencyValue::from_raw(total),
            }
        })
        .collect()
}

/// Forward revenue guesses from trailing-90-day quote volume, conversion
/// fraction, and average converted-quote value.
fn monthly_projections(quotes: &[QuoteRecord], anchor: &Anchor) -> Vec<MonthlyProjection> {
    let window_start = anchor.today - Duration::days(PROJECTION_WINDOW_DAYS);
    let recent: Vec<&QuoteRecord> = quotes
        .iter()
        .filter(|q| {
            q.sent_date
                .is_some_and(|d| window_start <= d && d <= anchor.today)
        })
        .collect();
    let converted: Vec<&&QuoteRecord> = recent
        .iter()
        .filter(|q| q.converted_date.is_some())
        .collect();

    let cvr_basis = if recent.is_empty() {
        0.0
    } else {
        converted.len() as f64 / recent.len() as f64
    };
    let avg_deal = if converted.is_empty() {
        0.0
    } else {
        converted.iter().map(|q| q.amount()).sum::<f64>() / converted.len() as f64
    };
    let volume_per_month = recent.len() as f64 / 3.0;
    let thin_sample = recent.len() < PROJECTION_SAMPLE_FLOOR;

    (1..=PROJECTION_MONTHS)
        .map(|ahead| {
            let (year, month) = month_add(anchor.today.year(), anchor.today.month(), ahead as i32);
            let projected_quotes =
                volume_per_month * (1.0 + PROJECTION_MONTHLY_GROWTH * ahead as f64);
            let confidence = if thin_sample {
                Confidence::Low
            } else if ahead <= 2 {
                Confidence::High
            } else if ahead <= 4 {
                Confidence::Medium
            } else {
                Confidence::Low
            };
            MonthlyProjection {
                month: month_key(year, month),
                label: month_label(year, month),
                projected_quotes: round1(projected_quotes),
                projected_revenue: CurrencyValue::from_raw(
                    projected_quotes * cvr_basis * avg_deal,
                ),
                confidence,
            }
        })
        .collect()
}

/// Per-rep rollup over the 30-day sent window. Names are compared trimmed
/// and case-folded so "Alice" and " alice " are one rep.
fn salesperson_breakdown(quotes: &[QuoteRecord], anchor: &Anchor) -> Vec<SalespersonStats> {
    struct Acc {
        name: String,
        sent: u64,
        converted: u64,
        value: f64,
    }

    let mut by_rep: BTreeMap<String, Acc> = BTreeMap::new();
    for quote in quotes {
        if !anchor.is_last_30_days(quote.sent_date) {
            continue;
        }
        let display = quote
            .salesperson
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or("Unassigned");
        let acc = by_rep.entry(display.to_lowercase()).or_insert_with(|| Acc {
            name: display.to_string(),
            sent: 0,
            converted: 0,
            value: 0.0,
        });
        acc.sent += 1;
        if quote.is_converted() {
            acc.converted += 1;
            acc.value += quote.amount();
        }
    }

    let mut stats: Vec<SalespersonStats> = by_rep
        .into_values()
        .map(|acc| SalespersonStats {
            cvr: ratio_pct(acc.converted, acc.sent),
            converted_value: CurrencyValue::from_raw(acc.value),
            salesperson: acc.name,
            quotes_sent: acc.sent,
            converted: acc.converted,
        })
        .collect();
    stats.sort_by(|a, b| {
        b.converted_value
            .raw
            .total_cmp(&a.converted_value.raw)
            .then_with(|| a.salesperson.cmp(&b.salesperson))
    });
    stats
}

fn ratio_pct(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        round1(numerator as f64 / denominator as f64 * 100.0)
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn month_add(year: i32, month: u32, offset: i32) -> (i32, u32) {
    let index = year * 12 + month as i32 - 1 + offset;
    (index.div_euclid(12), (index.rem_euclid(12) + 1) as u32)
}

fn month_key(year: i32, month: u32) -> String {
    format!("{year}-{month:02}")
}

fn month_label(year: i32, month: u32) -> String {
    match NaiveDate::from_ymd_opt(year, month, 1) {
        Some(first) => first.format("%B %Y").to_string(),
        None => month_key(year, month),
    }
}

fn range_label(start: NaiveDate, end: NaiveDate) -> String {
    format!("{} - {}", start.format("%b %-d"), end.format("%b %-d"))
}
