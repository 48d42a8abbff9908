//! Dashboard aggregation: status distribution, summary and monthly revenue.
//!
//! The database returns raw rows; bucketing happens in the pure functions
//! below so empty months and statuses still show up as zeros.

use std::collections::HashMap;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use chrono_tz::Europe::Paris;
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    models::{
        dashboard::{DashboardSummary, MonthlyRevenue, StatusBucket},
        invoice::InvoiceStatus,
    },
};

pub const DEFAULT_REVENUE_MONTHS: u32 = 12;
pub const MAX_REVENUE_MONTHS: u32 = 36;

/// Calendar date in Europe/Paris, the zone payments are bucketed in.
pub fn paris_today(now: DateTime<Utc>) -> NaiveDate {
    now.with_timezone(&Paris).date_naive()
}

/// One bucket per status, in lifecycle order, zero-filled.
pub fn zero_filled_distribution(rows: &[(InvoiceStatus, i64, i64)]) -> Vec<StatusBucket> {
    InvoiceStatus::ALL
        .iter()
        .map(|&status| {
            let (count, total_ttc_cents) = rows
                .iter()
                .filter(|(s, _, _)| *s == status)
                .fold((0, 0), |(c, t), (_, count, total)| (c + count, t + total));
            StatusBucket {
                status,
                count,
                total_ttc_cents,
            }
        })
        .collect()
}

/// Headline figures derived from the status distribution.
pub fn summarize(buckets: &[StatusBucket]) -> DashboardSummary {
    let mut summary = DashboardSummary::default();

    for bucket in buckets {
        summary.invoice_count += bucket.count;
        match bucket.status {
            InvoiceStatus::Draft => summary.draft_count += bucket.count,
            InvoiceStatus::Sent => {
                summary.invoiced_ttc_cents += bucket.total_ttc_cents;
                summary.outstanding_ttc_cents += bucket.total_ttc_cents;
            }
            InvoiceStatus::Overdue => {
                summary.invoiced_ttc_cents += bucket.total_ttc_cents;
                summary.outstanding_ttc_cents += bucket.total_ttc_cents;
                summary.overdue_count += bucket.count;
                summary.overdue_ttc_cents += bucket.total_ttc_cents;
            }
            InvoiceStatus::Paid => {
                summary.invoiced_ttc_cents += bucket.total_ttc_cents;
                summary.collected_ttc_cents += bucket.total_ttc_cents;
            }
            InvoiceStatus::Cancelled => {}
        }
    }

    summary
}

/// The `months` calendar months ending with the month of `end`, oldest first.
pub fn month_range(end: NaiveDate, months: u32) -> Vec<(i32, u32)> {
    let end_index = end.year() * 12 + end.month0() as i32;
    (0..months as i32)
        .rev()
        .map(|offset| {
            let index = end_index - offset;
            (index.div_euclid(12), index.rem_euclid(12) as u32 + 1)
        })
        .collect()
}

/// First day of the oldest month in `month_range(end, months)`.
pub fn range_start(end: NaiveDate, months: u32) -> Option<NaiveDate> {
    let (year, month) = *month_range(end, months).first()?;
    NaiveDate::from_ymd_opt(year, month, 1)
}

/// Bucket collected and invoiced amounts by calendar month.
///
/// `collected` rows are `(payment date, HT, TTC)`, `invoiced` rows are
/// `(issue date, TTC)`. Rows outside the range are ignored.
pub fn rollup_by_month(
    months: &[(i32, u32)],
    collected: &[(NaiveDate, i64, i64)],
    invoiced: &[(NaiveDate, i64)],
) -> Vec<MonthlyRevenue> {
    let mut index: HashMap<(i32, u32), usize> = HashMap::with_capacity(months.len());
    let mut buckets: Vec<MonthlyRevenue> = months
        .iter()
        .enumerate()
        .map(|(i, &(year, month))| {
            index.insert((year, month), i);
            MonthlyRevenue {
                year,
                month,
                label: format!("{year:04}-{month:02}"),
                collected_ht_cents: 0,
                collected_ttc_cents: 0,
                invoiced_ttc_cents: 0,
            }
        })
        .collect();

    for (date, ht, ttc) in collected {
        if let Some(&i) = index.get(&(date.year(), date.month())) {
            buckets[i].collected_ht_cents += ht;
            buckets[i].collected_ttc_cents += ttc;
        }
    }

    for (date, ttc) in invoiced {
        if let Some(&i) = index.get(&(date.year(), date.month())) {
            buckets[i].invoiced_ttc_cents += ttc;
        }
    }

    buckets
}

/// Count and TTC amount per status for the user.
pub async fn status_distribution(
    pool: &DbPool,
    user_id: Uuid,
) -> Result<Vec<StatusBucket>, AppError> {
    let rows = sqlx::query_as::<_, (InvoiceStatus, i64, i64)>(
        r#"
        SELECT status, COUNT(*), COALESCE(SUM(total_ttc_cents), 0)::BIGINT
        FROM invoices
        WHERE user_id = $1
        GROUP BY status
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(zero_filled_distribution(&rows))
}

pub async fn summary(pool: &DbPool, user_id: Uuid) -> Result<DashboardSummary, AppError> {
    let buckets = status_distribution(pool, user_id).await?;
    Ok(summarize(&buckets))
}

/// Monthly revenue for the `months` months ending with the month of `today`.
///
/// Payments are bucketed by their date in Europe/Paris.
pub async fn monthly_revenue(
    pool: &DbPool,
    user_id: Uuid,
    today: NaiveDate,
    months: Option<u32>,
) -> Result<Vec<MonthlyRevenue>, AppError> {
    let months = months.unwrap_or(DEFAULT_REVENUE_MONTHS);
    if months == 0 || months > MAX_REVENUE_MONTHS {
        return Err(AppError::InvalidRequest(format!(
            "months must be between 1 and {MAX_REVENUE_MONTHS}"
        )));
    }

    let range = month_range(today, months);
    let start = range_start(today, months)
        .ok_or_else(|| AppError::InvalidRequest("Date out of range".to_string()))?;

    let collected = sqlx::query_as::<_, (NaiveDate, i64, i64)>(
        r#"
        SELECT (paid_at AT TIME ZONE 'Europe/Paris')::date, total_ht_cents, total_ttc_cents
        FROM invoices
        WHERE user_id = $1
          AND status = 'paid'
          AND paid_at IS NOT NULL
          AND (paid_at AT TIME ZONE 'Europe/Paris')::date >= $2
        "#,
    )
    .bind(user_id)
    .bind(start)
    .fetch_all(pool)
    .await?;

    let invoiced = sqlx::query_as::<_, (NaiveDate, i64)>(
        r#"
        SELECT issue_date, total_ttc_cents
        FROM invoices
        WHERE user_id = $1
          AND status IN ('sent', 'paid', 'overdue')
          AND issue_date >= $2
        "#,
    )
    .bind(user_id)
    .bind(start)
    .fetch_all(pool)
    .await?;

    Ok(rollup_by_month(&range, &collected, &invoiced))
}
