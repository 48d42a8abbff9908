//! Overdue detection and reminder logging.
//!
//! A run flips sent invoices past their due date to `overdue`, then logs the
//! highest reminder level each overdue invoice has reached. Each level is
//! logged at most once per invoice (`UNIQUE (invoice_id, level)`), so runs
//! can be repeated freely. Newly logged levels emit `invoice.reminder_due`.

use chrono::NaiveDate;
use serde::Serialize;
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    models::{invoice::Invoice, webhook::InvoiceEvent},
    services::webhook_service,
};

/// Days past due at which each reminder level starts.
pub const REMINDER_THRESHOLDS_DAYS: [(i16, i64); 3] = [(1, 7), (2, 15), (3, 30)];

/// Outcome of a reminder run.
#[derive(Debug, Default, Serialize)]
pub struct ReminderRunReport {
    pub marked_overdue: u64,
    pub reminders_logged: u64,
    pub reminders: Vec<LoggedReminder>,
}

#[derive(Debug, Serialize)]
pub struct LoggedReminder {
    pub invoice_id: Uuid,
    pub number: String,
    pub level: i16,
    pub days_overdue: i64,
}

/// Reminder level reached after `days_overdue` days, if any.
pub fn reminder_level(days_overdue: i64) -> Option<i16> {
    REMINDER_THRESHOLDS_DAYS
        .iter()
        .rev()
        .find(|(_, threshold)| days_overdue >= *threshold)
        .map(|(level, _)| *level)
}

/// Run overdue detection and reminder logging for one user as of `today`.
pub async fn run_reminders(
    pool: &DbPool,
    user_id: Uuid,
    today: NaiveDate,
) -> Result<ReminderRunReport, AppError> {
    let mut tx = pool.begin().await?;

    let marked_overdue = sqlx::query(
        r#"
        UPDATE invoices
        SET status = 'overdue', updated_at = NOW()
        WHERE user_id = $1 AND status = 'sent' AND due_date < $2
        "#,
    )
    .bind(user_id)
    .bind(today)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    let overdue = sqlx::query_as::<_, Invoice>(
        "SELECT * FROM invoices WHERE user_id = $1 AND status = 'overdue' ORDER BY due_date",
    )
    .bind(user_id)
    .fetch_all(&mut *tx)
    .await?;

    let mut report = ReminderRunReport {
        marked_overdue,
        ..Default::default()
    };
    let mut to_notify = Vec::new();

    for invoice in overdue {
        let days_overdue = (today - invoice.due_date).num_days();
        let Some(level) = reminder_level(days_overdue) else {
            continue;
        };

        let inserted = sqlx::query(
            r#"
            INSERT INTO reminder_logs (invoice_id, level, days_overdue)
            VALUES ($1, $2, $3)
            ON CONFLICT (invoice_id, level) DO NOTHING
            "#,
        )
        .bind(invoice.id)
        .bind(level)
        .bind(days_overdue as i32)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if inserted == 1 {
            report.reminders.push(LoggedReminder {
                invoice_id: invoice.id,
                number: invoice.number.clone(),
                level,
                days_overdue,
            });
            to_notify.push((invoice, level));
        }
    }

    tx.commit().await?;

    report.reminders_logged = report.reminders.len() as u64;
    tracing::info!(
        %user_id,
        marked_overdue = report.marked_overdue,
        reminders_logged = report.reminders_logged,
        "reminder run complete"
    );

    for (invoice, level) in to_notify {
        webhook_service::dispatch_invoice_event(
            pool.clone(),
            invoice,
            InvoiceEvent::ReminderDue,
            Some(level),
        );
    }

    Ok(report)
}
