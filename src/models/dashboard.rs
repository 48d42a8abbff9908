//! Dashboard and report response types.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::invoice::InvoiceStatus;

/// Count and amount of invoices in one status.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusBucket {
    pub status: InvoiceStatus,
    pub count: i64,
    pub total_ttc_cents: i64,
}

/// Headline figures for the dashboard (`GET /api/dashboard/summary`).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DashboardSummary {
    /// Sent, overdue and paid invoices.
    pub invoiced_ttc_cents: i64,
    pub collected_ttc_cents: i64,

    /// Sent and overdue invoices.
    pub outstanding_ttc_cents: i64,
    pub overdue_count: i64,
    pub overdue_ttc_cents: i64,
    pub draft_count: i64,
    pub invoice_count: i64,
}

/// Query parameters for `GET /api/dashboard/revenue`.
#[derive(Debug, Deserialize)]
pub struct RevenueQuery {
    pub months: Option<u32>,
}

/// One calendar month of the revenue rollup.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyRevenue {
    pub year: i32,
    pub month: u32,

    /// `YYYY-MM`
    pub label: String,
    pub collected_ht_cents: i64,
    pub collected_ttc_cents: i64,
    pub invoiced_ttc_cents: i64,
}

/// When VAT becomes due: on invoicing (débits) or on collection (encaissements).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TvaBasis {
    #[default]
    Debits,
    Encaissements,
}

/// Query parameters for `GET /api/reports/tva`.
#[derive(Debug, Deserialize)]
pub struct TvaReportQuery {
    pub from: NaiveDate,
    pub to: NaiveDate,
    #[serde(default)]
    pub basis: TvaBasis,
}

/// VAT collected at one rate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TvaRateRow {
    pub vat_rate_bp: i32,
    pub base_ht_cents: i64,
    pub tva_cents: i64,
    pub line_count: i64,
}

/// TVA report for a period (`GET /api/reports/tva`).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TvaReport {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub basis: TvaBasis,
    pub rows: Vec<TvaRateRow>,
    pub total_base_ht_cents: i64,
    pub total_tva_cents: i64,
    pub invoice_count: i64,
}

/// Amount collected from one client, used by the top-clients ranking.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct ClientRevenue {
    pub client_id: Uuid,
    pub client_name: String,
    pub invoice_count: i64,
    pub total_ttc_cents: i64,
}
