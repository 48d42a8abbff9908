//! TVA (VAT) reporting.
//!
//! Two bases are supported:
//! - **débits**: VAT is due when the invoice is issued (sent, overdue or paid
//!   invoices by issue date)
//! - **encaissements**: VAT is due when the payment is collected (paid
//!   invoices by payment date, Europe/Paris)

use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDate;
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    models::dashboard::{TvaBasis, TvaRateRow, TvaReport, TvaReportQuery},
};

/// One invoice line as read for the report.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TaxLine {
    pub invoice_id: Uuid,
    pub vat_rate_bp: i32,
    pub total_ht_cents: i64,
    pub total_tva_cents: i64,
}

/// Group lines by VAT rate (ascending) and total them.
pub fn aggregate_tax_lines(
    from: NaiveDate,
    to: NaiveDate,
    basis: TvaBasis,
    lines: &[TaxLine],
) -> TvaReport {
    let mut by_rate: BTreeMap<i32, TvaRateRow> = BTreeMap::new();
    let mut invoices = HashSet::new();

    for line in lines {
        invoices.insert(line.invoice_id);
        let row = by_rate.entry(line.vat_rate_bp).or_insert(TvaRateRow {
            vat_rate_bp: line.vat_rate_bp,
            base_ht_cents: 0,
            tva_cents: 0,
            line_count: 0,
        });
        row.base_ht_cents += line.total_ht_cents;
        row.tva_cents += line.total_tva_cents;
        row.line_count += 1;
    }

    let rows: Vec<TvaRateRow> = by_rate.into_values().collect();
    let total_base_ht_cents = rows.iter().map(|r| r.base_ht_cents).sum();
    let total_tva_cents = rows.iter().map(|r| r.tva_cents).sum();

    TvaReport {
        from,
        to,
        basis,
        rows,
        total_base_ht_cents,
        total_tva_cents,
        invoice_count: invoices.len() as i64,
    }
}

/// Build the TVA report for `[from, to]` (both inclusive).
pub async fn tva_report(
    pool: &DbPool,
    user_id: Uuid,
    query: &TvaReportQuery,
) -> Result<TvaReport, AppError> {
    if query.from > query.to {
        return Err(AppError::InvalidRequest(
            "`from` must not be after `to`".to_string(),
        ));
    }

    let sql = match query.basis {
        TvaBasis::Debits => {
            r#"
            SELECT ii.invoice_id, ii.vat_rate_bp, ii.total_ht_cents, ii.total_tva_cents
            FROM invoice_items ii
            JOIN invoices i ON i.id = ii.invoice_id
            WHERE i.user_id = $1
              AND i.status IN ('sent', 'paid', 'overdue')
              AND i.issue_date BETWEEN $2 AND $3
            "#
        }
        TvaBasis::Encaissements => {
            r#"
            SELECT ii.invoice_id, ii.vat_rate_bp, ii.total_ht_cents, ii.total_tva_cents
            FROM invoice_items ii
            JOIN invoices i ON i.id = ii.invoice_id
            WHERE i.user_id = $1
              AND i.status = 'paid'
              AND (i.paid_at AT TIME ZONE 'Europe/Paris')::date BETWEEN $2 AND $3
            "#
        }
    };

    let lines = sqlx::query_as::<_, TaxLine>(sql)
        .bind(user_id)
        .bind(query.from)
        .bind(query.to)
        .fetch_all(pool)
        .await?;

    Ok(aggregate_tax_lines(query.from, query.to, query.basis, &lines))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(invoice_id: Uuid, rate: i32, ht: i64, tva: i64) -> TaxLine {
        TaxLine {
            invoice_id,
            vat_rate_bp: rate,
            total_ht_cents: ht,
            total_tva_cents: tva,
        }
    }

    #[test]
    fn groups_by_rate_in_ascending_order() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let from = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let to = NaiveDate::from_ymd_opt(2026, 3, 31).unwrap();

        let report = aggregate_tax_lines(
            from,
            to,
            TvaBasis::Debits,
            &[
                line(a, 2000, 10000, 2000),
                line(a, 550, 1000, 55),
                line(b, 2000, 5000, 1000),
            ],
        );

        assert_eq!(report.rows.len(), 2);
        assert_eq!(report.rows[0].vat_rate_bp, 550);
        assert_eq!(report.rows[0].tva_cents, 55);
        assert_eq!(report.rows[1].vat_rate_bp, 2000);
        assert_eq!(report.rows[1].base_ht_cents, 15000);
        assert_eq!(report.rows[1].line_count, 2);
        assert_eq!(report.total_base_ht_cents, 16000);
        assert_eq!(report.total_tva_cents, 3055);
        assert_eq!(report.invoice_count, 2);
    }

    #[test]
    fn empty_period_yields_zero_totals() {
        let day = NaiveDate::from_ymd_opt(2026, 5, 1).unwrap();
        let report = aggregate_tax_lines(day, day, TvaBasis::Encaissements, &[]);
        assert!(report.rows.is_empty());
        assert_eq!(report.total_tva_cents, 0);
        assert_eq!(report.invoice_count, 0);
    }
}
