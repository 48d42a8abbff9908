//! Invoice service - creation, numbering and status changes.
//!
//! This service handles:
//! - Line and invoice totals (HT, TVA, TTC) in integer cents
//! - Sequential invoice numbering per user and year
//! - The invoice status state machine
//!
//! # Numbering
//!
//! Numbers are allocated from `invoice_sequences` inside the transaction that
//! inserts the invoice. The upsert takes a row lock on `(user_id, year)`, so
//! concurrent creations queue behind each other and a rolled-back creation
//! releases its number without leaving a gap.

use chrono::{Datelike, Duration, NaiveDate};
use sqlx::PgConnection;
use uuid::Uuid;

use crate::{
    config::Config,
    db::DbPool,
    error::AppError,
    models::invoice::{
        CreateInvoiceItemRequest, CreateInvoiceRequest, Invoice, InvoiceFilter, InvoiceItem,
        InvoiceStatus,
    },
};

/// French VAT rates in basis points: 0 %, 2.1 %, 5.5 %, 10 %, 20 %.
pub const VAT_RATES_BP: [i32; 5] = [0, 210, 550, 1000, 2000];

/// Upper bound on lines per invoice.
const MAX_ITEMS: usize = 200;

/// HT and TVA of a single line or a whole invoice, in cents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Totals {
    pub ht_cents: i64,
    pub tva_cents: i64,
}

impl Totals {
    pub fn ttc_cents(&self) -> i64 {
        self.ht_cents + self.tva_cents
    }
}

/// Convert a percentage (`5.5`) to basis points, accepting only French rates.
pub fn vat_rate_bp(percent: f64) -> Result<i32, AppError> {
    if !percent.is_finite() {
        return Err(AppError::InvalidRequest("VAT rate must be a number".to_string()));
    }
    let bp = (percent * 100.0).round() as i32;
    if VAT_RATES_BP.contains(&bp) {
        Ok(bp)
    } else {
        Err(AppError::InvalidRequest(format!(
            "Unsupported VAT rate {percent}%, expected one of 0, 2.1, 5.5, 10, 20"
        )))
    }
}

/// Compute the HT and TVA of one invoice line.
///
/// HT is `quantity × unit price` rounded to the cent; TVA is rounded half up
/// on the line HT.
pub fn line_totals(
    quantity: f64,
    unit_price_cents: i64,
    vat_rate_bp: i32,
) -> Result<Totals, AppError> {
    if !quantity.is_finite() || quantity <= 0.0 {
        return Err(AppError::InvalidRequest(
            "Quantity must be positive".to_string(),
        ));
    }
    if unit_price_cents < 0 {
        return Err(AppError::InvalidRequest(
            "Unit price cannot be negative".to_string(),
        ));
    }

    let ht = (quantity * unit_price_cents as f64).round();
    if ht > i64::MAX as f64 / 10_000.0 {
        return Err(AppError::InvalidRequest("Line amount too large".to_string()));
    }
    let ht_cents = ht as i64;
    let tva_cents = (ht_cents * vat_rate_bp as i64 + 5_000) / 10_000;

    Ok(Totals {
        ht_cents,
        tva_cents,
    })
}

/// A validated line ready to insert.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedItem {
    pub description: String,
    pub quantity: f64,
    pub unit_price_cents: i64,
    pub vat_rate_bp: i32,
    pub totals: Totals,
}

/// Validate request lines and compute their totals plus the invoice totals.
pub fn prepare_items(
    items: &[CreateInvoiceItemRequest],
) -> Result<(Vec<PreparedItem>, Totals), AppError> {
    if items.is_empty() {
        return Err(AppError::InvalidRequest(
            "An invoice needs at least one item".to_string(),
        ));
    }
    if items.len() > MAX_ITEMS {
        return Err(AppError::InvalidRequest(format!(
            "An invoice cannot have more than {MAX_ITEMS} items"
        )));
    }

    let mut prepared = Vec::with_capacity(items.len());
    let mut total = Totals::default();

    for item in items {
        let description = item.description.trim();
        if description.is_empty() {
            return Err(AppError::InvalidRequest(
                "Item description is required".to_string(),
            ));
        }
        let rate = vat_rate_bp(item.vat_rate)?;
        let totals = line_totals(item.quantity, item.unit_price_cents, rate)?;

        total.ht_cents += totals.ht_cents;
        total.tva_cents += totals.tva_cents;

        prepared.push(PreparedItem {
            description: description.to_string(),
            quantity: item.quantity,
            unit_price_cents: item.unit_price_cents,
            vat_rate_bp: rate,
            totals,
        });
    }

    Ok((prepared, total))
}

/// `FAC-2026-0007`
pub fn format_invoice_number(prefix: &str, year: i32, sequence: i32) -> String {
    format!("{prefix}-{year}-{sequence:04}")
}

/// Apply the issue-date and payment-terms defaults.
pub fn resolve_dates(
    issue_date: Option<NaiveDate>,
    due_date: Option<NaiveDate>,
    today: NaiveDate,
    payment_terms_days: i64,
) -> Result<(NaiveDate, NaiveDate), AppError> {
    let issue = issue_date.unwrap_or(today);
    let due = match due_date {
        Some(due) => due,
        None => Duration::try_days(payment_terms_days)
            .and_then(|terms| issue.checked_add_signed(terms))
            .ok_or_else(|| {
                AppError::InvalidRequest("Issue date is out of range".to_string())
            })?,
    };

    if due < issue {
        return Err(AppError::InvalidRequest(
            "Due date cannot be before issue date".to_string(),
        ));
    }

    Ok((issue, due))
}

/// Take the next sequence value for `(user_id, year)`.
///
/// Must run inside the transaction that inserts the invoice; the row lock is
/// held until that transaction ends.
async fn allocate_sequence(
    conn: &mut PgConnection,
    user_id: Uuid,
    year: i32,
) -> Result<i32, AppError> {
    let sequence: i32 = sqlx::query_scalar(
        r#"
        INSERT INTO invoice_sequences (user_id, year, last_value)
        VALUES ($1, $2, 1)
        ON CONFLICT (user_id, year)
        DO UPDATE SET last_value = invoice_sequences.last_value + 1
        RETURNING last_value
        "#,
    )
    .bind(user_id)
    .bind(year)
    .fetch_one(&mut *conn)
    .await?;

    Ok(sequence)
}

/// Create a draft invoice with its items.
///
/// # Process
///
/// 1. Validate lines and dates, compute totals
/// 2. Start database transaction
/// 3. Check the client belongs to the user
/// 4. Allocate the invoice number
/// 5. Insert invoice and items
/// 6. Commit (or rollback on error)
pub async fn create_invoice(
    pool: &DbPool,
    config: &Config,
    user_id: Uuid,
    request: CreateInvoiceRequest,
    today: NaiveDate,
) -> Result<(Invoice, Vec<InvoiceItem>), AppError> {
    let (items, totals) = prepare_items(&request.items)?;
    let (issue_date, due_date) = resolve_dates(
        request.issue_date,
        request.due_date,
        today,
        config.payment_terms_days,
    )?;

    let mut tx = pool.begin().await?;

    let client_exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM clients WHERE id = $1 AND user_id = $2)")
            .bind(request.client_id)
            .bind(user_id)
            .fetch_one(&mut *tx)
            .await?;

    if !client_exists {
        tx.rollback().await?;
        return Err(AppError::ClientNotFound);
    }

    let sequence = allocate_sequence(&mut tx, user_id, issue_date.year()).await?;
    let number = format_invoice_number(&config.invoice_number_prefix, issue_date.year(), sequence);

    let invoice = sqlx::query_as::<_, Invoice>(
        r#"
        INSERT INTO invoices (
            user_id,
            client_id,
            number,
            status,
            issue_date,
            due_date,
            total_ht_cents,
            total_tva_cents,
            total_ttc_cents,
            notes
        )
        VALUES ($1, $2, $3, 'draft', $4, $5, $6, $7, $8, $9)
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(request.client_id)
    .bind(&number)
    .bind(issue_date)
    .bind(due_date)
    .bind(totals.ht_cents)
    .bind(totals.tva_cents)
    .bind(totals.ttc_cents())
    .bind(request.notes)
    .fetch_one(&mut *tx)
    .await?;

    let mut stored_items = Vec::with_capacity(items.len());
    for (position, item) in items.into_iter().enumerate() {
        let stored = sqlx::query_as::<_, InvoiceItem>(
            r#"
            INSERT INTO invoice_items (
                invoice_id,
                position,
                description,
                quantity,
                unit_price_cents,
                vat_rate_bp,
                total_ht_cents,
                total_tva_cents
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(invoice.id)
        .bind(position as i32 + 1)
        .bind(item.description)
        .bind(item.quantity)
        .bind(item.unit_price_cents)
        .bind(item.vat_rate_bp)
        .bind(item.totals.ht_cents)
        .bind(item.totals.tva_cents)
        .fetch_one(&mut *tx)
        .await?;
        stored_items.push(stored);
    }

    tx.commit().await?;

    tracing::info!(
        invoice_id = %invoice.id,
        number = %invoice.number,
        total_ttc_cents = invoice.total_ttc_cents,
        "invoice created"
    );

    Ok((invoice, stored_items))
}

/// List the user's invoices, newest first, with optional filters.
pub async fn list_invoices(
    pool: &DbPool,
    user_id: Uuid,
    filter: &InvoiceFilter,
) -> Result<Vec<Invoice>, AppError> {
    let invoices = sqlx::query_as::<_, Invoice>(
        r#"
        SELECT * FROM invoices
        WHERE user_id = $1
          AND ($2::invoice_status IS NULL OR status = $2)
          AND ($3::uuid IS NULL OR client_id = $3)
          AND ($4::date IS NULL OR issue_date >= $4)
          AND ($5::date IS NULL OR issue_date <= $5)
        ORDER BY issue_date DESC, number DESC
        "#,
    )
    .bind(user_id)
    .bind(filter.status)
    .bind(filter.client_id)
    .bind(filter.from)
    .bind(filter.to)
    .fetch_all(pool)
    .await?;

    Ok(invoices)
}

/// Get one of the user's invoices.
pub async fn get_invoice(pool: &DbPool, user_id: Uuid, invoice_id: Uuid) -> Result<Invoice, AppError> {
    sqlx::query_as::<_, Invoice>("SELECT * FROM invoices WHERE id = $1 AND user_id = $2")
        .bind(invoice_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::InvoiceNotFound)
}

pub async fn get_items(pool: &DbPool, invoice_id: Uuid) -> Result<Vec<InvoiceItem>, AppError> {
    let items = sqlx::query_as::<_, InvoiceItem>(
        "SELECT * FROM invoice_items WHERE invoice_id = $1 ORDER BY position",
    )
    .bind(invoice_id)
    .fetch_all(pool)
    .await?;

    Ok(items)
}

/// Lock an invoice row for the rest of the transaction.
///
/// With `user_id` set, invoices of other users are reported as not found.
pub async fn lock_invoice(
    conn: &mut PgConnection,
    invoice_id: Uuid,
    user_id: Option<Uuid>,
) -> Result<Invoice, AppError> {
    sqlx::query_as::<_, Invoice>(
        "SELECT * FROM invoices WHERE id = $1 AND ($2::uuid IS NULL OR user_id = $2) FOR UPDATE",
    )
    .bind(invoice_id)
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(AppError::InvoiceNotFound)
}

/// Move an invoice to `sent` or `cancelled`.
///
/// Payment goes through the payment service, overdue through the reminder run.
pub async fn transition_invoice(
    pool: &DbPool,
    user_id: Uuid,
    invoice_id: Uuid,
    next: InvoiceStatus,
) -> Result<Invoice, AppError> {
    if !matches!(next, InvoiceStatus::Sent | InvoiceStatus::Cancelled) {
        return Err(AppError::InvalidRequest(format!(
            "Invoices cannot be moved to {next} directly"
        )));
    }

    let mut tx = pool.begin().await?;

    let current = lock_invoice(&mut tx, invoice_id, Some(user_id)).await?;
    if !current.status.can_transition_to(next) {
        tx.rollback().await?;
        return Err(AppError::InvalidStatusTransition {
            from: current.status,
            to: next,
        });
    }

    let invoice = sqlx::query_as::<_, Invoice>(
        r#"
        UPDATE invoices
        SET status = $1,
            sent_at = CASE WHEN $1 = 'sent'::invoice_status THEN NOW() ELSE sent_at END,
            cancelled_at = CASE WHEN $1 = 'cancelled'::invoice_status THEN NOW() ELSE cancelled_at END,
            updated_at = NOW()
        WHERE id = $2
        RETURNING *
        "#,
    )
    .bind(next)
    .bind(invoice_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(
        invoice_id = %invoice.id,
        from = %current.status,
        to = %invoice.status,
        "invoice status changed"
    );

    Ok(invoice)
}
