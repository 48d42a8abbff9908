//! "Ask your invoices": free-text questions mapped to canned queries.
//!
//! The question is normalized (lowercase, French accents stripped,
//! punctuation folded to spaces) and run through keyword and regex checks in
//! a fixed order. The first match decides the intent; each intent runs one
//! query and answers with a French sentence plus the structured data.
//!
//! Checks, in order:
//! 1. a known client plus an unpaid/overdue keyword → unpaid invoices of that client
//! 2. overdue keywords → overdue invoices
//! 3. unpaid keywords → outstanding invoices
//! 4. ranking keywords → top clients by collected amount
//! 5. revenue keywords → collected revenue for a period (year to date by default)
//! 6. a count question naming a status → count for that status
//! 7. a known client → that client's invoices

use std::sync::LazyLock;

use chrono::{Datelike, Duration, NaiveDate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    models::{
        dashboard::ClientRevenue,
        invoice::{Invoice, InvoiceResponse, InvoiceStatus},
    },
};

const DEFAULT_TOP_CLIENTS: u32 = 5;
const MAX_TOP_CLIENTS: u32 = 50;
const MAX_LISTED_INVOICES: i64 = 50;
const MAX_QUESTION_LEN: usize = 500;

/// A date range, both ends inclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Period {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub label: String,
}

/// What the question asks for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QueryIntent {
    ClientUnpaid {
        client: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        client_id: Option<Uuid>,
    },
    ClientInvoices {
        client: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        client_id: Option<Uuid>,
    },
    Revenue { period: Period },
    Overdue,
    Unpaid,
    TopClients { limit: u32 },
    StatusCount { status: InvoiceStatus },
    Unknown,
}

/// One of the user's clients, as seen by the matcher.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct KnownClient {
    pub id: Uuid,
    pub name: String,
}

/// The client a question talks about.
///
/// `id` is set when the name matched one of the user's clients; a bare word
/// after "client" has none and is matched by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientMatch {
    pub name: String,
    pub id: Option<Uuid>,
}

/// Request body for `POST /api/ask`.
#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub question: String,
}

/// Answer to a question.
#[derive(Debug, Serialize)]
pub struct AskResponse {
    pub question: String,
    pub intent: QueryIntent,
    pub answer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount_cents: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<i64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub invoices: Vec<InvoiceResponse>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub clients: Vec<ClientRevenue>,
}

impl AskResponse {
    fn new(question: String, intent: QueryIntent, answer: String) -> Self {
        Self {
            question,
            intent,
            answer,
            amount_cents: None,
            count: None,
            invoices: Vec::new(),
            clients: Vec::new(),
        }
    }
}

static UNPAID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(impayee?s?|non payee?s?|pas (encore )?payee?s?|unpaid|en attente|a encaisser|outstanding|doit|doivent|owes?)\b")
        .expect("valid regex")
});
static OVERDUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(en retard|retards?|overdue|late|echues?|echeance depassee)\b")
        .expect("valid regex")
});
static TOP_CLIENTS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(top|meilleurs? clients?|principaux clients|plus gros clients|best clients|biggest clients)\b")
        .expect("valid regex")
});
static TOP_LIMIT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\btop (\d{1,2})\b|\b(\d{1,2}) (?:meilleurs|principaux|plus gros|best|biggest|top)\b")
        .expect("valid regex")
});
// "ça" folds to "ca", so the abbreviation only counts next to a determiner
// or a period.
static REVENUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(chiffre d affaires|(?:mon|notre|le|du|total) ca|ca (?:du|de|d|en|ce|cette|sur|depuis|total|annuel|mensuel|trimestriel|\d{4})|revenus?|revenue|encaisse|encaissements?|gagne|earned|turnover|income)\b")
        .expect("valid regex")
});
static COUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(combien|nombre|how many|count)\b").expect("valid regex"));
static STATUS_WORDS: LazyLock<[(Regex, InvoiceStatus); 4]> = LazyLock::new(|| {
    [
        (
            Regex::new(r"\b(brouillons?|drafts?)\b").expect("valid regex"),
            InvoiceStatus::Draft,
        ),
        (
            Regex::new(r"\b(annulee?s?|cancell?ed)\b").expect("valid regex"),
            InvoiceStatus::Cancelled,
        ),
        (
            Regex::new(r"\b(payee?s?|reglee?s?|paid)\b").expect("valid regex"),
            InvoiceStatus::Paid,
        ),
        (
            Regex::new(r"\b(envoyee?s?|sent|emises?)\b").expect("valid regex"),
            InvoiceStatus::Sent,
        ),
    ]
});
static CLIENT_WORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bclient\s+(?:(?:le|la|les|l|un|une|the|a)\s+)?([a-z0-9]+)").expect("valid regex")
});
static MONTH_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(janvier|fevrier|mars|avril|mai|juin|juillet|aout|septembre|octobre|novembre|decembre|january|february|march|april|may|june|july|august|september|october|november|december)\b(?:\s+(\d{4}))?")
        .expect("valid regex")
});
static YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(20\d{2})\b").expect("valid regex"));

const MONTHS_FR: [&str; 12] = [
    "janvier", "février", "mars", "avril", "mai", "juin", "juillet", "août", "septembre",
    "octobre", "novembre", "décembre",
];

/// Legal forms and filler words ignored when matching client names by token.
const NAME_STOPWORDS: [&str; 10] = [
    "sarl", "sas", "sasu", "eurl", "sci", "sa", "et", "fils", "cie", "societe",
];

/// Lowercase, strip French accents, fold punctuation to single spaces.
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars().flat_map(char::to_lowercase) {
        let folded = match c {
            'à' | 'â' | 'ä' => 'a',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'î' | 'ï' => 'i',
            'ô' | 'ö' => 'o',
            'ù' | 'û' | 'ü' => 'u',
            'ç' => 'c',
            'œ' => {
                out.push_str("oe");
                continue;
            }
            c if c.is_alphanumeric() => c,
            _ => ' ',
        };
        out.push(folded);
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn contains_phrase(haystack: &str, phrase: &str) -> bool {
    !phrase.is_empty() && format!(" {haystack} ").contains(&format!(" {phrase} "))
}

/// Find the client a normalized question talks about.
///
/// Full names win over single distinctive tokens; longer matches win over
/// shorter ones. Falls back to the word following "client".
pub fn match_client(question: &str, clients: &[KnownClient]) -> Option<ClientMatch> {
    let known = |client: &KnownClient| ClientMatch {
        name: client.name.clone(),
        id: Some(client.id),
    };

    let full = clients
        .iter()
        .filter(|client| contains_phrase(question, &normalize(&client.name)))
        .max_by_key(|client| normalize(&client.name).len());
    if let Some(client) = full {
        return Some(known(client));
    }

    let by_token = clients
        .iter()
        .filter_map(|client| {
            normalize(&client.name)
                .split(' ')
                .filter(|token| token.len() >= 4 && !NAME_STOPWORDS.contains(token))
                .filter(|token| contains_phrase(question, token))
                .map(str::len)
                .max()
                .map(|len| (len, client))
        })
        .max_by_key(|(len, _)| *len);
    if let Some((_, client)) = by_token {
        return Some(known(client));
    }

    CLIENT_WORD
        .captures(question)
        .and_then(|caps| caps.get(1))
        .map(|m| ClientMatch {
            name: m.as_str().to_string(),
            id: None,
        })
}

fn month_bounds(year: i32, month: u32) -> Option<(NaiveDate, NaiveDate)> {
    let from = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    Some((from, next - Duration::days(1)))
}

fn month_period(year: i32, month: u32) -> Option<Period> {
    let (from, to) = month_bounds(year, month)?;
    Some(Period {
        from,
        to,
        label: format!("{} {}", MONTHS_FR[month as usize - 1], year),
    })
}

fn quarter_period(year: i32, quarter: u32) -> Option<Period> {
    let (from, _) = month_bounds(year, quarter * 3 - 2)?;
    let (_, to) = month_bounds(year, quarter * 3)?;
    Some(Period {
        from,
        to,
        label: format!("T{quarter} {year}"),
    })
}

fn year_period(year: i32) -> Option<Period> {
    Some(Period {
        from: NaiveDate::from_ymd_opt(year, 1, 1)?,
        to: NaiveDate::from_ymd_opt(year, 12, 31)?,
        label: year.to_string(),
    })
}

fn month_number(name: &str) -> Option<u32> {
    let month = match name {
        "janvier" | "january" => 1,
        "fevrier" | "february" => 2,
        "mars" | "march" => 3,
        "avril" | "april" => 4,
        "mai" | "may" => 5,
        "juin" | "june" => 6,
        "juillet" | "july" => 7,
        "aout" | "august" => 8,
        "septembre" | "september" => 9,
        "octobre" | "october" => 10,
        "novembre" | "november" => 11,
        "decembre" | "december" => 12,
        _ => return None,
    };
    Some(month)
}

/// Resolve the period named in a normalized question, relative to `today`.
pub fn parse_period(question: &str, today: NaiveDate) -> Option<Period> {
    let has = |phrases: &[&str]| phrases.iter().any(|p| contains_phrase(question, p));
    let (year, month) = (today.year(), today.month());
    let quarter = (month - 1) / 3 + 1;

    if has(&["mois dernier", "mois precedent", "last month", "previous month"]) {
        return if month == 1 {
            month_period(year - 1, 12)
        } else {
            month_period(year, month - 1)
        };
    }
    if has(&["ce mois", "ce mois ci", "mois en cours", "this month", "current month"]) {
        return month_period(year, month);
    }
    if has(&["trimestre dernier", "trimestre precedent", "last quarter", "previous quarter"]) {
        return if quarter == 1 {
            quarter_period(year - 1, 4)
        } else {
            quarter_period(year, quarter - 1)
        };
    }
    if has(&["ce trimestre", "trimestre en cours", "this quarter", "current quarter"]) {
        return quarter_period(year, quarter);
    }
    if has(&["annee derniere", "annee precedente", "an dernier", "last year", "previous year"]) {
        return year_period(year - 1);
    }
    if has(&["cette annee", "annee en cours", "this year", "current year"]) {
        return year_period(year);
    }

    if let Some(caps) = MONTH_NAME.captures(question) {
        let named = caps.get(1).and_then(|m| month_number(m.as_str()))?;
        let named_year = match caps.get(2) {
            Some(y) => y.as_str().parse().ok()?,
            // A month later than the current one without a year means last year.
            None if named > month => year - 1,
            None => year,
        };
        return month_period(named_year, named);
    }

    if let Some(caps) = YEAR.captures(question) {
        let named_year: i32 = caps.get(1)?.as_str().parse().ok()?;
        return year_period(named_year);
    }

    None
}

fn year_to_date(today: NaiveDate) -> Period {
    Period {
        from: NaiveDate::from_ymd_opt(today.year(), 1, 1).unwrap_or(today),
        to: today,
        label: format!("depuis le 1er janvier {}", today.year()),
    }
}

fn top_limit(question: &str) -> u32 {
    TOP_LIMIT
        .captures(question)
        .and_then(|caps| caps.get(1).or_else(|| caps.get(2)))
        .and_then(|m| m.as_str().parse::<u32>().ok())
        .map(|n| n.clamp(1, MAX_TOP_CLIENTS))
        .unwrap_or(DEFAULT_TOP_CLIENTS)
}

/// Map a question to an intent.
pub fn classify(question: &str, today: NaiveDate, clients: &[KnownClient]) -> QueryIntent {
    let q = normalize(question);
    let client = match_client(&q, clients);
    let unpaid = UNPAID.is_match(&q);
    let overdue = OVERDUE.is_match(&q);

    if let Some(client) = &client {
        if unpaid || overdue {
            return QueryIntent::ClientUnpaid {
                client: client.name.clone(),
                client_id: client.id,
            };
        }
    }
    if overdue {
        return QueryIntent::Overdue;
    }
    if unpaid {
        return QueryIntent::Unpaid;
    }
    if TOP_CLIENTS.is_match(&q) {
        return QueryIntent::TopClients {
            limit: top_limit(&q),
        };
    }
    if REVENUE.is_match(&q) {
        return QueryIntent::Revenue {
            period: parse_period(&q, today).unwrap_or_else(|| year_to_date(today)),
        };
    }
    if COUNT.is_match(&q) {
        if let Some((_, status)) = STATUS_WORDS.iter().find(|(re, _)| re.is_match(&q)) {
            return QueryIntent::StatusCount { status: *status };
        }
    }
    if let Some(client) = client {
        return QueryIntent::ClientInvoices {
            client: client.name,
            client_id: client.id,
        };
    }

    QueryIntent::Unknown
}

/// `123456` → `1 234,56 €`
pub fn format_eur(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    let euros = (abs / 100).to_string();
    let mut grouped = String::with_capacity(euros.len() + euros.len() / 3);
    for (i, digit) in euros.chars().enumerate() {
        if i > 0 && (euros.len() - i) % 3 == 0 {
            grouped.push(' ');
        }
        grouped.push(digit);
    }
    format!("{sign}{grouped},{:02} €", abs % 100)
}

fn plural(count: i64, singular: &str, plural: &str) -> String {
    if count > 1 {
        format!("{count} {plural}")
    } else {
        format!("{count} {singular}")
    }
}

/// `%` and `_` are wildcards in ILIKE.
fn like_pattern(value: &str) -> String {
    let escaped = value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

/// An invoice row carrying the count and TTC total of every matching row,
/// computed before `LIMIT`.
#[derive(Debug, sqlx::FromRow)]
struct ListedInvoice {
    #[sqlx(flatten)]
    invoice: Invoice,
    matching_count: i64,
    matching_total_cents: i64,
}

/// Split listed rows into the invoices and the totals over all matches.
fn split_listed(rows: Vec<ListedInvoice>) -> (Vec<Invoice>, i64, i64) {
    let (count, total) = rows
        .first()
        .map(|row| (row.matching_count, row.matching_total_cents))
        .unwrap_or((0, 0));
    let invoices = rows.into_iter().map(|row| row.invoice).collect();
    (invoices, count, total)
}

/// Answer a question for the user.
pub async fn ask(
    pool: &DbPool,
    user_id: Uuid,
    question: String,
    today: NaiveDate,
) -> Result<AskResponse, AppError> {
    let trimmed = question.trim();
    if trimmed.is_empty() {
        return Err(AppError::InvalidRequest("Question is empty".to_string()));
    }
    if trimmed.chars().count() > MAX_QUESTION_LEN {
        return Err(AppError::InvalidRequest(format!(
            "Question exceeds {MAX_QUESTION_LEN} characters"
        )));
    }

    let clients =
        sqlx::query_as::<_, KnownClient>("SELECT id, name FROM clients WHERE user_id = $1")
            .bind(user_id)
            .fetch_all(pool)
            .await?;

    let intent = classify(trimmed, today, &clients);
    tracing::debug!(?intent, "question classified");

    match intent {
        QueryIntent::ClientUnpaid {
            ref client,
            client_id,
        } => {
            // A known client is matched by id; only a bare word falls back to ILIKE.
            let rows = sqlx::query_as::<_, ListedInvoice>(
                r#"
                SELECT i.*,
                       COUNT(*) OVER () AS matching_count,
                       (SUM(i.total_ttc_cents) OVER ())::BIGINT AS matching_total_cents
                FROM invoices i
                JOIN clients c ON c.id = i.client_id
                WHERE i.user_id = $1
                  AND (i.client_id = $2 OR ($2::uuid IS NULL AND c.name ILIKE $3))
                  AND i.status IN ('sent', 'overdue')
                ORDER BY i.due_date
                LIMIT $4
                "#,
            )
            .bind(user_id)
            .bind(client_id)
            .bind(like_pattern(client))
            .bind(MAX_LISTED_INVOICES)
            .fetch_all(pool)
            .await?;

            let (invoices, count, total) = split_listed(rows);
            let answer = if count == 0 {
                format!("Aucune facture impayée pour {client}.")
            } else {
                format!(
                    "{client} a {} pour un total de {}.",
                    plural(count, "facture impayée", "factures impayées"),
                    format_eur(total)
                )
            };
            Ok(with_invoices(trimmed, intent.clone(), answer, invoices, count, total))
        }
        QueryIntent::ClientInvoices {
            ref client,
            client_id,
        } => {
            let rows = sqlx::query_as::<_, ListedInvoice>(
                r#"
                SELECT i.*,
                       COUNT(*) OVER () AS matching_count,
                       (SUM(i.total_ttc_cents) OVER ())::BIGINT AS matching_total_cents
                FROM invoices i
                JOIN clients c ON c.id = i.client_id
                WHERE i.user_id = $1
                  AND (i.client_id = $2 OR ($2::uuid IS NULL AND c.name ILIKE $3))
                  AND i.status <> 'cancelled'
                ORDER BY i.issue_date DESC
                LIMIT $4
                "#,
            )
            .bind(user_id)
            .bind(client_id)
            .bind(like_pattern(client))
            .bind(MAX_LISTED_INVOICES)
            .fetch_all(pool)
            .await?;

            let (invoices, count, total) = split_listed(rows);
            let answer = if count == 0 {
                format!("Aucune facture trouvée pour {client}.")
            } else {
                format!(
                    "{} pour {client}, {} au total.",
                    plural(count, "facture", "factures"),
                    format_eur(total)
                )
            };
            Ok(with_invoices(trimmed, intent.clone(), answer, invoices, count, total))
        }
        QueryIntent::Revenue { ref period } => {
            let (ttc, ht, count) = sqlx::query_as::<_, (i64, i64, i64)>(
                r#"
                SELECT COALESCE(SUM(total_ttc_cents), 0)::BIGINT,
                       COALESCE(SUM(total_ht_cents), 0)::BIGINT,
                       COUNT(*)
                FROM invoices
                WHERE user_id = $1
                  AND status = 'paid'
                  AND (paid_at AT TIME ZONE 'Europe/Paris')::date BETWEEN $2 AND $3
                "#,
            )
            .bind(user_id)
            .bind(period.from)
            .bind(period.to)
            .fetch_one(pool)
            .await?;

            let answer = format!(
                "Chiffre d'affaires encaissé ({}) : {} TTC, {} HT, sur {}.",
                period.label,
                format_eur(ttc),
                format_eur(ht),
                plural(count, "facture", "factures")
            );
            let mut response = AskResponse::new(trimmed.to_string(), intent.clone(), answer);
            response.amount_cents = Some(ttc);
            response.count = Some(count);
            Ok(response)
        }
        QueryIntent::Overdue => {
            let rows = sqlx::query_as::<_, ListedInvoice>(
                r#"
                SELECT *,
                       COUNT(*) OVER () AS matching_count,
                       (SUM(total_ttc_cents) OVER ())::BIGINT AS matching_total_cents
                FROM invoices
                WHERE user_id = $1
                  AND (status = 'overdue' OR (status = 'sent' AND due_date < $2))
                ORDER BY due_date
                LIMIT $3
                "#,
            )
            .bind(user_id)
            .bind(today)
            .bind(MAX_LISTED_INVOICES)
            .fetch_all(pool)
            .await?;

            let (invoices, count, total) = split_listed(rows);
            let answer = if count == 0 {
                "Aucune facture en retard.".to_string()
            } else {
                format!(
                    "{} en retard pour {}.",
                    plural(count, "facture", "factures"),
                    format_eur(total)
                )
            };
            Ok(with_invoices(trimmed, intent, answer, invoices, count, total))
        }
        QueryIntent::Unpaid => {
            let rows = sqlx::query_as::<_, ListedInvoice>(
                r#"
                SELECT *,
                       COUNT(*) OVER () AS matching_count,
                       (SUM(total_ttc_cents) OVER ())::BIGINT AS matching_total_cents
                FROM invoices
                WHERE user_id = $1
                  AND status IN ('sent', 'overdue')
                ORDER BY due_date
                LIMIT $2
                "#,
            )
            .bind(user_id)
            .bind(MAX_LISTED_INVOICES)
            .fetch_all(pool)
            .await?;

            let (invoices, count, total) = split_listed(rows);
            let answer = if count == 0 {
                "Toutes vos factures émises sont payées.".to_string()
            } else {
                format!(
                    "{} en attente de paiement pour {}.",
                    plural(count, "facture", "factures"),
                    format_eur(total)
                )
            };
            Ok(with_invoices(trimmed, intent, answer, invoices, count, total))
        }
        QueryIntent::TopClients { limit } => {
            let clients = sqlx::query_as::<_, ClientRevenue>(
                r#"
                SELECT c.id AS client_id,
                       c.name AS client_name,
                       COUNT(*) AS invoice_count,
                       SUM(i.total_ttc_cents)::BIGINT AS total_ttc_cents
                FROM invoices i
                JOIN clients c ON c.id = i.client_id
                WHERE i.user_id = $1 AND i.status = 'paid'
                GROUP BY c.id, c.name
                ORDER BY SUM(i.total_ttc_cents) DESC, c.name
                LIMIT $2
                "#,
            )
            .bind(user_id)
            .bind(limit as i64)
            .fetch_all(pool)
            .await?;

            let answer = match clients.first() {
                Some(best) => format!(
                    "Votre meilleur client est {} avec {} encaissés.",
                    best.client_name,
                    format_eur(best.total_ttc_cents)
                ),
                None => "Aucune facture payée pour le moment.".to_string(),
            };
            let mut response = AskResponse::new(trimmed.to_string(), intent, answer);
            response.clients = clients;
            Ok(response)
        }
        QueryIntent::StatusCount { status } => {
            let (count, total) = sqlx::query_as::<_, (i64, i64)>(
                r#"
                SELECT COUNT(*), COALESCE(SUM(total_ttc_cents), 0)::BIGINT
                FROM invoices
                WHERE user_id = $1 AND status = $2
                "#,
            )
            .bind(user_id)
            .bind(status)
            .fetch_one(pool)
            .await?;

            let answer = format!(
                "{} au statut « {} » pour {}.",
                plural(count, "facture", "factures"),
                status.label_fr(),
                format_eur(total)
            );
            let mut response = AskResponse::new(trimmed.to_string(), intent, answer);
            response.count = Some(count);
            response.amount_cents = Some(total);
            Ok(response)
        }
        QueryIntent::Unknown => Ok(AskResponse::new(
            trimmed.to_string(),
            intent,
            "Je n'ai pas compris la question. Essayez par exemple : « factures impayées de Dupont », \
             « chiffre d'affaires du mois dernier », « factures en retard » ou « top 5 clients »."
                .to_string(),
        )),
    }
}

fn with_invoices(
    question: &str,
    intent: QueryIntent,
    answer: String,
    invoices: Vec<Invoice>,
    count: i64,
    total: i64,
) -> AskResponse {
    let mut response = AskResponse::new(question.to_string(), intent, answer);
    response.count = Some(count);
    response.amount_cents = Some(total);
    response.invoices = invoices.into_iter().map(InvoiceResponse::from).collect();
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::fixtures;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 18).unwrap()
    }

    fn known(id: u128, name: &str) -> KnownClient {
        KnownClient {
            id: Uuid::from_u128(id),
            name: name.to_string(),
        }
    }

    fn clients() -> Vec<KnownClient> {
        vec![
            known(1, "Boulangerie Dupont"),
            known(2, "SARL Martin & Fils"),
            known(3, "Café de la Gare"),
        ]
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn normalize_strips_accents_and_punctuation() {
        assert_eq!(
            normalize("Chiffre d’affaires du mois DERNIER ?"),
            "chiffre d affaires du mois dernier"
        );
        assert_eq!(normalize("Factures  impayées / Café"), "factures impayees cafe");
        assert_eq!(normalize("Cœur"), "coeur");
    }

    #[test]
    fn client_unpaid_by_full_name() {
        let intent = classify(
            "Quelles sont les factures impayées de la Boulangerie Dupont ?",
            today(),
            &clients(),
        );
        assert_eq!(
            intent,
            QueryIntent::ClientUnpaid {
                client: "Boulangerie Dupont".to_string(),
                client_id: Some(Uuid::from_u128(1)),
            }
        );
    }

    #[test]
    fn client_matched_by_distinctive_token() {
        let intent = classify("combien me doit Martin ?", today(), &clients());
        assert_eq!(
            intent,
            QueryIntent::ClientUnpaid {
                client: "SARL Martin & Fils".to_string(),
                client_id: Some(Uuid::from_u128(2)),
            }
        );
    }

    #[test]
    fn accented_client_name_matches_plain_question() {
        let intent = classify("factures du cafe de la gare", today(), &clients());
        assert_eq!(
            intent,
            QueryIntent::ClientInvoices {
                client: "Café de la Gare".to_string(),
                client_id: Some(Uuid::from_u128(3)),
            }
        );
    }

    #[test]
    fn unknown_client_falls_back_to_word_after_client() {
        let intent = classify("factures en retard du client Leroy", today(), &[]);
        assert_eq!(
            intent,
            QueryIntent::ClientUnpaid {
                client: "leroy".to_string(),
                client_id: None,
            }
        );
    }

    #[test]
    fn exact_name_wins_over_longer_names_sharing_it() {
        let clients = vec![known(10, "Martin"), known(11, "Martin Design")];

        let exact = match_client(&normalize("factures impayées de Martin"), &clients).unwrap();
        assert_eq!(exact.name, "Martin");
        assert_eq!(exact.id, Some(Uuid::from_u128(10)));

        let longer = match_client(&normalize("factures de Martin Design"), &clients).unwrap();
        assert_eq!(longer.id, Some(Uuid::from_u128(11)));
    }

    #[test]
    fn overdue_and_unpaid_without_client() {
        assert_eq!(
            classify("Quelles factures sont en retard ?", today(), &clients()),
            QueryIntent::Overdue
        );
        assert_eq!(
            classify("show me unpaid invoices", today(), &clients()),
            QueryIntent::Unpaid
        );
    }

    #[test]
    fn revenue_last_month() {
        let intent = classify("Quel est mon chiffre d'affaires du mois dernier ?", today(), &[]);
        let QueryIntent::Revenue { period } = intent else {
            panic!("expected revenue intent, got {intent:?}");
        };
        assert_eq!(period.from, date(2026, 2, 1));
        assert_eq!(period.to, date(2026, 2, 28));
        assert_eq!(period.label, "février 2026");
    }

    #[test]
    fn revenue_without_period_is_year_to_date() {
        let intent = classify("revenue?", today(), &[]);
        let QueryIntent::Revenue { period } = intent else {
            panic!("expected revenue intent, got {intent:?}");
        };
        assert_eq!(period.from, date(2026, 1, 1));
        assert_eq!(period.to, today());
    }

    #[test]
    fn periods_resolve_relative_to_today() {
        let january = date(2026, 1, 10);
        let last_month = parse_period("ca du mois dernier", january).unwrap();
        assert_eq!(last_month.from, date(2025, 12, 1));
        assert_eq!(last_month.to, date(2025, 12, 31));

        let quarter = parse_period("ce trimestre", today()).unwrap();
        assert_eq!(quarter.from, date(2026, 1, 1));
        assert_eq!(quarter.to, date(2026, 3, 31));
        assert_eq!(quarter.label, "T1 2026");

        let last_quarter = parse_period("last quarter", today()).unwrap();
        assert_eq!(last_quarter.from, date(2025, 10, 1));
        assert_eq!(last_quarter.to, date(2025, 12, 31));

        let last_year = parse_period("l an dernier", today()).unwrap();
        assert_eq!(last_year.from, date(2025, 1, 1));
        assert_eq!(last_year.to, date(2025, 12, 31));
    }

    #[test]
    fn month_names_pick_the_most_recent_occurrence() {
        let june = parse_period("ca en juin", today()).unwrap();
        assert_eq!(june.from, date(2025, 6, 1));

        let february = parse_period("revenue in february", today()).unwrap();
        assert_eq!(february.from, date(2026, 2, 1));

        let explicit = parse_period("ca de decembre 2024", today()).unwrap();
        assert_eq!(explicit.from, date(2024, 12, 1));
        assert_eq!(explicit.to, date(2024, 12, 31));

        let leap = parse_period("fevrier 2024", today()).unwrap();
        assert_eq!(leap.to, date(2024, 2, 29));
    }

    #[test]
    fn bare_year_is_whole_year() {
        let period = parse_period("chiffre d affaires 2025", today()).unwrap();
        assert_eq!(period.from, date(2025, 1, 1));
        assert_eq!(period.to, date(2025, 12, 31));
        assert!(parse_period("bonjour", today()).is_none());
    }

    #[test]
    fn top_clients_with_and_without_limit() {
        assert_eq!(
            classify("top 3 clients", today(), &[]),
            QueryIntent::TopClients { limit: 3 }
        );
        assert_eq!(
            classify("Qui sont mes meilleurs clients ?", today(), &[]),
            QueryIntent::TopClients { limit: 5 }
        );
        assert_eq!(
            classify("les 10 meilleurs clients par chiffre d'affaires", today(), &[]),
            QueryIntent::TopClients { limit: 10 }
        );
    }

    #[test]
    fn status_counts_do_not_confuse_paid_with_unpaid() {
        assert_eq!(
            classify("Combien de factures payées ?", today(), &[]),
            QueryIntent::StatusCount {
                status: InvoiceStatus::Paid
            }
        );
        assert_eq!(
            classify("Combien de factures impayées ?", today(), &[]),
            QueryIntent::Unpaid
        );
        assert_eq!(
            classify("how many drafts", today(), &[]),
            QueryIntent::StatusCount {
                status: InvoiceStatus::Draft
            }
        );
    }

    #[test]
    fn ca_needs_revenue_context() {
        assert_eq!(
            classify("Combien ça fait de factures payées ?", today(), &[]),
            QueryIntent::StatusCount {
                status: InvoiceStatus::Paid
            }
        );

        let intent = classify("Quel est mon CA ce mois-ci ?", today(), &[]);
        let QueryIntent::Revenue { period } = intent else {
            panic!("expected revenue intent, got {intent:?}");
        };
        assert_eq!(period.from, date(2026, 3, 1));
        assert_eq!(period.to, date(2026, 3, 31));

        assert!(matches!(
            classify("CA de janvier", today(), &[]),
            QueryIntent::Revenue { .. }
        ));
    }

    #[test]
    fn unrelated_question_is_unknown() {
        assert_eq!(
            classify("Quel temps fait-il à Lyon ?", today(), &clients()),
            QueryIntent::Unknown
        );
    }

    #[test]
    fn euros_are_formatted_the_french_way() {
        assert_eq!(format_eur(0), "0,00 €");
        assert_eq!(format_eur(5), "0,05 €");
        assert_eq!(format_eur(123456), "1 234,56 €");
        assert_eq!(format_eur(100000000), "1 000 000,00 €");
        assert_eq!(format_eur(-2550), "-25,50 €");
    }

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("Dupont"), "%Dupont%");
        assert_eq!(like_pattern("100%_bio"), "%100\\%\\_bio%");
    }

    async fn insert_unpaid(pool: &DbPool, user_id: Uuid, client_id: Uuid, count: i32) {
        sqlx::query(
            r#"
            INSERT INTO invoices (
                user_id, client_id, number, status, issue_date, due_date,
                total_ht_cents, total_tva_cents, total_ttc_cents
            )
            SELECT $1, $2, 'IMP-' || $2::text || '-' || n, 'sent'::invoice_status,
                   DATE '2026-02-01', DATE '2026-03-03', 10000, 2000, 12000
            FROM generate_series(1, $3) AS n
            "#,
        )
        .bind(user_id)
        .bind(client_id)
        .bind(count)
        .execute(pool)
        .await
        .unwrap();
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn known_client_is_queried_by_id(pool: DbPool) {
        let user_id = fixtures::user(&pool, "atelier@example.fr").await;
        let martin = fixtures::client(&pool, user_id, "Martin").await;
        let design = fixtures::client(&pool, user_id, "Martin Design").await;
        insert_unpaid(&pool, user_id, martin, 1).await;
        insert_unpaid(&pool, user_id, design, 2).await;

        let response = ask(&pool, user_id, "factures impayées de Martin".to_string(), today())
            .await
            .unwrap();

        assert_eq!(
            response.intent,
            QueryIntent::ClientUnpaid {
                client: "Martin".to_string(),
                client_id: Some(martin),
            }
        );
        assert_eq!(response.count, Some(1));
        assert_eq!(response.amount_cents, Some(12_000));
        assert!(response.invoices.iter().all(|i| i.client_id == martin));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn totals_cover_more_invoices_than_listed(pool: DbPool) {
        let user_id = fixtures::user(&pool, "atelier@example.fr").await;
        let client_id = fixtures::client(&pool, user_id, "Dupont").await;
        insert_unpaid(&pool, user_id, client_id, 60).await;

        let response = ask(&pool, user_id, "factures impayées".to_string(), today())
            .await
            .unwrap();

        assert_eq!(response.intent, QueryIntent::Unpaid);
        assert_eq!(response.count, Some(60));
        assert_eq!(response.amount_cents, Some(60 * 12_000));
        assert_eq!(response.invoices.len(), MAX_LISTED_INVOICES as usize);
        assert!(response.answer.starts_with("60 factures"));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn question_length_counts_characters(pool: DbPool) {
        let user_id = fixtures::user(&pool, "atelier@example.fr").await;

        // 500 two-byte characters are within the limit.
        let accented = "é".repeat(MAX_QUESTION_LEN);
        let response = ask(&pool, user_id, accented, today()).await.unwrap();
        assert_eq!(response.intent, QueryIntent::Unknown);

        let too_long = "é".repeat(MAX_QUESTION_LEN + 1);
        assert!(matches!(
            ask(&pool, user_id, too_long, today()).await,
            Err(AppError::InvalidRequest(_))
        ));
    }
}
