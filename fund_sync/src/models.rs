//! Diesel models mapping to the database schema.
//!
//! These types mirror the tables defined in the embedded migrations and in
//! [`crate::schema`] for use with Diesel's Queryable/Insertable APIs:
//! - [`crate::schema::fund_providers`] / [`crate::schema::fund_issuers`] —
//!   the organization directory (provider → issuer CIK hierarchy)
//! - [`crate::schema::fund_series`] / [`crate::schema::fund_classes`] —
//!   Type 6 SCD history of fund structure
//! - [`crate::schema::sec_reports`] — per-filing download/processing state
//! - [`crate::schema::security_mappings`] — identifier-to-ticker cache
//!
//! All timestamps are RFC 3339 UTC strings; date-only columns are
//! `YYYY-MM-DD` strings. See the migrations for constraints (partial unique
//! indexes on current SCD rows and active mappings, the filing natural key).

use diesel::prelude::*;

use crate::schema::*;

/// A row in [`crate::schema::fund_providers`]: a fund family grouping issuers.
#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = fund_providers, check_for_backend(diesel::sqlite::Sqlite))]
pub struct FundProvider {
    /// Database primary key.
    pub id: i32,
    /// Canonical provider name (unique), e.g. "BlackRock".
    pub provider_name: String,
    /// Optional display name when it differs from the canonical one.
    pub display_name: Option<String>,
    /// Inactive providers are excluded from pipeline runs.
    pub is_active: bool,
    /// Row creation timestamp (RFC 3339 UTC).
    pub created_at: String,
    /// Row update timestamp (RFC 3339 UTC).
    pub updated_at: String,
}

/// A row in [`crate::schema::fund_issuers`]: one registrant CIK.
#[derive(Debug, Clone, Queryable, Identifiable, Associations, Selectable)]
#[diesel(table_name = fund_issuers, check_for_backend(diesel::sqlite::Sqlite))]
#[diesel(belongs_to(FundProvider, foreign_key = provider_id))]
pub struct FundIssuer {
    /// Database primary key.
    pub id: i32,
    /// FK to [`FundProvider::id`].
    pub provider_id: i32,
    /// Registrant CIK as text (unique); normalized to 10 digits at the
    /// discovery boundary.
    pub cik: String,
    /// Registrant company name.
    pub company_name: String,
    /// Inactive issuers are excluded from pipeline runs.
    pub is_active: bool,
    /// Row creation timestamp (RFC 3339 UTC).
    pub created_at: String,
    /// Row update timestamp (RFC 3339 UTC).
    pub updated_at: String,
}

/// A row in [`crate::schema::fund_series`]: Type 6 SCD series history.
///
/// At most one row per `series_code` has `is_current = true`, enforced by a
/// partial unique index.
#[derive(Debug, Clone, Queryable, Identifiable, AsChangeset, Selectable)]
#[diesel(table_name = fund_series, check_for_backend(diesel::sqlite::Sqlite))]
pub struct FundSeries {
    /// Database primary key.
    pub id: i32,
    /// FK to [`FundIssuer::id`].
    pub issuer_id: i32,
    /// Series code, e.g. "S000004310".
    pub series_code: String,
    /// Whether this is the current row for the series code.
    pub is_current: bool,
    /// Start of this row's validity interval (RFC 3339 UTC).
    pub effective_date: String,
    /// End of validity; NULL while current.
    pub end_date: Option<String>,
    /// Where the row came from, e.g. "sec_api".
    pub source: String,
    /// Last time a discovery run confirmed the series still exists.
    pub last_verified_date: String,
    /// Row creation timestamp (RFC 3339 UTC).
    pub created_at: String,
    /// Row update timestamp (RFC 3339 UTC).
    pub updated_at: String,
}

/// Insertable form of [`FundSeries`].
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = fund_series)]
pub struct NewFundSeries<'a> {
    /// FK to [`FundIssuer::id`].
    pub issuer_id: i32,
    /// Series code, e.g. "S000004310".
    pub series_code: &'a str,
    /// Whether the new row is current (always true on insert).
    pub is_current: bool,
    /// Start of the validity interval (RFC 3339 UTC).
    pub effective_date: &'a str,
    /// Source tag, e.g. "sec_api".
    pub source: &'a str,
    /// Verification timestamp (RFC 3339 UTC).
    pub last_verified_date: &'a str,
    /// Row creation timestamp (RFC 3339 UTC).
    pub created_at: &'a str,
    /// Row update timestamp (RFC 3339 UTC).
    pub updated_at: &'a str,
}

/// A row in [`crate::schema::fund_classes`]: Type 6 SCD share class history.
///
/// Tracked attributes are `class_name` and `ticker`; a change closes the
/// current row and opens a new one carrying a human-readable `change_reason`.
#[derive(Debug, Clone, Queryable, Identifiable, AsChangeset, Selectable)]
#[diesel(table_name = fund_classes, check_for_backend(diesel::sqlite::Sqlite))]
pub struct FundClass {
    /// Database primary key.
    pub id: i32,
    /// Owning series code (denormalized, not a FK — series history rows are
    /// not unique per code).
    pub series_code: String,
    /// Class code, e.g. "C000219740".
    pub class_code: String,
    /// Class display name at this point in history.
    pub class_name: Option<String>,
    /// Ticker symbol at this point in history.
    pub ticker: Option<String>,
    /// Whether this is the current row for the class code.
    pub is_current: bool,
    /// Start of this row's validity interval (RFC 3339 UTC).
    pub effective_date: String,
    /// End of validity; NULL while current.
    pub end_date: Option<String>,
    /// Why this row was opened: "new_record" or a field-by-field diff.
    pub change_reason: Option<String>,
    /// Where the row came from, e.g. "sec_api".
    pub source: String,
    /// Last time a discovery run confirmed these attributes.
    pub last_verified_date: String,
    /// Row creation timestamp (RFC 3339 UTC).
    pub created_at: String,
    /// Row update timestamp (RFC 3339 UTC).
    pub updated_at: String,
}

/// Insertable form of [`FundClass`].
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = fund_classes)]
pub struct NewFundClass<'a> {
    /// Owning series code.
    pub series_code: &'a str,
    /// Class code, e.g. "C000219740".
    pub class_code: &'a str,
    /// Class display name.
    pub class_name: Option<&'a str>,
    /// Ticker symbol.
    pub ticker: Option<&'a str>,
    /// Whether the new row is current (always true on insert).
    pub is_current: bool,
    /// Start of the validity interval (RFC 3339 UTC).
    pub effective_date: &'a str,
    /// Why this row was opened.
    pub change_reason: Option<&'a str>,
    /// Source tag, e.g. "sec_api".
    pub source: &'a str,
    /// Verification timestamp (RFC 3339 UTC).
    pub last_verified_date: &'a str,
    /// Row creation timestamp (RFC 3339 UTC).
    pub created_at: &'a str,
    /// Row update timestamp (RFC 3339 UTC).
    pub updated_at: &'a str,
}

/// A row in [`crate::schema::sec_reports`]: one filing's lifecycle record.
///
/// Unique on (`series_code`, `accession_number`, `form_type`); created by
/// discovery, mutated only by the state machine, never deleted.
#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = sec_reports, check_for_backend(diesel::sqlite::Sqlite))]
pub struct SecReport {
    /// Database primary key.
    pub id: i32,
    /// Series the filing belongs to.
    pub series_code: String,
    /// Accession number in dashed form.
    pub accession_number: String,
    /// Form type, e.g. "NPORT-P".
    pub form_type: String,
    /// Filing date (`YYYY-MM-DD`) when discovery could infer one.
    pub filing_date: Option<String>,
    /// Report period date (`YYYY-MM-DD`) when discovery could infer one.
    pub report_date: Option<String>,
    /// When the data becomes public (N-PORT filings have a 60-day delay).
    pub public_date: Option<String>,
    /// Download axis: "pending" | "downloaded" | "failed".
    pub download_status: String,
    /// Processing axis: "pending" | "processed" | "failed".
    pub processing_status: String,
    /// JSON map of artifact kind → filesystem path, e.g. `{"xml": "..."}`.
    pub file_paths: Option<String>,
    /// Last error observed by a stage runner.
    pub error_message: Option<String>,
    /// Row creation timestamp (RFC 3339 UTC).
    pub created_at: String,
    /// Row update timestamp (RFC 3339 UTC).
    pub updated_at: String,
    /// Last time the processing stage touched this filing.
    pub last_processed_at: Option<String>,
}

/// Insertable form of [`SecReport`].
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = sec_reports)]
pub struct NewSecReport<'a> {
    /// Series the filing belongs to.
    pub series_code: &'a str,
    /// Accession number in dashed form.
    pub accession_number: &'a str,
    /// Form type, e.g. "NPORT-P".
    pub form_type: &'a str,
    /// Filing date (`YYYY-MM-DD`).
    pub filing_date: Option<String>,
    /// Report period date (`YYYY-MM-DD`).
    pub report_date: Option<String>,
    /// Download axis status (always "pending" on insert).
    pub download_status: &'a str,
    /// Processing axis status (always "pending" on insert).
    pub processing_status: &'a str,
    /// Row creation timestamp (RFC 3339 UTC).
    pub created_at: &'a str,
    /// Row update timestamp (RFC 3339 UTC).
    pub updated_at: &'a str,
}

/// A row in [`crate::schema::security_mappings`]: one identifier lookup
/// outcome, positive or confirmed-negative.
///
/// At most one active row (`end_date IS NULL`) exists per
/// (`identifier_type`, `identifier_value`), enforced by a partial unique
/// index. Mappings are updated in place on re-lookup rather than versioned.
#[derive(Debug, Clone, Queryable, Identifiable, AsChangeset, Selectable)]
#[diesel(table_name = security_mappings, check_for_backend(diesel::sqlite::Sqlite))]
pub struct SecurityMapping {
    /// Database primary key.
    pub id: i32,
    /// "CUSIP" or "ISIN" (CHECK-constrained).
    pub identifier_type: String,
    /// The identifier value that was looked up.
    pub identifier_value: String,
    /// Resolved ticker; NULL when none was found.
    pub ticker: Option<String>,
    /// True when the API confirmed there is no ticker — distinct from
    /// "never looked up".
    pub has_no_results: bool,
    /// When this mapping first became active (RFC 3339 UTC).
    pub start_date: String,
    /// Set on manual invalidation; NULL while active.
    pub end_date: Option<String>,
    /// Last time the API was consulted for this identifier.
    pub last_fetched_date: String,
    /// Row creation timestamp (RFC 3339 UTC).
    pub created_at: String,
    /// Row update timestamp (RFC 3339 UTC).
    pub updated_at: String,
}

/// Insertable form of [`SecurityMapping`].
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = security_mappings)]
pub struct NewSecurityMapping<'a> {
    /// "CUSIP" or "ISIN".
    pub identifier_type: &'a str,
    /// The identifier value.
    pub identifier_value: &'a str,
    /// Resolved ticker, when one was found.
    pub ticker: Option<&'a str>,
    /// True when the API confirmed there is no ticker.
    pub has_no_results: bool,
    /// Activation timestamp (RFC 3339 UTC).
    pub start_date: &'a str,
    /// Fetch timestamp (RFC 3339 UTC).
    pub last_fetched_date: &'a str,
    /// Row creation timestamp (RFC 3339 UTC).
    pub created_at: &'a str,
    /// Row update timestamp (RFC 3339 UTC).
    pub updated_at: &'a str,
}
