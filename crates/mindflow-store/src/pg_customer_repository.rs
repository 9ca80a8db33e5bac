//! `PostgreSQL` implementation of the `CustomerRepository` trait.
//!
//! `apply_changes` runs a whole change batch in one transaction:
//!
//! 1. lock the customer row (`SELECT ... FOR UPDATE`) and compare its
//!    version with the expected one;
//! 2. apply every change in order;
//! 3. bump the version and commit.
//!
//! The schema backs the aggregate's rules with a partial unique index on the
//! primary contact, a unique `(customer_id, external_system)` constraint and
//! a `RESTRICT` foreign key from jobs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection, PgPool, Postgres, Transaction};
use tracing::{debug, instrument};
use uuid::Uuid;

use mindflow_core::error::{DomainError, EntityKind};
use mindflow_core::pagination::{Page, PageRequest};
use mindflow_customers::domain::changes::CustomerChange;
use mindflow_customers::domain::entities::{
    Contact, Customer, CustomerSnapshot, CustomerType, ExternalIdMapping, PricingTier,
};
use mindflow_customers::domain::repository::{CustomerFilter, CustomerRepository};

use crate::error::{foreign_key_violation, map_sqlx_error, unique_violation};

const EXTERNAL_SYSTEM_KEY: &str = "customer_external_ids_customer_system_key";
const JOBS_CUSTOMER_FK: &str = "jobs_customer_id_fkey";

/// PostgreSQL-backed customer repository.
#[derive(Debug, Clone)]
pub struct PgCustomerRepository {
    pool: PgPool,
}

impl PgCustomerRepository {
    /// Creates a new `PgCustomerRepository`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// SQLx row types

#[derive(Debug, FromRow)]
struct CustomerRow {
    id: Uuid,
    customer_name: String,
    customer_type: String,
    pricing_tier: Option<String>,
    primary_contact_id: Option<Uuid>,
    is_active: bool,
    notes: Option<String>,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl CustomerRow {
    fn into_parts(self) -> Result<(Customer, i64), DomainError> {
        let customer_type = self.customer_type.parse::<CustomerType>().map_err(|_| {
            DomainError::Infrastructure(format!(
                "unknown customer type in storage: {}",
                self.customer_type
            ))
        })?;
        let customer = Customer {
            id: self.id,
            customer_name: self.customer_name,
            customer_type,
            pricing_tier: self.pricing_tier,
            primary_contact_id: self.primary_contact_id,
            is_active: self.is_active,
            notes: self.notes,
            created_at: self.created_at,
            updated_at: self.updated_at,
        };
        Ok((customer, self.version))
    }
}

#[derive(Debug, FromRow)]
struct ContactRow {
    id: Uuid,
    customer_id: Uuid,
    contact_name: String,
    role: Option<String>,
    email: Option<String>,
    phone: Option<String>,
    receives_notifications: bool,
    is_primary: bool,
    created_at: DateTime<Utc>,
}

impl From<ContactRow> for Contact {
    fn from(row: ContactRow) -> Self {
        Self {
            id: row.id,
            customer_id: row.customer_id,
            contact_name: row.contact_name,
            role: row.role,
            email: row.email,
            phone: row.phone,
            receives_notifications: row.receives_notifications,
            is_primary: row.is_primary,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct PricingTierRow {
    id: Uuid,
    customer_id: Uuid,
    tier_name: String,
    discount_percentage: f64,
    effective_date: DateTime<Utc>,
    expiration_date: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl From<PricingTierRow> for PricingTier {
    fn from(row: PricingTierRow) -> Self {
        Self {
            id: row.id,
            customer_id: row.customer_id,
            tier_name: row.tier_name,
            discount_percentage: row.discount_percentage,
            effective_date: row.effective_date,
            expiration_date: row.expiration_date,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct ExternalIdRow {
    id: Uuid,
    customer_id: Uuid,
    external_system: String,
    external_customer_id: String,
    external_customer_name: Option<String>,
    is_primary: bool,
    created_at: DateTime<Utc>,
}

impl From<ExternalIdRow> for ExternalIdMapping {
    fn from(row: ExternalIdRow) -> Self {
        Self {
            id: row.id,
            customer_id: row.customer_id,
            external_system: row.external_system,
            external_customer_id: row.external_customer_id,
            external_customer_name: row.external_customer_name,
            is_primary: row.is_primary,
            created_at: row.created_at,
        }
    }
}

const SELECT_CUSTOMER: &str = r"
SELECT id, customer_name, customer_type, pricing_tier, primary_contact_id,
       is_active, notes, version, created_at, updated_at
FROM customers
";

const LIST_FILTER: &str = r"
WHERE ($1::text IS NULL OR customer_name ILIKE $1 OR notes ILIKE $1)
  AND ($2::text IS NULL OR customer_type = $2)
  AND ($3::boolean IS NULL OR is_active = $3)
";

/// Wraps a search term for `ILIKE`, escaping its wildcards.
fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

async fn fetch_customer(
    conn: &mut PgConnection,
    customer_id: Uuid,
) -> Result<Option<(Customer, i64)>, DomainError> {
    let row: Option<CustomerRow> = sqlx::query_as(&format!("{SELECT_CUSTOMER} WHERE id = $1"))
        .bind(customer_id)
        .fetch_optional(conn)
        .await
        .map_err(|e| map_sqlx_error("load_customer", e))?;
    row.map(CustomerRow::into_parts).transpose()
}

async fn apply_change(
    tx: &mut Transaction<'_, Postgres>,
    customer_id: Uuid,
    change: &CustomerChange,
) -> Result<(), DomainError> {
    let operation = change.change_type();
    let rows_affected = match change {
        CustomerChange::CustomerCreated(c) => sqlx::query(
            r"
            INSERT INTO customers (
                id, customer_name, customer_type, pricing_tier, primary_contact_id,
                is_active, notes, version, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, 0, $8, $9)
            ",
        )
        .bind(c.id)
        .bind(&c.customer_name)
        .bind(c.customer_type.as_str())
        .bind(&c.pricing_tier)
        .bind(c.primary_contact_id)
        .bind(c.is_active)
        .bind(&c.notes)
        .bind(c.created_at)
        .bind(c.updated_at)
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error(operation, e))?
        .rows_affected(),

        CustomerChange::CustomerUpdated(c) => sqlx::query(
            r"
            UPDATE customers
            SET customer_name = $2, customer_type = $3, pricing_tier = $4,
                primary_contact_id = $5, is_active = $6, notes = $7, updated_at = $8
            WHERE id = $1
            ",
        )
        .bind(c.id)
        .bind(&c.customer_name)
        .bind(c.customer_type.as_str())
        .bind(&c.pricing_tier)
        .bind(c.primary_contact_id)
        .bind(c.is_active)
        .bind(&c.notes)
        .bind(c.updated_at)
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error(operation, e))?
        .rows_affected(),

        CustomerChange::CustomerDeleted { customer_id } => {
            delete_customer(tx, *customer_id).await?;
            return Ok(());
        }

        CustomerChange::ContactAdded(c) => sqlx::query(
            r"
            INSERT INTO customer_contacts (
                id, customer_id, contact_name, role, email, phone,
                receives_notifications, is_primary, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ",
        )
        .bind(c.id)
        .bind(c.customer_id)
        .bind(&c.contact_name)
        .bind(&c.role)
        .bind(&c.email)
        .bind(&c.phone)
        .bind(c.receives_notifications)
        .bind(c.is_primary)
        .bind(c.created_at)
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error(operation, e))?
        .rows_affected(),

        CustomerChange::ContactUpdated(c) => sqlx::query(
            r"
            UPDATE customer_contacts
            SET contact_name = $3, role = $4, email = $5, phone = $6,
                receives_notifications = $7, is_primary = $8
            WHERE id = $1 AND customer_id = $2
            ",
        )
        .bind(c.id)
        .bind(customer_id)
        .bind(&c.contact_name)
        .bind(&c.role)
        .bind(&c.email)
        .bind(&c.phone)
        .bind(c.receives_notifications)
        .bind(c.is_primary)
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error(operation, e))?
        .rows_affected(),

        CustomerChange::ContactRemoved { contact_id } => {
            sqlx::query("DELETE FROM customer_contacts WHERE id = $1 AND customer_id = $2")
                .bind(contact_id)
                .bind(customer_id)
                .execute(&mut **tx)
                .await
                .map_err(|e| map_sqlx_error(operation, e))?
                .rows_affected()
        }

        CustomerChange::PricingTierAdded(t) => sqlx::query(
            r"
            INSERT INTO customer_pricing_tiers (
                id, customer_id, tier_name, discount_percentage,
                effective_date, expiration_date, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ",
        )
        .bind(t.id)
        .bind(t.customer_id)
        .bind(&t.tier_name)
        .bind(t.discount_percentage)
        .bind(t.effective_date)
        .bind(t.expiration_date)
        .bind(t.created_at)
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error(operation, e))?
        .rows_affected(),

        CustomerChange::PricingTierUpdated(t) => sqlx::query(
            r"
            UPDATE customer_pricing_tiers
            SET tier_name = $3, discount_percentage = $4,
                effective_date = $5, expiration_date = $6
            WHERE id = $1 AND customer_id = $2
            ",
        )
        .bind(t.id)
        .bind(customer_id)
        .bind(&t.tier_name)
        .bind(t.discount_percentage)
        .bind(t.effective_date)
        .bind(t.expiration_date)
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error(operation, e))?
        .rows_affected(),

        CustomerChange::PricingTierRemoved { tier_id } => {
            sqlx::query("DELETE FROM customer_pricing_tiers WHERE id = $1 AND customer_id = $2")
                .bind(tier_id)
                .bind(customer_id)
                .execute(&mut **tx)
                .await
                .map_err(|e| map_sqlx_error(operation, e))?
                .rows_affected()
        }

        CustomerChange::ExternalIdMapped(m) => sqlx::query(
            r"
            INSERT INTO customer_external_ids (
                id, customer_id, external_system, external_customer_id,
                external_customer_name, is_primary, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ",
        )
        .bind(m.id)
        .bind(m.customer_id)
        .bind(&m.external_system)
        .bind(&m.external_customer_id)
        .bind(&m.external_customer_name)
        .bind(m.is_primary)
        .bind(m.created_at)
        .execute(&mut **tx)
        .await
        .map_err(|e| {
            if unique_violation(&e).as_deref() == Some(EXTERNAL_SYSTEM_KEY) {
                DomainError::Duplicate {
                    external_system: m.external_system.clone(),
                    external_customer_id: m.external_customer_id.clone(),
                }
            } else {
                map_sqlx_error(operation, e)
            }
        })?
        .rows_affected(),

        CustomerChange::ExternalIdUpdated(m) => sqlx::query(
            r"
            UPDATE customer_external_ids
            SET external_customer_id = $3, external_customer_name = $4, is_primary = $5
            WHERE id = $1 AND customer_id = $2
            ",
        )
        .bind(m.id)
        .bind(customer_id)
        .bind(&m.external_customer_id)
        .bind(&m.external_customer_name)
        .bind(m.is_primary)
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error(operation, e))?
        .rows_affected(),

        CustomerChange::ExternalIdRemoved { external_id } => {
            sqlx::query("DELETE FROM customer_external_ids WHERE id = $1 AND customer_id = $2")
                .bind(external_id)
                .bind(customer_id)
                .execute(&mut **tx)
                .await
                .map_err(|e| map_sqlx_error(operation, e))?
                .rows_affected()
        }
    };

    if rows_affected == 0 {
        return Err(missing_row(customer_id, change));
    }
    Ok(())
}

fn missing_row(customer_id: Uuid, change: &CustomerChange) -> DomainError {
    match change {
        CustomerChange::ContactUpdated(c) => DomainError::not_found(EntityKind::Contact, c.id),
        CustomerChange::ContactRemoved { contact_id } => {
            DomainError::not_found(EntityKind::Contact, *contact_id)
        }
        CustomerChange::PricingTierUpdated(t) => {
            DomainError::not_found(EntityKind::PricingTier, t.id)
        }
        CustomerChange::PricingTierRemoved { tier_id } => {
            DomainError::not_found(EntityKind::PricingTier, *tier_id)
        }
        CustomerChange::ExternalIdUpdated(m) => {
            DomainError::not_found(EntityKind::ExternalId, m.id)
        }
        CustomerChange::ExternalIdRemoved { external_id } => {
            DomainError::not_found(EntityKind::ExternalId, *external_id)
        }
        _ => DomainError::not_found(EntityKind::Customer, customer_id),
    }
}

/// Deletes the customer and, through cascades, its children. Jobs are
/// counted under the row lock taken by `apply_changes`.
async fn delete_customer(
    tx: &mut Transaction<'_, Postgres>,
    customer_id: Uuid,
) -> Result<(), DomainError> {
    let job_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM jobs WHERE customer_id = $1")
        .bind(customer_id)
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("count_jobs", e))?;
    if job_count > 0 {
        return Err(DomainError::HasDependencies {
            customer_id,
            job_count,
        });
    }

    // Break the customers <-> customer_contacts cycle before cascading.
    sqlx::query("UPDATE customers SET primary_contact_id = NULL WHERE id = $1")
        .bind(customer_id)
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("delete_customer", e))?;

    sqlx::query("DELETE FROM customers WHERE id = $1")
        .bind(customer_id)
        .execute(&mut **tx)
        .await
        .map_err(|e| {
            if foreign_key_violation(&e).as_deref() == Some(JOBS_CUSTOMER_FK) {
                DomainError::HasDependencies {
                    customer_id,
                    job_count: 1,
                }
            } else {
                map_sqlx_error("delete_customer", e)
            }
        })?;
    Ok(())
}

#[async_trait]
impl CustomerRepository for PgCustomerRepository {
    #[instrument(skip(self), fields(customer_id = %customer_id), err)]
    async fn load(&self, customer_id: Uuid) -> Result<Option<CustomerSnapshot>, DomainError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ")
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("load", e))?;

        let Some((customer, version)) = fetch_customer(&mut tx, customer_id).await? else {
            return Ok(None);
        };

        let contacts: Vec<ContactRow> = sqlx::query_as(
            r"
            SELECT id, customer_id, contact_name, role, email, phone,
                   receives_notifications, is_primary, created_at
            FROM customer_contacts
            WHERE customer_id = $1
            ",
        )
        .bind(customer_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("load_contacts", e))?;

        let pricing_tiers: Vec<PricingTierRow> = sqlx::query_as(
            r"
            SELECT id, customer_id, tier_name, discount_percentage,
                   effective_date, expiration_date, created_at
            FROM customer_pricing_tiers
            WHERE customer_id = $1
            ",
        )
        .bind(customer_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("load_pricing_tiers", e))?;

        let external_ids: Vec<ExternalIdRow> = sqlx::query_as(
            r"
            SELECT id, customer_id, external_system, external_customer_id,
                   external_customer_name, is_primary, created_at
            FROM customer_external_ids
            WHERE customer_id = $1
            ",
        )
        .bind(customer_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("load_external_ids", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        Ok(Some(CustomerSnapshot {
            customer,
            contacts: contacts.into_iter().map(Contact::from).collect(),
            pricing_tiers: pricing_tiers.into_iter().map(PricingTier::from).collect(),
            external_ids: external_ids.into_iter().map(ExternalIdMapping::from).collect(),
            version,
        }))
    }

    #[instrument(skip(self), fields(customer_id = %customer_id), err)]
    async fn find_customer(&self, customer_id: Uuid) -> Result<Option<Customer>, DomainError> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| map_sqlx_error("acquire_connection", e))?;
        Ok(fetch_customer(&mut conn, customer_id)
            .await?
            .map(|(customer, _)| customer))
    }

    #[instrument(skip(self), fields(page = page.page(), limit = page.limit()), err)]
    async fn list_customers(
        &self,
        filter: &CustomerFilter,
        page: PageRequest,
    ) -> Result<Page<Customer>, DomainError> {
        let search = filter.search.as_deref().map(like_pattern);
        let customer_type = filter.customer_type.map(|t| t.as_str());

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM customers {LIST_FILTER}"))
            .bind(search.as_deref())
            .bind(customer_type)
            .bind(filter.is_active)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("count_customers", e))?;

        let rows: Vec<CustomerRow> = sqlx::query_as(&format!(
            "{SELECT_CUSTOMER} {LIST_FILTER} ORDER BY customer_name, id LIMIT $4 OFFSET $5"
        ))
        .bind(search.as_deref())
        .bind(customer_type)
        .bind(filter.is_active)
        .bind(i64::from(page.limit()))
        .bind(i64::try_from(page.offset()).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_customers", e))?;

        let customers = rows
            .into_iter()
            .map(|row| row.into_parts().map(|(customer, _)| customer))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Page::new(customers, page, u64::try_from(total).unwrap_or(0)))
    }

    #[instrument(skip(self), err)]
    async fn find_customer_id_by_external_id(
        &self,
        external_system: &str,
        external_customer_id: &str,
    ) -> Result<Option<Uuid>, DomainError> {
        sqlx::query_scalar(
            r"
            SELECT customer_id
            FROM customer_external_ids
            WHERE external_system = $1 AND external_customer_id = $2
            ORDER BY created_at, id
            LIMIT 1
            ",
        )
        .bind(external_system)
        .bind(external_customer_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_customer_by_external_id", e))
    }

    #[instrument(skip(self), fields(customer_id = %customer_id), err)]
    async fn count_jobs(&self, customer_id: Uuid) -> Result<i64, DomainError> {
        sqlx::query_scalar("SELECT COUNT(*) FROM jobs WHERE customer_id = $1")
            .bind(customer_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("count_jobs", e))
    }

    #[instrument(
        skip(self, changes),
        fields(
            customer_id = %customer_id,
            expected_version = expected_version,
            change_count = changes.len()
        ),
        err
    )]
    async fn apply_changes(
        &self,
        customer_id: Uuid,
        expected_version: i64,
        changes: &[CustomerChange],
    ) -> Result<(), DomainError> {
        if changes.is_empty() {
            return Ok(());
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let current_version: Option<i64> =
            sqlx::query_scalar("SELECT version FROM customers WHERE id = $1 FOR UPDATE")
                .bind(customer_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("lock_customer", e))?;

        match (current_version, expected_version) {
            (Some(actual), 0) => {
                tx.rollback()
                    .await
                    .map_err(|e| map_sqlx_error("rollback", e))?;
                return Err(DomainError::ConcurrencyConflict {
                    customer_id,
                    expected: 0,
                    actual,
                });
            }
            (None, expected) if expected != 0 => {
                tx.rollback()
                    .await
                    .map_err(|e| map_sqlx_error("rollback", e))?;
                return Err(DomainError::not_found(EntityKind::Customer, customer_id));
            }
            (Some(actual), expected) if actual != expected => {
                tx.rollback()
                    .await
                    .map_err(|e| map_sqlx_error("rollback", e))?;
                return Err(DomainError::ConcurrencyConflict {
                    customer_id,
                    expected,
                    actual,
                });
            }
            _ => {}
        }

        let mut deleted = false;
        for change in changes {
            debug!(change_type = change.change_type(), "applying change");
            apply_change(&mut tx, customer_id, change).await?;
            deleted |= matches!(change, CustomerChange::CustomerDeleted { .. });
        }

        if !deleted {
            sqlx::query("UPDATE customers SET version = $2 WHERE id = $1")
                .bind(customer_id)
                .bind(expected_version + 1)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("bump_version", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }
}
