//! SQL storage for accounts and role assignments.
//!
//! The uniqueness constraints on `accounts.email` and `accounts.username`
//! are the source of truth for duplicate registrations; the pre-checks only
//! exist to produce friendly 409 messages before work is done.

use sqlx::{PgPool, Row};

use super::principal::{Principal, Role};

/// Account row as stored, including the password hash. Never serialized.
#[derive(Debug)]
pub(crate) struct AccountRecord {
    pub id: i64,
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
}

/// Fields for a new account; the password is already hashed.
#[derive(Debug)]
pub(crate) struct NewAccount {
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
}

/// Resolve a login identifier to the stored account. Emails are stored
/// normalized, so the email predicate takes the normalized form while the
/// username predicate stays exact.
pub(crate) async fn find_by_email_or_username(
    pool: &PgPool,
    email: &str,
    username: &str,
) -> Result<Option<AccountRecord>, sqlx::Error> {
    let row = sqlx::query(
        "SELECT id, email, username, password_hash, first_name, last_name, phone \
         FROM accounts WHERE email = $1 OR username = $2",
    )
    .bind(email)
    .bind(username)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|row| AccountRecord {
        id: row.get("id"),
        email: row.get("email"),
        username: row.get("username"),
        password_hash: row.get("password_hash"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        phone: row.get("phone"),
    }))
}

/// Fetch an account by id.
pub(crate) async fn account_by_id(
    pool: &PgPool,
    account_id: i64,
) -> Result<Option<AccountRecord>, sqlx::Error> {
    let row = sqlx::query(
        "SELECT id, email, username, password_hash, first_name, last_name, phone \
         FROM accounts WHERE id = $1",
    )
    .bind(account_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|row| AccountRecord {
        id: row.get("id"),
        email: row.get("email"),
        username: row.get("username"),
        password_hash: row.get("password_hash"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        phone: row.get("phone"),
    }))
}

pub(crate) async fn email_exists(pool: &PgPool, email: &str) -> Result<bool, sqlx::Error> {
    let row = sqlx::query("SELECT EXISTS(SELECT 1 FROM accounts WHERE email = $1) AS exists")
        .bind(email)
        .fetch_one(pool)
        .await?;
    Ok(row.get("exists"))
}

pub(crate) async fn username_exists(pool: &PgPool, username: &str) -> Result<bool, sqlx::Error> {
    let row = sqlx::query("SELECT EXISTS(SELECT 1 FROM accounts WHERE username = $1) AS exists")
        .bind(username)
        .fetch_one(pool)
        .await?;
    Ok(row.get("exists"))
}

/// Look up the id of a role by name. The USER role must be seeded before
/// registration can succeed.
pub(crate) async fn role_id(pool: &PgPool, role: Role) -> Result<Option<i64>, sqlx::Error> {
    let row = sqlx::query("SELECT id FROM roles WHERE name = $1")
        .bind(role.as_str())
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|row| row.get("id")))
}

/// Insert an account and its default role assignment in one transaction.
/// Returns the assigned account id.
pub(crate) async fn insert_account(
    pool: &PgPool,
    account: &NewAccount,
    default_role_id: i64,
) -> Result<i64, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let row = sqlx::query(
        "INSERT INTO accounts (email, username, password_hash, first_name, last_name, phone) \
         VALUES ($1, $2, $3, $4, $5, $6) RETURNING id",
    )
    .bind(&account.email)
    .bind(&account.username)
    .bind(&account.password_hash)
    .bind(&account.first_name)
    .bind(&account.last_name)
    .bind(&account.phone)
    .fetch_one(&mut *tx)
    .await?;
    let account_id: i64 = row.get("id");

    sqlx::query("INSERT INTO account_roles (account_id, role_id) VALUES ($1, $2)")
        .bind(account_id)
        .bind(default_role_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(account_id)
}

/// Grant a role to an account, idempotently.
/// Returns `false` when the account does not exist.
pub(crate) async fn grant_role(
    pool: &PgPool,
    account_id: i64,
    role: Role,
) -> Result<bool, sqlx::Error> {
    let exists =
        sqlx::query("SELECT EXISTS(SELECT 1 FROM accounts WHERE id = $1) AS exists")
            .bind(account_id)
            .fetch_one(pool)
            .await?
            .get::<bool, _>("exists");
    if !exists {
        return Ok(false);
    }

    sqlx::query(
        "INSERT INTO account_roles (account_id, role_id) \
         SELECT $1, id FROM roles WHERE name = $2 \
         ON CONFLICT DO NOTHING",
    )
    .bind(account_id)
    .bind(role.as_str())
    .execute(pool)
    .await?;

    Ok(true)
}

/// Role names assigned to an account.
pub(crate) async fn fetch_role_names(
    pool: &PgPool,
    account_id: i64,
) -> Result<Vec<String>, sqlx::Error> {
    let rows = sqlx::query(
        "SELECT r.name FROM roles r \
         JOIN account_roles ar ON ar.role_id = r.id \
         WHERE ar.account_id = $1 ORDER BY r.name",
    )
    .bind(account_id)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(|row| row.get("name")).collect())
}

/// Load the principal for a token subject, in a single lookup.
/// Unknown role names in the database are ignored rather than fatal.
pub(crate) async fn load_principal(
    pool: &PgPool,
    username: &str,
) -> Result<Option<Principal>, sqlx::Error> {
    let row = sqlx::query(
        "SELECT a.id, a.username, \
                COALESCE(array_agg(r.name) FILTER (WHERE r.name IS NOT NULL), '{}') AS roles \
         FROM accounts a \
         LEFT JOIN account_roles ar ON ar.account_id = a.id \
         LEFT JOIN roles r ON r.id = ar.role_id \
         WHERE a.username = $1 \
         GROUP BY a.id, a.username",
    )
    .bind(username)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|row| {
        let names: Vec<String> = row.get("roles");
        Principal {
            id: row.get("id"),
            username: row.get("username"),
            roles: names
                .iter()
                .filter_map(|name| Role::from_name(name))
                .collect(),
        }
    }))
}
