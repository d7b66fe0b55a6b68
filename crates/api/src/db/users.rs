//! User / auth query builders.

use sea_query::{Asterisk, Expr, Func, Query, SqliteQueryBuilder};

use super::Built;
use super::tables::{RefreshTokens, Users};

// ── User lookups ───────────────────────────────────────────────────────────

/// Columns matching `UserResponse` order.
fn user_columns(q: &mut sea_query::SelectStatement) -> &mut sea_query::SelectStatement {
    q.columns([
        Users::Id,
        Users::Name,
        Users::Email,
        Users::EmailVerifiedAt,
        Users::CreatedAt,
    ])
}

/// Find user by id.
pub fn get_by_id(user_id: &str) -> Built {
    let mut q = Query::select().to_owned();
    user_columns(&mut q)
        .from(Users::Table)
        .and_where(Expr::col(Users::Id).eq(user_id))
        .build(SqliteQueryBuilder)
}

/// Find user by email.
pub fn get_by_email(email: &str) -> Built {
    let mut q = Query::select().to_owned();
    user_columns(&mut q)
        .from(Users::Table)
        .and_where(Expr::col(Users::Email).eq(email))
        .build(SqliteQueryBuilder)
}

/// Find user by email for login (returns id, name, password_hash).
pub fn get_by_email_for_login(email: &str) -> Built {
    Query::select()
        .columns([Users::Id, Users::Name, Users::PasswordHash])
        .from(Users::Table)
        .and_where(Expr::col(Users::Email).eq(email))
        .build(SqliteQueryBuilder)
}

/// Check email existence.
pub fn email_exists(email: &str) -> Built {
    Query::select()
        .expr(Expr::expr(Func::count(Expr::col(Asterisk))).gt(0))
        .from(Users::Table)
        .and_where(Expr::col(Users::Email).eq(email))
        .build(SqliteQueryBuilder)
}

// ── User writes ────────────────────────────────────────────────────────────

/// Insert user with email/password.
pub fn insert(id: &str, name: &str, email: &str, password_hash: &str) -> Built {
    Query::insert()
        .into_table(Users::Table)
        .columns([Users::Id, Users::Name, Users::Email, Users::PasswordHash])
        .values_panic([id.into(), name.into(), email.into(), password_hash.into()])
        .build(SqliteQueryBuilder)
}

/// Stamp `email_verified_at` if not already set.
pub fn mark_verified(user_id: &str) -> Built {
    Query::update()
        .table(Users::Table)
        .value(Users::EmailVerifiedAt, Expr::cust("datetime('now')"))
        .value(Users::UpdatedAt, Expr::cust("datetime('now')"))
        .and_where(Expr::col(Users::Id).eq(user_id))
        .and_where(Expr::col(Users::EmailVerifiedAt).is_null())
        .build(SqliteQueryBuilder)
}

// ── Refresh tokens ─────────────────────────────────────────────────────────

/// Insert refresh token.
pub fn insert_refresh_token(id: &str, user_id: &str, token_hash: &str, expires_at: &str) -> Built {
    Query::insert()
        .into_table(RefreshTokens::Table)
        .columns([
            RefreshTokens::Id,
            RefreshTokens::UserId,
            RefreshTokens::TokenHash,
            RefreshTokens::ExpiresAt,
        ])
        .values_panic([
            id.into(),
            user_id.into(),
            token_hash.into(),
            expires_at.into(),
        ])
        .build(SqliteQueryBuilder)
}

/// Lookup an unexpired refresh token with user join (token id, user id, name).
pub fn lookup_refresh_token(token_hash: &str) -> Built {
    Query::select()
        .column((RefreshTokens::Table, RefreshTokens::Id))
        .column((RefreshTokens::Table, RefreshTokens::UserId))
        .column((Users::Table, Users::Name))
        .from(RefreshTokens::Table)
        .inner_join(
            Users::Table,
            Expr::col((Users::Table, Users::Id))
                .equals((RefreshTokens::Table, RefreshTokens::UserId)),
        )
        .and_where(Expr::col((RefreshTokens::Table, RefreshTokens::TokenHash)).eq(token_hash))
        .and_where(
            Expr::col((RefreshTokens::Table, RefreshTokens::ExpiresAt))
                .gt(Expr::cust("datetime('now')")),
        )
        .build(SqliteQueryBuilder)
}

/// Delete a user's refresh tokens that have already expired.
pub fn delete_expired_refresh_tokens(user_id: &str) -> Built {
    Query::delete()
        .from_table(RefreshTokens::Table)
        .and_where(Expr::col(RefreshTokens::UserId).eq(user_id))
        .and_where(Expr::col(RefreshTokens::ExpiresAt).lte(Expr::cust("datetime('now')")))
        .build(SqliteQueryBuilder)
}

/// Delete refresh token by hash.
pub fn delete_refresh_token(token_hash: &str) -> Built {
    Query::delete()
        .from_table(RefreshTokens::Table)
        .and_where(Expr::col(RefreshTokens::TokenHash).eq(token_hash))
        .build(SqliteQueryBuilder)
}

/// Delete refresh token by id.
pub fn delete_refresh_token_by_id(id: &str) -> Built {
    Query::delete()
        .from_table(RefreshTokens::Table)
        .and_where(Expr::col(RefreshTokens::Id).eq(id))
        .build(SqliteQueryBuilder)
}
