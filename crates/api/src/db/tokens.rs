//! Personal access token query builders.

use sea_query::{Expr, Order, Query, SqliteQueryBuilder};

use super::Built;
use super::tables::PersonalAccessTokens;

/// Columns matching `TokenSummary` order.
fn token_columns(q: &mut sea_query::SelectStatement) -> &mut sea_query::SelectStatement {
    q.columns([
        PersonalAccessTokens::Id,
        PersonalAccessTokens::Name,
        PersonalAccessTokens::TokenPrefix,
        PersonalAccessTokens::LastUsedAt,
        PersonalAccessTokens::CreatedAt,
    ])
}

/// Insert a token row; only the hash of the plaintext is stored.
pub fn insert(id: &str, user_id: &str, name: &str, token_hash: &str, token_prefix: &str) -> Built {
    Query::insert()
        .into_table(PersonalAccessTokens::Table)
        .columns([
            PersonalAccessTokens::Id,
            PersonalAccessTokens::UserId,
            PersonalAccessTokens::Name,
            PersonalAccessTokens::TokenHash,
            PersonalAccessTokens::TokenPrefix,
        ])
        .values_panic([
            id.into(),
            user_id.into(),
            name.into(),
            token_hash.into(),
            token_prefix.into(),
        ])
        .build(SqliteQueryBuilder)
}

/// SELECT a single token by id.
pub fn get_by_id(id: &str) -> Built {
    let mut q = Query::select().to_owned();
    token_columns(&mut q)
        .from(PersonalAccessTokens::Table)
        .and_where(Expr::col(PersonalAccessTokens::Id).eq(id))
        .build(SqliteQueryBuilder)
}

/// A user's tokens, newest first.
pub fn list_by_user(user_id: &str) -> Built {
    let mut q = Query::select().to_owned();
    token_columns(&mut q)
        .from(PersonalAccessTokens::Table)
        .and_where(Expr::col(PersonalAccessTokens::UserId).eq(user_id))
        .order_by(PersonalAccessTokens::CreatedAt, Order::Desc)
        .order_by_expr(Expr::cust("rowid"), Order::Desc)
        .build(SqliteQueryBuilder)
}

/// Resolve a token hash to `(token id, user id)`.
pub fn get_by_hash(token_hash: &str) -> Built {
    Query::select()
        .columns([PersonalAccessTokens::Id, PersonalAccessTokens::UserId])
        .from(PersonalAccessTokens::Table)
        .and_where(Expr::col(PersonalAccessTokens::TokenHash).eq(token_hash))
        .build(SqliteQueryBuilder)
}

/// Stamp `last_used_at`.
pub fn touch(id: &str) -> Built {
    Query::update()
        .table(PersonalAccessTokens::Table)
        .value(PersonalAccessTokens::LastUsedAt, Expr::cust("datetime('now')"))
        .and_where(Expr::col(PersonalAccessTokens::Id).eq(id))
        .build(SqliteQueryBuilder)
}

/// Delete a token, scoped to its owner.
pub fn delete_for_user(id: &str, user_id: &str) -> Built {
    Query::delete()
        .from_table(PersonalAccessTokens::Table)
        .and_where(Expr::col(PersonalAccessTokens::Id).eq(id))
        .and_where(Expr::col(PersonalAccessTokens::UserId).eq(user_id))
        .build(SqliteQueryBuilder)
}
