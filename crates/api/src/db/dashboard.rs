//! Dashboard aggregate queries.

use sea_query::{Alias, Asterisk, Expr, Func, Order, Query, SqliteQueryBuilder};

use super::Built;
use super::tables::{Cars, Modifications};

/// Number of modifications shown in the "recent" panel.
pub const RECENT_LIMIT: u64 = 5;

/// `COUNT(*)` of a user's cars.
pub fn cars_count(user_id: &str) -> Built {
    Query::select()
        .expr(Func::count(Expr::col(Asterisk)))
        .from(Cars::Table)
        .and_where(Expr::col(Cars::UserId).eq(user_id))
        .build(SqliteQueryBuilder)
}

/// `(modifications, active modifications, total cost)` across a user's cars.
pub fn modification_totals(user_id: &str) -> Built {
    // Conditional aggregates stay raw SQL with bound values
    let sql = concat!(
        "SELECT COUNT(\"m\".\"id\"), ",
        "COALESCE(SUM(CASE WHEN \"m\".\"is_active\" THEN 1 ELSE 0 END), 0), ",
        "COALESCE(SUM(\"m\".\"cost\"), 0.0) ",
        "FROM \"modifications\" AS \"m\" ",
        "INNER JOIN \"cars\" AS \"c\" ON \"c\".\"id\" = \"m\".\"car_id\" ",
        "WHERE \"c\".\"user_id\" = ?",
    )
    .to_string();
    (sql, sea_query::Values(vec![user_id.into()]))
}

/// The newest modifications across a user's cars, with the car label columns.
///
/// Columns: id, name, category, car_id, nickname, year, make, model,
/// installation_date, cost.
pub fn recent_modifications(user_id: &str) -> Built {
    let (m, c) = (Alias::new("m"), Alias::new("c"));
    Query::select()
        .column((m.clone(), Modifications::Id))
        .column((m.clone(), Modifications::Name))
        .column((m.clone(), Modifications::Category))
        .column((m.clone(), Modifications::CarId))
        .column((c.clone(), Cars::Nickname))
        .column((c.clone(), Cars::Year))
        .column((c.clone(), Cars::Make))
        .column((c.clone(), Cars::Model))
        .column((m.clone(), Modifications::InstallationDate))
        .column((m.clone(), Modifications::Cost))
        .from_as(Modifications::Table, m.clone())
        .join_as(
            sea_query::JoinType::InnerJoin,
            Cars::Table,
            c.clone(),
            Expr::col((c.clone(), Cars::Id)).equals((m.clone(), Modifications::CarId)),
        )
        .and_where(Expr::col((c, Cars::UserId)).eq(user_id))
        .order_by((m, Modifications::CreatedAt), Order::Desc)
        .order_by_expr(Expr::cust("\"m\".rowid"), Order::Desc)
        .limit(RECENT_LIMIT)
        .build(SqliteQueryBuilder)
}
