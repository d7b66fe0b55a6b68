//! Car query builders.

use sea_query::{Alias, Asterisk, Expr, Func, Query, SelectStatement, SqliteQueryBuilder};

use super::listing::{Filter, FilterKind, ListParams, ListSpec, Sort};
use super::tables::Cars;
use super::{Built, BuiltList};
use crate::ServiceError;
use crate::service::CarChanges;

/// Alias used for `cars` in every SELECT.
pub const ALIAS: &str = "c";

/// Filters, sorts and includes accepted by `GET /api/cars`.
pub const LIST_SPEC: ListSpec = ListSpec {
    rowid_of: ALIAS,
    filters: &[
        Filter {
            name: "make",
            kind: FilterKind::Partial((ALIAS, "make")),
        },
        Filter {
            name: "model",
            kind: FilterKind::Partial((ALIAS, "model")),
        },
        Filter {
            name: "nickname",
            kind: FilterKind::Partial((ALIAS, "nickname")),
        },
        Filter {
            name: "year",
            kind: FilterKind::Integer((ALIAS, "year")),
        },
    ],
    sorts: &[
        Sort {
            name: "make",
            column: (ALIAS, "make"),
        },
        Sort {
            name: "model",
            column: (ALIAS, "model"),
        },
        Sort {
            name: "year",
            column: (ALIAS, "year"),
        },
        Sort {
            name: "nickname",
            column: (ALIAS, "nickname"),
        },
        Sort {
            name: "created_at",
            column: (ALIAS, "created_at"),
        },
        Sort {
            name: "updated_at",
            column: (ALIAS, "updated_at"),
        },
    ],
    default_sort: "-created_at",
    includes: &["modifications"],
};

fn c() -> Alias {
    Alias::new(ALIAS)
}

/// Base SELECT with the car columns plus the modification count.
/// Column order must match the server's `car_from_row()` mapper.
fn car_select() -> SelectStatement {
    Query::select()
        .column((c(), Cars::Id))
        .column((c(), Cars::UserId))
        .column((c(), Cars::Make))
        .column((c(), Cars::Model))
        .column((c(), Cars::Year))
        .column((c(), Cars::Nickname))
        .column((c(), Cars::Vin))
        .column((c(), Cars::ImagePath))
        .column((c(), Cars::Notes))
        .column((c(), Cars::CreatedAt))
        .column((c(), Cars::UpdatedAt))
        .expr_as(
            Expr::cust(
                "(SELECT COUNT(*) FROM \"modifications\" AS \"m\" WHERE \"m\".\"car_id\" = \"c\".\"id\")",
            ),
            Alias::new("modifications_count"),
        )
        .from_as(Cars::Table, c())
        .to_owned()
}

/// Build the paginated list of a user's cars.
pub fn list(user_id: &str, params: &ListParams) -> Result<BuiltList, ServiceError> {
    let owner = Expr::col((c(), Cars::UserId)).eq(user_id);
    let mut count_q = Query::select()
        .expr(Func::count(Expr::col(Asterisk)))
        .from_as(Cars::Table, c())
        .and_where(owner.clone())
        .to_owned();
    let mut select_q = car_select();
    select_q.and_where(owner);

    let applied = LIST_SPEC.apply(params, &mut count_q, &mut select_q)?;
    Ok(BuiltList {
        count_query: count_q.build(SqliteQueryBuilder),
        select_query: select_q.build(SqliteQueryBuilder),
        applied,
    })
}

/// SELECT a single car by id.
pub fn get_by_id(id: &str) -> Built {
    car_select()
        .and_where(Expr::col((c(), Cars::Id)).eq(id))
        .build(SqliteQueryBuilder)
}

/// SELECT `user_id, image_path` for a car.
pub fn get_owner_and_image(id: &str) -> Built {
    Query::select()
        .columns([Cars::UserId, Cars::ImagePath])
        .from(Cars::Table)
        .and_where(Expr::col(Cars::Id).eq(id))
        .build(SqliteQueryBuilder)
}

/// INSERT a car from validated create changes.
pub fn insert(id: &str, user_id: &str, car: &CarChanges) -> Built {
    let opt = |v: &Option<Option<String>>| v.clone().flatten();
    Query::insert()
        .into_table(Cars::Table)
        .columns([
            Cars::Id,
            Cars::UserId,
            Cars::Make,
            Cars::Model,
            Cars::Year,
            Cars::Nickname,
            Cars::Vin,
            Cars::Notes,
        ])
        .values_panic([
            id.into(),
            user_id.into(),
            car.make.clone().unwrap_or_default().into(),
            car.model.clone().unwrap_or_default().into(),
            car.year.unwrap_or_default().into(),
            opt(&car.nickname).into(),
            opt(&car.vin).into(),
            opt(&car.notes).into(),
        ])
        .build(SqliteQueryBuilder)
}

/// UPDATE only the changed columns; always bumps `updated_at`.
pub fn update(id: &str, changes: &CarChanges) -> Built {
    let mut q = Query::update();
    q.table(Cars::Table)
        .value(Cars::UpdatedAt, Expr::cust("datetime('now')"));
    if let Some(make) = &changes.make {
        q.value(Cars::Make, make.as_str());
    }
    if let Some(model) = &changes.model {
        q.value(Cars::Model, model.as_str());
    }
    if let Some(year) = changes.year {
        q.value(Cars::Year, year);
    }
    if let Some(nickname) = &changes.nickname {
        q.value(Cars::Nickname, nickname.clone());
    }
    if let Some(vin) = &changes.vin {
        q.value(Cars::Vin, vin.clone());
    }
    if let Some(notes) = &changes.notes {
        q.value(Cars::Notes, notes.clone());
    }
    q.and_where(Expr::col(Cars::Id).eq(id))
        .build(SqliteQueryBuilder)
}

/// Set or clear the stored image key.
pub fn set_image(id: &str, image_path: Option<&str>) -> Built {
    Query::update()
        .table(Cars::Table)
        .value(Cars::ImagePath, image_path.map(str::to_string))
        .value(Cars::UpdatedAt, Expr::cust("datetime('now')"))
        .and_where(Expr::col(Cars::Id).eq(id))
        .build(SqliteQueryBuilder)
}

/// DELETE a car (modifications cascade).
pub fn delete(id: &str) -> Built {
    Query::delete()
        .from_table(Cars::Table)
        .and_where(Expr::col(Cars::Id).eq(id))
        .build(SqliteQueryBuilder)
}
