//! Modification query builders.

use sea_query::{Alias, Asterisk, Expr, Func, Order, Query, SelectStatement, SqliteQueryBuilder};

use super::listing::{Filter, FilterKind, ListParams, ListSpec, Sort};
use super::tables::Modifications;
use super::{Built, BuiltList};
use crate::ServiceError;
use crate::service::ModificationChanges;

/// Alias used for `modifications` in every SELECT.
pub const ALIAS: &str = "m";

/// Filters and sorts accepted by `GET /api/cars/{car}/modifications`.
pub const LIST_SPEC: ListSpec = ListSpec {
    rowid_of: ALIAS,
    filters: &[
        Filter {
            name: "name",
            kind: FilterKind::Partial((ALIAS, "name")),
        },
        Filter {
            name: "brand",
            kind: FilterKind::Partial((ALIAS, "brand")),
        },
        Filter {
            name: "vendor",
            kind: FilterKind::Partial((ALIAS, "vendor")),
        },
        Filter {
            name: "category",
            kind: FilterKind::Exact((ALIAS, "category")),
        },
        Filter {
            name: "is_active",
            kind: FilterKind::Boolean((ALIAS, "is_active")),
        },
    ],
    sorts: &[
        Sort {
            name: "name",
            column: (ALIAS, "name"),
        },
        Sort {
            name: "category",
            column: (ALIAS, "category"),
        },
        Sort {
            name: "brand",
            column: (ALIAS, "brand"),
        },
        Sort {
            name: "vendor",
            column: (ALIAS, "vendor"),
        },
        Sort {
            name: "installation_date",
            column: (ALIAS, "installation_date"),
        },
        Sort {
            name: "cost",
            column: (ALIAS, "cost"),
        },
        Sort {
            name: "created_at",
            column: (ALIAS, "created_at"),
        },
    ],
    default_sort: "-created_at",
    includes: &[],
};

fn m() -> Alias {
    Alias::new(ALIAS)
}

/// Column order must match the server's `modification_from_row()` mapper.
fn modification_select() -> SelectStatement {
    Query::select()
        .column((m(), Modifications::Id))
        .column((m(), Modifications::CarId))
        .column((m(), Modifications::Name))
        .column((m(), Modifications::Category))
        .column((m(), Modifications::Brand))
        .column((m(), Modifications::Vendor))
        .column((m(), Modifications::InstallationDate))
        .column((m(), Modifications::Cost))
        .column((m(), Modifications::IsActive))
        .column((m(), Modifications::Notes))
        .column((m(), Modifications::CreatedAt))
        .column((m(), Modifications::UpdatedAt))
        .from_as(Modifications::Table, m())
        .to_owned()
}

/// Build the paginated list of one car's modifications.
pub fn list(car_id: &str, params: &ListParams) -> Result<BuiltList, ServiceError> {
    let scope = Expr::col((m(), Modifications::CarId)).eq(car_id);
    let mut count_q = Query::select()
        .expr(Func::count(Expr::col(Asterisk)))
        .from_as(Modifications::Table, m())
        .and_where(scope.clone())
        .to_owned();
    let mut select_q = modification_select();
    select_q.and_where(scope);

    let applied = LIST_SPEC.apply(params, &mut count_q, &mut select_q)?;
    Ok(BuiltList {
        count_query: count_q.build(SqliteQueryBuilder),
        select_query: select_q.build(SqliteQueryBuilder),
        applied,
    })
}

/// All modifications of the given cars, newest first.
pub fn list_for_cars(car_ids: &[String]) -> Built {
    modification_select()
        .and_where(Expr::col((m(), Modifications::CarId)).is_in(car_ids.iter().map(String::as_str)))
        .order_by((m(), Modifications::CreatedAt), Order::Desc)
        .order_by_expr(Expr::cust("\"m\".rowid"), Order::Desc)
        .build(SqliteQueryBuilder)
}

/// SELECT a single modification by id.
pub fn get_by_id(id: &str) -> Built {
    modification_select()
        .and_where(Expr::col((m(), Modifications::Id)).eq(id))
        .build(SqliteQueryBuilder)
}

/// INSERT a modification from validated create changes.
pub fn insert(id: &str, car_id: &str, p: &ModificationChanges) -> Built {
    let opt = |v: &Option<Option<String>>| v.clone().flatten();
    Query::insert()
        .into_table(Modifications::Table)
        .columns([
            Modifications::Id,
            Modifications::CarId,
            Modifications::Name,
            Modifications::Category,
            Modifications::Brand,
            Modifications::Vendor,
            Modifications::InstallationDate,
            Modifications::Cost,
            Modifications::IsActive,
            Modifications::Notes,
        ])
        .values_panic([
            id.into(),
            car_id.into(),
            p.name.clone().unwrap_or_default().into(),
            p.category.clone().unwrap_or_default().into(),
            opt(&p.brand).into(),
            opt(&p.vendor).into(),
            opt(&p.installation_date).into(),
            p.cost.flatten().into(),
            p.is_active.unwrap_or(true).into(),
            opt(&p.notes).into(),
        ])
        .build(SqliteQueryBuilder)
}

/// UPDATE only the changed columns; always bumps `updated_at`.
pub fn update(id: &str, changes: &ModificationChanges) -> Built {
    let mut q = Query::update();
    q.table(Modifications::Table)
        .value(Modifications::UpdatedAt, Expr::cust("datetime('now')"));
    if let Some(name) = &changes.name {
        q.value(Modifications::Name, name.as_str());
    }
    if let Some(category) = &changes.category {
        q.value(Modifications::Category, category.as_str());
    }
    if let Some(brand) = &changes.brand {
        q.value(Modifications::Brand, brand.clone());
    }
    if let Some(vendor) = &changes.vendor {
        q.value(Modifications::Vendor, vendor.clone());
    }
    if let Some(date) = &changes.installation_date {
        q.value(Modifications::InstallationDate, date.clone());
    }
    if let Some(cost) = changes.cost {
        q.value(Modifications::Cost, cost);
    }
    if let Some(is_active) = changes.is_active {
        q.value(Modifications::IsActive, is_active);
    }
    if let Some(notes) = &changes.notes {
        q.value(Modifications::Notes, notes.clone());
    }
    q.and_where(Expr::col(Modifications::Id).eq(id))
        .build(SqliteQueryBuilder)
}

/// DELETE a modification by id.
pub fn delete(id: &str) -> Built {
    Query::delete()
        .from_table(Modifications::Table)
        .and_where(Expr::col(Modifications::Id).eq(id))
        .build(SqliteQueryBuilder)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_scopes_to_car_and_filters_active() {
        let params = ListParams::from_pairs([("filter[is_active]", "0"), ("sort", "-cost")]).unwrap();
        let built = list("car-1", &params).unwrap();
        let (sql, _) = &built.select_query;
        assert!(sql.contains(r#""m"."car_id" = ?"#), "{sql}");
        assert!(sql.contains(r#""m"."is_active" = ?"#), "{sql}");
        assert!(sql.contains(r#"ORDER BY "m"."cost" DESC"#), "{sql}");
    }

    #[test]
    fn list_rejects_includes() {
        let params = ListParams::from_pairs([("include", "car")]).unwrap();
        assert!(list("car-1", &params).is_err());
    }

    #[test]
    fn list_for_cars_uses_in_clause() {
        let (sql, values) = list_for_cars(&["a".to_string(), "b".to_string()]);
        assert!(sql.contains(r#""m"."car_id" IN (?, ?)"#), "{sql}");
        assert_eq!(values.0.len(), 2);
    }
}
