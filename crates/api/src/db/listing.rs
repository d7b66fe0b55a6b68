//! Whitelisted filtering, sorting, includes and pagination for list endpoints.
//!
//! Query strings look like
//! `?filter[make]=maz&sort=-year,make&include=modifications&page=2&per_page=10`.
//! Each list endpoint declares a [`ListSpec`]; anything outside it is a 400.

use std::collections::BTreeMap;

use sea_query::{Alias, Expr, LikeExpr, Order, SelectStatement, SimpleExpr};

use crate::ServiceError;
use crate::service::parse_date;

pub const DEFAULT_PER_PAGE: u32 = 15;
pub const MAX_PER_PAGE: u32 = 100;

/// `(table alias, column)`.
pub type Column = (&'static str, &'static str);

/// Raw list parameters parsed from the query string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListParams {
    pub filters: BTreeMap<String, String>,
    pub sort: Option<String>,
    pub include: Option<String>,
    pub page: u32,
    pub per_page: u32,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            filters: BTreeMap::new(),
            sort: None,
            include: None,
            page: 1,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

fn parse_number(key: &str, value: &str) -> Result<u32, ServiceError> {
    value
        .parse::<u32>()
        .map_err(|_| ServiceError::BadRequest(format!("`{key}` must be a positive integer")))
}

impl ListParams {
    /// Parse query-string pairs. Unknown top-level keys are ignored; empty
    /// values count as absent.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self, ServiceError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut params = Self::default();
        for (key, value) in pairs {
            let (key, value) = (key.as_ref(), value.as_ref().trim());
            if value.is_empty() {
                continue;
            }
            if let Some(name) = key
                .strip_prefix("filter[")
                .and_then(|rest| rest.strip_suffix(']'))
            {
                params.filters.insert(name.to_string(), value.to_string());
                continue;
            }
            match key {
                "sort" => params.sort = Some(value.to_string()),
                "include" => params.include = Some(value.to_string()),
                "page" => params.page = parse_number(key, value)?.max(1),
                "per_page" => params.per_page = parse_number(key, value)?.clamp(1, MAX_PER_PAGE),
                _ => {}
            }
        }
        Ok(params)
    }

    pub fn filter(&self, name: &str) -> Option<&str> {
        self.filters.get(name).map(String::as_str)
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.per_page)
    }
}

/// How a whitelisted filter constrains the query.
#[derive(Debug, Clone, Copy)]
pub enum FilterKind {
    /// Case-insensitive substring match.
    Partial(Column),
    /// Substring match on any of several columns.
    PartialAny(&'static [Column]),
    Exact(Column),
    Integer(Column),
    Boolean(Column),
    /// `column >= date`
    DateFrom(Column),
    /// `column <= date`
    DateTo(Column),
    /// Accepted here, applied by the caller.
    Custom,
}

#[derive(Debug, Clone, Copy)]
pub struct Filter {
    pub name: &'static str,
    pub kind: FilterKind,
}

#[derive(Debug, Clone, Copy)]
pub struct Sort {
    pub name: &'static str,
    pub column: Column,
}

/// What a list endpoint allows.
#[derive(Debug, Clone, Copy)]
pub struct ListSpec {
    /// Alias whose `rowid` breaks ties between equal sort keys.
    pub rowid_of: &'static str,
    pub filters: &'static [Filter],
    pub sorts: &'static [Sort],
    pub default_sort: &'static str,
    pub includes: &'static [&'static str],
}

/// Outcome of [`ListSpec::apply`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applied {
    pub includes: Vec<String>,
    pub page: u32,
    pub per_page: u32,
}

impl Applied {
    pub fn includes(&self, relation: &str) -> bool {
        self.includes.iter().any(|i| i == relation)
    }
}

/// Escape character for `LIKE` patterns built from user input.
const LIKE_ESCAPE: char = '!';

/// `%value%` with the value's own wildcards matched literally.
fn contains_pattern(value: &str) -> LikeExpr {
    let mut pattern = String::with_capacity(value.len() + 2);
    pattern.push('%');
    for c in value.chars() {
        if matches!(c, '%' | '_' | LIKE_ESCAPE) {
            pattern.push(LIKE_ESCAPE);
        }
        pattern.push(c);
    }
    pattern.push('%');
    LikeExpr::new(pattern).escape(LIKE_ESCAPE)
}

fn col(c: Column) -> Expr {
    Expr::col((Alias::new(c.0), Alias::new(c.1)))
}

fn not_allowed(what: &str, requested: &[String], allowed: &[&str]) -> ServiceError {
    ServiceError::BadRequest(format!(
        "Requested {what}(s) `{}` are not allowed. Allowed {what}(s) are `{}`.",
        requested.join(", "),
        allowed.join(", ")
    ))
}

pub fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl ListSpec {
    /// Build the condition for one filter value.
    fn condition(filter: &Filter, value: &str) -> Result<Option<SimpleExpr>, ServiceError> {
        let invalid = |expected: &str| {
            ServiceError::BadRequest(format!("filter `{}` must be {expected}", filter.name))
        };
        let cond = match filter.kind {
            FilterKind::Partial(c) => col(c).like(contains_pattern(value)),
            FilterKind::PartialAny(columns) => {
                let like = contains_pattern(value);
                let mut iter = columns.iter();
                let Some(first) = iter.next() else {
                    return Ok(None);
                };
                iter.fold(col(*first).like(like.clone()), |acc, c| {
                    acc.or(col(*c).like(like.clone()))
                })
            }
            FilterKind::Exact(c) => col(c).eq(value),
            FilterKind::Integer(c) => {
                let n: i64 = value.parse().map_err(|_| invalid("an integer"))?;
                col(c).eq(n)
            }
            FilterKind::Boolean(c) => {
                let b = parse_bool(value).ok_or_else(|| invalid("a boolean"))?;
                col(c).eq(b)
            }
            FilterKind::DateFrom(c) => {
                let d = parse_date(value).ok_or_else(|| invalid("a date (YYYY-MM-DD)"))?;
                col(c).gte(d.format("%Y-%m-%d").to_string())
            }
            FilterKind::DateTo(c) => {
                let d = parse_date(value).ok_or_else(|| invalid("a date (YYYY-MM-DD)"))?;
                col(c).lte(d.format("%Y-%m-%d").to_string())
            }
            FilterKind::Custom => return Ok(None),
        };
        Ok(Some(cond))
    }

    /// Apply filters to both statements, sorting and paging to `select`.
    pub fn apply(
        &self,
        params: &ListParams,
        count: &mut SelectStatement,
        select: &mut SelectStatement,
    ) -> Result<Applied, ServiceError> {
        let allowed_filters: Vec<&str> = self.filters.iter().map(|f| f.name).collect();
        let unknown: Vec<String> = params
            .filters
            .keys()
            .filter(|k| !allowed_filters.contains(&k.as_str()))
            .cloned()
            .collect();
        if !unknown.is_empty() {
            return Err(not_allowed("filter", &unknown, &allowed_filters));
        }

        for filter in self.filters {
            let Some(value) = params.filter(filter.name) else {
                continue;
            };
            if let Some(cond) = Self::condition(filter, value)? {
                count.and_where(cond.clone());
                select.and_where(cond);
            }
        }

        let sort = params.sort.as_deref().unwrap_or(self.default_sort);
        let mut orders = Vec::new();
        let mut unknown = Vec::new();
        for key in sort.split(',').map(str::trim).filter(|k| !k.is_empty()) {
            let (name, order) = match key.strip_prefix('-') {
                Some(name) => (name, Order::Desc),
                None => (key, Order::Asc),
            };
            match self.sorts.iter().find(|s| s.name == name) {
                Some(s) => orders.push((s.column, order)),
                None => unknown.push(name.to_string()),
            }
        }
        if !unknown.is_empty() {
            let allowed: Vec<&str> = self.sorts.iter().map(|s| s.name).collect();
            return Err(not_allowed("sort", &unknown, &allowed));
        }
        let tie_break = orders
            .last()
            .map(|(_, o)| o.clone())
            .unwrap_or(Order::Asc);
        for (column, order) in orders {
            select.order_by_expr(col(column).into(), order);
        }
        select.order_by_expr(Expr::cust(format!("\"{}\".rowid", self.rowid_of)), tie_break);

        let mut includes = Vec::new();
        let mut unknown = Vec::new();
        for relation in params
            .include
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|r| !r.is_empty())
        {
            if self.includes.contains(&relation) {
                includes.push(relation.to_string());
            } else {
                unknown.push(relation.to_string());
            }
        }
        if !unknown.is_empty() {
            return Err(not_allowed("include", &unknown, self.includes));
        }

        select
            .limit(u64::from(params.per_page))
            .offset(params.offset());

        Ok(Applied {
            includes,
            page: params.page,
            per_page: params.per_page,
        })
    }
}
