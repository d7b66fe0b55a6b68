//! Inertia page routes. Each renders a front-end component with its props;
//! authorization failures surface as the same 403/404 the API returns.

use axum::{
    extract::{FromRef, FromRequestParts, Path, State},
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use serde_json::json;

use garage_api::service::MIN_CAR_YEAR;

use crate::config::AppConfig;
use crate::error::ApiErr;
use crate::extract::ListQuery;
use crate::inertia::{Inertia, redirect};
use crate::policy::{Ability, CarPolicy};
use crate::repository;
use crate::routes::auth::{AuthUser, MaybeUser};
use crate::routes::cars::load_car;
use crate::storage::Db;
use crate::{current_year, today};

/// Signed-in user for page routes; anonymous visits go to `/login`.
pub struct PageUser(pub AuthUser);

impl<S> FromRequestParts<S> for PageUser
where
    S: Send + Sync,
    Db: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match AuthUser::from_request_parts(parts, state).await {
            Ok(user) => Ok(Self(user)),
            Err(e) if e.status() == StatusCode::UNAUTHORIZED => Err(redirect("/login")),
            Err(e) => Err(e.into_response()),
        }
    }
}

fn with_auth(inertia: Inertia, user: Option<&AuthUser>) -> Inertia {
    inertia.share("auth", json!({ "user": user.map(|u| &u.profile) }))
}

fn year_bounds() -> serde_json::Value {
    json!({ "min_year": MIN_CAR_YEAR, "max_year": current_year() + 1 })
}

/// GET /
pub async fn welcome(
    inertia: Inertia,
    State(config): State<AppConfig>,
    MaybeUser(user): MaybeUser,
) -> Response {
    with_auth(inertia, user.as_ref()).render(
        "Welcome",
        json!({ "can_register": config.registration_open }),
    )
}

/// GET /login
pub async fn login(
    inertia: Inertia,
    State(config): State<AppConfig>,
    MaybeUser(user): MaybeUser,
) -> Response {
    if user.is_some() {
        return redirect("/dashboard");
    }
    with_auth(inertia, None).render(
        "Auth/Login",
        json!({ "can_register": config.registration_open }),
    )
}

/// GET /register
pub async fn register(
    inertia: Inertia,
    State(config): State<AppConfig>,
    MaybeUser(user): MaybeUser,
) -> Response {
    if user.is_some() {
        return redirect("/dashboard");
    }
    with_auth(inertia, None).render(
        "Auth/Register",
        json!({ "registration_open": config.registration_open }),
    )
}

/// GET /dashboard
pub async fn dashboard(
    inertia: Inertia,
    State(db): State<Db>,
    PageUser(user): PageUser,
) -> Result<Response, ApiErr> {
    let stats = {
        let conn = db.conn();
        repository::dashboard::summary(&conn, &user.user_id)?
    };
    Ok(with_auth(inertia, Some(&user)).render("Dashboard", json!({ "stats": stats })))
}

/// GET /cars
pub async fn cars_index(
    inertia: Inertia,
    State(db): State<Db>,
    PageUser(user): PageUser,
    ListQuery(params): ListQuery,
) -> Result<Response, ApiErr> {
    let cars = {
        let conn = db.conn();
        repository::cars::list(&conn, &user.user_id, &params)?
    };
    Ok(with_auth(inertia, Some(&user)).render(
        "Cars/Index",
        json!({
            "cars": cars,
            "filters": params.filters,
            "sort": params.sort,
        }),
    ))
}

/// GET /cars/create
pub async fn cars_create(inertia: Inertia, PageUser(user): PageUser) -> Response {
    with_auth(inertia, Some(&user)).render("Cars/Create", year_bounds())
}

/// GET /cars/{car}
pub async fn cars_show(
    inertia: Inertia,
    State(db): State<Db>,
    PageUser(user): PageUser,
    Path(car_id): Path<String>,
) -> Result<Response, ApiErr> {
    let car = {
        let conn = db.conn();
        CarPolicy::authorize(&conn, &user.user_id, &car_id, Ability::View)?;
        load_car(&conn, &car_id)?
    };
    Ok(with_auth(inertia, Some(&user)).render("Cars/Show", json!({ "car": car })))
}

/// GET /cars/{car}/edit
pub async fn cars_edit(
    inertia: Inertia,
    State(db): State<Db>,
    PageUser(user): PageUser,
    Path(car_id): Path<String>,
) -> Result<Response, ApiErr> {
    let car = {
        let conn = db.conn();
        CarPolicy::authorize(&conn, &user.user_id, &car_id, Ability::Update)?;
        load_car(&conn, &car_id)?
    };
    let mut props = year_bounds();
    props["car"] = json!(car);
    Ok(with_auth(inertia, Some(&user)).render("Cars/Edit", props))
}

/// GET /events: public.
pub async fn events_index(
    inertia: Inertia,
    State(db): State<Db>,
    MaybeUser(user): MaybeUser,
    ListQuery(params): ListQuery,
) -> Result<Response, ApiErr> {
    let (events, tracks, organizers) = {
        let conn = db.conn();
        (
            repository::events::list(&conn, &params, &today())?,
            repository::events::tracks(&conn)?,
            repository::events::organizers(&conn)?,
        )
    };
    Ok(with_auth(inertia, user.as_ref()).render(
        "Events/Index",
        json!({
            "events": events,
            "tracks": tracks,
            "organizers": organizers,
            "filters": params.filters,
            "sort": params.sort,
        }),
    ))
}

/// GET /settings/tokens
pub async fn tokens_index(
    inertia: Inertia,
    State(db): State<Db>,
    PageUser(user): PageUser,
) -> Result<Response, ApiErr> {
    let tokens = {
        let conn = db.conn();
        repository::tokens::list(&conn, &user.user_id)?
    };
    Ok(with_auth(inertia, Some(&user)).render("Tokens/Index", json!({ "tokens": tokens })))
}
