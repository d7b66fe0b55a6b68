use axum::{
    Json,
    extract::{Multipart, Path, State, multipart::MultipartError},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use rusqlite::Connection;

use garage_api::{
    CarRequest, CarResponse, Paginated, ServiceError,
    service::{self, Mode},
};

use crate::config::AppConfig;
use crate::current_year;
use crate::error::ApiErr;
use crate::extract::{JsonBody, ListQuery};
use crate::images::{ImageKind, ImageStore};
use crate::policy::{Ability, CarPolicy};
use crate::repository;
use crate::routes::auth::AuthUser;
use crate::storage::Db;

/// Multipart field carrying the uploaded image.
pub const IMAGE_FIELD: &str = "image";

// ---------------------------------------------------------------------------
// CRUD
// ---------------------------------------------------------------------------

/// GET /api/cars: the caller's cars, filtered, sorted and paginated.
pub async fn list_cars(
    State(db): State<Db>,
    user: AuthUser,
    ListQuery(params): ListQuery,
) -> Result<Json<Paginated<CarResponse>>, ApiErr> {
    let conn = db.conn();
    repository::cars::list(&conn, &user.user_id, &params).map(Json)
}

/// POST /api/cars
pub async fn create_car(
    State(db): State<Db>,
    user: AuthUser,
    JsonBody(req): JsonBody<CarRequest>,
) -> Result<(StatusCode, Json<CarResponse>), ApiErr> {
    let changes = service::validate_car(&req, Mode::Create, current_year())?;
    let conn = db.conn();
    let car = repository::cars::create(&conn, &user.user_id, &changes)?;
    tracing::info!("user {} added car {}", user.user_id, car.id);
    Ok((StatusCode::CREATED, Json(car)))
}

/// GET /api/cars/{car}: one car with its modifications.
pub async fn get_car(
    State(db): State<Db>,
    user: AuthUser,
    Path(car_id): Path<String>,
) -> Result<Json<CarResponse>, ApiErr> {
    let conn = db.conn();
    CarPolicy::authorize(&conn, &user.user_id, &car_id, Ability::View)?;
    load_car(&conn, &car_id).map(Json)
}

/// PUT|PATCH /api/cars/{car}: partial update.
pub async fn update_car(
    State(db): State<Db>,
    user: AuthUser,
    Path(car_id): Path<String>,
    JsonBody(req): JsonBody<CarRequest>,
) -> Result<Json<CarResponse>, ApiErr> {
    let conn = db.conn();
    CarPolicy::authorize(&conn, &user.user_id, &car_id, Ability::Update)?;
    let changes = service::validate_car(&req, Mode::Update, current_year())?;
    if !changes.is_empty() {
        repository::cars::update(&conn, &car_id, &changes)?;
    }
    load_car(&conn, &car_id).map(Json)
}

/// DELETE /api/cars/{car}: modifications cascade; the image file is removed.
pub async fn delete_car(
    State(db): State<Db>,
    State(images): State<ImageStore>,
    user: AuthUser,
    Path(car_id): Path<String>,
) -> Result<StatusCode, ApiErr> {
    let image_path = {
        let conn = db.conn();
        let car = CarPolicy::authorize(&conn, &user.user_id, &car_id, Ability::Delete)?;
        repository::cars::delete(&conn, &car_id)?;
        car.image_path
    };
    images.discard(image_path).await;
    tracing::info!("user {} deleted car {car_id}", user.user_id);
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) fn load_car(conn: &Connection, car_id: &str) -> Result<CarResponse, ApiErr> {
    repository::cars::find_with_modifications(conn, car_id)?
        .ok_or_else(|| ApiErr::not_found("car not found"))
}

// ---------------------------------------------------------------------------
// Image
// ---------------------------------------------------------------------------

fn multipart_err(e: MultipartError) -> ApiErr {
    ApiErr::new(e.status(), e.body_text())
}

/// Check an upload and sniff its format.
pub fn validate_image(bytes: &[u8], max_bytes: usize) -> Result<ImageKind, ServiceError> {
    if bytes.is_empty() {
        return Err(ServiceError::invalid(IMAGE_FIELD, "The image field is required."));
    }
    if bytes.len() > max_bytes {
        return Err(ServiceError::invalid(
            IMAGE_FIELD,
            format!(
                "The image field must not be greater than {} kilobytes.",
                max_bytes / 1024
            ),
        ));
    }
    ImageKind::detect(bytes).ok_or_else(|| {
        ServiceError::invalid(
            IMAGE_FIELD,
            "The image field must be a file of type: jpeg, png, gif, webp.",
        )
    })
}

/// Point the car at `key`, returning the replaced key and the updated car.
fn attach_image(
    conn: &Connection,
    user_id: &str,
    car_id: &str,
    key: &str,
) -> Result<(Option<String>, CarResponse), ApiErr> {
    let car = CarPolicy::authorize(conn, user_id, car_id, Ability::ManageImage)?;
    repository::cars::set_image(conn, car_id, Some(key))?;
    Ok((car.image_path, load_car(conn, car_id)?))
}

/// POST /api/cars/{car}/image: multipart upload (field `image`).
pub async fn upload_image(
    State(db): State<Db>,
    State(images): State<ImageStore>,
    State(config): State<AppConfig>,
    user: AuthUser,
    Path(car_id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<CarResponse>, ApiErr> {
    {
        let conn = db.conn();
        CarPolicy::authorize(&conn, &user.user_id, &car_id, Ability::ManageImage)?;
    }

    let mut upload = None;
    while let Some(field) = multipart.next_field().await.map_err(multipart_err)? {
        if field.name() == Some(IMAGE_FIELD) {
            upload = Some(field.bytes().await.map_err(multipart_err)?);
        }
    }
    let bytes = upload.unwrap_or_default();
    let kind = validate_image(&bytes, config.max_image_bytes)?;

    let key = images
        .put(&car_id, kind, &bytes)
        .await
        .map_err(ApiErr::from_db("store car image"))?;

    let attached = {
        let conn = db.conn();
        attach_image(&conn, &user.user_id, &car_id, &key)
    };
    match attached {
        Ok((previous, car)) => {
            images.discard(previous).await;
            Ok(Json(car))
        }
        Err(e) => {
            images.discard(Some(key)).await;
            Err(e)
        }
    }
}

/// GET /api/cars/{car}/image: stream the stored image to its owner.
pub async fn show_image(
    State(db): State<Db>,
    State(images): State<ImageStore>,
    user: AuthUser,
    Path(car_id): Path<String>,
) -> Result<Response, ApiErr> {
    let key = {
        let conn = db.conn();
        CarPolicy::authorize(&conn, &user.user_id, &car_id, Ability::View)?.image_path
    }
    .ok_or_else(|| ApiErr::not_found("car has no image"))?;

    let bytes = images
        .get(&key)
        .await
        .map_err(ApiErr::from_db("read car image"))?
        .ok_or_else(|| ApiErr::not_found("car has no image"))?;
    let mime = ImageKind::from_key(&key)
        .or_else(|| ImageKind::detect(&bytes))
        .map_or("application/octet-stream", ImageKind::mime);

    Ok((
        [
            (header::CONTENT_TYPE, mime),
            (header::CACHE_CONTROL, "private"),
        ],
        bytes,
    )
        .into_response())
}

/// DELETE /api/cars/{car}/image
pub async fn delete_image(
    State(db): State<Db>,
    State(images): State<ImageStore>,
    user: AuthUser,
    Path(car_id): Path<String>,
) -> Result<StatusCode, ApiErr> {
    let previous = {
        let conn = db.conn();
        let car = CarPolicy::authorize(&conn, &user.user_id, &car_id, Ability::ManageImage)?;
        if car.image_path.is_some() {
            repository::cars::set_image(&conn, &car_id, None)?;
        }
        car.image_path
    };
    images.discard(previous).await;
    Ok(StatusCode::NO_CONTENT)
}
