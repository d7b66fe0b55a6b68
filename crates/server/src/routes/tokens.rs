use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

use garage_api::{
    CreateTokenRequest, CreateTokenResponse, ListTokensResponse, crypto, db, service,
};

use crate::error::ApiErr;
use crate::extract::JsonBody;
use crate::repository;
use crate::routes::auth::AuthUser;
use crate::storage::{Db, sq_execute};

/// GET /api/tokens: the caller's personal access tokens, newest first.
pub async fn list_tokens(
    State(db): State<Db>,
    user: AuthUser,
) -> Result<Json<ListTokensResponse>, ApiErr> {
    let conn = db.conn();
    let tokens = repository::tokens::list(&conn, &user.user_id)?;
    Ok(Json(ListTokensResponse { tokens }))
}

/// POST /api/tokens: mint a token. The plaintext is only ever returned here.
pub async fn create_token(
    State(db): State<Db>,
    user: AuthUser,
    JsonBody(req): JsonBody<CreateTokenRequest>,
) -> Result<(StatusCode, Json<CreateTokenResponse>), ApiErr> {
    let name = service::validate_token_name(&req.name)?;
    let plain_text_token = service::generate_personal_token();
    let id = Uuid::new_v4().to_string();

    let conn = db.conn();
    sq_execute(
        &conn,
        db::tokens::insert(
            &id,
            &user.user_id,
            &name,
            &crypto::hash_token(&plain_text_token),
            &service::token_prefix(&plain_text_token),
        ),
    )
    .map_err(ApiErr::from_db("insert token"))?;
    let token = repository::tokens::find(&conn, &id)?
        .ok_or_else(|| ApiErr::internal("token vanished after insert"))?;

    tracing::info!("user {} created token {id}", user.user_id);
    Ok((
        StatusCode::CREATED,
        Json(CreateTokenResponse {
            token,
            plain_text_token,
        }),
    ))
}

/// DELETE /api/tokens/{id}: revoke one of the caller's tokens.
pub async fn delete_token(
    State(db): State<Db>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiErr> {
    let conn = db.conn();
    let deleted = sq_execute(&conn, db::tokens::delete_for_user(&id, &user.user_id))
        .map_err(ApiErr::from_db("delete token"))?;
    if deleted == 0 {
        return Err(ApiErr::not_found("token not found"));
    }
    Ok(StatusCode::NO_CONTENT)
}
