use crate::api::error::AppError;
use crate::api::middleware::auth::require_admin;
use crate::services::admin_config::{list_entries, upsert_entries};
use crate::services::audit::AuditEventType;
use crate::utils::auth::AuthUser;
use axum::{Json, extract::State};
use serde_json::json;
use std::collections::BTreeMap;
use tracing::info;

#[utoipa::path(
    get,
    path = "/admin/config",
    responses(
        (status = 200, description = "All configuration entries", body = BTreeMap<String, String>),
        (status = 403, description = "Admin role required")
    ),
    security(("jwt" = [])),
    tag = "admin"
)]
pub async fn get_config(
    State(state): State<crate::AppState>,
    user: AuthUser,
) -> Result<Json<BTreeMap<String, String>>, AppError> {
    require_admin(&user)?;
    Ok(Json(list_entries(&state.db).await?))
}

/// Upsert moderation settings. Unknown keys or malformed values reject the whole batch.
#[utoipa::path(
    put,
    path = "/admin/config",
    request_body = BTreeMap<String, String>,
    responses(
        (status = 200, description = "Configuration after the update", body = BTreeMap<String, String>),
        (status = 400, description = "Unknown key or invalid value"),
        (status = 403, description = "Admin role required")
    ),
    security(("jwt" = [])),
    tag = "admin"
)]
pub async fn update_config(
    State(state): State<crate::AppState>,
    user: AuthUser,
    Json(entries): Json<BTreeMap<String, String>>,
) -> Result<Json<BTreeMap<String, String>>, AppError> {
    require_admin(&user)?;
    let updated = upsert_entries(&state.db, &entries, Some(&user.id)).await?;

    info!("⚙️  Admin {} updated {} config entries", user.id, entries.len());
    state
        .audit
        .log(
            AuditEventType::ConfigUpdate,
            Some(user.id.clone()),
            None,
            "update_config",
            Some(json!({ "keys": entries.keys().collect::<Vec<_>>() })),
        )
        .await;

    Ok(Json(updated))
}
