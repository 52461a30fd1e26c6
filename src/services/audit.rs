use crate::entities::audit_logs;
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use tracing::{error, info};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AuditEventType {
    UserRegister,
    UserLogin,
    ResourceDelete,
    ShareCreate,
    ShareUpdate,
    ShareRevoke,
    PermissionGrant,
    PermissionUpdate,
    PermissionRevoke,
    SuggestionAutoModerated,
    SuggestionOverride,
    ConfigUpdate,
}

impl fmt::Display for AuditEventType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Clone)]
pub struct AuditService {
    db: DatabaseConnection,
}

impl AuditService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn log(
        &self,
        event_type: AuditEventType,
        user_id: Option<String>,
        resource_id: Option<String>,
        action: &str,
        details: Option<Value>,
    ) {
        let event_type_str = event_type.to_string();
        let action = action.to_string();
        let db = self.db.clone();
        let details_json = details.map(|v| v.to_string());

        info!(
            target: "audit",
            event_type = %event_type_str,
            user_id = ?user_id,
            resource_id = ?resource_id,
            action = %action,
            "Audit Event Occurred"
        );

        // Persist without holding up the request
        tokio::spawn(async move {
            let log = audit_logs::ActiveModel {
                id: Set(Uuid::new_v4().to_string()),
                timestamp: Set(chrono::Utc::now()),
                event_type: Set(event_type_str),
                user_id: Set(user_id),
                resource_id: Set(resource_id),
                action: Set(action),
                status: Set("success".to_string()),
                details: Set(details_json),
            };

            if let Err(e) = log.insert(&db).await {
                error!("Failed to persist audit log: {}", e);
            }
        });
    }
}
