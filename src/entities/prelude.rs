pub use super::admin_config::Entity as AdminConfig;
pub use super::audit_logs::Entity as AuditLogs;
pub use super::collection_resources::Entity as CollectionResources;
pub use super::collections::Entity as Collections;
pub use super::comments::Entity as Comments;
pub use super::group_members::Entity as GroupMembers;
pub use super::groups::Entity as Groups;
pub use super::resource_permissions::Entity as ResourcePermissions;
pub use super::resource_ratings::Entity as ResourceRatings;
pub use super::resource_shares::Entity as ResourceShares;
pub use super::resource_tags::Entity as ResourceTags;
pub use super::resources::Entity as Resources;
pub use super::suggestion_votes::Entity as SuggestionVotes;
pub use super::suggestions::Entity as Suggestions;
pub use super::users::Entity as Users;
