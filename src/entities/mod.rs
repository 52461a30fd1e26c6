pub mod prelude;

pub mod admin_config;
pub mod audit_logs;
pub mod collection_resources;
pub mod collections;
pub mod comments;
pub mod group_members;
pub mod groups;
pub mod resource_permissions;
pub mod resource_ratings;
pub mod resource_shares;
pub mod resource_tags;
pub mod resources;
pub mod suggestion_votes;
pub mod suggestions;
pub mod users;
