pub mod access;
pub mod admin_config;
pub mod audit;
pub mod cache;
pub mod collection_service;
pub mod comment_service;
pub mod group_service;
pub mod moderation;
pub mod permission_service;
pub mod rating_service;
pub mod resource_query;
pub mod resource_service;
pub mod share_service;
pub mod suggestion_service;
pub mod vote_service;
