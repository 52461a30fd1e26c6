pub mod admin;
pub mod auth;
pub mod collections;
pub mod comments;
pub mod groups;
pub mod health;
pub mod permissions;
pub mod ratings;
pub mod resources;
pub mod shares;
pub mod suggestions;
pub mod users;
