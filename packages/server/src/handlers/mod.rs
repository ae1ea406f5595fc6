pub mod auth;
pub mod health;
pub mod photo;
pub mod plugin;
pub mod trash;
pub mod user;
