pub mod auth;
pub mod cars;
pub mod dashboard;
pub mod events;
pub mod health;
pub mod modifications;
pub mod pages;
pub mod tokens;
