pub mod auth;
pub mod cors;

pub use auth::{CurrentCreator, MaybeCreator, SessionKeys, SuperAdmin};
pub use cors::cors_layer;
