pub mod config;
pub mod crypto;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod platforms;
pub mod router;
pub mod service;

pub use crypto::TokenCipher;
pub use db::BoardStorage;
pub use error::BoardError;
pub use platforms::{Platform, PlatformClient};
pub use router::{BoardState, board_router};
