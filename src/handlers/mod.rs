pub mod admin;
pub mod auth;
pub mod content;
pub mod health;
pub mod leaderboard;
