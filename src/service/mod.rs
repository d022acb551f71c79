pub mod connections;
pub mod scoring;
pub mod submission;
pub mod sync;
pub mod token_refresh;

pub use connections::{ConnectionService, LoginOutcome};
pub use submission::{SubmissionRequest, SubmissionService};
pub use sync::{SyncReport, SyncService};
pub use token_refresh::{RefreshResult, TokenRefreshService};
