pub mod api;
pub mod cli;
pub mod config;
pub mod confirm;
pub mod error;
pub mod history;
pub mod output;
pub mod rating;
pub mod search;
pub mod services;
pub mod session;
pub mod tier;
pub mod tracking;

pub use api::ApiClient;
pub use config::Config;
pub use error::{ApiError, ValidationError};
pub use session::{Session, SessionState};
pub use tracking::TrackedUsers;
