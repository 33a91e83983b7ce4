mod service;
mod types;

pub use service::{AuthService, Clock, EnsureSessionResult, NextRefreshDelay, SystemClock};
pub use types::{AuthorizedCharacterData, LoginRequest};
