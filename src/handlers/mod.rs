mod health;
mod token;

pub use health::{HEALTH_CACHE_CONTROL, health_check, health_head};
pub use token::issue_stream_token;
