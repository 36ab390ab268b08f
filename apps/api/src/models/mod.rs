pub mod api_key;
pub mod history;
pub mod project;
pub mod requirement;
pub mod user;
