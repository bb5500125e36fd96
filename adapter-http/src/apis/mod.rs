pub mod call;
pub mod health;
pub mod sessions;
