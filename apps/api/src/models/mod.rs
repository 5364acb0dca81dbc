pub mod attachment;
pub mod message;
pub mod profile;
pub mod user;
