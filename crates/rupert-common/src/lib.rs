pub mod error;
pub mod error_mapping;
pub mod messages;
pub mod protocol;
pub mod sites;
pub mod text;
