pub mod backend;
pub mod cli;
pub mod config;
pub mod dispatcher;
pub mod interpreter;
pub mod resolver;
pub mod session;
pub mod speech;
pub mod storage;
pub mod ui;
pub mod wake;

pub use rupert_common::error_mapping;
pub use rupert_common::messages;
pub use rupert_common::protocol;
pub use rupert_common::sites;
