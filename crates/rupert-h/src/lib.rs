pub mod backend;
pub mod cdp;
pub mod inject;

pub use backend::HeadlessBrowser;
