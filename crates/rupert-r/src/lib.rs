pub mod backend;
pub mod error;
pub mod server;
pub mod speech;
pub mod ui;

pub use backend::RemoteBrowser;
pub use error::BridgeError;
pub use server::{BridgeHandle, BridgeServer};
pub use speech::RemoteSpeech;
pub use ui::RemoteUi;
