pub mod header;
pub mod store;

pub use header::{AuthDisplay, AuthHeader};
pub use store::{CrossContextSync, LogNavigator, Navigator, SessionStore, TOKEN_KEY};
