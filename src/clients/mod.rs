pub mod api_client;
pub mod auth_request;

pub use api_client::{failure_message, ApiClient, JobLinks};
pub use auth_request::{AuthenticatedRequestBuilder, DEV_EMAIL_HEADER};
