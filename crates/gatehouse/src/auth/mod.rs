//! Challenge preparation and response validation.

mod preparer;
mod validator;

pub use preparer::prepare_challenge;
pub use validator::{validate_login, validate_signup, AuthHeaders, RequestDetails};
