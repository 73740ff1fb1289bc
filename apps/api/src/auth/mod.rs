pub mod credential;
pub mod google;
pub mod handlers;
pub mod oauth_state;
pub mod token;
pub mod users;

pub use credential::AuthUser;
