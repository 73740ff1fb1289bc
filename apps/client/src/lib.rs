//! Client side of the job tracker: capture of job postings from supported
//! boards, the credential session shared with the dashboard, and the
//! dashboard's view logic.
pub mod capture;
pub mod client;
pub mod dashboard;
pub mod models;
pub mod session;
pub mod site;
pub mod trigger;
