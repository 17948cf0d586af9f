pub mod billing;
pub mod db;
pub mod http;
pub mod notes;
pub mod processing;
pub mod questions;

pub use billing::RestBillingAdapter;
pub use db::DbAdapter;
pub use http::BackendClient;
pub use notes::RestNotesAdapter;
pub use processing::RestProcessingAdapter;
pub use questions::RestQuestionAdapter;
