// Library root
// -----------
// Client for the NextBrain machine-learning backend. The binary
// (`main.rs`) uses these modules to implement the interactive CLI.
//
// Module responsibilities:
// - `api`: the model lifecycle client (upload, train, poll, predict,
//   delete).
// - `transport`: builds the per-auth-mode HTTP requests and sends them.
// - `model`: wire shapes such as model ids, tables and status documents.
// - `config`: credentials and access-token persistence.
// - `error`: the error taxonomy shared by all of the above.
// - `ui`: terminal menu flows that delegate to `api`.
pub mod api;
pub mod config;
pub mod error;
pub mod model;
pub mod transport;
pub mod ui;

pub use api::{ModelLifecycleClient, TrainFailurePolicy, POLL_INTERVAL};
pub use config::{AuthMode, Credentials};
pub use error::{Error, Result};
pub use model::{ModelId, StatusAxis, Table};
