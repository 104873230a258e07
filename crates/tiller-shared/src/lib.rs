//! App and task models for the Tiller
//! dashboard, and the sync seam they
//! persist through.

pub mod app;
pub mod sync;
pub mod task;

pub use app::{
  App,
  AppCollection,
  next_app_id
};
pub use sync::{
  HttpVerb,
  SyncMethod,
  SyncOptions,
  SyncRequest,
  Transport
};
pub use task::{
  Task,
  TaskCollection,
  TaskPayload
};
