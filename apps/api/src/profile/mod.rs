// Profile engine: keyword classification, merge, completeness and stage selection.
// Everything here is pure and synchronous; the async turn pipeline lives in `guidance`.

pub mod classifier;
pub mod completeness;
pub mod handlers;
pub mod stage;
pub mod store;
