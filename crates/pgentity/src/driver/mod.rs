//! Bridging JSON values to the PostgreSQL wire types.
//!
//! Parameters are bound by the type the server declares for each placeholder,
//! and result columns are decoded by their column type, so the engine itself
//! only ever sees `serde_json::Value`.

mod decode;
mod param;

pub(crate) use decode::decode_row;
pub(crate) use param::JsonParam;
