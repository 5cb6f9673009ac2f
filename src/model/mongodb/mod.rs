mod bson;
mod store;

pub use bson::Id;
pub use store::{ensure_indexes_exist, MongoStore};
