pub mod instances;
pub mod manager;

pub use instances::{InstanceRow, InstanceSource, LookupQuery, PgInstanceSource, RowStream};
pub use manager::{connect_pool, DatabaseError};
