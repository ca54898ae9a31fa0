pub mod schema;
pub mod tenant;
