// handlers/master/mod.rs - Company management for master principals
//
// Security Level: JWT with role = master
// Middleware: jwt_auth_middleware

pub mod companies;

pub use companies::{companies_get, companies_post, company_put, company_stop_post};
