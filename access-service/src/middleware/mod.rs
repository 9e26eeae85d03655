pub mod access;

pub use access::{access_middleware, AuthUser};
