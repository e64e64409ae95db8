mod security;

pub use security::{Authorizer, SecurityContext, FULL_ACCESS};
