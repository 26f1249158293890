//! Authorization of administrative votes

pub mod authorizer;

pub use authorizer::{AddressBasedAuthorizer, AuthorizerError, QuorumRule};
