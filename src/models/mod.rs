pub mod authenticator;
pub mod certificate;
pub mod credential;
pub mod policy;
pub mod principal;
pub mod session;
