pub mod access;
pub mod ident;
pub mod namespace;
