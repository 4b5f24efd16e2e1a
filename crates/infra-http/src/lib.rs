// EQSANS Infrastructure - HTTP adapters for Fermi and ICAT

pub mod fermi;
pub mod icat;
mod response;

pub use fermi::{FermiClient, FermiConfig, FermiTimeouts};
pub use icat::{IcatClient, IcatConfig};
