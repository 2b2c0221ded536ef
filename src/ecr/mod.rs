pub mod client;
pub mod error;
pub mod gateway;

pub use client::EcrGateway;
pub use error::RegistryError;
pub use gateway::{RepositoryGateway, RepositoryIdentity};
