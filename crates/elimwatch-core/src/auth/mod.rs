//! Credential handling: keys live in memory for the session and in the OS
//! keychain between runs, never in files or logs.

mod credentials;

pub use credentials::{CredentialStore, Credentials};
