pub mod attestation;
pub mod types;

pub use attestation::{Attestation, AttestationBuilder};
pub use types::Quote;
