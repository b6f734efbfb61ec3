//! Generation client module - service contract and simulated implementation

pub mod simulated;
pub mod traits;

pub use simulated::SimulatedClient;
pub use traits::{GenerationClient, GenerationRequest, GenerationResult, Style};
