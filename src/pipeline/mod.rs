pub mod patterns;
pub mod primitives;
pub mod types;
pub mod text;
pub mod voice;
pub mod tabular;
pub mod vision;
pub mod remote; // Extraction service and remote file clients
pub mod validation;
pub mod job; // Optimizer job payload
pub mod processor;
