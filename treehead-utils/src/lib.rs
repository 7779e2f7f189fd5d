pub mod json_stringify_deterministic;
pub mod keypair;
