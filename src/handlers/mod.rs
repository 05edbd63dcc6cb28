// handlers/mod.rs - request handlers
//
// ping:      ANY /ping (health check, bypasses the authorization gate)
// instances: GET /     (scope-gated instance lookup)
pub mod instances;
pub mod ping;

pub use instances::instance_lookup;
pub use ping::ping;
