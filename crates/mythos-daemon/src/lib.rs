//! Library surface behind the `mythosd` binary, split out so integration
//! tests can drive `Services` directly without a real process.

pub mod args;
pub mod presence;
pub mod services;
pub mod world_seed;
