#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]

pub mod align;
pub mod artifacts;
pub mod classifier;
pub mod config;
pub mod encode;
pub mod features;
pub mod pipeline;
pub mod record;
pub mod scaler;
pub mod server;
