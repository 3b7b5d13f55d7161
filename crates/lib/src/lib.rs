//! Recipe relay core library: LINE webhook verification and dispatch, recipe generation, and
//! chunked delivery, plus the gateway server used by the CLI.

pub mod channels;
pub mod config;
pub mod delivery;
pub mod dispatch;
pub mod gateway;
pub mod llm;
pub mod recipe;

#[cfg(test)]
mod testing;
