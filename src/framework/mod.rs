//! Flow control shared by the pipeline stages: tick states, bounded polling, an injectable clock and a trigger gate.

mod clock;
mod gate;
mod poll;
mod state;

pub use clock::*;
pub use gate::*;
pub use poll::*;
pub use state::*;
