pub mod router;

pub use router::{OracleSwapRouter, SwapQuote, SwapRouter};
