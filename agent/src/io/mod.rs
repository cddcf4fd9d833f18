pub mod stdio;
pub mod transport;
