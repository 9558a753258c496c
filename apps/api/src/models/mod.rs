pub mod analysis;
pub mod block;
