pub mod master;
pub mod scores;
pub mod weights;
