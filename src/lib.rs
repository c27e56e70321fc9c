pub mod aggregation;
pub mod index;
pub mod matching;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod utils;
