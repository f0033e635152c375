pub mod matrix;
pub mod simplex;
