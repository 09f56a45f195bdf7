pub mod bid;
pub mod errors;
pub mod tender;

pub use bid::*;
pub use errors::*;
pub use tender::*;
