pub mod convert;
pub mod health;
pub mod progress;

pub use convert::*;
pub use health::*;
pub use progress::*;
