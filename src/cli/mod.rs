pub mod decrypt;
pub mod encrypt;
pub mod random;
pub mod seed;

pub use decrypt::*;
pub use encrypt::*;
pub use random::*;
pub use seed::*;
