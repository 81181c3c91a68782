pub mod armor;
pub mod block;
pub mod compress;
pub mod kdf;
pub mod mac;

pub use armor::*;
pub use block::*;
pub use compress::*;
pub use kdf::*;
pub use mac::*;
