pub mod market;
pub mod signal;
pub mod snapshot;
pub mod watch;

pub use market::*;
pub use signal::*;
pub use snapshot::*;
pub use watch::*;
