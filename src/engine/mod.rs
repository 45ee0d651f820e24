pub mod alerts;
pub mod lifecycle;
pub mod refresh;

pub use alerts::{classify, should_dispatch, AlertLabel, Proximity, RangeBucket};
pub use lifecycle::{evaluate, Transition, TransitionKind};
pub use refresh::{AlertEvent, RefreshReport, RefreshRunner};
