//! Resilient interaction engine
//!
//! Locator chains, their resolution, click strategies and page settling.
//! Everything here talks to the page through `BrowserDriver` and measures
//! time through `Clock`.

pub mod clock;
pub mod error;
pub mod executor;
pub mod locator;
pub mod resolver;
pub mod retry;
pub mod wait;

pub use clock::{Clock, ManualClock, TokioClock};
pub use error::{EngineError, EngineResult};
pub use executor::{Action, Executor, Outcome, Strategy};
pub use locator::{AttrConstraint, AttrOp, LocatorChain, LocatorSpec, TextMatch};
pub use resolver::{Resolution, ResolvedTarget, Resolver};
pub use retry::RetryPolicy;
pub use wait::{Settled, WaitCoordinator};
