//! LED/buzzer blink controller for the Gatehouse access-control platform.
//!
//! [`LedBuzzer`] is the canonical timed device module: ON/OFF/TOGGLE are
//! forwarded verbatim to a delegate line-output module, STATE is answered
//! from locally tracked state, and BLINK runs a toggle sequence under the
//! host scheduler. [`LineOutput`] is the delegate side, serving level
//! commands directly against a GPIO line.
//!
//! The delegate must run on a different host thread than the blink
//! controller; a module cannot send a request through its own host.

pub mod blink;
pub mod output;

pub use blink::{LedBuzzer, LedBuzzerConfig};
pub use output::LineOutput;
