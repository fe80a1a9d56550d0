//! Intent handlers.
//!
//! Each module owns the parsing and formatting of one family of intents. The dispatcher calls
//! into them after the gate and maps their failures to outcomes.

pub mod alarm;
pub mod calendar;
pub mod clock;
pub mod math;
pub mod media;
pub mod phone;
pub mod reminder;
pub mod search;
pub mod system;
pub mod users;
pub mod voice;
pub mod weather;
