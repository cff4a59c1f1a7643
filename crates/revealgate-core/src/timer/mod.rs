mod countdown;
mod unlock;

pub use countdown::{Countdown, CountdownStatus, CountdownStep};
pub use unlock::UnlockTimer;
