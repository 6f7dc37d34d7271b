pub mod board;
pub mod mirror;
pub mod rollover;
pub mod session;

pub use board::{BoardEvent, Pending, TaskBoard, Toggled};
pub use mirror::{TaskMirror, ToggleCommand};
pub use rollover::{Clock, DayRolloverScheduler, LocalClock};
pub use session::{Screen, SessionController};
