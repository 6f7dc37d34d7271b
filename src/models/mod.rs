pub mod profile;
pub mod session;
pub mod task;

pub use profile::{Profile, ProfileUpdate};
pub use session::{AuthUser, Session, SignUpOutcome};
pub use task::{NewTask, Task};
