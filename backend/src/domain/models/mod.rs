pub mod attendance;
pub mod user;

pub use attendance::{AttendanceDatabase, YearAttendance};
pub use user::{find_user, UserAccount, USERS};
