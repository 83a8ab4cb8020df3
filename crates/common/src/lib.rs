pub mod appointment;
pub mod directory;
pub mod error;
pub mod event;
pub mod ids;
pub mod notification;

pub use appointment::{
    Action, Appointment, AppointmentStatus, ClusterKey, MeetingDetails, MeetingSchedule,
    NewAppointment,
};
pub use directory::{CourseSummary, UserProfile};
pub use error::{Error, Result};
pub use event::{AppointmentEvent, EventSubject};
pub use ids::{AppointmentId, CourseId, NotificationId, UserId};
pub use notification::{Notification, NotificationCategory, NotificationKind};
