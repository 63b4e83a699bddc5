pub mod booking;
pub mod conflict;
pub mod policy;

pub use booking::AppointmentBookingService;
pub use conflict::ConflictDetectionService;
