pub mod booking;
pub mod ledger;
pub mod lifecycle;
pub mod memory;
pub mod notification;
pub mod repository;
pub mod supabase;

pub use booking::BookingEngine;
pub use ledger::{BookingLedger, Reservation};
pub use lifecycle::AppointmentLifecycleService;
pub use memory::InMemoryAppointmentRepository;
pub use notification::{EmailNotificationSender, LogNotificationSender, NotificationError, NotificationSender};
pub use repository::AppointmentRepository;
pub use supabase::SupabaseAppointmentRepository;
