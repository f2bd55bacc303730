pub mod availability;
pub mod doctor;
pub mod generator;
pub mod memory;
pub mod repository;
pub mod slots;
pub mod supabase;

pub use availability::AvailabilityService;
pub use doctor::DoctorService;
pub use generator::SlotGenerator;
pub use memory::{InMemoryDoctorRepository, InMemorySlotRepository};
pub use repository::{DoctorRepository, SlotRepository};
pub use slots::SlotService;
pub use supabase::{SupabaseDoctorRepository, SupabaseSlotRepository};
