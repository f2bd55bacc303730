pub mod memory;
pub mod repository;
pub mod supabase;
pub mod wallet;

pub use memory::InMemoryPatientRepository;
pub use repository::PatientRepository;
pub use supabase::SupabasePatientRepository;
pub use wallet::WalletService;
