//! Data models for EquipTrack

pub mod category;
pub mod enums;
pub mod equipment;
pub mod loan;
pub mod maintenance;
pub mod request;
pub mod transition;
pub mod user;

// Re-export commonly used types
pub use category::Category;
pub use enums::{EquipmentStatus, LoanKind, LoanStatus, MaintenanceType, RequestStatus, Role};
pub use equipment::EquipmentRecord;
pub use loan::LoanRecord;
pub use maintenance::MaintenanceRecord;
pub use request::LoanRequest;
pub use transition::{TransitionEvent, TransitionKind};
pub use user::{UserClaims, UserProfile};
