pub mod actor;
pub mod alert;
pub mod enums;
pub mod patient;
pub mod risk;
pub mod vital;

pub use actor::*;
pub use alert::*;
pub use enums::*;
pub use patient::*;
pub use risk::*;
pub use vital::*;
