mod registry;

pub use registry::{LockerAssignment, LockerRegistry};
