pub mod myers;
pub mod raw_operation;
