pub mod common_len;
pub mod deadline;
pub mod side;
