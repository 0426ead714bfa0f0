//! Process exit codes

pub const SUCCESS: i32 = 0;
/// Analysis, serialisation or output failed
pub const EXECUTION_ERROR: i32 = 1;
/// Bad arguments, missing or unreadable input
pub const INPUT_ERROR: i32 = 2;
/// Batch run where some subjects failed and others succeeded
pub const PARTIAL_FAILURE: i32 = 3;
