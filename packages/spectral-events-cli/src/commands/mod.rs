pub mod batch;
pub mod detect;
pub mod info;
pub mod validate;
