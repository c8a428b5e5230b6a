pub mod crops;
pub mod interests;
