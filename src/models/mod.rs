pub mod crop;
pub mod interest;
