pub mod admin;
pub mod signup;
