pub mod artifacts;
pub mod config;
pub mod errors;
pub mod gates;
pub mod hash;
pub mod machine;
pub mod package;
pub mod report;
pub mod retry;
pub mod role;
pub mod run;
pub mod stage;
pub mod validator;
