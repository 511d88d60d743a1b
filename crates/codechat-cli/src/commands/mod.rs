pub mod artifact;
pub mod conversation;
pub mod run;
