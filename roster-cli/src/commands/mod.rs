pub mod diff;
pub mod init;
pub mod run;
pub mod schedule;
pub mod status;
