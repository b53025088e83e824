#![forbid(unsafe_code)]

mod branches;
mod commit;
mod projects;
mod resolve;
