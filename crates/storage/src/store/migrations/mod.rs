#![forbid(unsafe_code)]

mod apply;
mod list;
mod record;
