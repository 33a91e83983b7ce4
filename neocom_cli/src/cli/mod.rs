mod auth;
mod common;
mod root;

pub(crate) use root::get_args;
