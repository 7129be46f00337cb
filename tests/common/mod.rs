#![allow(dead_code)]

pub mod log_capture;
pub mod test_utils;
