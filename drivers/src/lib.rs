#![no_std]
#![allow(unsafe_op_in_unsafe_fn)]

extern crate alloc;

pub mod net;
