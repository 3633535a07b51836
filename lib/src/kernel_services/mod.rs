//! Function-pointer indirection to subsystems that link after `slopos-lib`
//! (timer, console) so lower layers can call them without a dependency edge.

pub mod platform;
