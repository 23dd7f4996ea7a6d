//! Domain layer: identifiers, money, the split aggregate and its rules, and the
//! ports the application layer talks to.

pub mod ids;
pub mod money;
pub mod notification;
pub mod ports;
pub mod shares;
pub mod split;
pub mod user;
