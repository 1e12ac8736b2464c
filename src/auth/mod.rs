pub mod pin;
pub mod yggdrasil;
