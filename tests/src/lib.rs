//! Cross-crate test suite, one module per area.

#[cfg(test)]
mod support;

#[cfg(test)]
mod backend;
#[cfg(test)]
mod core;
#[cfg(test)]
mod decode;
#[cfg(test)]
mod difftest;
#[cfg(test)]
mod disas;
#[cfg(test)]
mod exec;
#[cfg(test)]
mod frontend;
#[cfg(test)]
mod guest;
#[cfg(test)]
mod integration;
