//! Hexlift: raise and lower hexagonal tiles so a traveler can walk to its
//! goal. The library holds the terrain rules and the simulation; the binary
//! is a headless driver.

pub mod config;
pub mod domain;
pub mod sim;
