mod broadcast;
mod common;
mod registry;
