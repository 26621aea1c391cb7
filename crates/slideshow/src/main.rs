//! Slideshow.
//!
//! A headless slideshow that walks the images of a folder in sequential or random order. Images
//! are loaded through a windowed asynchronous cache that keeps the neighbors of the shown image
//! decoded within a fixed memory budget.

#![warn(
    missing_docs,
    missing_debug_implementations,
    unused_crate_dependencies,
    clippy::all
)]

mod cli;
mod config;
mod decoder;
mod discovery;
mod logging;
mod navigator;
mod slideshow;

fn main() {
    match cli::execute() {
        Ok(()) => std::process::exit(0),
        Err(error) => {
            logging::ensure_log_error(&error);
            std::process::exit(1);
        }
    }
}
