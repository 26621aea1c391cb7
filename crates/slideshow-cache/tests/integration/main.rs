mod cache;
mod prefetch;
mod utils;
