mod context;
mod tb;
mod types;
