mod config;
mod connector;
mod root;
