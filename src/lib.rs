pub mod error;
pub mod models;
pub mod services;
pub mod shell;
pub mod state;
pub mod supabase;
pub mod view;
