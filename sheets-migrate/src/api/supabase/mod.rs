//! Supabase PostgREST backend for the store

mod client;

pub use client::SupabaseClient;
