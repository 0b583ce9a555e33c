pub mod supabase;

pub use supabase::{content_range_total, filter_value, DatabaseError, SupabaseClient};
