pub mod cache;
pub mod quotes;

pub use quotes::{normalize_symbol, parse_symbol_list, search_symbols, QuoteLookup, QuoteService};
