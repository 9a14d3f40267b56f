pub mod intervals;

pub use intervals::{heart_rate, pulse_transit_times, summarize_ptt, PttSummary};
