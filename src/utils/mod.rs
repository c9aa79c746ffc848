pub mod clock;
pub mod ids;

pub use clock::{now_timestamp, timestamp_before};
pub use ids::{derive_id, new_id};
