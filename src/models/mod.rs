pub mod earnings;
pub mod outcome;
pub mod returns;
pub mod ticker;

pub use earnings::{CanonicalEvent, EventId, RawAnnouncement, SessionBucket, SourceId};
pub use outcome::{EventOutcome, Horizon};
pub use returns::{ReturnPanel, ReturnSeries};
pub use ticker::TickerMetadata;
