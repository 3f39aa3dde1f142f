pub mod feedback;
pub mod ticket;

pub use feedback::FeedbackRecord;
pub use ticket::{Priority, RankedMatch, TicketRecord, TicketStatus};
