pub mod booking;
pub mod dispatcher;
pub mod function;
pub mod normalize;
pub mod query;
pub mod taxi;
pub mod venue;

pub use booking::{
    generate_reference_number, validate_booking, BookingDomain, BookingRecord, BookingRejection,
    BookingStore, RejectionKind,
};
pub use dispatcher::FunctionDispatcher;
pub use function::{argument_text, DeclaredFunction, FunctionBackends, QueryFunction, TransactionFunction, DONTCARE};
pub use query::{format_table, FormatLimits, NO_RESULTS};
pub use taxi::TaxiDescriptor;
pub use venue::{QueryRows, VenueMatch, VenueStore};
