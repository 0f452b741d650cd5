pub mod decode;
pub mod multiwoz;
pub mod registry;
pub mod repair;
pub mod sgd;
pub mod validation;

pub use decode::{decode_document, read_document};
pub use registry::{
    FunctionSpec, FunctionTarget, SchemaRegistry, ServiceSchema, SlotSpec, SlotType, SlotValues,
};
pub use repair::{repair, RepairKind, RepairOutcome};
pub use sgd::SgdCatalog;
pub use validation::{validate, ParsedArguments, ValidationError, ValidationKind};
