pub mod schemas;
pub mod validator;

pub use schemas::{field_weight, required_fields, structural_score, FieldKind};
pub use validator::ResponseValidator;
