pub mod pending;
pub mod product;
pub mod utterance;

pub use pending::{PendingAction, PendingSlot};
pub use product::{ProductId, ProductRecord};
pub use utterance::{normalize, Utterance};
