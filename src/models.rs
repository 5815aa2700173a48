mod ids;
mod note;

pub use ids::{LocalIdGenerator, NoteId};
pub use note::{Note, NoteBuilder, UNTITLED, now_millis};
