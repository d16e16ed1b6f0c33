pub mod flag;
pub mod list_item;
pub mod note;
pub mod user;

pub use flag::{Flag, DEFAULT_FLAG_COLOR};
pub use list_item::{ListItem, NewListItem};
pub use note::{NewNote, Note, NoteUpdate, DEFAULT_NOTE_COLOR};
pub use user::User;
