//! Structural writer: section-scoped, format-preserving edits to notes.
//!
//! All mutations flow through [`NoteFile`]: read parses front-matter and
//! detects the line ending, edits operate on the LF-normalised body, and
//! [`NoteFile::write`] restores the original line ending, normalises the
//! trailing newline to exactly one, and lands on disk via a temp-file
//! rename so external readers never observe a torn note.
//!
//! Front-matter round-trips byte-identically until a field is actually
//! modified; only then is the YAML re-serialised (key order preserved).
//!
//! Concurrent writes by this engine to the same note are last-write-wins;
//! callers that need a stricter order sequence their own operations.

mod atomic;
mod note_file;
mod rename;
mod section;

pub use atomic::atomic_write;
pub use note_file::NoteFile;
pub use rename::{
    migrate_field_values, rename_field, rename_tag, ChangePreview, FieldRenameOptions,
    RenameOutcome, TagRenameOptions,
};
pub use section::{
    find_section, format_payload, insert_in_section, remove_from_section, replace_in_section,
    section_names, toggle_task, InsertOptions, PayloadStyle, Position,
};

pub use flywheel_parser::{extract_headings, Heading};
