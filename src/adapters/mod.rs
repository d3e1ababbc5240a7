// ABOUTME: Concrete bindings of the collaborator traits used by the binary.
// ABOUTME: Every external operation is an executable script in the project directory.

mod parse;
mod script;

pub use script::{ScriptAdapter, ScriptScanner};
